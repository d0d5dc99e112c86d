//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Deployment environment. Controls how much error detail is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

/// Public identity of the site, used by pages, previews and the sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMeta {
    /// Absolute base URL without a trailing slash.
    pub url: String,
    pub name: String,
    pub description: String,
    pub default_image: Option<String>,
}

impl SiteMeta {
    /// Absolute URL for a site path.
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL. Required by `serve` and `sitemap`.
    pub database_url: Option<String>,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// Public site URL used for canonical links, Open Graph and the sitemap.
    pub site_url: String,

    /// Site name shown in titles and social previews (default: Cadence).
    pub site_name: String,

    /// Default description for pages and previews without their own.
    pub site_description: String,

    /// Default social preview image (absolute or site-relative URL).
    pub default_og_image: Option<String>,

    /// Cloudflare Turnstile secret. When None, feedback intake is misconfigured.
    pub turnstile_secret: Option<String>,

    /// Turnstile site key rendered into the feedback form.
    pub turnstile_site_key: Option<String>,

    /// Turnstile verification endpoint.
    pub turnstile_verify_url: String,

    /// Shared secret for verifying admin bearer tokens (HS256).
    pub auth_jwt_secret: Option<String>,

    /// Email addresses allowed into the admin API.
    pub admin_emails: Vec<String>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Deployment environment from APP_ENV (default: production).
    pub environment: Environment,

    /// S3 bucket for uploads. When set (and built with `s3`), replaces local storage.
    pub s3_bucket: Option<String>,

    /// Optional key prefix inside the bucket.
    pub s3_prefix: Option<String>,

    /// Custom endpoint for S3-compatible services.
    pub s3_endpoint: Option<String>,

    /// Public base URL for objects in the bucket.
    pub s3_public_url: Option<String>,
}

impl Config {
    pub fn site(&self) -> SiteMeta {
        SiteMeta {
            url: self.site_url.clone(),
            name: self.site_name.clone(),
            description: self.site_description.clone(),
            default_image: self.default_og_image.clone(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url = env::var("DATABASE_URL").ok();

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let site_url = normalize_site_url(
            &env::var("SITE_URL").unwrap_or_else(|_| format!("http://localhost:{port}")),
        )?;

        let site_name = env::var("SITE_NAME").unwrap_or_else(|_| "Cadence".to_string());

        let site_description = env::var("SITE_DESCRIPTION").unwrap_or_else(|_| {
            "Build habits that stick with Cadence, the streak-friendly habit tracker.".to_string()
        });

        let default_og_image = non_empty_var("DEFAULT_OG_IMAGE");
        let turnstile_secret = non_empty_var("TURNSTILE_SECRET_KEY");
        let turnstile_site_key = non_empty_var("TURNSTILE_SITE_KEY");

        let turnstile_verify_url = env::var("TURNSTILE_VERIFY_URL").unwrap_or_else(|_| {
            crate::services::captcha::TURNSTILE_VERIFY_URL.to_string()
        });

        let auth_jwt_secret = non_empty_var("AUTH_JWT_SECRET");
        let admin_emails = list_var("ADMIN_EMAILS")
            .into_iter()
            .map(|e| e.to_lowercase())
            .collect();

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let environment = match env::var("APP_ENV")
            .unwrap_or_default()
            .to_lowercase()
            .as_str()
        {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        };

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            uploads_dir,
            files_url,
            site_url,
            site_name,
            site_description,
            default_og_image,
            turnstile_secret,
            turnstile_site_key,
            turnstile_verify_url,
            auth_jwt_secret,
            admin_emails,
            cors_allowed_origins,
            environment,
            s3_bucket: non_empty_var("S3_BUCKET"),
            s3_prefix: non_empty_var("S3_PREFIX"),
            s3_endpoint: non_empty_var("S3_ENDPOINT"),
            s3_public_url: non_empty_var("S3_PUBLIC_URL"),
        })
    }

    /// Configuration for tests and tools: no database, local defaults.
    pub fn for_local(uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 3000,
            database_url: None,
            database_max_connections: 5,
            uploads_dir: uploads_dir.into(),
            files_url: "/files".to_string(),
            site_url: "http://localhost:3000".to_string(),
            site_name: "Cadence".to_string(),
            site_description: "Build habits that stick.".to_string(),
            default_og_image: None,
            turnstile_secret: None,
            turnstile_site_key: None,
            turnstile_verify_url: crate::services::captcha::TURNSTILE_VERIFY_URL.to_string(),
            auth_jwt_secret: None,
            admin_emails: Vec::new(),
            cors_allowed_origins: vec!["*".to_string()],
            environment: Environment::Development,
            s3_bucket: None,
            s3_prefix: None,
            s3_endpoint: None,
            s3_public_url: None,
        }
    }
}

/// Check that the site URL is an absolute http(s) URL and strip the
/// trailing slash.
fn normalize_site_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim()).context("SITE_URL must be an absolute URL")?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("SITE_URL must use http or https");
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a comma-separated list, dropping blank entries.
fn list_var(key: &str) -> Vec<String> {
    env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
