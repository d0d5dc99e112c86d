//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{Config, SiteMeta};
use crate::content::ContentContext;
use crate::db;
use crate::file::{FileStorage, LocalFileStorage};
use crate::media::MediaLibrary;
use crate::middleware::AdminAuth;
use crate::services::{ChallengeVerifier, FeedbackService, TurnstileVerifier};
use crate::store::{ContentStore, PgContentStore};
use crate::theme::ThemeEngine;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Cached posts and media, kept fresh from store notifications.
    content: ContentContext,

    media: MediaLibrary,

    feedback: FeedbackService,

    theme: Arc<ThemeEngine>,

    /// Admin token verification (available when AUTH_JWT_SECRET is set).
    admin_auth: Option<AdminAuth>,
}

impl AppState {
    /// Connect to PostgreSQL and object storage and load the content.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::create_pool(config)
            .await
            .context("failed to create database pool")?;

        db::run_migrations(&pool)
            .await
            .context("failed to run migrations")?;

        let store: Arc<dyn ContentStore> = Arc::new(PgContentStore::new(pool));
        let storage = build_storage(config).await?;

        let verifier = config.turnstile_secret.as_ref().map(|secret| {
            Arc::new(TurnstileVerifier::new(secret.clone(), config.turnstile_verify_url.clone()))
                as Arc<dyn ChallengeVerifier>
        });
        if verifier.is_none() {
            warn!("TURNSTILE_SECRET_KEY is not set; feedback submissions will be refused");
        }

        Self::from_parts(config.clone(), store, storage, verifier).await
    }

    /// Assemble state from already-built backends.
    pub async fn from_parts(
        config: Config,
        store: Arc<dyn ContentStore>,
        storage: Arc<dyn FileStorage>,
        verifier: Option<Arc<dyn ChallengeVerifier>>,
    ) -> Result<Self> {
        let content = ContentContext::start(store.clone(), storage)
            .await
            .context("failed to load content")?;

        let theme = ThemeEngine::new(config.site(), config.environment.is_development())
            .context("failed to load templates")?;

        let admin_auth = config
            .auth_jwt_secret
            .as_ref()
            .map(|secret| AdminAuth::new(secret.as_bytes(), config.admin_emails.clone()));
        if admin_auth.is_some() && config.admin_emails.is_empty() {
            warn!("ADMIN_EMAILS is empty; no one can use the admin API");
        }

        info!(
            site = %config.site_url,
            admin_api = admin_auth.is_some(),
            "application state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                media: MediaLibrary::new(content.clone()),
                feedback: FeedbackService::new(store, verifier),
                theme: Arc::new(theme),
                admin_auth,
                content,
                config,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn site(&self) -> &SiteMeta {
        self.inner.theme.site()
    }

    pub fn content(&self) -> &ContentContext {
        &self.inner.content
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        self.inner.content.store()
    }

    pub fn media(&self) -> &MediaLibrary {
        &self.inner.media
    }

    pub fn feedback(&self) -> &FeedbackService {
        &self.inner.feedback
    }

    pub fn theme(&self) -> &ThemeEngine {
        &self.inner.theme
    }

    pub fn admin_auth(&self) -> Option<&AdminAuth> {
        self.inner.admin_auth.as_ref()
    }

    /// Stop background work.
    pub async fn shutdown(&self) {
        self.inner.content.shutdown().await;
    }
}

/// Object storage from configuration: S3 when a bucket is set and the
/// `s3` feature is built, local disk otherwise.
async fn build_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    #[cfg(feature = "s3")]
    if let Some(bucket) = &config.s3_bucket {
        let base_url = config
            .s3_public_url
            .clone()
            .context("S3_PUBLIC_URL is required when S3_BUCKET is set")?;
        info!(bucket = %bucket, "using S3 storage");
        return Ok(Arc::new(
            crate::file::S3FileStorage::new(
                bucket.clone(),
                config.s3_prefix.clone(),
                config.s3_endpoint.as_deref(),
                base_url,
            )
            .await,
        ));
    }

    #[cfg(not(feature = "s3"))]
    if config.s3_bucket.is_some() {
        warn!("S3_BUCKET is set but the s3 feature is not enabled; using local storage");
    }

    tokio::fs::create_dir_all(&config.uploads_dir)
        .await
        .with_context(|| format!("failed to create {}", config.uploads_dir.display()))?;
    info!(dir = %config.uploads_dir.display(), "using local storage");
    Ok(Arc::new(LocalFileStorage::new(
        &config.uploads_dir,
        &config.files_url,
    )))
}
