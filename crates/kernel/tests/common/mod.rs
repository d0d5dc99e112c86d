#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Every test gets its own [`TestApp`]: the real router and state, backed
//! by the in-memory store and local storage in a temporary directory. The
//! challenge verifier is the only stand-in, so no test touches the network.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cadence_kernel::config::Environment;
use cadence_kernel::content::ContentSnapshot;
use cadence_kernel::file::{FileStorage, LocalFileStorage};
use cadence_kernel::middleware::admin_auth::AdminClaims;
use cadence_kernel::services::ChallengeVerifier;
use cadence_kernel::store::{ContentStore, MemoryContentStore};
use cadence_kernel::{AppState, Config, build_router};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const ADMIN_EMAIL: &str = "editor@cadence.app";

/// How the challenge verifier answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Challenge {
    Pass,
    Fail,
    /// The provider cannot be reached.
    Unreachable,
    /// No secret configured.
    Missing,
}

struct StubVerifier(Challenge);

#[async_trait]
impl ChallengeVerifier for StubVerifier {
    async fn verify(&self, token: &str, _remote_ip: Option<&str>) -> Result<bool> {
        match self.0 {
            Challenge::Pass => Ok(!token.trim().is_empty()),
            Challenge::Fail => Ok(false),
            Challenge::Unreachable | Challenge::Missing => {
                anyhow::bail!("connection refused")
            }
        }
    }
}

/// Local storage whose deletes always fail.
struct UndeletableStorage(LocalFileStorage);

#[async_trait]
impl FileStorage for UndeletableStorage {
    async fn write(
        &self,
        uri: &str,
        data: &[u8],
        progress: &mut (dyn FnMut(u64) + Send),
    ) -> Result<()> {
        self.0.write(uri, data, progress).await
    }

    async fn delete(&self, _uri: &str) -> Result<()> {
        anyhow::bail!("bucket is read-only")
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        self.0.exists(uri).await
    }

    fn public_url(&self, uri: &str) -> String {
        self.0.public_url(uri)
    }

    fn scheme(&self) -> &'static str {
        self.0.scheme()
    }
}

/// Knobs for building a [`TestApp`].
#[derive(Debug, Clone, Copy)]
pub struct TestOptions {
    pub challenge: Challenge,
    /// Configure AUTH_JWT_SECRET.
    pub admin_api: bool,
    pub undeletable_storage: bool,
    /// Run with `Environment::Production`.
    pub production: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            challenge: Challenge::Pass,
            admin_api: true,
            undeletable_storage: false,
            production: false,
        }
    }
}

/// Test application wrapper using the real kernel routes and state.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryContentStore>,
    _uploads: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with(TestOptions::default()).await
    }

    pub async fn with(options: TestOptions) -> Self {
        let uploads = tempfile::tempdir().expect("Failed to create temp dir");

        let mut config = Config::for_local(uploads.path());
        config.site_url = "https://cadence.test".to_string();
        config.admin_emails = vec![ADMIN_EMAIL.to_string()];
        if options.admin_api {
            config.auth_jwt_secret = Some(JWT_SECRET.to_string());
        }
        if options.production {
            config.environment = Environment::Production;
        }

        let store = Arc::new(MemoryContentStore::new());
        let local = LocalFileStorage::new(uploads.path(), "/files");
        let storage: Arc<dyn FileStorage> = if options.undeletable_storage {
            Arc::new(UndeletableStorage(local))
        } else {
            Arc::new(local)
        };
        let verifier = match options.challenge {
            Challenge::Missing => None,
            c => Some(Arc::new(StubVerifier(c)) as Arc<dyn ChallengeVerifier>),
        };

        let state = AppState::from_parts(
            config,
            store.clone() as Arc<dyn ContentStore>,
            storage,
            verifier,
        )
        .await
        .expect("Failed to initialize AppState");

        Self {
            router: build_router(state.clone()),
            state,
            store,
            _uploads: uploads,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send an admin API request with a valid admin token.
    pub async fn admin(&self, mut request: Request<Body>) -> Response {
        let token = admin_token(ADMIN_EMAIL);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        self.request(request).await
    }

    /// Wait for the cached snapshot to satisfy `pred`.
    pub async fn wait_for(&self, pred: impl FnMut(&ContentSnapshot) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), self.state.content().wait_until(pred))
            .await
            .expect("snapshot did not catch up")
            .expect("content context shut down");
    }
}

/// Sign a token the way the auth provider does.
pub fn token_for(email: Option<&str>, secret: &str) -> String {
    let claims = AdminClaims {
        sub: "user-1".to_string(),
        email: email.map(str::to_string),
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn admin_token(email: &str) -> String {
    token_for(Some(email), JWT_SECRET)
}

/// Build a JSON request.
pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a body-less request.
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

const BOUNDARY: &str = "cadence-test-boundary";

/// Build a multipart upload with one `file` field per entry.
pub fn multipart_request(uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, mime, data) in files {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Collect a response body as a string.
pub async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
