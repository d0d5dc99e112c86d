//! Challenge token verification (Cloudflare Turnstile).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default Turnstile verification endpoint.
pub const TURNSTILE_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

/// Timeout for one verification round trip.
const VERIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Verifies a challenge token issued to a browser.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    /// Returns Ok(false) when the provider rejects the token, and an error
    /// when the provider could not be reached or answered garbage.
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool>;
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    secret: &'a str,
    response: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remoteip: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Turnstile siteverify client.
#[derive(Clone)]
pub struct TurnstileVerifier {
    client: reqwest::Client,
    secret: String,
    verify_url: String,
}

impl TurnstileVerifier {
    pub fn new(secret: impl Into<String>, verify_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(VERIFY_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();

        Self {
            client,
            secret: secret.into(),
            verify_url: verify_url.into(),
        }
    }
}

impl std::fmt::Debug for TurnstileVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnstileVerifier")
            .field("verify_url", &self.verify_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChallengeVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, remote_ip: Option<&str>) -> Result<bool> {
        if token.trim().is_empty() {
            return Ok(false);
        }

        let body = VerifyRequest {
            secret: &self.secret,
            response: token,
            remoteip: remote_ip,
        };

        let response = self
            .client
            .post(&self.verify_url)
            .json(&body)
            .send()
            .await
            .context("turnstile request failed")?
            .error_for_status()
            .context("turnstile returned an error status")?;

        let result: VerifyResponse = response
            .json()
            .await
            .context("invalid turnstile response")?;

        if result.success {
            debug!("challenge token verified");
        } else {
            warn!(error_codes = ?result.error_codes, "challenge token rejected");
        }
        Ok(result.success)
    }
}
