//! Feedback intake from the public form, and triage for admins.

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::captcha::ChallengeVerifier;
use crate::error::AppError;
use crate::models::{CreateFeedback, Feedback, FeedbackStatus, feedback::SOURCE_WEBSITE};
use crate::store::{ContentStore, StoreError};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_EMAIL_CHARS: usize = 254;
pub const MIN_MESSAGE_CHARS: usize = 10;
pub const MAX_MESSAGE_CHARS: usize = 5000;

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex literal"));

/// Body of `POST /api/feedback`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
    pub turnstile_token: String,
}

/// Why a submission was not recorded.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("verification failed")]
    Verification,

    #[error("{0}")]
    Misconfigured(String),

    #[error("failed to save feedback")]
    Store(#[from] StoreError),
}

impl From<FeedbackError> for AppError {
    fn from(err: FeedbackError) -> Self {
        match err {
            FeedbackError::Validation { field, message } => AppError::validation(field, message),
            FeedbackError::Verification => AppError::Verification,
            FeedbackError::Misconfigured(msg) => AppError::ServerMisconfigured(msg),
            FeedbackError::Store(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}

fn invalid(field: &'static str, message: &str) -> FeedbackError {
    FeedbackError::Validation {
        field,
        message: message.to_string(),
    }
}

/// Check the form fields and return the cleaned-up record input.
pub fn validate_submission(submission: &FeedbackSubmission) -> Result<CreateFeedback, FeedbackError> {
    let name = submission.name.trim();
    if name.is_empty() {
        return Err(invalid("name", "Name is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(invalid("name", "Name is too long"));
    }

    let email = submission.email.trim();
    if email.is_empty() {
        return Err(invalid("email", "Email is required"));
    }
    if email.len() > MAX_EMAIL_CHARS || !EMAIL_RE.is_match(email) || email.contains("..") {
        return Err(invalid("email", "Please enter a valid email address"));
    }

    let message = submission.message.trim();
    let length = message.chars().count();
    if length < MIN_MESSAGE_CHARS {
        return Err(invalid(
            "message",
            "Message must be at least 10 characters",
        ));
    }
    if length > MAX_MESSAGE_CHARS {
        return Err(invalid("message", "Message is too long"));
    }

    Ok(CreateFeedback {
        name: name.to_string(),
        email: email.to_string(),
        message: message.to_string(),
        source: SOURCE_WEBSITE.to_string(),
    })
}

/// Feedback intake and triage.
#[derive(Clone)]
pub struct FeedbackService {
    store: Arc<dyn ContentStore>,
    verifier: Option<Arc<dyn ChallengeVerifier>>,
}

impl FeedbackService {
    /// `verifier` is None when no challenge secret is configured; every
    /// submission is then refused as a server misconfiguration.
    pub fn new(store: Arc<dyn ContentStore>, verifier: Option<Arc<dyn ChallengeVerifier>>) -> Self {
        Self { store, verifier }
    }

    /// Validate, verify the challenge token, and record the submission.
    pub async fn submit(
        &self,
        submission: FeedbackSubmission,
        remote_ip: Option<&str>,
    ) -> Result<Uuid, FeedbackError> {
        let input = validate_submission(&submission)?;

        let Some(verifier) = &self.verifier else {
            warn!("feedback submitted but TURNSTILE_SECRET_KEY is not set");
            return Err(FeedbackError::Misconfigured(
                "Server misconfigured: TURNSTILE_SECRET_KEY is not set".to_string(),
            ));
        };

        match verifier.verify(&submission.turnstile_token, remote_ip).await {
            Ok(true) => {}
            Ok(false) => return Err(FeedbackError::Verification),
            Err(e) => {
                warn!(error = %e, "challenge verification unavailable");
                return Err(FeedbackError::Verification);
            }
        }

        let feedback = input.into_feedback(Uuid::now_v7(), Utc::now());
        self.store.insert_feedback(&feedback).await.map_err(|e| {
            warn!(error = %e, "failed to record feedback");
            FeedbackError::Store(e)
        })?;

        info!(feedback_id = %feedback.id, source = %feedback.source, "feedback recorded");
        Ok(feedback.id)
    }

    /// All feedback, newest first.
    pub async fn list(&self) -> Result<Vec<Feedback>, StoreError> {
        self.store.list_feedback().await
    }

    pub async fn set_status(&self, id: Uuid, status: FeedbackStatus) -> Result<(), StoreError> {
        if !self.store.set_feedback_status(id, status).await? {
            return Err(StoreError::NotFound);
        }
        info!(feedback_id = %id, status = %status, "feedback status changed");
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        if !self.store.delete_feedback(id).await? {
            return Err(StoreError::NotFound);
        }
        info!(feedback_id = %id, "feedback deleted");
        Ok(())
    }
}
