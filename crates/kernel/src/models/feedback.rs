//! Feedback submitted through the public form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source tag recorded for submissions from the website form.
pub const SOURCE_WEBSITE: &str = "website";

/// Triage status of a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    #[default]
    New,
    Reviewed,
    Archived,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackStatus::New => "new",
            FeedbackStatus::Reviewed => "reviewed",
            FeedbackStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(FeedbackStatus::New),
            "reviewed" => Ok(FeedbackStatus::Reviewed),
            "archived" => Ok(FeedbackStatus::Archived),
            other => Err(format!("unknown feedback status '{other}'")),
        }
    }
}

/// Feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub status: FeedbackStatus,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording validated feedback.
#[derive(Debug, Clone)]
pub struct CreateFeedback {
    pub name: String,
    pub email: String,
    pub message: String,
    pub source: String,
}

impl CreateFeedback {
    /// Build the record with status `new`.
    pub fn into_feedback(self, id: Uuid, now: DateTime<Utc>) -> Feedback {
        Feedback {
            id,
            name: self.name,
            email: self.email,
            message: self.message,
            status: FeedbackStatus::New,
            source: self.source,
            created_at: now,
        }
    }
}
