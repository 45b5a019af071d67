use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::routing::{Category, Sentiment};

/// Named response-style bundle selectable per request, used for A/B
/// comparison. The registered set is fixed; unknown variants are rejected at
/// the parse boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyVariant {
    A,
    B,
}

impl PolicyVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    pub fn registered() -> &'static [PolicyVariant] {
        &[Self::A, Self::B]
    }
}

impl std::str::FromStr for PolicyVariant {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            other => {
                Err(PipelineError::Validation(format!("policy variant `{other}` is not registered")))
            }
        }
    }
}

/// Thumbs up or down on a persisted turn. Stored as +1 / -1.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    pub fn from_value(value: i64) -> Result<Self, PipelineError> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(PipelineError::Validation(format!("rating must be +1 or -1, got {other}"))),
        }
    }

    pub fn as_value(&self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }
}

/// Result of one classify -> route -> respond run. This is the value the
/// response cache memoizes per (variant, query) key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub category: Category,
    pub sentiment: Sentiment,
    pub response: String,
}

/// One user query and its resolved answer, as persisted. Write-once: the
/// store assigns `id` and `created_at` and nothing mutates a row afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub id: i64,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub query: String,
    pub detected_language: Option<String>,
    pub policy_variant: PolicyVariant,
    pub category: Option<Category>,
    pub sentiment: Option<Sentiment>,
    pub response: String,
    pub latency_ms: u32,
}

/// Fields the caller supplies for a turn insert. `created_at` is assigned by
/// the store when absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTurn {
    pub session_id: String,
    pub query: String,
    pub detected_language: Option<String>,
    pub policy_variant: PolicyVariant,
    pub category: Option<Category>,
    pub sentiment: Option<Sentiment>,
    pub response: String,
    pub latency_ms: u32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub id: i64,
    pub turn_id: i64,
    pub created_at: DateTime<Utc>,
    pub rating: i64,
    pub comment: Option<String>,
}

/// Feedback joined with the turn it rates, for review listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FeedbackWithTurn {
    pub feedback: Feedback,
    pub query: String,
    pub response: String,
    pub policy_variant: PolicyVariant,
}
