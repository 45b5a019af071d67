pub mod cache;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ratelimit;
pub mod routing;

pub use cache::{cache_key, ResponseCache};
pub use domain::{Feedback, FeedbackWithTurn, NewTurn, PolicyVariant, Rating, Resolution, Turn};
pub use errors::PipelineError;
pub use ratelimit::{SessionBuckets, TokenBucket};
pub use routing::{Category, Classification, ResponseKind, Route, Sentiment, ESCALATION_RESPONSE};
