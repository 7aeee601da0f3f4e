//! The persistent rate-limit discovery store: an r2d2-pooled
//! SQLite database that learns per-resource rate limits from observed
//! responses and 429s. Every call blocks on SQLite; callers on an async
//! runtime should dispatch through `tokio::task::spawn_blocking`.

mod confidence;
mod error;
mod learner;
mod store;

pub use confidence::{compute_confidence, should_update, MIN_USABLE_CONFIDENCE};
pub use error::DiscoveryError;
pub use learner::{learn_from_429, LearnedEstimate, CANDIDATE_WINDOWS};
pub use store::{DiscoveryStore, LearningEntry};
