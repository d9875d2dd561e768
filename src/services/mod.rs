//! Services Layer
//!
//! Business logic of the matching engine:
//!
//! - `scoring`: pure weighted scoring of a property against a demand
//! - `matching`: persistence and lifecycle around those scores
//! - `notifications`: fire-and-forget new-match event boundary

pub mod matching;
pub mod notifications;
pub mod scoring;

pub use matching::{MatchingService, DEFAULT_MATCH_LIMIT};
pub use notifications::{NotificationHub, NotificationSink};
