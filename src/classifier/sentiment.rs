//! Sentiment scoring for social messages

use crate::types::message::SocialMessage;

/// Category and score attached to a message before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentOutcome {
    pub category: String,
    pub sentiment: f64,
}

/// Pluggable scorer. Implementations must be pure: no I/O, no panics.
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score(&self, message: &SocialMessage) -> SentimentOutcome;
}

/// Echoes the category and sentiment supplied upstream by the producer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughScorer;

impl SentimentScorer for PassthroughScorer {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn score(&self, message: &SocialMessage) -> SentimentOutcome {
        SentimentOutcome {
            category: message.category.clone(),
            sentiment: message.sentiment,
        }
    }
}
