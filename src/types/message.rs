//! Social message records

use super::fields::{DecodeRecord, FieldReader};
use serde::{Deserialize, Serialize};

pub const DEFAULT_AUTHOR: &str = "anonymous";
pub const DEFAULT_CATEGORY: &str = "unknown";
pub const DEFAULT_TIMESTAMP: &str = "unknown";

/// A social-media style message with an upstream sentiment score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialMessage {
    /// Message body
    pub message: String,

    pub author: String,

    /// `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,

    /// Topic label, e.g. "humor" or "tech"
    pub category: String,

    /// Sentiment score, nominally in [-1, 1]
    pub sentiment: f64,

    pub keyword_mentioned: String,

    pub message_length: i64,
}

impl SocialMessage {
    #[cfg(test)]
    pub fn new(author: &str, category: &str, sentiment: f64) -> Self {
        Self {
            message: String::new(),
            author: author.to_string(),
            timestamp: DEFAULT_TIMESTAMP.to_string(),
            category: category.to_string(),
            sentiment,
            keyword_mentioned: String::new(),
            message_length: 0,
        }
    }
}

impl DecodeRecord for SocialMessage {
    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        Self {
            message: fields.string("message", ""),
            author: fields.string("author", DEFAULT_AUTHOR),
            timestamp: fields.string("timestamp", DEFAULT_TIMESTAMP),
            category: fields.string("category", DEFAULT_CATEGORY),
            sentiment: fields.float("sentiment", 0.0),
            keyword_mentioned: fields.string("keyword_mentioned", ""),
            message_length: fields.integer("message_length", 0),
        }
    }
}
