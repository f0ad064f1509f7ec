//! Per-record classification

pub mod rules;
pub mod sentiment;

pub use rules::{FraudAssessment, FraudRule, FraudRuleEngine, RuleThresholds, Verdict};
pub use sentiment::{PassthroughScorer, SentimentOutcome, SentimentScorer};
