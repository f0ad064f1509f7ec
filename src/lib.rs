//! Event Insights Pipeline Library
//!
//! Consumes social messages or card transactions from NATS, classifies each
//! record, and maintains per-key aggregates in a local SQLite store that a
//! dashboard polls.

pub mod classifier;
pub mod config;
pub mod consumer;
pub mod dashboard;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;
pub mod types;

pub use classifier::{FraudRuleEngine, PassthroughScorer, SentimentScorer, Verdict};
pub use config::AppConfig;
pub use consumer::EventConsumer;
pub use dashboard::{DashboardReader, DashboardReporter};
pub use error::{IngestError, SetupError, StoreError};
pub use ingest::{IngestLoop, RecordHandler, SentimentHandler, TransactionHandler};
pub use metrics::{IngestMetrics, IngestSummary};
pub use store::AggregateStore;
pub use types::{SocialMessage, Transaction};
