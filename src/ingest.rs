//! The ingestion loop: decode, classify and persist one record at a time.

use crate::classifier::{FraudAssessment, FraudRuleEngine, SentimentOutcome, SentimentScorer};
use crate::error::{IngestError, StoreResult};
use crate::metrics::{IngestMetrics, IngestSummary};
use crate::store::AggregateStore;
use crate::types::{DecodeRecord, SocialMessage, Transaction};
use futures::{Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Variant-specific behaviour plugged into the ingestion loop.
pub trait RecordHandler {
    type Record: DecodeRecord + std::fmt::Debug;
    type Outcome;

    /// Short name used in logs
    fn kind(&self) -> &'static str;

    fn classify(&self, record: &Self::Record) -> Self::Outcome;

    /// Write the record and its outcome in one store transaction.
    fn persist(
        &self,
        store: &mut AggregateStore,
        record: &Self::Record,
        outcome: &Self::Outcome,
    ) -> StoreResult<i64>;

    /// Label the outcome is counted under in metrics.
    fn label(&self, outcome: &Self::Outcome) -> String;

    fn log_stored(&self, id: i64, record: &Self::Record, outcome: &Self::Outcome);
}

/// Social messages: score, then fold into the author/category means.
pub struct SentimentHandler {
    scorer: Box<dyn SentimentScorer>,
}

impl SentimentHandler {
    pub fn new<S: SentimentScorer + 'static>(scorer: S) -> Self {
        Self {
            scorer: Box::new(scorer),
        }
    }
}

impl RecordHandler for SentimentHandler {
    type Record = SocialMessage;
    type Outcome = SentimentOutcome;

    fn kind(&self) -> &'static str {
        "message"
    }

    fn classify(&self, record: &SocialMessage) -> SentimentOutcome {
        self.scorer.score(record)
    }

    fn persist(
        &self,
        store: &mut AggregateStore,
        record: &SocialMessage,
        outcome: &SentimentOutcome,
    ) -> StoreResult<i64> {
        store.insert_message(record, outcome)
    }

    fn label(&self, outcome: &SentimentOutcome) -> String {
        outcome.category.clone()
    }

    fn log_stored(&self, id: i64, record: &SocialMessage, outcome: &SentimentOutcome) {
        info!(
            id,
            author = %record.author,
            category = %outcome.category,
            sentiment = outcome.sentiment,
            scorer = self.scorer.name(),
            "Message stored"
        );
    }
}

/// Card transactions: apply the fraud rules, then store in the matching
/// partition.
pub struct TransactionHandler {
    rules: FraudRuleEngine,
}

impl TransactionHandler {
    pub fn new(rules: FraudRuleEngine) -> Self {
        Self { rules }
    }
}

impl RecordHandler for TransactionHandler {
    type Record = Transaction;
    type Outcome = FraudAssessment;

    fn kind(&self) -> &'static str {
        "transaction"
    }

    fn classify(&self, record: &Transaction) -> FraudAssessment {
        self.rules.assess(record)
    }

    fn persist(
        &self,
        store: &mut AggregateStore,
        record: &Transaction,
        outcome: &FraudAssessment,
    ) -> StoreResult<i64> {
        store.insert_transaction(record, outcome.verdict)
    }

    fn label(&self, outcome: &FraudAssessment) -> String {
        outcome.verdict.as_str().to_string()
    }

    fn log_stored(&self, id: i64, record: &Transaction, outcome: &FraudAssessment) {
        if outcome.verdict.is_fraud() {
            warn!(
                id,
                name = %record.name,
                merchant = %record.merchant,
                amount = record.amount,
                card_type = %record.card_type,
                rules = ?outcome.rule_names(),
                "Fraud detected"
            );
        } else {
            info!(
                id,
                name = %record.name,
                merchant = %record.merchant,
                amount = record.amount,
                "Legitimate transaction"
            );
        }
    }
}

/// Result of one successfully processed record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: i64,
    pub label: String,
    pub degraded: bool,
}

/// Single-writer consumer driving records through classifier and store.
pub struct IngestLoop<H: RecordHandler> {
    handler: H,
    store: AggregateStore,
    metrics: Arc<IngestMetrics>,
}

impl<H: RecordHandler> IngestLoop<H> {
    pub fn new(handler: H, store: AggregateStore, metrics: Arc<IngestMetrics>) -> Self {
        Self {
            handler,
            store,
            metrics,
        }
    }

    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Hand the store back for an orderly close.
    pub fn into_store(self) -> AggregateStore {
        self.store
    }

    /// Consume `payloads` until the stream ends or `shutdown` resolves.
    ///
    /// Shutdown is only observed while waiting for the next payload, so a
    /// record that has been pulled off the stream is always either fully
    /// committed or rolled back before the loop exits.
    pub async fn run<S, F>(&mut self, payloads: S, shutdown: F) -> IngestSummary
    where
        S: Stream,
        S::Item: AsRef<[u8]>,
        F: Future<Output = ()>,
    {
        tokio::pin!(payloads);
        tokio::pin!(shutdown);

        info!(kind = self.handler.kind(), "Ingestion loop started");

        loop {
            let payload = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping ingestion");
                    break;
                }
                next = payloads.next() => match next {
                    Some(payload) => payload,
                    None => {
                        info!("Inbound stream ended");
                        break;
                    }
                },
            };

            // The single local writer commits inline on this task, so shutdown
            // is only ever observed between fully committed records.
            if self.handle(payload.as_ref()).is_err() {
                // Already logged and counted.
                continue;
            }
        }

        let summary = self.metrics.summary();
        info!(
            received = summary.received,
            stored = summary.stored,
            failed = summary.failed,
            "Ingestion loop stopped"
        );
        summary
    }

    /// Process one raw payload. Errors are logged and counted, then returned
    /// so callers can tell a skipped record from a stored one.
    pub fn handle(&mut self, payload: &[u8]) -> Result<StoredRecord, IngestError> {
        let started = Instant::now();
        self.metrics.record_received();

        match self.process(payload) {
            Ok(stored) => {
                self.metrics
                    .record_stored(started.elapsed(), &stored.label, stored.degraded);
                Ok(stored)
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(
                    kind = self.handler.kind(),
                    stage = e.stage(),
                    error = %e,
                    payload_len = payload.len(),
                    "Record skipped"
                );
                Err(e)
            }
        }
    }

    fn process(&mut self, payload: &[u8]) -> Result<StoredRecord, IngestError> {
        let decoded = <H::Record as DecodeRecord>::decode(payload)?;
        if decoded.is_degraded() {
            warn!(
                kind = self.handler.kind(),
                fields = ?decoded.degraded,
                record = ?decoded.record,
                "Record decoded with defaults for malformed fields"
            );
        }

        let outcome = self.handler.classify(&decoded.record);
        let id = self
            .handler
            .persist(&mut self.store, &decoded.record, &outcome)?;
        self.handler.log_stored(id, &decoded.record, &outcome);

        Ok(StoredRecord {
            id,
            label: self.handler.label(&outcome),
            degraded: decoded.is_degraded(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{PassthroughScorer, Verdict};
    use crate::error::DecodeError;

    fn store() -> AggregateStore {
        let mut store = AggregateStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn transaction_loop() -> IngestLoop<TransactionHandler> {
        IngestLoop::new(
            TransactionHandler::new(FraudRuleEngine::default()),
            store(),
            Arc::new(IngestMetrics::new()),
        )
    }

    #[test]
    fn test_handle_transaction_scenarios() {
        let mut ingest = transaction_loop();

        let large = ingest
            .handle(br#"{"amount": 950, "merchant": "Grocery", "purchase_location": 1, "home_location": 1, "type": "Credit"}"#)
            .unwrap();
        assert_eq!(large.label, "fraud");

        let restaurant = ingest
            .handle(br#"{"amount": 600, "merchant": "Restaurant", "purchase_location": 1, "home_location": 1, "type": "Credit"}"#)
            .unwrap();
        assert_eq!(restaurant.label, "legit");

        let retail = ingest
            .handle(br#"{"amount": 750, "merchant": "Retail Store", "purchase_location": 1, "home_location": 1, "type": "Credit"}"#)
            .unwrap();
        assert_eq!(retail.label, "fraud");

        let counts = ingest.store().counts().unwrap();
        assert_eq!(counts.transactions, 3);
        assert_eq!(counts.fraud, 2);
        assert_eq!(counts.legit, 1);
        assert_eq!(
            ingest.store().recent_partition(Verdict::Legit, 5).unwrap()[0]
                .transaction
                .merchant,
            "Restaurant"
        );
    }

    #[test]
    fn test_bad_payload_is_skipped_and_counted() {
        let mut ingest = transaction_loop();

        let err = ingest.handle(b"{not json").unwrap_err();
        assert!(matches!(err, IngestError::Decode(DecodeError::InvalidJson(_))));

        ingest.handle(br#"{"amount": 10}"#).unwrap();

        let summary = ingest.metrics.summary();
        assert_eq!(summary.received, 2);
        assert_eq!(summary.stored, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_degraded_record_is_stored() {
        let mut ingest = IngestLoop::new(
            SentimentHandler::new(PassthroughScorer),
            store(),
            Arc::new(IngestMetrics::new()),
        );

        let stored = ingest
            .handle(br#"{"author": "Frank", "sentiment": {"score": 1}, "category": "tech"}"#)
            .unwrap();

        assert!(stored.degraded);
        assert_eq!(stored.label, "tech");
        let authors = ingest.store().author_sentiment().unwrap();
        assert_eq!(authors[0].key, "Frank");
        assert_eq!(authors[0].avg_sentiment, 0.0);
    }

    #[test]
    fn test_store_failure_is_reported() {
        // Schema never created: every write fails.
        let store = AggregateStore::open_in_memory().unwrap();
        let mut ingest = IngestLoop::new(
            SentimentHandler::new(PassthroughScorer),
            store,
            Arc::new(IngestMetrics::new()),
        );

        let err = ingest.handle(br#"{"author": "Eve"}"#).unwrap_err();
        assert_eq!(err.stage(), "store");
    }

    #[tokio::test]
    async fn test_run_stops_at_end_of_stream() {
        let mut ingest = transaction_loop();
        let payloads = futures::stream::iter(vec![
            br#"{"amount": 950}"#.to_vec(),
            b"garbage".to_vec(),
            br#"{"amount": 20}"#.to_vec(),
        ]);

        let summary = ingest.run(payloads, std::future::pending::<()>()).await;

        assert_eq!(summary.received, 3);
        assert_eq!(summary.stored, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.label("fraud"), 1);
        assert_eq!(summary.label("legit"), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut ingest = transaction_loop();
        let payloads = futures::stream::pending::<Vec<u8>>();

        let summary = ingest.run(payloads, async {}).await;

        assert_eq!(summary.received, 0);
        assert_eq!(ingest.store().counts().unwrap().transactions, 0);
    }
}
