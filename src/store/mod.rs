//! SQLite-backed aggregate store.
//!
//! Only this module talks to the database. The ingestion loop owns the single
//! writable `AggregateStore`; the dashboard opens its own read-only handles.

pub mod schema;

use crate::classifier::{SentimentOutcome, Verdict};
use crate::error::{StoreError, StoreResult};
use crate::types::{SocialMessage, Transaction};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Point on the sentiment-over-time series.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentPoint {
    pub timestamp: String,
    pub sentiment: f64,
}

/// Running mean for one key of an aggregate table.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub key: String,
    pub avg_sentiment: f64,
    pub message_count: i64,
}

/// A raw message row with its store identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: i64,
    pub message: SocialMessage,
}

/// A raw transaction row with its store identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTransaction {
    pub id: i64,
    pub transaction: Transaction,
}

/// Row counts across every table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub messages: i64,
    pub sentiment_rows: i64,
    pub transactions: i64,
    pub fraud: i64,
    pub legit: i64,
}

fn partition_table(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Fraud => "is_fraud",
        Verdict::Legit => "legit_transactions",
    }
}

/// Persistent store of raw records and their aggregates.
pub struct AggregateStore {
    conn: Connection,
}

impl AggregateStore {
    /// Open (or create) the store at `path`, creating missing directories.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(path)?;
        // WAL lets the dashboard read while the writer commits.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        info!(path = %path.display(), "Opened aggregate store");
        Ok(Self { conn })
    }

    /// Open an in-memory store (used in tests).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open a read-only handle on an existing store file.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self { conn })
    }

    /// Delete a store file and its WAL siblings. Returns whether the main
    /// file existed.
    pub fn remove_files<P: AsRef<Path>>(path: P) -> std::io::Result<bool> {
        let path = path.as_ref();
        let existed = remove_if_exists(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut sibling = path.as_os_str().to_owned();
            sibling.push(suffix);
            remove_if_exists(Path::new(&sibling))?;
        }
        Ok(existed)
    }

    /// Drop and recreate every table. Safe to call repeatedly; each call
    /// leaves an empty store.
    pub fn initialize(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(schema::DROP_ALL)?;
        tx.execute_batch(schema::CREATE_ALL)?;
        tx.commit()?;
        info!("Aggregate store schema initialized");
        Ok(())
    }

    /// Store one message and fold its score into both aggregates.
    ///
    /// Runs in a single transaction: the raw row, the metric-history row and
    /// both aggregate upserts commit together or not at all. Returns the id
    /// of the raw row.
    pub fn insert_message(
        &mut self,
        message: &SocialMessage,
        outcome: &SentimentOutcome,
    ) -> StoreResult<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            schema::INSERT_STREAMED_MESSAGE,
            params![
                message.message,
                message.author,
                message.timestamp,
                message.category,
                message.sentiment,
                message.keyword_mentioned,
                message.message_length,
            ],
        )?;
        let id = tx.last_insert_rowid();

        tx.execute(
            schema::INSERT_SENTIMENT_MESSAGE,
            params![
                outcome.category,
                message.author,
                outcome.sentiment,
                message.timestamp
            ],
        )?;
        tx.execute(
            schema::UPSERT_CATEGORY_SENTIMENT,
            params![outcome.category],
        )?;
        tx.execute(
            schema::UPSERT_AUTHOR_SENTIMENT,
            params![message.author],
        )?;

        tx.commit()?;
        debug!(id, author = %message.author, category = %outcome.category, "Inserted message");
        Ok(id)
    }

    /// Store one transaction in the raw table and in its verdict partition,
    /// atomically. Returns the id of the raw row.
    pub fn insert_transaction(
        &mut self,
        transaction: &Transaction,
        verdict: Verdict,
    ) -> StoreResult<i64> {
        let tx = self.conn.transaction()?;

        let id = insert_transaction_row(&tx, "transactions", transaction)?;
        insert_transaction_row(&tx, partition_table(verdict), transaction)?;

        tx.commit()?;
        debug!(id, verdict = %verdict, "Inserted transaction");
        Ok(id)
    }

    /// Remove a raw message row. Aggregates are left as they are.
    pub fn delete_message(&mut self, id: i64) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM streamed_messages WHERE id = ?1", params![id])?;
        info!(id, removed, "Deleted message");
        Ok(removed > 0)
    }

    /// Remove a raw transaction row. Partition tables are left as they are.
    pub fn delete_transaction(&mut self, id: i64) -> StoreResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM transactions WHERE id = ?1", params![id])?;
        info!(id, removed, "Deleted transaction");
        Ok(removed > 0)
    }

    /// Most recent sentiment history rows, newest first.
    pub fn recent_sentiment(&self, limit: usize) -> StoreResult<Vec<SentimentPoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp, sentiment FROM sentiment_messages
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let points = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SentimentPoint {
                    timestamp: row.get(0)?,
                    sentiment: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(points)
    }

    /// Most recent raw messages, newest first.
    pub fn recent_messages(&self, limit: usize) -> StoreResult<Vec<StoredMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, message, author, timestamp, category, sentiment,
                    keyword_mentioned, message_length
             FROM streamed_messages ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let messages = stmt
            .query_map(params![limit as i64], |row| {
                Ok(StoredMessage {
                    id: row.get(0)?,
                    message: SocialMessage {
                        message: row.get(1)?,
                        author: row.get(2)?,
                        timestamp: row.get(3)?,
                        category: row.get(4)?,
                        sentiment: row.get(5)?,
                        keyword_mentioned: row.get(6)?,
                        message_length: row.get(7)?,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    /// Mean sentiment per category, highest first.
    pub fn category_sentiment(&self) -> StoreResult<Vec<AggregateRow>> {
        self.aggregate_rows(
            "SELECT category, avg_sentiment, message_count FROM category_sentiment
             ORDER BY avg_sentiment DESC, category ASC",
        )
    }

    /// Mean sentiment per author, highest first.
    pub fn author_sentiment(&self) -> StoreResult<Vec<AggregateRow>> {
        self.aggregate_rows(
            "SELECT author, avg_sentiment, message_count FROM author_sentiment
             ORDER BY avg_sentiment DESC, author ASC",
        )
    }

    fn aggregate_rows(&self, sql: &str) -> StoreResult<Vec<AggregateRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(AggregateRow {
                    key: row.get(0)?,
                    avg_sentiment: row.get(1)?,
                    message_count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent raw transactions, newest first.
    pub fn recent_transactions(&self, limit: usize) -> StoreResult<Vec<StoredTransaction>> {
        self.transaction_rows("transactions", limit)
    }

    /// Most recent transactions of one verdict partition, newest first.
    pub fn recent_partition(
        &self,
        verdict: Verdict,
        limit: usize,
    ) -> StoreResult<Vec<StoredTransaction>> {
        self.transaction_rows(partition_table(verdict), limit)
    }

    fn transaction_rows(&self, table: &str, limit: usize) -> StoreResult<Vec<StoredTransaction>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, {} FROM {} ORDER BY timestamp DESC, id DESC LIMIT ?1",
            schema::TRANSACTION_COLUMNS,
            table
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], transaction_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Row counts of every table.
    pub fn counts(&self) -> StoreResult<StoreCounts> {
        Ok(StoreCounts {
            messages: self.count("streamed_messages")?,
            sentiment_rows: self.count("sentiment_messages")?,
            transactions: self.count("transactions")?,
            fraud: self.count("is_fraud")?,
            legit: self.count("legit_transactions")?,
        })
    }

    fn count(&self, table: &str) -> StoreResult<i64> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }

    /// Close the connection, surfacing any error from finalizing it.
    pub fn close(self) -> StoreResult<()> {
        self.conn.close().map_err(|(_, err)| StoreError::from(err))
    }
}

fn insert_transaction_row(
    tx: &rusqlite::Transaction<'_>,
    table: &str,
    transaction: &Transaction,
) -> StoreResult<i64> {
    tx.execute(
        &format!(
            "INSERT INTO {} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            table,
            schema::TRANSACTION_COLUMNS
        ),
        params![
            transaction.name,
            transaction.merchant,
            transaction.amount,
            transaction.purchase_location,
            transaction.home_location,
            transaction.card_type,
            transaction.timestamp,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<StoredTransaction> {
    Ok(StoredTransaction {
        id: row.get(0)?,
        transaction: Transaction {
            name: row.get(1)?,
            merchant: row.get(2)?,
            amount: row.get(3)?,
            purchase_location: row.get(4)?,
            home_location: row.get(5)?,
            card_type: row.get(6)?,
            timestamp: row.get(7)?,
        },
    })
}

fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{PassthroughScorer, SentimentScorer};

    fn store() -> AggregateStore {
        let mut store = AggregateStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        store
    }

    fn insert(store: &mut AggregateStore, author: &str, category: &str, sentiment: f64) -> i64 {
        let msg = SocialMessage::new(author, category, sentiment);
        let outcome = PassthroughScorer.score(&msg);
        store.insert_message(&msg, &outcome).unwrap()
    }

    fn aggregate(rows: &[AggregateRow], key: &str) -> Option<f64> {
        rows.iter().find(|r| r.key == key).map(|r| r.avg_sentiment)
    }

    fn recomputed_avg(store: &AggregateStore, column: &str, key: &str) -> f64 {
        store
            .conn
            .query_row(
                &format!(
                    "SELECT AVG(sentiment) FROM sentiment_messages WHERE {} = ?1",
                    column
                ),
                params![key],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn test_humor_category_mean() {
        let mut store = store();
        for sentiment in [0.8, 0.6, 1.0] {
            insert(&mut store, "Charlie", "humor", sentiment);
        }

        let categories = store.category_sentiment().unwrap();
        let humor = aggregate(&categories, "humor").unwrap();
        assert!((humor - 0.8).abs() < 1e-9);
        assert_eq!(categories[0].message_count, 3);
    }

    #[test]
    fn test_running_mean_matches_history_after_every_insert() {
        let mut store = store();
        let authors = ["Alice", "Bob", "Charlie"];
        let categories = ["humor", "tech", "food", "travel"];

        for i in 0..40 {
            let author = authors[i % authors.len()];
            let category = categories[(i * 7) % categories.len()];
            let sentiment = ((i * 37) % 21) as f64 / 10.0 - 1.0;
            insert(&mut store, author, category, sentiment);

            let by_author = store.author_sentiment().unwrap();
            let by_category = store.category_sentiment().unwrap();

            let expected_author = recomputed_avg(&store, "author", author);
            let expected_category = recomputed_avg(&store, "category", category);
            assert_eq!(aggregate(&by_author, author), Some(expected_author));
            assert_eq!(aggregate(&by_category, category), Some(expected_category));
        }
    }

    #[test]
    fn test_mean_is_exact_for_long_single_key_history() {
        let mut store = store();
        for sentiment in [0.8, 0.6, 1.0, 0.1, 0.2, 0.3, -0.7, 0.33, 0.9, 0.45] {
            insert(&mut store, "Dana", "humor", sentiment);

            let expected = recomputed_avg(&store, "category", "humor");
            let humor = aggregate(&store.category_sentiment().unwrap(), "humor");
            assert_eq!(humor, Some(expected));
            let dana = aggregate(&store.author_sentiment().unwrap(), "Dana");
            assert_eq!(dana, Some(recomputed_avg(&store, "author", "Dana")));
        }
        assert_eq!(store.category_sentiment().unwrap()[0].message_count, 10);
    }

    #[test]
    fn test_aggregates_ordered_by_mean_descending() {
        let mut store = store();
        insert(&mut store, "Alice", "humor", 0.9);
        insert(&mut store, "Bob", "tech", -0.4);
        insert(&mut store, "Eve", "food", 0.1);

        let keys: Vec<String> = store
            .author_sentiment()
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["Alice", "Eve", "Bob"]);
    }

    #[test]
    fn test_initialize_is_idempotent_and_clears_rows() {
        let mut store = store();
        insert(&mut store, "Alice", "humor", 0.5);
        store
            .insert_transaction(&Transaction::new("Grocery", 10.0, 1, "Credit"), Verdict::Legit)
            .unwrap();

        store.initialize().unwrap();
        assert_eq!(store.counts().unwrap(), StoreCounts::default());
        assert!(store.category_sentiment().unwrap().is_empty());

        store.initialize().unwrap();
        assert_eq!(store.counts().unwrap(), StoreCounts::default());
        assert!(store.author_sentiment().unwrap().is_empty());

        // Schema is usable after the second call.
        insert(&mut store, "Alice", "humor", 0.5);
        assert_eq!(store.counts().unwrap().messages, 1);
    }

    #[test]
    fn test_failed_aggregate_upsert_rolls_back_raw_insert() {
        let mut store = store();
        insert(&mut store, "Alice", "humor", 0.2);

        // Break the last step of the write path.
        store.conn.execute_batch("DROP TABLE author_sentiment;").unwrap();

        let msg = SocialMessage::new("Bob", "humor", 1.0);
        let outcome = PassthroughScorer.score(&msg);
        assert!(store.insert_message(&msg, &outcome).is_err());

        let counts = store.counts().unwrap();
        assert_eq!(counts.messages, 1);
        assert_eq!(counts.sentiment_rows, 1);
        let humor = aggregate(&store.category_sentiment().unwrap(), "humor").unwrap();
        assert!((humor - 0.2).abs() < 1e-12);

        // Restore the table and retry the same record.
        store.conn.execute_batch(schema::CREATE_ALL).unwrap();
        store.insert_message(&msg, &outcome).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.messages, 2);
        assert_eq!(counts.sentiment_rows, 2);
        let humor = aggregate(&store.category_sentiment().unwrap(), "humor").unwrap();
        assert!((humor - 0.6).abs() < 1e-12);
        assert_eq!(
            aggregate(&store.author_sentiment().unwrap(), "Bob"),
            Some(1.0)
        );
    }

    #[test]
    fn test_transactions_are_partitioned_by_verdict() {
        let mut store = store();
        let fraud = Transaction::new("Grocery", 950.0, 1, "Credit");
        let legit = Transaction::new("Restaurant", 600.0, 1, "Credit");

        store.insert_transaction(&fraud, Verdict::Fraud).unwrap();
        store.insert_transaction(&legit, Verdict::Legit).unwrap();
        store.insert_transaction(&legit, Verdict::Legit).unwrap();

        let counts = store.counts().unwrap();
        assert_eq!(counts.transactions, 3);
        assert_eq!(counts.fraud, 1);
        assert_eq!(counts.legit, 2);

        let flagged = store.recent_partition(Verdict::Fraud, 10).unwrap();
        assert_eq!(flagged[0].transaction, fraud);
    }

    #[test]
    fn test_failed_partition_insert_rolls_back_raw_insert() {
        let mut store = store();
        store.conn.execute_batch("DROP TABLE is_fraud;").unwrap();

        let tx = Transaction::new("Grocery", 950.0, 1, "Credit");
        assert!(store.insert_transaction(&tx, Verdict::Fraud).is_err());
        assert_eq!(store.recent_transactions(10).unwrap().len(), 0);
    }

    #[test]
    fn test_delete_leaves_aggregates_untouched() {
        let mut store = store();
        let id = insert(&mut store, "Alice", "humor", 1.0);
        insert(&mut store, "Alice", "humor", 0.0);

        assert!(store.delete_message(id).unwrap());
        assert!(!store.delete_message(id).unwrap());

        assert_eq!(store.counts().unwrap().messages, 1);
        let humor = aggregate(&store.category_sentiment().unwrap(), "humor").unwrap();
        assert!((humor - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_delete_transaction() {
        let mut store = store();
        let id = store
            .insert_transaction(&Transaction::new("Grocery", 10.0, 1, "Credit"), Verdict::Legit)
            .unwrap();

        assert!(store.delete_transaction(id).unwrap());
        let counts = store.counts().unwrap();
        assert_eq!(counts.transactions, 0);
        assert_eq!(counts.legit, 1);
    }

    #[test]
    fn test_recent_reads_newest_first_with_limit() {
        let mut store = store();
        for (i, ts) in ["2025-01-29 14:35:20", "2025-01-29 14:35:22", "2025-01-29 14:35:21"]
            .iter()
            .enumerate()
        {
            let mut msg = SocialMessage::new("Alice", "humor", i as f64 / 10.0);
            msg.timestamp = ts.to_string();
            let outcome = PassthroughScorer.score(&msg);
            store.insert_message(&msg, &outcome).unwrap();
        }

        let points = store.recent_sentiment(2).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].timestamp, "2025-01-29 14:35:22");
        assert_eq!(points[1].timestamp, "2025-01-29 14:35:21");

        let messages = store.recent_messages(10).unwrap();
        assert_eq!(messages[0].message.timestamp, "2025-01-29 14:35:22");
    }

    #[test]
    fn test_file_store_creates_directories_and_reader_sees_commits() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data").join("pipeline.sqlite");

        let mut writer = AggregateStore::open(&path).unwrap();
        writer.initialize().unwrap();
        insert(&mut writer, "Grace", "tech", 0.4);

        let reader = AggregateStore::open_read_only(&path).unwrap();
        assert_eq!(reader.counts().unwrap().messages, 1);
        assert_eq!(reader.author_sentiment().unwrap()[0].key, "Grace");

        drop(reader);
        writer.close().unwrap();
        assert!(AggregateStore::remove_files(&path).unwrap());
        assert!(!path.exists());
        assert!(!AggregateStore::remove_files(&path).unwrap());
    }
}
