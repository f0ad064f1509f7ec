//! SQL schema for the aggregate store.

/// Drops every table the pipeline owns.
pub const DROP_ALL: &str = "
DROP TABLE IF EXISTS streamed_messages;
DROP TABLE IF EXISTS sentiment_messages;
DROP TABLE IF EXISTS category_sentiment;
DROP TABLE IF EXISTS author_sentiment;
DROP TABLE IF EXISTS transactions;
DROP TABLE IF EXISTS is_fraud;
DROP TABLE IF EXISTS legit_transactions;
";

/// Creates every table the pipeline owns.
pub const CREATE_ALL: &str = "
CREATE TABLE IF NOT EXISTS streamed_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message TEXT NOT NULL,
    author TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    category TEXT NOT NULL,
    sentiment REAL NOT NULL,
    keyword_mentioned TEXT NOT NULL,
    message_length INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sentiment_messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category TEXT NOT NULL,
    author TEXT NOT NULL,
    sentiment REAL NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sentiment_messages_category ON sentiment_messages (category);
CREATE INDEX IF NOT EXISTS idx_sentiment_messages_author ON sentiment_messages (author);

CREATE TABLE IF NOT EXISTS category_sentiment (
    category TEXT PRIMARY KEY,
    avg_sentiment REAL NOT NULL,
    message_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS author_sentiment (
    author TEXT PRIMARY KEY,
    avg_sentiment REAL NOT NULL,
    message_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    purchase_location INTEGER NOT NULL,
    home_location INTEGER NOT NULL,
    type TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS is_fraud (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    purchase_location INTEGER NOT NULL,
    home_location INTEGER NOT NULL,
    type TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS legit_transactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    merchant TEXT NOT NULL,
    amount REAL NOT NULL,
    purchase_location INTEGER NOT NULL,
    home_location INTEGER NOT NULL,
    type TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
";

pub const INSERT_STREAMED_MESSAGE: &str = "
INSERT INTO streamed_messages
    (message, author, timestamp, category, sentiment, keyword_mentioned, message_length)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

pub const INSERT_SENTIMENT_MESSAGE: &str = "
INSERT INTO sentiment_messages (category, author, sentiment, timestamp)
VALUES (?1, ?2, ?3, ?4)
";

// Mean and count are recomputed from the series table inside the insert
// transaction, so they always equal a fresh AVG over the stored history.
pub const UPSERT_CATEGORY_SENTIMENT: &str = "
INSERT INTO category_sentiment (category, avg_sentiment, message_count)
SELECT ?1, AVG(sentiment), COUNT(*) FROM sentiment_messages WHERE category = ?1
ON CONFLICT(category) DO UPDATE SET
    avg_sentiment = excluded.avg_sentiment,
    message_count = excluded.message_count
";

pub const UPSERT_AUTHOR_SENTIMENT: &str = "
INSERT INTO author_sentiment (author, avg_sentiment, message_count)
SELECT ?1, AVG(sentiment), COUNT(*) FROM sentiment_messages WHERE author = ?1
ON CONFLICT(author) DO UPDATE SET
    avg_sentiment = excluded.avg_sentiment,
    message_count = excluded.message_count
";

pub const TRANSACTION_COLUMNS: &str =
    "name, merchant, amount, purchase_location, home_location, type, timestamp";
