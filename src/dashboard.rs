//! Read-only dashboard over the aggregate store.
//!
//! The reader never shares the writer's connection: every poll opens its own
//! read-only handle on a blocking thread. Query failures are logged and turn
//! into empty result sets so a transient read error never stops the
//! dashboard.

use crate::config::PipelineVariant;
use crate::error::StoreResult;
use crate::store::{AggregateRow, AggregateStore, SentimentPoint, StoreCounts, StoredTransaction};
use std::fmt::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

const BAR_WIDTH: f64 = 20.0;

/// One poll's worth of dashboard data.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardSnapshot {
    Sentiment {
        recent: Vec<SentimentPoint>,
        by_author: Vec<AggregateRow>,
        by_category: Vec<AggregateRow>,
    },
    Transaction {
        recent: Vec<StoredTransaction>,
        counts: StoreCounts,
    },
}

impl DashboardSnapshot {
    pub fn empty(variant: PipelineVariant) -> Self {
        match variant {
            PipelineVariant::Sentiment => DashboardSnapshot::Sentiment {
                recent: Vec::new(),
                by_author: Vec::new(),
                by_category: Vec::new(),
            },
            PipelineVariant::Transaction => DashboardSnapshot::Transaction {
                recent: Vec::new(),
                counts: StoreCounts::default(),
            },
        }
    }

    /// Render as plain-text tables.
    pub fn render(&self) -> String {
        let mut out = String::new();
        match self {
            DashboardSnapshot::Sentiment {
                recent,
                by_author,
                by_category,
            } => {
                out.push_str("Sentiment over time (newest first)\n");
                if recent.is_empty() {
                    out.push_str("  (no rows)\n");
                }
                for point in recent.iter().take(10) {
                    let _ = writeln!(
                        out,
                        "  {:<20} {:>6.2} {}",
                        point.timestamp,
                        point.sentiment,
                        sentiment_bar(point.sentiment)
                    );
                }
                render_aggregate(&mut out, "Average sentiment by author", by_author);
                render_aggregate(&mut out, "Average sentiment by category", by_category);
            }
            DashboardSnapshot::Transaction { recent, counts } => {
                let total = counts.fraud + counts.legit;
                let fraud_pct = if total > 0 {
                    counts.fraud as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                let _ = writeln!(
                    out,
                    "Transactions: {}  fraud: {}  legit: {}  fraud rate: {:.1}%",
                    counts.transactions, counts.fraud, counts.legit, fraud_pct
                );
                if recent.is_empty() {
                    out.push_str("  (no rows)\n");
                }
                for row in recent.iter().take(10) {
                    let tx = &row.transaction;
                    let _ = writeln!(
                        out,
                        "  #{:<6} {:<20} {:<10} {:<16} {:>9.2} {:<6}",
                        row.id, tx.timestamp, tx.name, tx.merchant, tx.amount, tx.card_type
                    );
                }
            }
        }
        out
    }
}

fn render_aggregate(out: &mut String, title: &str, rows: &[AggregateRow]) {
    let _ = writeln!(out, "{}", title);
    if rows.is_empty() {
        out.push_str("  (no rows)\n");
    }
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<16} {:>6.2} ({:>4}) {}",
            row.key,
            row.avg_sentiment,
            row.message_count,
            sentiment_bar(row.avg_sentiment)
        );
    }
}

/// Bar proportional to a score clamped to the display range [-1, 1].
fn sentiment_bar(score: f64) -> String {
    let clamped = score.clamp(-1.0, 1.0);
    let len = (clamped.abs() * BAR_WIDTH).round() as usize;
    let glyph = if clamped < 0.0 { "-" } else { "█" };
    glyph.repeat(len)
}

/// Issues the dashboard queries against a store file.
#[derive(Debug, Clone)]
pub struct DashboardReader {
    path: PathBuf,
    variant: PipelineVariant,
    recent_limit: usize,
}

impl DashboardReader {
    pub fn new(path: impl Into<PathBuf>, variant: PipelineVariant, recent_limit: usize) -> Self {
        Self {
            path: path.into(),
            variant,
            recent_limit,
        }
    }

    /// Query the store. Never fails: errors yield empty sections.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let store = match AggregateStore::open_read_only(&self.path) {
            Ok(store) => store,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Dashboard cannot open store");
                return DashboardSnapshot::empty(self.variant);
            }
        };

        match self.variant {
            PipelineVariant::Sentiment => DashboardSnapshot::Sentiment {
                recent: or_empty(store.recent_sentiment(self.recent_limit), "recent sentiment"),
                by_author: or_empty(store.author_sentiment(), "author sentiment"),
                by_category: or_empty(store.category_sentiment(), "category sentiment"),
            },
            PipelineVariant::Transaction => DashboardSnapshot::Transaction {
                recent: or_empty(
                    store.recent_transactions(self.recent_limit),
                    "recent transactions",
                ),
                counts: or_empty(store.counts(), "row counts"),
            },
        }
    }
}

fn or_empty<T: Default>(result: StoreResult<T>, query: &str) -> T {
    result.unwrap_or_else(|e| {
        error!(query, error = %e, "Dashboard query failed");
        T::default()
    })
}

/// Polls the reader on a fixed interval and logs the rendered snapshot
pub struct DashboardReporter {
    reader: DashboardReader,
    interval_secs: u64,
}

impl DashboardReporter {
    pub fn new(reader: DashboardReader, interval_secs: u64) -> Self {
        Self {
            reader,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Start the periodic polling task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            let reader = self.reader.clone();
            match tokio::task::spawn_blocking(move || reader.snapshot()).await {
                Ok(snapshot) => info!("Dashboard\n{}", snapshot.render()),
                Err(e) => error!(error = %e, "Dashboard poll panicked"),
            }
        }
    }
}
