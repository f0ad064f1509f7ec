//! Event Producer
//!
//! Generates random transactions or social messages, appends each one to a
//! local NDJSON file and publishes it to NATS. Runs until interrupted or
//! until the optional record count (first argument) is reached.

use anyhow::{Context, Result};
use chrono::Local;
use event_insights_pipeline::config::{AppConfig, PipelineVariant};
use event_insights_pipeline::{SocialMessage, Transaction};
use rand::Rng;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const USERS: &[&str] = &["Alice", "Bob", "Charlie", "Eve", "Frank", "Grace"];
const MERCHANTS: &[&str] = &[
    "Grocery",
    "Gas Station",
    "Online Shopping",
    "Restaurant",
    "Retail Store",
];
const LOCATIONS: &[i64] = &[
    64401, 64448, 64439, 64506, 64436, 64048, 64469, 64456, 64461, 64739, 64730, 66767, 64067,
    64633, 65326, 65803, 65742, 66006, 66032,
];
const CARD_TYPES: &[&str] = &["Debit", "Credit"];

const ADJECTIVES: &[&str] = &["amazing", "funny", "boring", "exciting", "weird"];
const ACTIONS: &[&str] = &["found", "saw", "tried", "shared", "loved"];
const TOPICS: &[(&str, &str)] = &[
    ("a movie", "entertainment"),
    ("a meme", "humor"),
    ("a game", "gaming"),
    ("a new recipe", "food"),
    ("a travel blog", "travel"),
    ("a new laptop", "tech"),
];

/// Random record generator
struct EventGenerator {
    rng: rand::rngs::ThreadRng,
}

impl EventGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn generate_transaction(&mut self) -> Transaction {
        let amount: f64 = self.rng.gen_range(1.0..=1000.0);

        Transaction {
            name: self.random_choice(USERS).to_string(),
            merchant: self.random_choice(MERCHANTS).to_string(),
            amount: (amount * 100.0).round() / 100.0,
            purchase_location: *self.random_choice(LOCATIONS),
            home_location: *self.random_choice(LOCATIONS),
            card_type: self.random_choice(CARD_TYPES).to_string(),
            timestamp: now(),
        }
    }

    fn generate_message(&mut self) -> SocialMessage {
        let (topic, category) = *self.random_choice(TOPICS);
        let text = format!(
            "I just {} {}! It was {}.",
            self.random_choice(ACTIONS),
            topic,
            self.random_choice(ADJECTIVES)
        );
        let keyword = topic.rsplit(' ').next().unwrap_or(topic).to_string();
        let sentiment: f64 = self.rng.gen_range(-1.0..=1.0);

        SocialMessage {
            message_length: text.len() as i64,
            message: text,
            author: self.random_choice(USERS).to_string(),
            timestamp: now(),
            category: category.to_string(),
            sentiment: (sentiment * 100.0).round() / 100.0,
            keyword_mentioned: keyword,
        }
    }

    fn generate(&mut self, variant: PipelineVariant) -> Result<Vec<u8>> {
        let payload = match variant {
            PipelineVariant::Transaction => serde_json::to_vec(&self.generate_transaction())?,
            PipelineVariant::Sentiment => serde_json::to_vec(&self.generate_message())?,
        };
        Ok(payload)
    }

    fn random_choice<'a, T>(&mut self, choices: &'a [T]) -> &'a T {
        &choices[self.rng.gen_range(0..choices.len())]
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Remove any previous live file and make sure its directory exists.
fn reset_live_file(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to delete live data file {}", path.display()))?;
        info!(path = %path.display(), "Deleted existing live data file");
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(())
}

fn append_line(path: &Path, payload: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(payload)?;
    file.write_all(b"\n")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("event_producer=info".parse()?),
        )
        .init();

    info!("Starting Event Producer");

    let config = AppConfig::load()?;
    let count: Option<u64> = std::env::args().nth(1).and_then(|s| s.parse().ok());
    let variant = config.pipeline.variant;
    let subject = config.nats.subject.clone();
    let live_path = Path::new(&config.producer.live_data_path).to_path_buf();
    let delay = Duration::from_secs(config.producer.interval_secs);

    info!(
        nats_url = %config.nats.url,
        subject = %subject,
        variant = ?variant,
        count = ?count,
        interval_secs = config.producer.interval_secs,
        "Configuration loaded"
    );

    reset_live_file(&live_path)?;

    // NATS is optional: without it the producer still feeds the live file.
    let client = match async_nats::connect(config.nats.url.as_str()).await {
        Ok(c) => {
            info!("Connected to NATS");
            Some(c)
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Writing to the live file only.");
            None
        }
    };

    let mut generator = EventGenerator::new();
    let mut produced: u64 = 0;

    loop {
        if count.is_some_and(|limit| produced >= limit) {
            break;
        }

        let payload = generator.generate(variant)?;
        append_line(&live_path, &payload)?;

        if let Some(client) = &client {
            client
                .publish(subject.clone(), payload.clone().into())
                .await
                .context("Failed to publish record")?;
        }
        produced += 1;
        info!(
            produced,
            record = %String::from_utf8_lossy(&payload),
            "Produced record"
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Producer interrupted by user");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    if let Some(client) = client {
        client.flush().await.context("Failed to flush NATS client")?;
    }
    info!(produced, "Producer shutting down");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_insights_pipeline::types::DecodeRecord;

    #[test]
    fn test_generated_transaction_decodes_cleanly() {
        let mut generator = EventGenerator::new();
        let payload = generator.generate(PipelineVariant::Transaction).unwrap();
        let decoded = Transaction::decode(&payload).unwrap();

        assert!(!decoded.is_degraded());
        assert!(decoded.record.amount >= 1.0 && decoded.record.amount <= 1000.0);
        assert!(CARD_TYPES.contains(&decoded.record.card_type.as_str()));
    }

    #[test]
    fn test_generated_message_decodes_cleanly() {
        let mut generator = EventGenerator::new();
        let payload = generator.generate(PipelineVariant::Sentiment).unwrap();
        let decoded = SocialMessage::decode(&payload).unwrap();

        assert!(!decoded.is_degraded());
        assert!((-1.0..=1.0).contains(&decoded.record.sentiment));
        assert_eq!(
            decoded.record.message_length,
            decoded.record.message.len() as i64
        );
    }

    #[test]
    fn test_live_file_is_reset_then_appended() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data").join("live.json");

        reset_live_file(&path).unwrap();
        append_line(&path, b"{\"a\":1}").unwrap();
        append_line(&path, b"{\"a\":2}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

        reset_live_file(&path).unwrap();
        assert!(!path.exists());
    }
}
