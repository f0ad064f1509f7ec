//! Card transaction records

use super::fields::{DecodeRecord, FieldReader};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "anonymous";
pub const DEFAULT_MERCHANT: &str = "unknown";
pub const DEFAULT_CARD_TYPE: &str = "unknown";
pub const DEFAULT_TIMESTAMP: &str = "unknown";

/// A card transaction as published by the producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Card holder
    pub name: String,

    /// Merchant category label, e.g. "Grocery" or "Online Shopping"
    pub merchant: String,

    /// Purchase amount
    pub amount: f64,

    /// Location code (ZIP) where the purchase happened
    pub purchase_location: i64,

    /// Location code (ZIP) of the card holder's home
    pub home_location: i64,

    /// "Debit" or "Credit"
    #[serde(rename = "type")]
    pub card_type: String,

    /// `%Y-%m-%d %H:%M:%S`
    pub timestamp: String,
}

impl Transaction {
    /// Create a transaction at the holder's home location with default labels.
    #[cfg(test)]
    pub fn new(merchant: &str, amount: f64, location: i64, card_type: &str) -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            merchant: merchant.to_string(),
            amount,
            purchase_location: location,
            home_location: location,
            card_type: card_type.to_string(),
            timestamp: DEFAULT_TIMESTAMP.to_string(),
        }
    }

    pub fn is_away_from_home(&self) -> bool {
        self.purchase_location != self.home_location
    }
}

impl DecodeRecord for Transaction {
    fn from_fields(fields: &mut FieldReader<'_>) -> Self {
        Self {
            name: fields.string("name", DEFAULT_NAME),
            merchant: fields.string("merchant", DEFAULT_MERCHANT),
            amount: fields.float("amount", 0.0),
            purchase_location: fields.integer("purchase_location", 0),
            home_location: fields.integer("home_location", 0),
            card_type: fields.string("type", DEFAULT_CARD_TYPE),
            timestamp: fields.string("timestamp", DEFAULT_TIMESTAMP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_producer_payload() {
        let payload = br#"{
            "name": "Alice",
            "merchant": "Gas Station",
            "amount": 42.17,
            "purchase_location": 64401,
            "home_location": 64448,
            "type": "Debit",
            "timestamp": "2025-02-10 09:15:00"
        }"#;

        let decoded = Transaction::decode(payload).unwrap();
        let tx = &decoded.record;

        assert!(decoded.degraded.is_empty());
        assert_eq!(tx.name, "Alice");
        assert_eq!(tx.card_type, "Debit");
        assert_eq!(tx.amount, 42.17);
        assert!(tx.is_away_from_home());
    }

    #[test]
    fn test_decode_empty_object_uses_defaults() {
        let decoded = Transaction::decode(b"{}").unwrap();
        let tx = &decoded.record;

        assert_eq!(tx.name, "anonymous");
        assert_eq!(tx.merchant, "unknown");
        assert_eq!(tx.amount, 0.0);
        assert_eq!(tx.purchase_location, 0);
        assert_eq!(tx.home_location, 0);
        assert_eq!(tx.card_type, "unknown");
        assert_eq!(tx.timestamp, "unknown");
        assert!(!decoded.is_degraded());
    }

    #[test]
    fn test_decode_malformed_amount_is_degraded_not_rejected() {
        let decoded =
            Transaction::decode(br#"{"name": "Bob", "amount": "a lot", "type": "Credit"}"#).unwrap();

        assert_eq!(decoded.record.amount, 0.0);
        assert_eq!(decoded.record.name, "Bob");
        assert_eq!(decoded.degraded, vec!["amount"]);
    }

    #[test]
    fn test_serializes_card_type_as_type() {
        let tx = Transaction::new("Grocery", 10.0, 64401, "Credit");
        let json = serde_json::to_value(&tx).unwrap();

        assert_eq!(json["type"], "Credit");
        assert!(json.get("card_type").is_none());
    }
}
