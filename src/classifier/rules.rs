//! Rule-based fraud classification for card transactions

use crate::types::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of classifying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Fraud,
    Legit,
}

impl Verdict {
    pub fn is_fraud(self) -> bool {
        matches!(self, Verdict::Fraud)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Fraud => "fraud",
            Verdict::Legit => "legit",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual fraud rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudRule {
    /// Unconditionally large transaction
    LargeAmount,
    /// Purchase away from home with a moderate amount
    LocationMismatch,
    /// Large purchase in a risky merchant category
    RiskyMerchant,
    /// Large debit card purchase
    LargeDebit,
}

impl FraudRule {
    pub const ALL: [FraudRule; 4] = [
        FraudRule::LargeAmount,
        FraudRule::LocationMismatch,
        FraudRule::RiskyMerchant,
        FraudRule::LargeDebit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FraudRule::LargeAmount => "large_amount",
            FraudRule::LocationMismatch => "location_mismatch",
            FraudRule::RiskyMerchant => "risky_merchant",
            FraudRule::LargeDebit => "large_debit",
        }
    }
}

/// Configurable rule thresholds. All comparisons are strict (`amount > x`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleThresholds {
    pub large_amount: f64,
    pub location_mismatch_amount: f64,
    pub risky_merchant_amount: f64,
    pub debit_amount: f64,
    /// Merchant labels treated as risky for large purchases
    pub risky_merchants: Vec<String>,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            large_amount: 900.0,
            location_mismatch_amount: 500.0,
            risky_merchant_amount: 700.0,
            debit_amount: 800.0,
            risky_merchants: vec!["Online Shopping".to_string(), "Retail Store".to_string()],
        }
    }
}

/// Verdict plus the rules that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FraudAssessment {
    pub verdict: Verdict,
    pub triggered_rules: Vec<FraudRule>,
}

impl FraudAssessment {
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.triggered_rules.iter().map(|r| r.as_str()).collect()
    }
}

/// Evaluates the fraud rules against a transaction. Pure and total.
#[derive(Debug, Clone, Default)]
pub struct FraudRuleEngine {
    thresholds: RuleThresholds,
}

impl FraudRuleEngine {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    /// Whether a single rule fires for this transaction.
    pub fn fires(&self, rule: FraudRule, tx: &Transaction) -> bool {
        let t = &self.thresholds;
        match rule {
            FraudRule::LargeAmount => tx.amount > t.large_amount,
            FraudRule::LocationMismatch => {
                tx.is_away_from_home() && tx.amount > t.location_mismatch_amount
            }
            FraudRule::RiskyMerchant => {
                t.risky_merchants.iter().any(|m| m == &tx.merchant)
                    && tx.amount > t.risky_merchant_amount
            }
            FraudRule::LargeDebit => tx.card_type == "Debit" && tx.amount > t.debit_amount,
        }
    }

    /// Short-circuiting verdict.
    pub fn classify(&self, tx: &Transaction) -> Verdict {
        if FraudRule::ALL.iter().any(|&rule| self.fires(rule, tx)) {
            Verdict::Fraud
        } else {
            Verdict::Legit
        }
    }

    /// Evaluate every rule and report which ones fired.
    pub fn assess(&self, tx: &Transaction) -> FraudAssessment {
        let triggered_rules: Vec<FraudRule> = FraudRule::ALL
            .iter()
            .copied()
            .filter(|&rule| self.fires(rule, tx))
            .collect();

        let verdict = if triggered_rules.is_empty() {
            Verdict::Legit
        } else {
            Verdict::Fraud
        };

        FraudAssessment {
            verdict,
            triggered_rules,
        }
    }
}
