use std::fmt;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

mod envelope;

pub use envelope::{AnalystFeedback, Approval, FraudAlert, ReviewCase};

/// Decision thresholds shared by the coordinator and the router.
pub mod thresholds {
    pub const FRAUD_RISK: f64 = 0.6;
    pub const ALERT_CONFIDENCE: f64 = 0.8;
    pub const REVIEW_LOWER: f64 = 0.3;
    pub const REVIEW_UPPER: f64 = 0.7;
    pub const HIGH_VELOCITY: i64 = 3;
    pub const VELOCITY_WINDOW_SECS: i64 = 300;
}

/// Wire format for transaction timestamps: `yyyy-MM-ddTHH:mm:ss`, second
/// precision, no zone suffix.
pub mod wire_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub merchant_id: String,
    pub merchant_category: String,
    pub location: String,
    #[serde(with = "wire_time")]
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Transaction {
    pub fn to_analysis_text(&self) -> String {
        format!(
            "Transaction: {}, Customer: {}, Amount: {} {}, Merchant: {} ({}), Location: {}, Time: {}",
            self.transaction_id,
            self.customer_id,
            self.amount,
            self.currency,
            self.merchant_id,
            self.merchant_category,
            self.location,
            self.timestamp.format(wire_time::FORMAT),
        )
    }

    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("transactionId", &self.transaction_id),
            ("customerId", &self.customer_id),
            ("currency", &self.currency),
            ("merchantId", &self.merchant_id),
            ("merchantCategory", &self.merchant_category),
            ("location", &self.location),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be blank"));
            }
        }
        if self.amount <= 0.0 {
            return Err("amount must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub customer_id: String,
    pub average_transaction_amount: f64,
    pub daily_spending_limit: f64,
    pub transaction_categories: Vec<String>,
    pub primary_location: String,
    pub risk_level: RiskLevel,
}

impl CustomerProfile {
    pub fn is_amount_unusual(&self, amount: f64) -> bool {
        amount > self.average_transaction_amount * 3.0
    }

    pub fn is_typical_category(&self, category: &str) -> bool {
        self.transaction_categories.iter().any(|c| c == category)
    }

    pub fn is_typical_location(&self, location: &str) -> bool {
        self.primary_location.eq_ignore_ascii_case(location)
    }
}

/// A transaction paired with whatever profile and velocity the stream joins
/// knew at processing time. Exists only in flight; never produced to a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTransaction {
    pub transaction: Transaction,
    pub customer_profile: Option<CustomerProfile>,
    pub velocity_count: Option<i64>,
}

impl EnrichedTransaction {
    pub fn to_streaming_context(&self) -> StreamingContext {
        StreamingContext {
            recent_transaction_count: self.velocity_count,
            customer_profile: self.customer_profile.clone(),
            context_summary: self.context_summary(),
        }
    }

    fn context_summary(&self) -> String {
        let mut summary = String::from("Streaming Context: ");

        if let Some(count) = self.velocity_count.filter(|c| *c > 1) {
            summary.push_str(&format!("{count} recent transactions"));
            if count > thresholds::HIGH_VELOCITY {
                summary.push_str(" (HIGH VELOCITY)");
            }
            summary.push_str(", ");
        }
        match &self.customer_profile {
            Some(profile) => {
                summary.push_str(&format!(
                    "Customer: ${:.0} avg, {} risk",
                    profile.average_transaction_amount, profile.risk_level
                ));
                if profile.is_amount_unusual(self.transaction.amount) {
                    summary.push_str(" (UNUSUAL AMOUNT)");
                }
            }
            None => summary.push_str("Real-time transaction analysis"),
        }

        summary
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingContext {
    pub recent_transaction_count: Option<i64>,
    pub customer_profile: Option<CustomerProfile>,
    pub context_summary: String,
}

impl StreamingContext {
    /// Context for paths that have no stream state, e.g. the HTTP surface.
    pub fn empty(summary: &str) -> Self {
        Self {
            recent_transaction_count: None,
            customer_profile: None,
            context_summary: summary.to_string(),
        }
    }

    pub fn has_high_velocity(&self) -> bool {
        self.recent_transaction_count
            .is_some_and(|count| count > thresholds::HIGH_VELOCITY)
    }

    pub fn ai_context(&self) -> String {
        let mut context = String::new();

        if self.has_high_velocity() {
            context.push_str(&format!(
                "HIGH VELOCITY: {} transactions in the last 5 minutes. ",
                self.recent_transaction_count.unwrap_or_default()
            ));
        }
        if let Some(profile) = &self.customer_profile {
            context.push_str(&format!(
                "Customer baseline: ${:.2} avg, {} risk.",
                profile.average_transaction_amount, profile.risk_level
            ));
        }

        context
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInsight {
    pub agent_type: String,
    pub agent_name: String,
    pub analysis: String,
    pub risk_score: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub recommendation: String,
    #[serde(with = "wire_time")]
    pub timestamp: NaiveDateTime,
}

impl AgentInsight {
    pub fn new(
        agent_type: impl Into<String>,
        agent_name: impl Into<String>,
        analysis: impl Into<String>,
        risk_score: f64,
        reasoning: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            agent_type: agent_type.into(),
            agent_name: agent_name.into(),
            analysis: analysis.into(),
            risk_score,
            confidence: risk_score.min(1.0),
            reasoning: reasoning.into(),
            recommendation: recommendation.into(),
            timestamp: Utc::now().naive_utc(),
        }
    }

    pub fn indicates_fraud(&self) -> bool {
        self.risk_score > thresholds::FRAUD_RISK
    }

    pub fn is_high_confidence(&self) -> bool {
        self.confidence > 0.8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudDecision {
    pub transaction_id: String,
    pub is_fraudulent: bool,
    pub confidence_score: f64,
    pub primary_reason: String,
    pub detailed_explanation: String,
    pub agent_insights: Vec<AgentInsight>,
    #[serde(with = "wire_time")]
    pub analyzed_at: NaiveDateTime,
}

impl FraudDecision {
    pub fn fraudulent(
        transaction_id: impl Into<String>,
        confidence: f64,
        reason: impl Into<String>,
        explanation: impl Into<String>,
        insights: Vec<AgentInsight>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_fraudulent: true,
            confidence_score: confidence,
            primary_reason: reason.into(),
            detailed_explanation: explanation.into(),
            agent_insights: insights,
            analyzed_at: Utc::now().naive_utc(),
        }
    }

    pub fn legitimate(
        transaction_id: impl Into<String>,
        confidence: f64,
        explanation: impl Into<String>,
        insights: Vec<AgentInsight>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_fraudulent: false,
            confidence_score: confidence,
            primary_reason: "Transaction appears legitimate".to_string(),
            detailed_explanation: explanation.into(),
            agent_insights: insights,
            analyzed_at: Utc::now().naive_utc(),
        }
    }

    pub fn is_high_confidence(&self) -> bool {
        self.confidence_score >= thresholds::ALERT_CONFIDENCE
    }

    pub fn requires_manual_review(&self) -> bool {
        self.confidence_score > thresholds::REVIEW_LOWER
            && self.confidence_score < thresholds::REVIEW_UPPER
    }
}
