use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{AgentInsight, FraudDecision};

/// High-confidence fraud envelope produced to `fraud-alerts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudAlert {
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_id: String,
    pub confidence: i64,
    pub reason: String,
    pub agent_count: usize,
    pub ai_explanation: String,
    pub timestamp: i64,
    pub priority: String,
}

impl FraudAlert {
    pub fn from_decision(decision: &FraudDecision) -> Self {
        Self {
            kind: "AI_FRAUD_ALERT".to_string(),
            transaction_id: decision.transaction_id.clone(),
            confidence: confidence_percent(decision),
            reason: decision.primary_reason.clone(),
            agent_count: decision.agent_insights.len(),
            ai_explanation: decision.detailed_explanation.clone(),
            timestamp: Utc::now().timestamp_millis(),
            priority: if decision.is_high_confidence() {
                "HIGH".to_string()
            } else {
                "MEDIUM".to_string()
            },
        }
    }
}

/// Uncertain or fraudulent decisions queued for an analyst on `human-review`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCase {
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_id: String,
    pub confidence: i64,
    pub explanation: String,
    pub agent_insights: Vec<AgentInsight>,
    pub status: String,
    pub timestamp: i64,
}

impl ReviewCase {
    pub fn from_decision(decision: &FraudDecision) -> Self {
        Self {
            kind: "AI_REVIEW_CASE".to_string(),
            transaction_id: decision.transaction_id.clone(),
            confidence: confidence_percent(decision),
            explanation: decision.detailed_explanation.clone(),
            agent_insights: decision.agent_insights.clone(),
            status: "PENDING_HUMAN_REVIEW".to_string(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    #[serde(rename = "type")]
    pub kind: String,
    pub transaction_id: String,
    pub confidence: i64,
    pub status: String,
    pub agent_count: usize,
    pub timestamp: i64,
}

impl Approval {
    pub fn from_decision(decision: &FraudDecision) -> Self {
        Self {
            kind: "AI_APPROVAL".to_string(),
            transaction_id: decision.transaction_id.clone(),
            confidence: confidence_percent(decision),
            status: "APPROVED_BY_AI".to_string(),
            agent_count: decision.agent_insights.len(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalystFeedback {
    pub transaction_id: String,
    pub actual_fraud: bool,
    pub feedback: String,
    #[serde(default)]
    pub timestamp: i64,
}

fn confidence_percent(decision: &FraudDecision) -> i64 {
    (decision.confidence_score * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(confidence: f64) -> FraudDecision {
        FraudDecision::fraudulent("TXN-9", confidence, "velocity attack", "details", vec![])
    }

    #[test]
    fn alert_priority_splits_at_high_confidence() {
        assert_eq!(FraudAlert::from_decision(&decision(0.9)).priority, "HIGH");
        assert_eq!(FraudAlert::from_decision(&decision(0.8)).priority, "HIGH");
        assert_eq!(FraudAlert::from_decision(&decision(0.79)).priority, "MEDIUM");
    }

    #[test]
    fn envelopes_round_confidence_to_whole_percent() {
        let alert = FraudAlert::from_decision(&decision(0.856));
        assert_eq!(alert.confidence, 86);
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "AI_FRAUD_ALERT");
        assert_eq!(json["transactionId"], "TXN-9");
    }

    #[test]
    fn review_case_carries_insights_and_status() {
        let mut base = decision(0.5);
        base.agent_insights = vec![AgentInsight::new("t", "n", "a", 0.5, "r", "rec")];
        let case = ReviewCase::from_decision(&base);
        assert_eq!(case.status, "PENDING_HUMAN_REVIEW");
        assert_eq!(case.agent_insights.len(), 1);

        let wire = serde_json::to_string(&case).unwrap();
        let back: ReviewCase = serde_json::from_str(&wire).unwrap();
        assert_eq!(back.transaction_id, case.transaction_id);
        assert_eq!(back.confidence, case.confidence);
    }

    #[test]
    fn approval_counts_agents_only() {
        let approval = Approval::from_decision(&decision(0.95));
        assert_eq!(approval.kind, "AI_APPROVAL");
        assert_eq!(approval.status, "APPROVED_BY_AI");
        assert_eq!(approval.agent_count, 0);
    }

    #[test]
    fn feedback_parses_wire_shape() {
        let wire = r#"{"transactionId":"TXN-4","actualFraud":true,"feedback":"confirmed card testing","timestamp":1736000000000}"#;
        let parsed: AnalystFeedback = serde_json::from_str(wire).unwrap();
        assert!(parsed.actual_fraud);
        assert_eq!(parsed.transaction_id, "TXN-4");
    }
}
