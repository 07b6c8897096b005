use std::time::Duration;

use anyhow::Context as _;
use fraud_models::{thresholds, Approval, FraudAlert, FraudDecision, ReviewCase};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    FraudAlert,
    HumanReview,
    Approved,
}

/// Branch selection is evaluated in order and total: every decision lands on
/// exactly one output.
pub fn select_branch(decision: &FraudDecision) -> Branch {
    if decision.is_fraudulent && decision.confidence_score > thresholds::ALERT_CONFIDENCE {
        Branch::FraudAlert
    } else if decision.is_fraudulent || decision.requires_manual_review() {
        Branch::HumanReview
    } else {
        Branch::Approved
    }
}

pub struct DecisionRouter {
    producer: FutureProducer,
    topic_fraud_alerts: String,
    topic_review: String,
    topic_approved: String,
}

impl DecisionRouter {
    pub fn new(
        producer: FutureProducer,
        topic_fraud_alerts: String,
        topic_review: String,
        topic_approved: String,
    ) -> Self {
        Self {
            producer,
            topic_fraud_alerts,
            topic_review,
            topic_approved,
        }
    }

    pub async fn route(&self, key: &str, decision: &FraudDecision) -> anyhow::Result<Branch> {
        let branch = select_branch(decision);
        match branch {
            Branch::FraudAlert => {
                warn!(
                    "FRAUD ALERT for transaction {} (confidence {:.0}%, {} agents)",
                    decision.transaction_id,
                    decision.confidence_score * 100.0,
                    decision.agent_insights.len()
                );
                self.produce(&self.topic_fraud_alerts, key, &FraudAlert::from_decision(decision))
                    .await?;
            }
            Branch::HumanReview => {
                info!(
                    "REVIEW NEEDED for transaction {} (confidence {:.0}%)",
                    decision.transaction_id,
                    decision.confidence_score * 100.0
                );
                self.produce(&self.topic_review, key, &ReviewCase::from_decision(decision))
                    .await?;
            }
            Branch::Approved => {
                debug!(
                    "APPROVED transaction {} (confidence {:.0}%)",
                    decision.transaction_id,
                    decision.confidence_score * 100.0
                );
                self.produce(&self.topic_approved, key, &Approval::from_decision(decision))
                    .await?;
            }
        }
        Ok(branch)
    }

    async fn produce<T: Serialize>(&self, topic: &str, key: &str, envelope: &T) -> anyhow::Result<()> {
        let body = serde_json::to_string(envelope).context("failed to serialize output envelope")?;
        self.producer
            .send(
                FutureRecord::to(topic).key(key).payload(&body),
                Timeout::After(Duration::from_secs(3)),
            )
            .await
            .map_err(|(err, _)| err)
            .with_context(|| format!("failed to publish to {topic}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(fraudulent: bool, confidence: f64) -> FraudDecision {
        if fraudulent {
            FraudDecision::fraudulent("TXN-1", confidence, "reason", "explanation", vec![])
        } else {
            FraudDecision::legitimate("TXN-1", confidence, "explanation", vec![])
        }
    }

    #[test]
    fn fraud_above_alert_threshold_goes_to_alerts() {
        assert_eq!(select_branch(&decision(true, 0.9)), Branch::FraudAlert);
        assert_eq!(select_branch(&decision(true, 1.0)), Branch::FraudAlert);
    }

    #[test]
    fn alert_threshold_is_strict() {
        // confidence exactly 0.8 is not an alert; fraud falls through to review
        assert_eq!(select_branch(&decision(true, 0.8)), Branch::HumanReview);
    }

    #[test]
    fn fraud_with_middling_confidence_is_reviewed() {
        assert_eq!(select_branch(&decision(true, 0.75)), Branch::HumanReview);
        assert_eq!(select_branch(&decision(true, 0.4)), Branch::HumanReview);
    }

    #[test]
    fn uncertain_legitimate_decisions_are_reviewed() {
        assert_eq!(select_branch(&decision(false, 0.5)), Branch::HumanReview);
        assert_eq!(select_branch(&decision(false, 0.69)), Branch::HumanReview);
    }

    #[test]
    fn review_band_upper_bound_is_strict() {
        // confidence exactly 0.7 is outside the review band
        assert_eq!(select_branch(&decision(false, 0.7)), Branch::Approved);
    }

    #[test]
    fn confident_legitimate_decisions_are_approved() {
        assert_eq!(select_branch(&decision(false, 0.9)), Branch::Approved);
        assert_eq!(select_branch(&decision(false, 0.3)), Branch::Approved);
    }

    #[test]
    fn every_decision_lands_on_exactly_one_branch() {
        for fraudulent in [true, false] {
            for tenth in 0..=10 {
                let confidence = tenth as f64 / 10.0;
                // select_branch is total; it cannot fail to choose
                let _ = select_branch(&decision(fraudulent, confidence));
            }
        }
    }
}
