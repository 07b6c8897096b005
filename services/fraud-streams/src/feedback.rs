use fraud_agents::KnowledgeLog;
use fraud_models::AnalystFeedback;
use tracing::{info, warn};

/// Feedback is appended to the write-only knowledge logs; nothing on the
/// decision path reads it back.
pub fn handle_record(knowledge: &KnowledgeLog, payload: &[u8]) {
    match serde_json::from_slice::<AnalystFeedback>(payload) {
        Ok(feedback) => {
            info!(
                "processing analyst feedback for transaction {}: actual_fraud={}",
                feedback.transaction_id, feedback.actual_fraud
            );
            knowledge.record(&feedback);
        }
        Err(err) => warn!("skipping malformed analyst feedback: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraud_agents::Analyst;

    #[test]
    fn valid_feedback_is_recorded_for_the_whole_panel() {
        let knowledge = KnowledgeLog::default();
        let payload = br#"{"transactionId":"TXN-7","actualFraud":false,"feedback":"false positive"}"#;
        handle_record(&knowledge, payload);
        assert_eq!(knowledge.recorded_count(), Analyst::ALL.len());
    }

    #[test]
    fn malformed_feedback_is_dropped() {
        let knowledge = KnowledgeLog::default();
        handle_record(&knowledge, b"{\"nope\":true}");
        assert_eq!(knowledge.recorded_count(), 0);
    }
}
