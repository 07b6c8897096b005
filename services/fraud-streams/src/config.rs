use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub brokers: String,
    pub group_id: String,
    pub auto_offset_reset: String,
    pub topic_transactions: String,
    pub topic_profiles: String,
    pub topic_feedback: String,
    pub topic_fraud_alerts: String,
    pub topic_review: String,
    pub topic_approved: String,
    pub agent_pool_size: usize,
    pub worker_count: usize,
    pub recovery_idle_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            brokers: env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string()),
            group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| "fraud-streams-v1".to_string()),
            auto_offset_reset: env::var("KAFKA_AUTO_OFFSET_RESET")
                .unwrap_or_else(|_| "latest".to_string()),
            topic_transactions: env::var("TOPIC_TRANSACTIONS")
                .unwrap_or_else(|_| "transactions".to_string()),
            topic_profiles: env::var("TOPIC_PROFILES")
                .unwrap_or_else(|_| "customerProfiles".to_string()),
            topic_feedback: env::var("TOPIC_FEEDBACK")
                .unwrap_or_else(|_| "analyst-feedback".to_string()),
            topic_fraud_alerts: env::var("TOPIC_FRAUD_ALERTS")
                .unwrap_or_else(|_| "fraud-alerts".to_string()),
            topic_review: env::var("TOPIC_REVIEW").unwrap_or_else(|_| "human-review".to_string()),
            topic_approved: env::var("TOPIC_APPROVED")
                .unwrap_or_else(|_| "approved-transactions".to_string()),
            agent_pool_size: env::var("AGENT_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            worker_count: env::var("WORKER_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            recovery_idle_ms: env::var("RECOVERY_IDLE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
        }
    }
}
