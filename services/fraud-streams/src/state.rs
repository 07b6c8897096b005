use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use anyhow::Context as _;
use chrono::{NaiveDateTime, Utc};
use fraud_models::{thresholds, CustomerProfile, Transaction};
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{config::ClientConfig, Message};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;

/// Tumbling-window transaction counts per customer. Mirrors the two stream
/// stores: `windows` holds the open and previous window counts
/// (velocity-windows), `current` the latest count observed per customer
/// (current-velocity).
#[derive(Debug)]
pub struct VelocityStore {
    window_secs: i64,
    windows: HashMap<String, BTreeMap<i64, i64>>,
    current: HashMap<String, i64>,
}

impl VelocityStore {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            windows: HashMap::new(),
            current: HashMap::new(),
        }
    }

    /// Counts the event into the window covering its timestamp and returns
    /// that window's count. The triggering event is included, so the k-th
    /// event inside one window observes exactly k.
    pub fn record(&mut self, customer_id: &str, timestamp: NaiveDateTime) -> i64 {
        let window_start = self.align(timestamp);
        let per_customer = self.windows.entry(customer_id.to_string()).or_default();
        let slot = per_customer.entry(window_start).or_insert(0);
        *slot += 1;
        let count = *slot;

        // Windows older than the previous one are never read again.
        while per_customer.len() > 2 {
            let oldest = *per_customer
                .keys()
                .next()
                .unwrap_or(&window_start);
            per_customer.remove(&oldest);
        }

        self.current.insert(customer_id.to_string(), count);
        count
    }

    pub fn current(&self, customer_id: &str) -> Option<i64> {
        self.current.get(customer_id).copied()
    }

    fn align(&self, timestamp: NaiveDateTime) -> i64 {
        let epoch = timestamp.and_utc().timestamp();
        epoch - epoch.rem_euclid(self.window_secs)
    }
}

/// State rebuilt from the input topics before the group consumer starts:
/// the compacted profile table plus the transactions still inside the
/// velocity window.
#[derive(Debug, Default)]
pub struct RecoveredState {
    pub profiles: HashMap<String, CustomerProfile>,
    pub recent_transactions: Vec<(String, NaiveDateTime)>,
}

/// Replays `customerProfiles` from the beginning and `transactions` back to
/// the start of the current velocity window, using a throwaway non-group
/// consumer. The scan ends once the topics go idle.
pub async fn replay_input(config: &Config) -> anyhow::Result<RecoveredState> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", format!("{}-recovery-{}", config.group_id, Uuid::new_v4()))
        .set("bootstrap.servers", &config.brokers)
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .create()
        .context("failed to create recovery consumer")?;
    consumer
        .subscribe(&[&config.topic_profiles, &config.topic_transactions])
        .context("failed to subscribe recovery topics")?;

    let cutoff = Utc::now().naive_utc() - chrono::Duration::seconds(thresholds::VELOCITY_WINDOW_SECS);
    let mut state = RecoveredState::default();
    let mut stream = consumer.stream();

    loop {
        match tokio::time::timeout(Duration::from_millis(config.recovery_idle_ms), stream.next()).await
        {
            Ok(Some(Ok(msg))) => {
                let topic = msg.topic();
                if topic == config.topic_profiles {
                    apply_profile_record(&mut state.profiles, msg.key(), msg.payload());
                } else if topic == config.topic_transactions {
                    let Some(payload) = msg.payload() else { continue };
                    match serde_json::from_slice::<Transaction>(payload) {
                        Ok(txn) if txn.timestamp >= cutoff => {
                            state.recent_transactions.push((txn.customer_id, txn.timestamp));
                        }
                        Ok(_) => {}
                        Err(err) => warn!("skipping malformed transaction during recovery: {err}"),
                    }
                }
            }
            Ok(Some(Err(err))) => warn!("recovery consume error: {err}"),
            Ok(None) => break,
            Err(_) => {
                info!("recovery scan idle, state stores rebuilt");
                break;
            }
        }
    }

    state.recent_transactions.sort_by_key(|(_, ts)| *ts);
    Ok(state)
}

/// Applies one compacted-topic record to the profile table. An empty payload
/// is a tombstone.
pub fn apply_profile_record(
    profiles: &mut HashMap<String, CustomerProfile>,
    key: Option<&[u8]>,
    payload: Option<&[u8]>,
) {
    match payload.filter(|p| !p.is_empty()) {
        Some(payload) => match serde_json::from_slice::<CustomerProfile>(payload) {
            Ok(profile) => {
                if profile.average_transaction_amount > profile.daily_spending_limit {
                    warn!(
                        "skipping profile {} with average above daily limit",
                        profile.customer_id
                    );
                    return;
                }
                profiles.insert(profile.customer_id.clone(), profile);
            }
            Err(err) => warn!("skipping malformed customer profile: {err}"),
        },
        None => {
            if let Some(key) = key.and_then(|k| std::str::from_utf8(k).ok()) {
                profiles.remove(key);
            }
        }
    }
}
