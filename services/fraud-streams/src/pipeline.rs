use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Context as _;
use fraud_agents::{AgentCoordinator, KnowledgeLog};
use fraud_models::{thresholds, CustomerProfile, EnrichedTransaction, Transaction};
use futures::StreamExt;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::BorrowedMessage;
use rdkafka::producer::FutureProducer;
use rdkafka::{config::ClientConfig, Message};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::feedback;
use crate::router::DecisionRouter;
use crate::state::{self, RecoveredState, VelocityStore};

type ProfileTable = Arc<RwLock<HashMap<String, CustomerProfile>>>;

pub async fn run(
    config: Config,
    coordinator: Arc<AgentCoordinator>,
    knowledge: Arc<KnowledgeLog>,
    recovered: RecoveredState,
) -> anyhow::Result<()> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &config.group_id)
        .set("bootstrap.servers", &config.brokers)
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", "1000")
        .set("auto.offset.reset", &config.auto_offset_reset)
        .create()
        .context("failed to create fraud-streams consumer")?;
    consumer
        .subscribe(&[
            &config.topic_transactions,
            &config.topic_profiles,
            &config.topic_feedback,
        ])
        .context("failed to subscribe input topics")?;

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &config.brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .context("failed to create fraud-streams producer")?;
    let router = Arc::new(DecisionRouter::new(
        producer,
        config.topic_fraud_alerts.clone(),
        config.topic_review.clone(),
        config.topic_approved.clone(),
    ));

    let profiles: ProfileTable = Arc::new(RwLock::new(recovered.profiles));

    // Warm the sharded velocity stores with the replayed in-window events,
    // then hand each store to its worker.
    let mut stores: Vec<VelocityStore> = (0..config.worker_count)
        .map(|_| VelocityStore::new(thresholds::VELOCITY_WINDOW_SECS))
        .collect();
    for (customer_id, timestamp) in &recovered.recent_transactions {
        stores[shard(customer_id, config.worker_count)].record(customer_id, *timestamp);
    }

    let mut senders = Vec::with_capacity(config.worker_count);
    let mut workers: Vec<JoinHandle<anyhow::Result<()>>> = Vec::with_capacity(config.worker_count);
    for (index, store) in stores.into_iter().enumerate() {
        let (tx, rx) = mpsc::channel::<Transaction>(256);
        senders.push(tx);
        workers.push(tokio::spawn(run_worker(
            index,
            rx,
            Arc::clone(&profiles),
            store,
            Arc::clone(&coordinator),
            Arc::clone(&router),
        )));
    }

    info!(
        "fraud-streams consuming {}, {} and {} with {} decision workers",
        config.topic_transactions, config.topic_profiles, config.topic_feedback, config.worker_count
    );

    {
        let mut stream = consumer.stream();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested, draining decision workers");
                    break;
                }
                message = stream.next() => {
                    let Some(result) = message else { break };
                    match result {
                        Ok(msg) => handle_message(&msg, &config, &senders, &profiles, &knowledge).await?,
                        Err(err) => error!("fraud-streams consume error: {err}"),
                    }
                }
            }
        }
    }

    drop(senders);
    for worker in workers {
        worker.await.context("decision worker panicked")??;
    }
    info!("fraud-streams stopped");
    Ok(())
}

async fn handle_message(
    msg: &BorrowedMessage<'_>,
    config: &Config,
    senders: &[mpsc::Sender<Transaction>],
    profiles: &ProfileTable,
    knowledge: &KnowledgeLog,
) -> anyhow::Result<()> {
    let topic = msg.topic();

    if topic == config.topic_transactions {
        let Some(payload) = msg.payload() else {
            return Ok(());
        };
        let transaction = match serde_json::from_slice::<Transaction>(payload) {
            Ok(txn) => txn,
            Err(err) => {
                warn!("skipping malformed transaction: {err}");
                return Ok(());
            }
        };
        if let Err(reason) = transaction.validate() {
            warn!(
                "skipping invalid transaction {}: {reason}",
                transaction.transaction_id
            );
            return Ok(());
        }
        let index = shard(&transaction.customer_id, senders.len());
        senders[index]
            .send(transaction)
            .await
            .map_err(|_| anyhow::anyhow!("decision worker {index} stopped, stalling intake"))?;
    } else if topic == config.topic_profiles {
        let mut table = profiles.write().await;
        state::apply_profile_record(&mut table, msg.key(), msg.payload());
    } else if topic == config.topic_feedback {
        if let Some(payload) = msg.payload() {
            feedback::handle_record(knowledge, payload);
        }
    }

    Ok(())
}

/// One worker per shard keeps per-customer arrival order: a slow decision
/// delays only its own shard.
async fn run_worker(
    index: usize,
    mut rx: mpsc::Receiver<Transaction>,
    profiles: ProfileTable,
    mut velocity: VelocityStore,
    coordinator: Arc<AgentCoordinator>,
    router: Arc<DecisionRouter>,
) -> anyhow::Result<()> {
    while let Some(transaction) = rx.recv().await {
        // count the event into its window first, then left-join against the
        // current-velocity store: the triggering event sees its own increment
        velocity.record(&transaction.customer_id, transaction.timestamp);
        let velocity_count = velocity.current(&transaction.customer_id);
        let profile = profiles.read().await.get(&transaction.customer_id).cloned();

        if velocity_count.is_some_and(|count| count > thresholds::HIGH_VELOCITY) {
            warn!(
                "high velocity detected for customer {}: {} txns/5min",
                transaction.customer_id,
                velocity_count.unwrap_or_default()
            );
        }

        let enriched = EnrichedTransaction {
            transaction,
            customer_profile: profile,
            velocity_count,
        };
        let context = enriched.to_streaming_context();
        let decision = coordinator
            .investigate(&enriched.transaction, &context)
            .await;
        router
            .route(&enriched.transaction.customer_id, &decision)
            .await
            .with_context(|| format!("worker {index} failed to publish decision"))?;
    }
    Ok(())
}

fn shard(customer_id: &str, worker_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    customer_id.hash(&mut hasher);
    (hasher.finish() % worker_count as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_is_stable_per_customer() {
        let a = shard("CUST-001", 4);
        assert_eq!(a, shard("CUST-001", 4));
        assert!(a < 4);
    }
}
