use std::env;
use std::time::Duration;

use anyhow::Context as _;
use chrono::Utc;
use fraud_models::{CustomerProfile, RiskLevel, Transaction};
use rand::seq::SliceRandom;
use rand::Rng;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::config::ClientConfig;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

const LOCATIONS: [&str; 5] = ["New York", "Los Angeles", "Chicago", "Houston", "Phoenix"];
const CATEGORIES: [&str; 5] = ["GROCERY", "GAS_STATION", "RESTAURANT", "RETAIL", "ONLINE"];
const RISK_LEVELS: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();

    let brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string());
    let topic_transactions =
        env::var("TOPIC_TRANSACTIONS").unwrap_or_else(|_| "transactions".to_string());
    let topic_profiles =
        env::var("TOPIC_PROFILES").unwrap_or_else(|_| "customerProfiles".to_string());
    let scenario = env::var("SCENARIO").unwrap_or_else(|_| "normal".to_string());
    let count: usize = env::var("COUNT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let rate_ms: u64 = env::var("RATE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(500);

    let producer: FutureProducer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("message.timeout.ms", "5000")
        .create()
        .context("failed to create scenario producer")?;

    info!("seeding customer profiles");
    let profiles = generate_profiles(5);
    for profile in &profiles {
        send(&producer, &topic_profiles, &profile.customer_id, profile).await?;
    }

    info!("producing scenario '{scenario}' with {count} transactions");
    match scenario.as_str() {
        "normal" => normal_traffic(&producer, &topic_transactions, &profiles, count, rate_ms).await?,
        "velocity-attack" => {
            velocity_attack(&producer, &topic_transactions, &profiles[0], count).await?
        }
        "unusual-amount" => {
            unusual_amounts(&producer, &topic_transactions, &profiles[0], count, rate_ms).await?
        }
        "mixed" => {
            normal_traffic(&producer, &topic_transactions, &profiles, count / 2, rate_ms).await?;
            velocity_attack(&producer, &topic_transactions, &profiles[0], count / 2).await?;
        }
        other => anyhow::bail!("unknown SCENARIO '{other}'"),
    }

    info!("scenario complete");
    Ok(())
}

fn generate_profiles(count: usize) -> Vec<CustomerProfile> {
    let mut rng = rand::thread_rng();
    (1..=count)
        .map(|i| {
            let average = rng.gen_range(50.0..500.0_f64).round();
            let category_count = rng.gen_range(1..=3);
            let mut categories: Vec<String> = CATEGORIES
                .choose_multiple(&mut rng, category_count)
                .map(|c| c.to_string())
                .collect();
            categories.sort();
            CustomerProfile {
                customer_id: format!("CUST-{i:03}"),
                average_transaction_amount: average,
                daily_spending_limit: average * 10.0,
                transaction_categories: categories,
                primary_location: LOCATIONS[(i - 1) % LOCATIONS.len()].to_string(),
                risk_level: RISK_LEVELS[(i - 1) % RISK_LEVELS.len()],
            }
        })
        .collect()
}

async fn normal_traffic(
    producer: &FutureProducer,
    topic: &str,
    profiles: &[CustomerProfile],
    count: usize,
    rate_ms: u64,
) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let profile = profiles
            .choose(&mut rng)
            .context("no profiles generated")?;
        let amount = profile.average_transaction_amount * rng.gen_range(0.5..1.5);
        let category = profile
            .transaction_categories
            .choose(&mut rng)
            .cloned()
            .unwrap_or_else(|| "GROCERY".to_string());
        let txn = transaction(profile, (amount * 100.0).round() / 100.0, &category, &profile.primary_location);
        send(producer, topic, &txn.customer_id, &txn).await?;
        tokio::time::sleep(Duration::from_millis(rate_ms)).await;
    }
    Ok(())
}

async fn velocity_attack(
    producer: &FutureProducer,
    topic: &str,
    profile: &CustomerProfile,
    count: usize,
) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    info!("rapid-fire attack against {}", profile.customer_id);
    for _ in 0..count {
        let amount = rng.gen_range(10.0..60.0_f64).round();
        let txn = transaction(profile, amount, "ONLINE", "Unknown Location");
        send(producer, topic, &txn.customer_id, &txn).await?;
        // near-zero spacing is the attack signature
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    Ok(())
}

async fn unusual_amounts(
    producer: &FutureProducer,
    topic: &str,
    profile: &CustomerProfile,
    count: usize,
    rate_ms: u64,
) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..count {
        let amount = profile.average_transaction_amount * rng.gen_range(5.0..10.0);
        let txn = transaction(profile, amount.round(), "ONLINE", "Unknown");
        send(producer, topic, &txn.customer_id, &txn).await?;
        tokio::time::sleep(Duration::from_millis(rate_ms)).await;
    }
    Ok(())
}

fn transaction(
    profile: &CustomerProfile,
    amount: f64,
    category: &str,
    location: &str,
) -> Transaction {
    Transaction {
        transaction_id: format!("TXN-{}", Uuid::new_v4()),
        customer_id: profile.customer_id.clone(),
        amount,
        currency: "USD".to_string(),
        merchant_id: format!("MERCH-{}", rand::thread_rng().gen_range(100..999)),
        merchant_category: category.to_string(),
        location: location.to_string(),
        timestamp: Utc::now().naive_utc(),
        metadata: serde_json::Map::new(),
    }
}

async fn send<T: Serialize>(
    producer: &FutureProducer,
    topic: &str,
    key: &str,
    value: &T,
) -> anyhow::Result<()> {
    let body = serde_json::to_string(value).context("failed to serialize record")?;
    producer
        .send(
            FutureRecord::to(topic).key(key).payload(&body),
            Timeout::After(Duration::from_secs(3)),
        )
        .await
        .map_err(|(err, _)| err)
        .with_context(|| format!("failed to publish to {topic}"))?;
    Ok(())
}
