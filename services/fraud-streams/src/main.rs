use std::env;
use std::sync::Arc;

use fraud_agents::{AgentCoordinator, HttpScorer, KnowledgeLog, Scorer};
use tracing::info;

mod config;
mod feedback;
mod pipeline;
mod router;
mod state;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env::var("RUST_LOG").unwrap_or_else(|_| "info,rdkafka=warn".to_string()))
        .init();

    let config = Config::from_env();
    let scorer: Arc<dyn Scorer> = Arc::new(HttpScorer::from_env()?);
    let coordinator = Arc::new(AgentCoordinator::new(scorer, config.agent_pool_size));
    let knowledge = Arc::new(KnowledgeLog::default());

    info!("replaying input topics to rebuild state stores");
    let recovered = state::replay_input(&config).await?;
    info!(
        "recovered {} customer profiles and {} in-window transactions",
        recovered.profiles.len(),
        recovered.recent_transactions.len()
    );

    pipeline::run(config, coordinator, knowledge, recovered).await
}
