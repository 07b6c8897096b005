use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use fraud_agents::coordinator::TECHNICAL_ERROR_REASON;
use fraud_agents::{AgentCoordinator, Analyst, HttpScorer, Scorer};
use fraud_models::{FraudDecision, StreamingContext, Transaction};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};

mod investigation;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<AgentCoordinator>,
    pub scorer: Arc<dyn Scorer>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            env::var("RUST_LOG").unwrap_or_else(|_| "info,detection_api=debug".to_string()),
        )
        .init();

    let agent_pool_size: usize = env::var("AGENT_POOL_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(5);
    let scorer: Arc<dyn Scorer> = Arc::new(HttpScorer::from_env()?);
    let coordinator = Arc::new(AgentCoordinator::new(Arc::clone(&scorer), agent_pool_size));

    let state = Arc::new(AppState { coordinator, scorer });

    let app = Router::new()
        .route("/api/fraud-detection/analyze", post(analyze))
        .route("/api/fraud-detection/agents/info", get(agents_info))
        .route("/api/fraud-detection/health", get(health))
        .route("/api/investigation/chat", post(investigation::chat))
        .route("/api/investigation/explain/:transaction_id", post(investigation::explain))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr: SocketAddr = env::var("DETECTION_BIND")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("invalid DETECTION_BIND")?;

    info!("detection-api listening on {bind_addr}");
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(transaction): Json<Transaction>,
) -> Result<(StatusCode, Json<FraudDecision>), (StatusCode, String)> {
    transaction
        .validate()
        .map_err(|reason| (StatusCode::BAD_REQUEST, reason))?;

    info!(
        "fraud analysis request for transaction {}",
        transaction.transaction_id
    );

    let context =
        StreamingContext::empty("REST API call - single transaction analysis with streaming-intelligent agents");
    let decision = state.coordinator.investigate(&transaction, &context).await;

    if decision.primary_reason == TECHNICAL_ERROR_REASON {
        error!(
            "analysis of {} failed internally, returning fallback decision",
            transaction.transaction_id
        );
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(decision)));
    }

    info!(
        "analysis complete for {}: {} (confidence {:.2})",
        transaction.transaction_id,
        if decision.is_fraudulent { "FRAUD" } else { "LEGITIMATE" },
        decision.confidence_score
    );
    Ok((StatusCode::OK, Json(decision)))
}

async fn agents_info() -> Json<serde_json::Value> {
    let agents: serde_json::Map<String, serde_json::Value> = Analyst::ALL
        .iter()
        .map(|analyst| {
            (
                analyst.id().to_string(),
                serde_json::Value::String(analyst.specialization().to_string()),
            )
        })
        .collect();

    Json(json!({
        "totalAgents": Analyst::ALL.len(),
        "architecture": "Streaming-Intelligent AI",
        "agents": agents,
        "streamingCapabilities": [
            "Real-time velocity intelligence",
            "Customer profile streaming context",
            "AI-enhanced pattern detection",
            "Streaming-intelligent decision synthesis",
        ],
        "version": "1.0.0",
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "UP",
        "service": "detection-api",
        "architecture": "Streaming-Intelligent AI",
        "timestamp": Utc::now(),
    }))
}
