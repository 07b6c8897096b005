use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use fraud_agents::Analyst;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

fn panel_roster() -> String {
    Analyst::ALL
        .iter()
        .map(|analyst| format!("- {}: {}", analyst.id(), analyst.specialization()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Free-form Q&A against the investigation system. Answers come straight from
/// the scorer; no decision state is consulted.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    info!("new investigation chat question: {}", request.question);

    let prompt = format!(
        "You are an expert fraud investigation assistant with access to a multi-agent AI fraud detection system.\n\n\
         Our system uses {} specialized AI agents:\n{}\n\n\
         The agents work together, debate findings, and reach consensus through weighted voting.\n\n\
         User question: {}\n\n\
         Provide helpful, detailed responses about fraud detection, our AI system capabilities, or general fraud\n\
         prevention guidance. Be professional but accessible.\n\n\
         If asked about specific transactions, explain that you'd need transaction details to provide specific analysis.\n",
        Analyst::ALL.len(),
        panel_roster(),
        request.question,
    );

    match state.scorer.score(&prompt).await {
        Ok(scored) => Ok(Json(json!({
            "response": scored.raw,
            "transactionId": request.transaction_id,
            "systemCapabilities": [
                "Multi-agent fraud analysis",
                "Explainable AI decisions",
                "Real-time transaction processing",
                "Collaborative agent intelligence",
            ],
            "timestamp": Utc::now(),
        }))),
        Err(err) => {
            error!("error processing chat request: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "response": "I'm sorry, I encountered a technical issue. Please try again.",
                    "error": "Technical error occurred",
                    "timestamp": Utc::now(),
                })),
            ))
        }
    }
}

/// Conversational explanation of how the panel investigates a transaction.
pub async fn explain(
    State(state): State<Arc<AppState>>,
    Path(transaction_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    info!("explaining decision for transaction {transaction_id}");

    let prompt = format!(
        "Explain this fraud detection decision in simple, conversational terms:\n\n\
         Transaction ID: {transaction_id}\n\n\
         Our {} AI fraud investigators analyzed this transaction:\n{}\n\n\
         Explain how these agents work together and what factors they consider.\n\
         Make it sound like you're explaining a real investigation team's work.\n",
        Analyst::ALL.len(),
        panel_roster(),
    );

    match state.scorer.score(&prompt).await {
        Ok(scored) => Ok(Json(json!({
            "transactionId": transaction_id,
            "explanation": scored.raw,
            "investigationProcess": [
                "Parallel agent analysis",
                "Agent collaboration and debate",
                "Consensus building",
                "Final decision synthesis",
            ],
            "timestamp": Utc::now(),
        }))),
        Err(err) => {
            error!("error explaining decision for transaction {transaction_id}: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not generate explanation" })),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fraud_agents::{AgentCoordinator, Scored, Scorer, ScorerError};

    struct EchoScorer;

    #[async_trait]
    impl Scorer for EchoScorer {
        async fn score(&self, prompt: &str) -> Result<Scored, ScorerError> {
            Ok(Scored::parse(format!("echo: {}", prompt.len())))
        }
    }

    struct FailScorer;

    #[async_trait]
    impl Scorer for FailScorer {
        async fn score(&self, _prompt: &str) -> Result<Scored, ScorerError> {
            Err(ScorerError::Unavailable("down".to_string()))
        }
    }

    fn state(scorer: Arc<dyn Scorer>) -> Arc<AppState> {
        Arc::new(AppState {
            coordinator: Arc::new(AgentCoordinator::new(Arc::clone(&scorer), 5)),
            scorer,
        })
    }

    #[tokio::test]
    async fn chat_answers_with_the_scorers_raw_text() {
        let request = ChatRequest {
            question: "how do you catch card testing?".to_string(),
            transaction_id: None,
        };
        let Json(body) = chat(State(state(Arc::new(EchoScorer))), Json(request))
            .await
            .unwrap();
        assert!(body["response"].as_str().unwrap().starts_with("echo:"));
        assert_eq!(body["systemCapabilities"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn chat_surfaces_scorer_outage_as_500() {
        let request = ChatRequest {
            question: "anyone home?".to_string(),
            transaction_id: None,
        };
        let (status, _) = chat(State(state(Arc::new(FailScorer))), Json(request))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn explain_names_the_transaction() {
        let Json(body) = explain(
            State(state(Arc::new(EchoScorer))),
            Path("TXN-42".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(body["transactionId"], "TXN-42");
        assert_eq!(body["investigationProcess"].as_array().unwrap().len(), 4);
    }
}
