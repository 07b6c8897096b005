use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::parse;

#[derive(Debug, Error)]
pub enum ScorerError {
    #[error("scoring service unavailable: {0}")]
    Unavailable(String),
}

/// A scored response: the raw completion plus the fields extracted from it.
#[derive(Debug, Clone)]
pub struct Scored {
    pub raw: String,
    pub risk_score: f64,
    pub reasoning: String,
    pub recommendation: String,
}

impl Scored {
    pub fn parse(raw: String) -> Self {
        let risk_score = parse::extract_risk_score(&raw);
        let reasoning = parse::extract_reasoning(&raw);
        let recommendation = parse::extract_recommendation(&raw);
        Self {
            raw,
            risk_score,
            reasoning,
            recommendation,
        }
    }
}

/// The external text-scoring capability. Injected everywhere so the decision
/// path can be exercised without the real service.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score(&self, prompt: &str) -> Result<Scored, ScorerError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Profile {
    Cloud,
    Local,
}

/// HTTP-backed scorer. `cloud` speaks the OpenAI-style chat-completions API,
/// `local` speaks the Ollama generate API. Core behavior is identical.
pub struct HttpScorer {
    client: reqwest::Client,
    profile: Profile,
    url: String,
    model: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl HttpScorer {
    pub fn from_env() -> anyhow::Result<Self> {
        let profile_raw = env::var("SCORER_PROFILE").unwrap_or_else(|_| "local".to_string());
        let profile = match profile_raw.as_str() {
            "cloud" => Profile::Cloud,
            "local" => Profile::Local,
            other => anyhow::bail!("unknown SCORER_PROFILE '{other}', expected cloud or local"),
        };
        let url = env::var("SCORER_URL").unwrap_or_else(|_| match profile {
            Profile::Cloud => "https://api.groq.com/openai/v1/chat/completions".to_string(),
            Profile::Local => "http://localhost:11434/api/generate".to_string(),
        });
        let model = env::var("SCORER_MODEL").unwrap_or_else(|_| match profile {
            Profile::Cloud => "llama-3.1-70b-versatile".to_string(),
            Profile::Local => "llama3.1".to_string(),
        });
        let api_key = env::var("SCORER_API_KEY").unwrap_or_default();
        let timeout_ms: u64 = env::var("SCORER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30_000);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| anyhow::anyhow!("failed to build scorer http client: {err}"))?;

        info!("scorer configured: profile={profile_raw}, model={model}");
        Ok(Self {
            client,
            profile,
            url,
            model,
            api_key,
        })
    }

    async fn call_cloud(&self, prompt: &str) -> Result<String, ScorerError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ScorerError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ScorerError::Unavailable(format!(
                "scoring service returned {}",
                response.status()
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ScorerError::Unavailable(err.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ScorerError::Unavailable("empty completion".to_string()))
    }

    async fn call_local(&self, prompt: &str) -> Result<String, ScorerError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ScorerError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ScorerError::Unavailable(format!(
                "scoring service returned {}",
                response.status()
            )));
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|err| ScorerError::Unavailable(err.to_string()))?;
        Ok(generated.response)
    }
}

#[async_trait]
impl Scorer for HttpScorer {
    async fn score(&self, prompt: &str) -> Result<Scored, ScorerError> {
        let raw = match self.profile {
            Profile::Cloud => self.call_cloud(prompt).await?,
            Profile::Local => self.call_local(prompt).await?,
        };
        Ok(Scored::parse(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scored_parse_fills_all_fields() {
        let scored = Scored::parse(
            "RISK_SCORE: 0.72\nREASONING: velocity spike\nRECOMMENDATION: hold for review"
                .to_string(),
        );
        assert_eq!(scored.risk_score, 0.72);
        assert_eq!(scored.reasoning, "velocity spike");
        assert_eq!(scored.recommendation, "hold for review");
    }

    #[test]
    fn scored_parse_neutral_on_free_text() {
        let scored = Scored::parse("the model rambled with no signal words".to_string());
        assert_eq!(scored.risk_score, 0.5);
        assert_eq!(scored.recommendation, "Standard fraud review recommended");
    }
}
