use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use fraud_agents::coordinator::{streaming_bonus, weighted_risk_score};
use fraud_agents::{AgentCoordinator, Scored, Scorer, ScorerError};
use fraud_models::{
    AgentInsight, CustomerProfile, EnrichedTransaction, RiskLevel, StreamingContext, Transaction,
};

struct FixedScorer {
    risk: f64,
}

#[async_trait]
impl Scorer for FixedScorer {
    async fn score(&self, _prompt: &str) -> Result<Scored, ScorerError> {
        Ok(Scored::parse(format!(
            "RISK_SCORE: {}\nREASONING: scripted verdict\nRECOMMENDATION: scripted action",
            self.risk
        )))
    }
}

struct FailScorer;

#[async_trait]
impl Scorer for FailScorer {
    async fn score(&self, _prompt: &str) -> Result<Scored, ScorerError> {
        Err(ScorerError::Unavailable("connection refused".to_string()))
    }
}

struct PanicScorer;

#[async_trait]
impl Scorer for PanicScorer {
    async fn score(&self, _prompt: &str) -> Result<Scored, ScorerError> {
        panic!("scorer blew up");
    }
}

fn transaction(amount: f64) -> Transaction {
    Transaction {
        transaction_id: "TXN-100".to_string(),
        customer_id: "CUST-001".to_string(),
        amount,
        currency: "USD".to_string(),
        merchant_id: "MERCH-1".to_string(),
        merchant_category: "ONLINE".to_string(),
        location: "Unknown Location".to_string(),
        timestamp: NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap(),
        metadata: serde_json::Map::new(),
    }
}

fn profile(average: f64, risk_level: RiskLevel) -> CustomerProfile {
    CustomerProfile {
        customer_id: "CUST-001".to_string(),
        average_transaction_amount: average,
        daily_spending_limit: 5000.0,
        transaction_categories: vec!["GROCERY".to_string(), "RETAIL".to_string()],
        primary_location: "Los Angeles".to_string(),
        risk_level,
    }
}

fn context(
    transaction: &Transaction,
    profile: Option<CustomerProfile>,
    velocity: Option<i64>,
) -> StreamingContext {
    EnrichedTransaction {
        transaction: transaction.clone(),
        customer_profile: profile,
        velocity_count: velocity,
    }
    .to_streaming_context()
}

fn coordinator(scorer: impl Scorer + 'static) -> AgentCoordinator {
    AgentCoordinator::new(Arc::new(scorer), 5)
}

#[tokio::test]
async fn bare_context_yields_panel_plus_consensus() {
    let txn = transaction(54.0);
    let ctx = context(&txn, None, None);
    let decision = coordinator(FixedScorer { risk: 0.9 }).investigate(&txn, &ctx).await;

    assert_eq!(decision.agent_insights.len(), 6);
    assert!(decision.is_fraudulent);
    assert_eq!(decision.confidence_score, 0.9);
}

#[tokio::test]
async fn high_velocity_adds_the_velocity_collaboration_pair() {
    let txn = transaction(54.0);
    let ctx = context(&txn, None, Some(9));
    let decision = coordinator(FixedScorer { risk: 0.9 }).investigate(&txn, &ctx).await;

    assert_eq!(decision.agent_insights.len(), 8);
    let collab_names: Vec<&str> = decision
        .agent_insights
        .iter()
        .filter(|i| i.agent_name.ends_with("-collab"))
        .map(|i| i.agent_name.as_str())
        .collect();
    assert_eq!(collab_names, vec!["PATTERN_DETECTOR-collab", "TEMPORAL_ANALYST-collab"]);
    assert_eq!(decision.confidence_score, 1.0);
}

#[tokio::test]
async fn velocity_and_profile_produce_the_full_ten_opinions() {
    let txn = transaction(54.0);
    let ctx = context(&txn, Some(profile(253.0, RiskLevel::Low)), Some(9));
    let decision = coordinator(FixedScorer { risk: 0.95 }).investigate(&txn, &ctx).await;

    assert_eq!(decision.agent_insights.len(), 10);
    assert!(decision.is_fraudulent);
    assert_eq!(decision.confidence_score, 1.0);
    assert!(decision.detailed_explanation.contains("Intelligence Sources"));
    assert!(decision
        .agent_insights
        .iter()
        .any(|i| i.agent_name == "CONSENSUS_ORCHESTRATOR"));
}

#[tokio::test]
async fn total_scorer_outage_degrades_to_neutral_legitimate() {
    let txn = transaction(54.0);
    let ctx = context(&txn, None, None);
    let decision = coordinator(FailScorer).investigate(&txn, &ctx).await;

    assert_eq!(decision.agent_insights.len(), 6);
    assert!(decision.agent_insights.iter().all(|i| i.risk_score == 0.5));
    assert!(!decision.is_fraudulent);
    assert_eq!(decision.confidence_score, 0.9);
}

#[tokio::test]
async fn outage_under_high_velocity_still_flags_fraud() {
    let txn = transaction(54.0);
    let ctx = context(&txn, None, Some(9));
    let decision = coordinator(FailScorer).investigate(&txn, &ctx).await;

    // base 0.5 + velocity bonus 0.25 crosses the fraud threshold; the
    // neutral panel disagrees with the flag, so confidence stays low.
    assert!(decision.is_fraudulent);
    assert!((decision.confidence_score - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn profile_bonuses_stack_on_the_weighted_base() {
    let txn = transaction(400.0);
    let ctx = context(&txn, Some(profile(100.0, RiskLevel::High)), None);
    let decision = coordinator(FixedScorer { risk: 0.2 }).investigate(&txn, &ctx).await;

    // base 0.2 + unusual amount 0.20 + high tier 0.10 stays below 0.6.
    assert!(!decision.is_fraudulent);
    assert_eq!(decision.agent_insights.len(), 8);
    assert_eq!(decision.confidence_score, 1.0);
}

#[tokio::test]
async fn replay_with_identical_responses_is_idempotent() {
    let txn = transaction(54.0);
    let ctx = context(&txn, Some(profile(253.0, RiskLevel::Low)), Some(5));
    let coordinator = coordinator(FixedScorer { risk: 0.7 });

    let first = coordinator.investigate(&txn, &ctx).await;
    let second = coordinator.investigate(&txn, &ctx).await;

    assert_eq!(first.is_fraudulent, second.is_fraudulent);
    assert_eq!(first.confidence_score, second.confidence_score);
    assert_eq!(first.agent_insights.len(), second.agent_insights.len());
}

#[tokio::test]
async fn panicking_scorer_yields_the_technical_error_decision() {
    let txn = transaction(54.0);
    let ctx = context(&txn, None, None);
    let decision = coordinator(PanicScorer).investigate(&txn, &ctx).await;

    assert!(decision.is_fraudulent);
    assert_eq!(decision.confidence_score, 0.5);
    assert_eq!(decision.primary_reason, "Technical error during analysis");
    assert!(decision.agent_insights.is_empty());
}

#[test]
fn weighted_mean_is_order_independent() {
    let insights = vec![
        AgentInsight::new("t", "BEHAVIOR_ANALYST", "a", 0.9, "r", "x"),
        AgentInsight::new("t", "PATTERN_DETECTOR", "a", 0.2, "r", "x"),
        AgentInsight::new("t", "RISK_ASSESSOR", "a", 0.7, "r", "x"),
        AgentInsight::new("t", "GEOGRAPHIC_ANALYST", "a", 0.4, "r", "x"),
        AgentInsight::new("t", "TEMPORAL_ANALYST", "a", 0.6, "r", "x"),
        AgentInsight::new("t", "CONSENSUS_ORCHESTRATOR", "a", 0.5, "r", "x"),
    ];
    let mut reversed = insights.clone();
    reversed.reverse();

    assert!((weighted_risk_score(&insights) - weighted_risk_score(&reversed)).abs() < 1e-12);
}

#[test]
fn error_insights_keep_their_analysts_weight() {
    let healthy = vec![AgentInsight::new("t", "PATTERN_DETECTOR", "a", 0.5, "r", "x")];
    let degraded = vec![AgentInsight::new("t", "PATTERN_DETECTOR-error", "a", 0.5, "r", "x")];
    assert_eq!(weighted_risk_score(&healthy), weighted_risk_score(&degraded));
}

#[test]
fn streaming_bonus_is_zero_only_without_context() {
    let txn = transaction(54.0);

    let bare = context(&txn, None, None);
    assert_eq!(streaming_bonus(&txn, &bare), 0.0);

    let low_velocity = context(&txn, None, Some(3));
    assert_eq!(streaming_bonus(&txn, &low_velocity), 0.0);

    let velocity = context(&txn, None, Some(4));
    assert_eq!(streaming_bonus(&txn, &velocity), 0.25);

    let big = transaction(1000.0);
    let stacked = context(&big, Some(profile(100.0, RiskLevel::High)), Some(9));
    assert!((streaming_bonus(&big, &stacked) - 0.55).abs() < 1e-12);
}
