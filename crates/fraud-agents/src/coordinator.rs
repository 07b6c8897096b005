use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use fraud_models::{thresholds, AgentInsight, FraudDecision, RiskLevel, StreamingContext, Transaction};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::analyst::Analyst;
use crate::scorer::Scorer;

/// Risk-score spread across the panel above which agents are considered in
/// disagreement.
const DISAGREEMENT_SPREAD: f64 = 0.4;

/// Weight applied to collaboration and consensus insights in the weighted
/// mean; phase-1 insights use their analyst's own weight.
const SUPPORTING_WEIGHT: f64 = 0.8;

/// Primary reason carried by the synthetic decision emitted when a phase
/// fails outright.
pub const TECHNICAL_ERROR_REASON: &str = "Technical error during analysis";

/// Orchestrates one decision pass: parallel panel analysis, conditional
/// collaboration plus consensus, weighted synthesis. A pure function of the
/// enriched transaction and the injected scorer; holds no bus state.
pub struct AgentCoordinator {
    scorer: Arc<dyn Scorer>,
    pool: Arc<Semaphore>,
}

impl AgentCoordinator {
    pub fn new(scorer: Arc<dyn Scorer>, pool_size: usize) -> Self {
        info!("agent coordinator initialized with {} fraud investigators, pool size {pool_size}", Analyst::ALL.len());
        Self {
            scorer,
            pool: Arc::new(Semaphore::new(pool_size)),
        }
    }

    pub async fn investigate(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
    ) -> FraudDecision {
        info!(
            "starting investigation for transaction {} with context: {}",
            transaction.transaction_id,
            context.ai_context()
        );
        let started = Instant::now();

        match self.run_phases(transaction, context).await {
            Ok(decision) => {
                info!(
                    "investigation completed in {}ms: {} (confidence {:.0}%)",
                    started.elapsed().as_millis(),
                    if decision.is_fraudulent { "FRAUD" } else { "LEGITIMATE" },
                    decision.confidence_score * 100.0
                );
                decision
            }
            Err(err) => {
                error!(
                    "error during investigation of {}: {err:#}",
                    transaction.transaction_id
                );
                Self::error_decision(transaction, &err)
            }
        }
    }

    /// Synthetic decision for an uncaught coordinator failure; routed to
    /// human review downstream.
    pub fn error_decision(transaction: &Transaction, err: &anyhow::Error) -> FraudDecision {
        FraudDecision::fraudulent(
            transaction.transaction_id.clone(),
            0.5,
            TECHNICAL_ERROR_REASON,
            format!("Error occurred: {err}. Manual review required."),
            Vec::new(),
        )
    }

    async fn run_phases(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
    ) -> anyhow::Result<FraudDecision> {
        let individual = self.parallel_analysis(transaction, context).await?;
        let collaborative = self.collaboration(transaction, context, &individual).await?;

        let mut insights = individual;
        insights.extend(collaborative);
        Ok(self.synthesize(transaction, context, insights))
    }

    /// Phase 1: every analyst runs concurrently on the shared bounded pool;
    /// all five complete before phase 2 starts.
    async fn parallel_analysis(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
    ) -> anyhow::Result<Vec<AgentInsight>> {
        let mut handles = Vec::with_capacity(Analyst::ALL.len());
        for analyst in Analyst::ALL {
            let scorer = Arc::clone(&self.scorer);
            let pool = Arc::clone(&self.pool);
            let txn = transaction.clone();
            let ctx = context.clone();
            handles.push(tokio::spawn(async move {
                let _permit = pool.acquire_owned().await.context("agent pool closed")?;
                Ok::<_, anyhow::Error>(analyst.analyze(scorer.as_ref(), &txn, &ctx).await)
            }));
        }

        let mut insights = Vec::with_capacity(handles.len());
        for handle in handles {
            insights.push(handle.await.context("analysis task failed")??);
        }
        info!("phase 1 complete: {} agents provided insights", insights.len());
        Ok(insights)
    }

    /// Phase 2: velocity and profile collaboration streams where the context
    /// warrants them, then always a consensus insight over the phase-1 panel.
    async fn collaboration(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
        individual: &[AgentInsight],
    ) -> anyhow::Result<Vec<AgentInsight>> {
        if Self::panel_disagrees(individual) {
            info!("agents have conflicting views, initiating collaboration");
        }

        let mut handles = Vec::new();
        if context.has_high_velocity() {
            let count = context.recent_transaction_count.unwrap_or_default();
            let question = format!(
                "{count} events in 5 minutes - does this align with automated attack patterns?"
            );
            for analyst in [Analyst::Pattern, Analyst::Temporal] {
                handles.push(self.spawn_collaboration(analyst, transaction, &question));
            }
        }
        if let Some(profile) = &context.customer_profile {
            let question = format!(
                "Customer baseline shows ${:.2} average spending at {} risk tier. Does this transaction fit the customer's established profile?",
                profile.average_transaction_amount, profile.risk_level
            );
            for analyst in [Analyst::Behavior, Analyst::Risk] {
                handles.push(self.spawn_collaboration(analyst, transaction, &question));
            }
        }

        let mut insights = Vec::with_capacity(handles.len() + 1);
        for handle in handles {
            insights.push(handle.await.context("collaboration task failed")??);
        }
        insights.push(self.build_consensus(transaction, context, individual).await?);
        Ok(insights)
    }

    fn spawn_collaboration(
        &self,
        analyst: Analyst,
        transaction: &Transaction,
        question: &str,
    ) -> JoinHandle<anyhow::Result<AgentInsight>> {
        let scorer = Arc::clone(&self.scorer);
        let pool = Arc::clone(&self.pool);
        let txn = transaction.clone();
        let question = question.to_string();
        tokio::spawn(async move {
            let _permit = pool.acquire_owned().await.context("agent pool closed")?;
            Ok(analyst.collaborate(scorer.as_ref(), &txn, &question).await)
        })
    }

    fn panel_disagrees(insights: &[AgentInsight]) -> bool {
        if insights.len() < 2 {
            return false;
        }
        let max = insights.iter().map(|i| i.risk_score).fold(f64::MIN, f64::max);
        let min = insights.iter().map(|i| i.risk_score).fold(f64::MAX, f64::min);
        max - min > DISAGREEMENT_SPREAD
    }

    async fn build_consensus(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
        individual: &[AgentInsight],
    ) -> anyhow::Result<AgentInsight> {
        let findings = individual
            .iter()
            .map(|i| format!("{} (Risk: {:.2}): {}", i.agent_name, i.risk_score, i.reasoning))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "You are the lead fraud investigator reviewing findings from your team of {} specialists.\n\n\
             Transaction: {}\n\n\
             Streaming context: {}\n\n\
             Agent Findings:\n{}\n\n\
             Based on all agent analyses, provide a final consensus:\n\
             - Do the agents generally agree or disagree?\n\
             - What's the overall fraud risk?\n\
             - What are the key factors driving the decision?\n\n\
             Format:\n\
             RISK_SCORE: [0.0-1.0]\n\
             REASONING: [Consensus analysis]\n\
             RECOMMENDATION: [Final action]\n",
            Analyst::ALL.len(),
            transaction.to_analysis_text(),
            context.context_summary,
            findings,
        );

        let _permit = self.pool.acquire().await.context("agent pool closed")?;
        let insight = match self.scorer.score(&prompt).await {
            Ok(scored) => AgentInsight::new(
                "Consensus Building",
                "CONSENSUS_ORCHESTRATOR",
                scored.raw.clone(),
                scored.risk_score,
                scored.reasoning,
                scored.recommendation,
            ),
            Err(err) => AgentInsight::new(
                "Consensus Building",
                "CONSENSUS_ORCHESTRATOR",
                format!("Error building consensus: {err}"),
                0.5,
                "Technical error occurred during consensus building",
                "Manual review required",
            ),
        };
        Ok(insight)
    }

    /// Phase 3: weighted mean, streaming bonus, thresholded fraud flag,
    /// agreement-based confidence, contextual explanation.
    fn synthesize(
        &self,
        transaction: &Transaction,
        context: &StreamingContext,
        insights: Vec<AgentInsight>,
    ) -> FraudDecision {
        let base = weighted_risk_score(&insights);
        let bonus = streaming_bonus(transaction, context);
        let final_risk = (base + bonus).min(1.0);
        let fraudulent = final_risk >= thresholds::FRAUD_RISK;
        let confidence = Self::confidence(&insights, fraudulent, context);
        let explanation = Self::explanation(context, &insights, final_risk, fraudulent);

        if fraudulent {
            FraudDecision::fraudulent(
                transaction.transaction_id.clone(),
                confidence,
                "AI agents with streaming context detected fraud",
                explanation,
                insights,
            )
        } else {
            FraudDecision::legitimate(transaction.transaction_id.clone(), confidence, explanation, insights)
        }
    }

    fn confidence(insights: &[AgentInsight], fraudulent: bool, context: &StreamingContext) -> f64 {
        if insights.is_empty() {
            return 0.5;
        }
        let agreeing = insights
            .iter()
            .filter(|i| i.indicates_fraud() == fraudulent)
            .count();
        let agreement_ratio = agreeing as f64 / insights.len() as f64;

        let mut confidence: f64 = if agreement_ratio >= 0.8 {
            0.9
        } else if agreement_ratio >= 0.6 {
            0.7
        } else if agreement_ratio >= 0.4 {
            0.5
        } else {
            0.3
        };

        if context.has_high_velocity() {
            confidence += 0.1;
        }
        if context.customer_profile.is_some() {
            confidence += 0.1;
        }
        confidence.min(1.0)
    }

    fn explanation(
        context: &StreamingContext,
        insights: &[AgentInsight],
        final_risk: f64,
        fraudulent: bool,
    ) -> String {
        let mut explanation =
            String::from("AI agents analyzed this transaction with real-time streaming context:\n\n");
        explanation.push_str("STREAMING CONTEXT:\n");
        let _ = writeln!(explanation, "- {}\n", context.context_summary);

        explanation.push_str("AI AGENT ANALYSIS:\n");
        for insight in insights {
            let _ = writeln!(
                explanation,
                "- {} ({:.0}% risk): {}",
                insight.agent_name,
                insight.risk_score * 100.0,
                insight.reasoning
            );
        }

        let _ = writeln!(explanation, "\nFinal risk score: {:.1}%", final_risk * 100.0);
        let _ = writeln!(
            explanation,
            "Decision: {}",
            if fraudulent { "FRAUD DETECTED" } else { "LEGITIMATE" }
        );
        explanation.push_str("Intelligence Sources: Real-time velocity, customer profiles, temporal patterns");
        explanation
    }
}

/// Weighted mean risk across all insights. Order-independent by
/// construction: a plain sum of weight-scaled scores over the weight total.
pub fn weighted_risk_score(insights: &[AgentInsight]) -> f64 {
    let mut total_score = 0.0;
    let mut total_weight = 0.0;
    for insight in insights {
        let weight = insight_weight(&insight.agent_name);
        total_score += insight.risk_score * weight;
        total_weight += weight;
    }
    if total_weight > 0.0 {
        total_score / total_weight
    } else {
        0.5
    }
}

fn insight_weight(agent_name: &str) -> f64 {
    if agent_name.ends_with("-collab") {
        return SUPPORTING_WEIGHT;
    }
    let base = agent_name.trim_end_matches("-error");
    Analyst::ALL
        .iter()
        .find(|a| a.id() == base)
        .map(|a| a.weight())
        .unwrap_or(SUPPORTING_WEIGHT)
}

/// Context bonus added on top of the weighted mean: high velocity +0.25,
/// unusual amount +0.20, high-risk customer tier +0.10.
pub fn streaming_bonus(transaction: &Transaction, context: &StreamingContext) -> f64 {
    let mut bonus = 0.0;
    if context.has_high_velocity() {
        bonus += 0.25;
    }
    if let Some(profile) = &context.customer_profile {
        if profile.is_amount_unusual(transaction.amount) {
            bonus += 0.20;
        }
        if profile.risk_level == RiskLevel::High {
            bonus += 0.10;
        }
    }
    bonus
}
