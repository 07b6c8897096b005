use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Mutex;

use fraud_models::{AgentInsight, AnalystFeedback, StreamingContext, Transaction};
use tracing::{debug, warn};

use crate::scorer::{Scorer, ScorerError};

/// The closed panel of specialist analyzers. Each variant carries a fixed
/// id, a specialization label, a consensus weight, and its own prompt shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Analyst {
    Behavior,
    Pattern,
    Risk,
    Geographic,
    Temporal,
}

impl Analyst {
    pub const ALL: [Analyst; 5] = [
        Analyst::Behavior,
        Analyst::Pattern,
        Analyst::Risk,
        Analyst::Geographic,
        Analyst::Temporal,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Analyst::Behavior => "BEHAVIOR_ANALYST",
            Analyst::Pattern => "PATTERN_DETECTOR",
            Analyst::Risk => "RISK_ASSESSOR",
            Analyst::Geographic => "GEOGRAPHIC_ANALYST",
            Analyst::Temporal => "TEMPORAL_ANALYST",
        }
    }

    pub fn specialization(self) -> &'static str {
        match self {
            Analyst::Behavior => "Customer Behavior Analysis",
            Analyst::Pattern => "Fraud Pattern Detection",
            Analyst::Risk => "Financial Risk Assessment",
            Analyst::Geographic => "Geographic Risk Analysis",
            Analyst::Temporal => "Temporal Pattern Analysis",
        }
    }

    /// Consensus weight. Pattern detection carries the most signal, behavior
    /// next; location and timing stay at the baseline.
    pub fn weight(self) -> f64 {
        match self {
            Analyst::Behavior => 1.2,
            Analyst::Pattern => 1.3,
            Analyst::Risk => 1.1,
            Analyst::Geographic => 1.0,
            Analyst::Temporal => 1.0,
        }
    }

    /// Runs this analyst's independent pass. Scorer failure never propagates:
    /// it degrades to a neutral insight that still participates in consensus.
    pub async fn analyze(
        self,
        scorer: &dyn Scorer,
        transaction: &Transaction,
        context: &StreamingContext,
    ) -> AgentInsight {
        debug!("{} analyzing transaction {}", self.id(), transaction.transaction_id);
        let prompt = self.analysis_prompt(transaction, context);
        match scorer.score(&prompt).await {
            Ok(scored) => AgentInsight::new(
                self.specialization(),
                self.id(),
                scored.raw.clone(),
                scored.risk_score,
                scored.reasoning,
                scored.recommendation,
            ),
            Err(err) => self.neutral_insight(&err),
        }
    }

    /// Answers another agent's question about the same transaction.
    pub async fn collaborate(
        self,
        scorer: &dyn Scorer,
        transaction: &Transaction,
        question: &str,
    ) -> AgentInsight {
        let prompt = self.collaboration_prompt(transaction, question);
        match scorer.score(&prompt).await {
            Ok(scored) => {
                let preview: String = scored.raw.chars().take(100).collect();
                AgentInsight::new(
                    self.specialization(),
                    format!("{}-collab", self.id()),
                    scored.raw.clone(),
                    scored.risk_score,
                    scored.reasoning,
                    format!("Collaboration response: {preview}"),
                )
            }
            Err(err) => self.neutral_insight(&err),
        }
    }

    fn neutral_insight(self, err: &ScorerError) -> AgentInsight {
        warn!("{} analysis degraded to neutral: {err}", self.id());
        AgentInsight::new(
            self.specialization(),
            format!("{}-error", self.id()),
            format!("Analysis failed: {err}"),
            0.5,
            format!("Error occurred during analysis: {err}"),
            "Manual review required due to analysis error",
        )
    }

    fn analysis_prompt(self, transaction: &Transaction, context: &StreamingContext) -> String {
        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "You are an expert {} specialist working in fraud detection.\n",
            self.specialization()
        );

        self.push_context_block(&mut prompt, transaction, context);

        let _ = writeln!(prompt, "TRANSACTION TO ANALYZE:\n{}\n", transaction.to_analysis_text());

        prompt.push_str(self.focus_block());

        prompt.push_str(
            "\nProvide your analysis in this format:\n\
             RISK_SCORE: [0.0-1.0]\n\
             REASONING: [Your detailed analysis]\n\
             RECOMMENDATION: [What action to take]\n",
        );

        prompt
    }

    fn collaboration_prompt(self, transaction: &Transaction, question: &str) -> String {
        format!(
            "You are a {} fraud detection specialist.\n\
             Another agent is asking: {}\n\n\
             Transaction details: {}\n\n\
             Provide your expert opinion with a risk score (0.0 to 1.0) and reasoning.\n\
             Format your response as:\n\
             RISK_SCORE: [0.0-1.0]\n\
             REASONING: [Your detailed analysis]\n\
             RECOMMENDATION: [What action to take]\n",
            self.specialization(),
            question,
            transaction.to_analysis_text(),
        )
    }

    fn push_context_block(
        self,
        prompt: &mut String,
        transaction: &Transaction,
        context: &StreamingContext,
    ) {
        prompt.push_str("STREAMING INTELLIGENCE:\n");
        match context.recent_transaction_count {
            Some(count) if context.has_high_velocity() => {
                let _ = writeln!(
                    prompt,
                    "HIGH VELOCITY ALERT: {count} transactions in the last 5 minutes."
                );
            }
            Some(count) => {
                let _ = writeln!(prompt, "Normal velocity: {count} transactions in the last 5 minutes.");
            }
            None => prompt.push_str("No velocity data for this customer.\n"),
        }

        match &context.customer_profile {
            Some(profile) => {
                prompt.push_str("CUSTOMER BASELINE:\n");
                let _ = writeln!(prompt, "- Average spending: ${:.2}", profile.average_transaction_amount);
                let _ = writeln!(prompt, "- Daily limit: ${:.2}", profile.daily_spending_limit);
                let _ = writeln!(prompt, "- Risk tier: {}", profile.risk_level);
                let _ = writeln!(
                    prompt,
                    "- Typical categories: {}",
                    profile.transaction_categories.join(", ")
                );
                let _ = writeln!(prompt, "- Primary location: {}", profile.primary_location);
                if profile.is_amount_unusual(transaction.amount) {
                    prompt.push_str("- UNUSUAL AMOUNT: more than 3x the customer average!\n");
                }
                if self == Analyst::Geographic {
                    if profile.is_typical_location(&transaction.location) {
                        prompt.push_str("- Location matches customer baseline\n");
                    } else {
                        let _ = writeln!(
                            prompt,
                            "- LOCATION ANOMALY: expected {}, actual {}",
                            profile.primary_location, transaction.location
                        );
                    }
                }
            }
            None => prompt.push_str("No customer profile on record.\n"),
        }
        prompt.push('\n');
    }

    fn focus_block(self) -> &'static str {
        match self {
            Analyst::Behavior => {
                "As a BEHAVIOR ANALYST, focus on:\n\
                 1. How does the velocity pattern affect behavioral risk?\n\
                 2. Does the spending amount deviate from the customer baseline?\n\
                 3. Are there behavioral red flags in frequency or timing?\n\
                 4. Is this consistent with the customer's normal behavior?\n"
            }
            Analyst::Pattern => {
                "As a PATTERN DETECTOR, focus on:\n\
                 1. Does the velocity pattern match known attack vectors?\n\
                 2. Are there card testing indicators (small or round amounts)?\n\
                 3. Is this part of an automated fraud campaign (bot, credential stuffing)?\n\
                 4. Do patterns match fraud rings or scripted activity?\n"
            }
            Analyst::Risk => {
                "As a RISK ASSESSOR, focus on:\n\
                 1. Transaction amount relative to the customer's limits and history\n\
                 2. Merchant category risk profile\n\
                 3. Combined financial impact and probability\n\
                 4. Whether additional verification is warranted\n"
            }
            Analyst::Geographic => {
                "As a GEOGRAPHIC ANALYST, focus on:\n\
                 1. Location consistency with the customer's typical patterns\n\
                 2. Geographic impossibility under rapid transaction velocity\n\
                 3. High-risk regions and location spoofing indicators\n\
                 4. Cross-border transaction risks\n"
            }
            Analyst::Temporal => {
                "As a TEMPORAL ANALYST, focus on:\n\
                 1. Transaction time vs. typical active hours (off-hours activity)\n\
                 2. Sub-second or regular intervals indicating automation\n\
                 3. Rapid-fire sequences inside the velocity window\n\
                 4. Burst patterns consistent with card testing\n"
            }
        }
    }
}

/// Write-only feedback store. The decision path never reads it; it exists so
/// analyst feedback has somewhere durable-in-process to land.
#[derive(Debug, Default)]
pub struct KnowledgeLog {
    entries: Mutex<HashMap<String, Vec<AnalystFeedback>>>,
}

impl KnowledgeLog {
    pub fn record(&self, feedback: &AnalystFeedback) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for analyst in Analyst::ALL {
            entries
                .entry(analyst.id().to_string())
                .or_default()
                .push(feedback.clone());
        }
    }

    pub fn recorded_count(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().map(Vec::len).sum()
    }
}
