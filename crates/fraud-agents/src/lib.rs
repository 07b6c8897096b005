//! The analysis side of the fraud pipeline: the scoring capability, the
//! five-specialist analyzer panel, and the coordinator that turns one
//! enriched transaction into one decision.

pub mod analyst;
pub mod coordinator;
pub mod parse;
pub mod scorer;

pub use analyst::{Analyst, KnowledgeLog};
pub use coordinator::AgentCoordinator;
pub use scorer::{HttpScorer, Scored, Scorer, ScorerError};
