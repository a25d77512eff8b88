//! Task-relevance scoring
//!
//! Scores are pure functions of the file descriptor, the task text, and the
//! project context; nothing is cached between calls.

pub mod keywords;
pub mod relevance;

pub use keywords::{tokenize, triggered_concepts, Concept, CONCEPTS};
pub use relevance::{
    FactorWeights, FrameworkConvention, KindWeights, ProjectContext, RelevanceScore,
    RelevanceScorer, ScoreFactor, ScoreMetadata, ScoreReason, ScorerProfile,
};
