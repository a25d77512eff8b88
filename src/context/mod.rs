//! Context optimization
//!
//! A fixed catalog of techniques turns a file set into budgeted text. The
//! optimizer picks one per request from its compatibility with the task,
//! the time and quality constraints, and what worked before for the same
//! task signature. Output over budget goes through secondary compression.

pub mod compression;
pub mod history;
pub mod models;
pub mod optimizer;
pub mod techniques;
pub mod token_budget;
pub mod token_estimator;

pub use compression::secondary_compress;
pub use history::{BoundedLru, OptimizationHistory, ResultCache, TaskSignature, TechniqueStats};
pub use models::{
    ContextFile, ContextPriority, OptimizationConstraints, OptimizationResult, TaskClass,
    TechniqueOutput,
};
pub use optimizer::{ContextOptimizer, TechniqueRanking};
pub use techniques::{Technique, TechniqueInput};
pub use token_budget::{BudgetError, LimitPeriod, TokenUsageLedger};
pub use token_estimator::{estimator_for, CharRatioEstimator, TiktokenEstimator, TokenEstimator};
