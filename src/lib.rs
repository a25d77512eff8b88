//! Context optimization engine
//!
//! Scans a project with the best-matching language plugin, caches the
//! snapshot for a day, ranks files against a task and compresses the most
//! relevant ones into a token budget with an adaptively chosen technique.
//!
//! ```no_run
//! use context_optimizer::{Config, ContextEngine, ContextMode, ScanLevel};
//! use std::path::Path;
//!
//! # async fn run() -> context_optimizer::Result<()> {
//! let config = Config::load(None)?;
//! context_optimizer::telemetry::init(&config.logging);
//!
//! let mut engine = ContextEngine::new(config).await?;
//! let project = Path::new("./my-app");
//! engine.scan(project, ScanLevel::Standard, false).await?;
//! let context = engine
//!     .get_context(project, "fix login bug", 4000, ContextMode::Focused)
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod plugins;
pub mod project;
pub mod scoring;
pub mod telemetry;

pub use cache::{CacheEntry, ProjectCache};
pub use config::Config;
pub use context::{ContextOptimizer, OptimizationConstraints, OptimizationResult, Technique};
pub use engine::{
    ContextEngine, ContextMode, ContextResponse, DependencyReport, EngineResponse, OptimizeMode,
    OptimizeResponse, ScanSummary,
};
pub use error::{ContextError, Result};
pub use plugins::{LanguagePlugin, PluginRegistry};
pub use project::{ProjectId, ProjectSnapshot, ScanLevel};
pub use scoring::{RelevanceScore, RelevanceScorer};
