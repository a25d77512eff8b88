//! Technique selection and application under token, time, and quality constraints

use super::compression::secondary_compress;
use super::history::{OptimizationHistory, ResultCache, TaskSignature};
use super::models::{ContextFile, OptimizationConstraints, OptimizationResult, TaskClass, TechniqueOutput};
use super::techniques::{Technique, TechniqueInput};
use super::token_estimator::{estimator_for, TokenEstimator};
use crate::config::OptimizerConfig;
use crate::error::Result;
use crate::metrics;
use crate::scoring::tokenize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

const FAST_PATH_BONUS: f64 = 20.0;
const SLOW_PATH_PENALTY: f64 = 10.0;
const HIGH_QUALITY_BONUS: f64 = 15.0;
const HISTORY_WEIGHT: f64 = 10.0;
const SECONDARY_CONFIDENCE_FACTOR: f64 = 0.8;

/// Selection score of one technique, kept for explainability
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TechniqueRanking {
    pub technique: Technique,
    pub score: f64,
}

/// Adaptive optimizer; owns the history and result cache for its session
pub struct ContextOptimizer {
    config: OptimizerConfig,
    estimator: Arc<dyn TokenEstimator>,
    history: OptimizationHistory,
    results: ResultCache,
}

impl ContextOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let estimator = estimator_for(config.tokenizer);
        Self::with_estimator(config, estimator)
    }

    pub fn with_estimator(config: OptimizerConfig, estimator: Arc<dyn TokenEstimator>) -> Self {
        Self {
            history: OptimizationHistory::new(config.history_capacity),
            results: ResultCache::new(config.result_cache_capacity),
            config,
            estimator,
        }
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    pub fn history(&self) -> &OptimizationHistory {
        &self.history
    }

    /// Average weighted complexity per file, 0 for an empty set
    pub fn aggregate_complexity(files: &[ContextFile]) -> f64 {
        if files.is_empty() {
            return 0.0;
        }
        files.iter().map(ContextFile::weighted_complexity).sum::<f64>() / files.len() as f64
    }

    /// Score every technique for a task, highest first, catalog order on ties
    pub fn rank_techniques(
        &self,
        task_class: TaskClass,
        complexity: f64,
        constraints: &OptimizationConstraints,
        signature: &TaskSignature,
    ) -> Vec<TechniqueRanking> {
        let fast_path = constraints.time_constraint_ms < self.config.realtime_threshold_ms;
        let high_quality = constraints.quality_requirement > self.config.high_quality_threshold;

        let mut rankings: Vec<TechniqueRanking> = Technique::ALL
            .iter()
            .map(|&technique| {
                let mut score = technique.compatibility(task_class, complexity);
                if fast_path {
                    if technique == Technique::ExtremeCompression {
                        score += FAST_PATH_BONUS;
                    } else {
                        score -= SLOW_PATH_PENALTY;
                    }
                }
                if high_quality && technique == Technique::SmartSummarization {
                    score += HIGH_QUALITY_BONUS;
                }
                if let Some(quality) = self.history.average_quality(signature, technique) {
                    score += HISTORY_WEIGHT * quality;
                }
                TechniqueRanking { technique, score }
            })
            .collect();

        // Stable sort keeps catalog order among equal scores
        rankings.sort_by(|a, b| b.score.total_cmp(&a.score));
        rankings
    }

    pub fn select_technique(
        &self,
        task_class: TaskClass,
        complexity: f64,
        constraints: &OptimizationConstraints,
        signature: &TaskSignature,
    ) -> Technique {
        self.rank_techniques(task_class, complexity, constraints, signature)
            .first()
            .map(|r| r.technique)
            .unwrap_or(Technique::ExtremeCompression)
    }

    /// Pick the best technique for the task, apply it, and learn from the outcome
    pub fn optimize_intelligently(
        &mut self,
        files: &[ContextFile],
        task: &str,
        constraints: &OptimizationConstraints,
    ) -> Result<OptimizationResult> {
        let started = Instant::now();
        let task_class = TaskClass::classify(task);
        let complexity = Self::aggregate_complexity(files);
        let signature = TaskSignature::new(task, constraints);
        let technique = self.select_technique(task_class, complexity, constraints, &signature);

        debug!(
            task_class = task_class.as_str(),
            complexity,
            technique = %technique,
            "technique selected"
        );

        let result = self.apply(technique, task_class, files, task, constraints, started)?;
        self.history
            .record(signature, technique, result.quality_score, result.estimated_tokens);
        Ok(result)
    }

    /// Fast path: extreme compression, then secondary compression if over target
    pub fn optimize_real_time(
        &mut self,
        files: &[ContextFile],
        task: &str,
        target_tokens: usize,
        time_limit_ms: u64,
    ) -> Result<OptimizationResult> {
        let started = Instant::now();
        let constraints = OptimizationConstraints::new(target_tokens).with_time_constraint(time_limit_ms);
        self.apply(
            Technique::ExtremeCompression,
            TaskClass::classify(task),
            files,
            task,
            &constraints,
            started,
        )
    }

    fn apply(
        &mut self,
        technique: Technique,
        task_class: TaskClass,
        files: &[ContextFile],
        task: &str,
        constraints: &OptimizationConstraints,
        started: Instant,
    ) -> Result<OptimizationResult> {
        let input = TechniqueInput {
            files,
            task,
            constraints,
            estimator: self.estimator.as_ref(),
        };
        let primary = technique.optimize(&input, &mut self.results)?;
        let primary_tokens = primary.estimated_tokens;

        let (output, secondary) = if primary_tokens > constraints.token_budget {
            (self.compress_further(primary, task, constraints.token_budget), true)
        } else {
            (primary, false)
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            technique = %technique,
            primary_tokens,
            tokens = output.estimated_tokens,
            budget = constraints.token_budget,
            secondary,
            elapsed_ms,
            "context optimized"
        );
        if let Some(m) = metrics::global() {
            m.record_optimization(technique.name(), output.estimated_tokens, secondary);
        }

        Ok(OptimizationResult {
            technique,
            task_class,
            content: output.content,
            estimated_tokens: output.estimated_tokens,
            confidence: output.confidence,
            quality_score: output.quality_score,
            primary_tokens,
            secondary_compression: secondary,
            files_considered: files.len(),
            elapsed_ms,
        })
    }

    fn compress_further(&self, primary: TechniqueOutput, task: &str, target_tokens: usize) -> TechniqueOutput {
        let keywords = tokenize(task);
        let content = secondary_compress(&primary.content, target_tokens, &keywords, self.estimator.as_ref());
        let estimated_tokens = self.estimator.estimate(&content);
        TechniqueOutput {
            content,
            estimated_tokens,
            confidence: primary.confidence * SECONDARY_CONFIDENCE_FACTOR,
            quality_score: primary.quality_score,
        }
    }
}
