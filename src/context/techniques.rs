//! Optimization technique catalog
//!
//! The catalog is a closed enum. Each variant reports a compatibility score
//! for a task class and complexity figure, and produces budgeted text from a
//! file set. Compatibility is on a 0 to 100 scale.

use super::compression::{is_comment, is_declaration};
use super::history::{ResultCache, ResultKey};
use super::models::{ContextFile, OptimizationConstraints, TaskClass, TechniqueOutput};
use super::token_estimator::TokenEstimator;
use crate::error::{ContextError, Result};
use crate::scoring::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

const EXTREME_TOP_FILES: usize = 3;
const EXTREME_PREVIEW_CHARS: usize = 200;
const COMPLEX_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    ExtremeCompression,
    SmartSummarization,
    ContextualFiltering,
    StructuralOptimization,
    SemanticCompression,
    AdaptiveCaching,
}

impl Technique {
    /// Catalog order, which also breaks selection ties
    pub const ALL: [Technique; 6] = [
        Technique::ExtremeCompression,
        Technique::SmartSummarization,
        Technique::ContextualFiltering,
        Technique::StructuralOptimization,
        Technique::SemanticCompression,
        Technique::AdaptiveCaching,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Technique::ExtremeCompression => "extreme_compression",
            Technique::SmartSummarization => "smart_summarization",
            Technique::ContextualFiltering => "contextual_filtering",
            Technique::StructuralOptimization => "structural_optimization",
            Technique::SemanticCompression => "semantic_compression",
            Technique::AdaptiveCaching => "adaptive_caching",
        }
    }

    /// How well the technique suits a task, before constraint adjustments
    pub fn compatibility(&self, task_class: TaskClass, complexity: f64) -> f64 {
        match self {
            Technique::ExtremeCompression => 70.0,
            Technique::SmartSummarization => {
                let mut score = 60.0;
                if complexity > COMPLEX_THRESHOLD {
                    score += 20.0;
                }
                if task_class == TaskClass::Implementation {
                    score += 15.0;
                }
                score
            }
            Technique::ContextualFiltering => match task_class {
                TaskClass::Debug => 80.0,
                TaskClass::Testing => 65.0,
                _ => 50.0,
            },
            Technique::StructuralOptimization => match task_class {
                TaskClass::Refactoring => 80.0,
                _ => 50.0,
            },
            Technique::SemanticCompression => match task_class {
                TaskClass::Implementation => 50.0,
                _ => 40.0,
            },
            Technique::AdaptiveCaching => 30.0,
        }
    }

    /// Produce budgeted content for the task
    pub fn optimize(&self, input: &TechniqueInput<'_>, results: &mut ResultCache) -> Result<TechniqueOutput> {
        if input.constraints.token_budget == 0 {
            return Err(ContextError::Optimization {
                technique: self.name().to_string(),
                reason: "token budget must be positive".to_string(),
            });
        }

        let output = match self {
            Technique::ExtremeCompression => extreme_compression(input),
            Technique::SmartSummarization => smart_summarization(input),
            Technique::ContextualFiltering => contextual_filtering(input),
            Technique::StructuralOptimization => structural_optimization(input),
            Technique::SemanticCompression => semantic_compression(input),
            Technique::AdaptiveCaching => adaptive_caching(input, results),
        };
        debug!(
            technique = %self,
            tokens = output.estimated_tokens,
            files = input.files.len(),
            "technique applied"
        );
        Ok(output)
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything a technique reads
pub struct TechniqueInput<'a> {
    pub files: &'a [ContextFile],
    pub task: &'a str,
    pub constraints: &'a OptimizationConstraints,
    pub estimator: &'a dyn TokenEstimator,
}

impl<'a> TechniqueInput<'a> {
    pub fn keywords(&self) -> Vec<String> {
        tokenize(self.task)
    }
}

/// Appends sections while the running estimate stays within a budget
struct BudgetedText<'a> {
    text: String,
    tokens: usize,
    budget: usize,
    estimator: &'a dyn TokenEstimator,
}

impl<'a> BudgetedText<'a> {
    fn new(budget: usize, estimator: &'a dyn TokenEstimator) -> Self {
        Self {
            text: String::new(),
            tokens: 0,
            budget,
            estimator,
        }
    }

    /// Append a line if it fits; returns false once the budget is spent
    fn push_line(&mut self, line: &str) -> bool {
        let cost = self.estimator.estimate(line) + 1;
        if self.tokens + cost > self.budget {
            return false;
        }
        self.text.push_str(line);
        self.text.push('\n');
        self.tokens += cost;
        true
    }

    fn finish(self, confidence: f64, quality_score: f64) -> TechniqueOutput {
        let estimated_tokens = self.estimator.estimate(&self.text);
        TechniqueOutput {
            content: self.text,
            estimated_tokens,
            confidence,
            quality_score,
        }
    }
}

/// Cheap relevance used by techniques that pick files themselves
fn quick_relevance(file: &ContextFile, keywords: &[String]) -> usize {
    let path = file.display_path().to_lowercase();
    let content = file.content.to_lowercase();
    let symbols: Vec<String> = file
        .classes
        .iter()
        .chain(file.functions.iter())
        .map(|s| s.to_lowercase())
        .collect();

    keywords
        .iter()
        .map(|k| {
            let mut hits = 0;
            if path.contains(k.as_str()) {
                hits += 4;
            }
            if symbols.iter().any(|s| s.contains(k.as_str())) {
                hits += 2;
            }
            if content.contains(k.as_str()) {
                hits += 1;
            }
            hits
        })
        .sum()
}

fn preview(content: &str, chars: usize) -> String {
    content.chars().take(chars).collect()
}

fn extreme_compression(input: &TechniqueInput<'_>) -> TechniqueOutput {
    let keywords = input.keywords();
    let mut ranked: Vec<(usize, &ContextFile)> = input
        .files
        .iter()
        .map(|f| (quick_relevance(f, &keywords), f))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.relevance.unwrap_or(0.0).total_cmp(&a.1.relevance.unwrap_or(0.0)))
    });

    let mut content = String::new();
    for (_, file) in ranked.into_iter().take(EXTREME_TOP_FILES) {
        content.push_str(&format!("// {}\n", file.display_path()));
        if !file.classes.is_empty() {
            content.push_str(&format!("classes: {}\n", file.classes.join(", ")));
        }
        if !file.functions.is_empty() {
            content.push_str(&format!("functions: {}\n", file.functions.join(", ")));
        }
        let head = preview(&file.content, EXTREME_PREVIEW_CHARS);
        if !head.trim().is_empty() {
            content.push_str(head.trim_end());
            content.push('\n');
        }
        content.push('\n');
    }

    let estimated_tokens = input.estimator.estimate(&content);
    TechniqueOutput {
        content,
        estimated_tokens,
        confidence: 0.6,
        quality_score: 0.5,
    }
}

fn smart_summarization(input: &TechniqueInput<'_>) -> TechniqueOutput {
    if input.files.is_empty() {
        return TechniqueOutput::empty();
    }

    let budget = input.constraints.token_budget;
    let per_file = (budget / input.files.len()).max(1);
    let mut out = BudgetedText::new(budget, input.estimator);
    let mut summarized = 0usize;

    for file in input.files {
        let mut file_text = BudgetedText::new(per_file, input.estimator);
        if !file_text.push_line(&format!("// {}", file.display_path())) {
            continue;
        }
        let mut extracted = 0;
        for line in file.content.lines() {
            if is_declaration(line) || is_comment(line) {
                if !file_text.push_line(line.trim_end()) {
                    break;
                }
                extracted += 1;
            }
        }
        if extracted > 0 {
            summarized += 1;
        }
        for line in file_text.text.lines() {
            if !out.push_line(line) {
                break;
            }
        }
    }

    let coverage = summarized as f64 / input.files.len() as f64;
    out.finish(0.8, 0.6 + 0.3 * coverage)
}

fn contextual_filtering(input: &TechniqueInput<'_>) -> TechniqueOutput {
    let keywords = input.keywords();
    let previous: Vec<String> = input
        .constraints
        .previous_tasks
        .iter()
        .map(|t| t.to_lowercase())
        .collect();

    let mut out = BudgetedText::new(input.constraints.token_budget, input.estimator);
    let mut retained = 0usize;

    'files: for file in input.files {
        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let path = file.display_path().to_lowercase();
        let referenced = !stem.is_empty() && previous.iter().any(|t| t.contains(stem.as_str()));
        let named = keywords.iter().any(|k| {
            path.contains(k.as_str())
                || file
                    .classes
                    .iter()
                    .chain(file.functions.iter())
                    .any(|s| s.to_lowercase().contains(k.as_str()))
        });

        let lines: Vec<&str> = file.content.lines().collect();
        let mut window: BTreeSet<usize> = BTreeSet::new();
        for (i, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            if keywords.iter().any(|k| lower.contains(k.as_str())) {
                window.insert(i.saturating_sub(1));
                window.insert(i);
                if i + 1 < lines.len() {
                    window.insert(i + 1);
                }
            }
        }

        if !(referenced || named || !window.is_empty()) {
            continue;
        }
        retained += 1;

        if !out.push_line(&format!("// {}", file.display_path())) {
            break;
        }
        let mut previous_line: Option<usize> = None;
        for i in window {
            if previous_line.is_some_and(|p| i > p + 1) && !out.push_line("...") {
                break 'files;
            }
            if !out.push_line(lines[i].trim_end()) {
                break 'files;
            }
            previous_line = Some(i);
        }
    }

    let quality = if retained == 0 { 0.3 } else { 0.75 };
    out.finish(0.75, quality)
}

fn structural_optimization(input: &TechniqueInput<'_>) -> TechniqueOutput {
    let mut out = BudgetedText::new(input.constraints.token_budget, input.estimator);

    'files: for file in input.files {
        if !out.push_line(&file.display_path()) {
            break;
        }
        for class in &file.classes {
            if !out.push_line(&format!("  class {}", class)) {
                break 'files;
            }
        }
        for function in &file.functions {
            if !out.push_line(&format!("  fn {}", function)) {
                break 'files;
            }
        }
    }

    out.finish(0.7, 0.65)
}

fn semantic_compression(input: &TechniqueInput<'_>) -> TechniqueOutput {
    let task = input.task.to_lowercase();
    let mut symbols: BTreeSet<&str> = BTreeSet::new();
    for file in input.files {
        symbols.extend(file.classes.iter().map(String::as_str));
        symbols.extend(file.functions.iter().map(String::as_str));
    }

    let mut out = BudgetedText::new(input.constraints.token_budget, input.estimator);
    if !symbols.is_empty() {
        let listing = symbols.iter().copied().collect::<Vec<_>>().join(", ");
        out.push_line(&format!("symbols: {}", listing));
    }

    'files: for file in input.files {
        let mentioned = file
            .classes
            .iter()
            .chain(file.functions.iter())
            .any(|s| s.chars().count() > 2 && task.contains(&s.to_lowercase()));
        if !mentioned {
            continue;
        }
        if !out.push_line(&format!("// {}", file.display_path())) {
            break;
        }
        for line in file.content.lines() {
            if !out.push_line(line.trim_end()) {
                break 'files;
            }
        }
    }

    out.finish(0.55, 0.6)
}

fn adaptive_caching(input: &TechniqueInput<'_>, results: &mut ResultCache) -> TechniqueOutput {
    let key = ResultKey::new(input.task, input.constraints);
    if let Some(cached) = results.get(&key) {
        debug!(task = input.task, "reusing cached optimization result");
        return cached.clone();
    }
    let output = smart_summarization(input);
    results.insert(key, output.clone());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::token_estimator::CharRatioEstimator;
    use pretty_assertions::assert_eq;

    fn files() -> Vec<ContextFile> {
        vec![
            ContextFile::new(
                "src/auth/login.js",
                "// Login flow\nclass LoginController {\n  validate(user) {\n    return checkPassword(user);\n  }\n}\nfunction logout() {}\n",
            )
            .with_symbols(vec!["LoginController".into()], vec!["validate".into(), "logout".into()]),
            ContextFile::new("src/util/format.js", "function pad(s) {\n  return s;\n}\n")
                .with_symbols(vec![], vec!["pad".into()]),
        ]
    }

    fn run(technique: Technique, files: &[ContextFile], task: &str, budget: usize) -> TechniqueOutput {
        let estimator = CharRatioEstimator::default();
        let constraints = OptimizationConstraints::new(budget);
        let input = TechniqueInput {
            files,
            task,
            constraints: &constraints,
            estimator: &estimator,
        };
        let mut cache = ResultCache::new(8);
        technique.optimize(&input, &mut cache).unwrap()
    }

    #[test]
    fn test_every_technique_handles_empty_input() {
        for technique in Technique::ALL {
            let output = run(technique, &[], "fix login bug", 500);
            assert!(output.content.len() < 1_000, "{} produced unexpected output", technique);
            assert_eq!(output.estimated_tokens, CharRatioEstimator::default().estimate(&output.content));
        }
    }

    #[test]
    fn test_zero_budget_is_an_optimization_error() {
        let estimator = CharRatioEstimator::default();
        let constraints = OptimizationConstraints::new(0);
        let input = TechniqueInput {
            files: &[],
            task: "anything",
            constraints: &constraints,
            estimator: &estimator,
        };
        let err = Technique::SmartSummarization
            .optimize(&input, &mut ResultCache::new(1))
            .unwrap_err();
        assert!(matches!(err, ContextError::Optimization { .. }));
    }

    #[test]
    fn test_compatibility_favours_task_class() {
        assert_eq!(Technique::ContextualFiltering.compatibility(TaskClass::Debug, 0.0), 80.0);
        assert_eq!(Technique::StructuralOptimization.compatibility(TaskClass::Refactoring, 0.0), 80.0);
        assert_eq!(Technique::SmartSummarization.compatibility(TaskClass::Implementation, 60.0), 95.0);
        assert_eq!(Technique::AdaptiveCaching.compatibility(TaskClass::General, 0.0), 30.0);
    }

    #[test]
    fn test_extreme_compression_lists_symbols_first_for_relevant_file() {
        let output = run(Technique::ExtremeCompression, &files(), "fix login bug", 500);
        assert!(output.content.starts_with("// src/auth/login.js\nclasses: LoginController\n"));
        assert!(output.content.contains("functions: pad"));
    }

    #[test]
    fn test_smart_summarization_keeps_declarations() {
        let output = run(Technique::SmartSummarization, &files(), "implement signup", 500);
        assert!(output.content.contains("class LoginController {"));
        assert!(output.content.contains("function pad(s) {"));
        assert!(!output.content.contains("return s;"));
        assert!(output.estimated_tokens <= 500);
    }

    #[test]
    fn test_smart_summarization_respects_budget() {
        let output = run(Technique::SmartSummarization, &files(), "implement signup", 12);
        assert!(output.estimated_tokens <= 12);
    }

    #[test]
    fn test_contextual_filtering_windows_around_matches() {
        let output = run(Technique::ContextualFiltering, &files(), "fix checkpassword", 500);
        assert_eq!(
            output.content,
            "// src/auth/login.js\n  validate(user) {\n    return checkPassword(user);\n  }\n"
        );
    }

    #[test]
    fn test_contextual_filtering_uses_previous_tasks() {
        let estimator = CharRatioEstimator::default();
        let constraints = OptimizationConstraints::new(500)
            .with_previous_tasks(vec!["clean up format helpers".to_string()]);
        let files = files();
        let input = TechniqueInput {
            files: &files,
            task: "unrelated words",
            constraints: &constraints,
            estimator: &estimator,
        };
        let output = Technique::ContextualFiltering
            .optimize(&input, &mut ResultCache::new(1))
            .unwrap();
        assert!(output.content.contains("// src/util/format.js"));
    }

    #[test]
    fn test_structural_outline_has_no_bodies() {
        let output = run(Technique::StructuralOptimization, &files(), "refactor", 500);
        assert_eq!(
            output.content,
            "src/auth/login.js\n  class LoginController\n  fn validate\n  fn logout\nsrc/util/format.js\n  fn pad\n"
        );
    }

    #[test]
    fn test_semantic_compression_includes_mentioned_bodies() {
        let output = run(Technique::SemanticCompression, &files(), "change how pad works", 500);
        assert!(output.content.starts_with("symbols: LoginController, logout, pad, validate\n"));
        assert!(output.content.contains("return s;"));
        assert!(!output.content.contains("checkPassword"));
    }

    #[test]
    fn test_adaptive_caching_reuses_result() {
        let estimator = CharRatioEstimator::default();
        let constraints = OptimizationConstraints::new(500);
        let files = files();
        let input = TechniqueInput {
            files: &files,
            task: "implement signup",
            constraints: &constraints,
            estimator: &estimator,
        };
        let mut cache = ResultCache::new(4);
        let first = Technique::AdaptiveCaching.optimize(&input, &mut cache).unwrap();
        assert_eq!(cache.len(), 1);

        let input = TechniqueInput { files: &[], ..input };
        let second = Technique::AdaptiveCaching.optimize(&input, &mut cache).unwrap();
        assert_eq!(first, second);
    }
}
