//! Data models for context optimization

use crate::project::SourceFileDescriptor;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Priority level for context items
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextPriority {
    Critical = 4,
    High = 3,
    Medium = 2,
    Low = 1,
}

impl ContextPriority {
    /// Bucket a [0, 1] relevance score
    pub fn from_score(score: f64) -> Self {
        if score >= 0.85 {
            ContextPriority::Critical
        } else if score >= 0.6 {
            ContextPriority::High
        } else if score >= 0.35 {
            ContextPriority::Medium
        } else {
            ContextPriority::Low
        }
    }
}

/// A file handed to the optimizer, with its content loaded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextFile {
    pub path: PathBuf,
    pub content: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub complexity: u32,
    /// Relevance score from the scorer, if the file was ranked
    pub relevance: Option<f64>,
}

impl ContextFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            classes: Vec::new(),
            functions: Vec::new(),
            complexity: 0,
            relevance: None,
        }
    }

    pub fn from_descriptor(descriptor: &SourceFileDescriptor, content: String) -> Self {
        Self {
            path: descriptor.path.clone(),
            content,
            classes: descriptor.classes.clone(),
            functions: descriptor.functions.clone(),
            complexity: descriptor.complexity,
            relevance: None,
        }
    }

    pub fn with_symbols(mut self, classes: Vec<String>, functions: Vec<String>) -> Self {
        self.classes = classes;
        self.functions = functions;
        self
    }

    pub fn with_relevance(mut self, relevance: f64) -> Self {
        self.relevance = Some(relevance);
        self
    }

    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }

    /// Weighted structural size used by technique selection
    pub fn weighted_complexity(&self) -> f64 {
        self.classes.len() as f64 * 3.0 + self.functions.len() as f64 * 2.0 + self.complexity as f64
    }
}

/// Coarse classification of a task description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskClass {
    Debug,
    Implementation,
    Refactoring,
    Testing,
    General,
}

const DEBUG_WORDS: &[&str] = &[
    "bug", "fix", "error", "crash", "issue", "debug", "broken", "fail", "failing", "exception",
];
const REFACTOR_WORDS: &[&str] = &[
    "refactor", "restructure", "reorganize", "cleanup", "clean up", "simplify", "rename", "extract",
];
const TESTING_WORDS: &[&str] = &["test", "tests", "testing", "coverage", "spec", "assert", "mock"];
const IMPLEMENTATION_WORDS: &[&str] = &[
    "implement", "add", "create", "build", "feature", "support", "introduce", "new",
];

impl TaskClass {
    /// Classify a task by keyword matching; earlier classes win ties
    pub fn classify(task: &str) -> Self {
        let lower = task.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let hits = |vocab: &[&str]| {
            vocab
                .iter()
                .filter(|v| {
                    if v.contains(' ') {
                        lower.contains(*v)
                    } else {
                        words.contains(v)
                    }
                })
                .count()
        };

        let scored = [
            (TaskClass::Debug, hits(DEBUG_WORDS)),
            (TaskClass::Refactoring, hits(REFACTOR_WORDS)),
            (TaskClass::Testing, hits(TESTING_WORDS)),
            (TaskClass::Implementation, hits(IMPLEMENTATION_WORDS)),
        ];

        let mut best = (TaskClass::General, 0);
        for (class, count) in scored {
            if count > best.1 {
                best = (class, count);
            }
        }
        best.0
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskClass::Debug => "debug",
            TaskClass::Implementation => "implementation",
            TaskClass::Refactoring => "refactoring",
            TaskClass::Testing => "testing",
            TaskClass::General => "general",
        }
    }
}

/// Budget and quality constraints for one optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// Maximum estimated output tokens, must be positive
    pub token_budget: usize,
    pub time_constraint_ms: u64,
    /// Required quality in [0, 1]
    pub quality_requirement: f64,
    /// Recent task descriptions, most recent last
    pub previous_tasks: Vec<String>,
}

impl OptimizationConstraints {
    pub fn new(token_budget: usize) -> Self {
        Self {
            token_budget,
            time_constraint_ms: 5000,
            quality_requirement: 0.7,
            previous_tasks: Vec::new(),
        }
    }

    pub fn with_time_constraint(mut self, ms: u64) -> Self {
        self.time_constraint_ms = ms;
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality_requirement = quality.clamp(0.0, 1.0);
        self
    }

    pub fn with_previous_tasks(mut self, tasks: Vec<String>) -> Self {
        self.previous_tasks = tasks;
        self
    }
}

/// Raw output of a single technique
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechniqueOutput {
    pub content: String,
    pub estimated_tokens: usize,
    pub confidence: f64,
    pub quality_score: f64,
}

impl TechniqueOutput {
    pub fn empty() -> Self {
        Self {
            content: String::new(),
            estimated_tokens: 0,
            confidence: 0.0,
            quality_score: 0.0,
        }
    }
}

/// Final result of an optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub technique: super::techniques::Technique,
    pub task_class: TaskClass,
    pub content: String,
    pub estimated_tokens: usize,
    pub confidence: f64,
    pub quality_score: f64,
    /// Tokens produced by the technique before any secondary pass
    pub primary_tokens: usize,
    pub secondary_compression: bool,
    pub files_considered: usize,
    pub elapsed_ms: u64,
}

impl OptimizationResult {
    pub fn within_budget(&self, budget: usize) -> bool {
        self.estimated_tokens <= budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_classification() {
        assert_eq!(TaskClass::classify("fix login bug"), TaskClass::Debug);
        assert_eq!(TaskClass::classify("Refactor the payment module"), TaskClass::Refactoring);
        assert_eq!(TaskClass::classify("increase test coverage"), TaskClass::Testing);
        assert_eq!(TaskClass::classify("implement OAuth support"), TaskClass::Implementation);
        assert_eq!(TaskClass::classify("explain the architecture"), TaskClass::General);
    }

    #[test]
    fn test_priority_from_score() {
        assert_eq!(ContextPriority::from_score(0.9), ContextPriority::Critical);
        assert_eq!(ContextPriority::from_score(0.6), ContextPriority::High);
        assert_eq!(ContextPriority::from_score(0.4), ContextPriority::Medium);
        assert_eq!(ContextPriority::from_score(0.0), ContextPriority::Low);
        assert!(ContextPriority::Critical > ContextPriority::Low);
    }

    #[test]
    fn test_weighted_complexity() {
        let file = ContextFile::new("a.py", "")
            .with_symbols(vec!["A".into()], vec!["f".into(), "g".into()]);
        assert_eq!(file.weighted_complexity(), 7.0);
    }

    #[test]
    fn test_constraints_clamp_quality() {
        let constraints = OptimizationConstraints::new(500).with_quality(1.4);
        assert_eq!(constraints.quality_requirement, 1.0);
    }
}
