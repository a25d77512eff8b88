//! Multi-factor relevance scoring of project files against a task

use super::keywords::{mentions_any, tokenize, triggered_concepts, Concept};
use crate::config::ScoringConfig;
use crate::context::models::ContextPriority;
use crate::project::{FileKind, Language, ProjectSnapshot, SourceFileDescriptor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const TEST_WORDS: &[&str] = &["test", "tests", "testing", "spec", "coverage", "unittest", "mock"];
const CONFIG_WORDS: &[&str] = &[
    "config", "configuration", "settings", "setting", "setup", "env", "environment", "build",
    "deploy", "dependency", "dependencies",
];
const DOC_WORDS: &[&str] = &["doc", "docs", "documentation", "readme", "guide", "explain"];

/// Factor that contributed to a relevance score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    FileType,
    Language,
    Complexity,
    Size,
    Freshness,
    TaskKeywords,
    Framework,
}

/// One itemized contribution to a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReason {
    pub factor: ScoreFactor,
    /// Weighted contribution to the final score
    pub weight: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub file_type: FileKind,
    pub importance: ContextPriority,
    pub category: String,
}

/// Relevance of one file to one task, recomputed on every scoring call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceScore {
    pub file_path: PathBuf,
    /// Bounded to [0, 1]
    pub score: f64,
    pub reasons: Vec<ScoreReason>,
    pub metadata: ScoreMetadata,
}

/// Project facts the scorer needs, borrowed from a snapshot
#[derive(Debug, Clone, Copy)]
pub struct ProjectContext<'a> {
    pub language: Language,
    pub framework: Option<&'a str>,
    pub files: Option<&'a BTreeMap<PathBuf, SourceFileDescriptor>>,
    /// Freshness is measured against this instant so scores stay pure
    pub reference_time: DateTime<Utc>,
}

impl<'a> ProjectContext<'a> {
    pub fn new(language: Language, reference_time: DateTime<Utc>) -> Self {
        Self {
            language,
            framework: None,
            files: None,
            reference_time,
        }
    }

    pub fn from_snapshot(snapshot: &'a ProjectSnapshot) -> Self {
        Self {
            language: snapshot.language,
            framework: snapshot.framework.as_deref(),
            files: Some(&snapshot.source_files),
            reference_time: snapshot.captured_at,
        }
    }

    pub fn with_framework(mut self, framework: &'a str) -> Self {
        self.framework = Some(framework);
        self
    }

    pub fn with_files(mut self, files: &'a BTreeMap<PathBuf, SourceFileDescriptor>) -> Self {
        self.files = Some(files);
        self
    }

    fn descriptor(&self, path: &Path) -> Option<&'a SourceFileDescriptor> {
        self.files.and_then(|files| files.get(path))
    }
}

/// Per-kind weights for the type factor
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KindWeights {
    pub source: f64,
    pub module: f64,
    pub test: f64,
    pub config: f64,
    pub documentation: f64,
    pub other: f64,
}

impl KindWeights {
    pub fn weight(&self, kind: FileKind) -> f64 {
        match kind {
            FileKind::Source => self.source,
            FileKind::Module => self.module,
            FileKind::Test => self.test,
            FileKind::Config => self.config,
            FileKind::Documentation => self.documentation,
            FileKind::Other => self.other,
        }
    }
}

impl Default for KindWeights {
    fn default() -> Self {
        Self {
            source: 1.0,
            module: 0.85,
            test: 0.6,
            config: 0.45,
            documentation: 0.3,
            other: 0.15,
        }
    }
}

/// Contribution of each factor to the final score; sums to 1.0
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FactorWeights {
    pub file_type: f64,
    pub language: f64,
    pub complexity: f64,
    pub size: f64,
    pub freshness: f64,
    pub task_keywords: f64,
    pub framework: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            file_type: 0.15,
            language: 0.05,
            complexity: 0.10,
            size: 0.05,
            freshness: 0.10,
            task_keywords: 0.45,
            framework: 0.10,
        }
    }
}

/// Path fragments conventional for a framework
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConvention {
    pub framework: String,
    pub markers: Vec<String>,
}

impl FrameworkConvention {
    pub fn new(framework: &str, markers: &[&str]) -> Self {
        Self {
            framework: framework.to_string(),
            markers: markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }
}

/// Language-specific scoring knobs, configured per plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerProfile {
    pub language: Language,
    pub kind_weights: KindWeights,
    pub factor_weights: FactorWeights,
    /// Language score for files outside the project's language family
    pub foreign_language_score: f64,
    pub conventions: Vec<FrameworkConvention>,
    /// File names that are conventional entry points
    pub entry_points: Vec<String>,
}

impl ScorerProfile {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            kind_weights: KindWeights::default(),
            factor_weights: FactorWeights::default(),
            foreign_language_score: 0.4,
            conventions: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    pub fn with_convention(mut self, framework: &str, markers: &[&str]) -> Self {
        self.conventions.push(FrameworkConvention::new(framework, markers));
        self
    }

    pub fn with_entry_points(mut self, names: &[&str]) -> Self {
        self.entry_points = names.iter().map(|n| n.to_lowercase()).collect();
        self
    }

    pub fn with_kind_weights(mut self, weights: KindWeights) -> Self {
        self.kind_weights = weights;
        self
    }
}

/// Keywords and concepts derived once per task
struct TaskTerms {
    keywords: Vec<String>,
    concepts: Vec<&'static Concept>,
}

impl TaskTerms {
    fn new(task: &str) -> Self {
        let keywords = tokenize(task);
        let concepts = triggered_concepts(&keywords);
        Self { keywords, concepts }
    }
}

/// Weighted-sum relevance scorer
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    profile: ScorerProfile,
    config: ScoringConfig,
}

impl RelevanceScorer {
    pub fn new(profile: ScorerProfile, config: ScoringConfig) -> Self {
        Self { profile, config }
    }

    pub fn profile(&self) -> &ScorerProfile {
        &self.profile
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score a single file
    pub fn score(&self, path: &Path, task: &str, ctx: &ProjectContext<'_>) -> RelevanceScore {
        self.score_with_terms(path, &TaskTerms::new(task), ctx)
    }

    /// Score many files, sorted by descending score then path
    pub fn rank(&self, paths: &[PathBuf], task: &str, ctx: &ProjectContext<'_>) -> Vec<RelevanceScore> {
        let terms = TaskTerms::new(task);
        let mut scores: Vec<RelevanceScore> = paths
            .iter()
            .map(|p| self.score_with_terms(p, &terms, ctx))
            .collect();
        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        scores
    }

    /// Rank, drop files at or below the minimum score, keep at most `max_files`
    pub fn select(
        &self,
        paths: &[PathBuf],
        task: &str,
        ctx: &ProjectContext<'_>,
        max_files: Option<usize>,
    ) -> Vec<RelevanceScore> {
        let limit = max_files.unwrap_or(self.config.max_files);
        self.rank(paths, task, ctx)
            .into_iter()
            .filter(|s| s.score > self.config.min_score)
            .take(limit)
            .collect()
    }

    fn score_with_terms(&self, path: &Path, terms: &TaskTerms, ctx: &ProjectContext<'_>) -> RelevanceScore {
        let fallback;
        let file = match ctx.descriptor(path) {
            Some(descriptor) => descriptor,
            None => {
                let language = path
                    .extension()
                    .map(|e| Language::from_extension(&e.to_string_lossy()))
                    .unwrap_or(Language::Unknown);
                fallback = SourceFileDescriptor::bare(path, language, FileKind::classify(path));
                &fallback
            }
        };

        let weights = self.profile.factor_weights;
        let mut reasons = Vec::new();
        let mut total = 0.0;
        let mut push = |factor: ScoreFactor, sub: f64, weight: f64, description: String| {
            let contribution = sub.clamp(0.0, 1.0) * weight;
            if contribution > 0.0 {
                total += contribution;
                reasons.push(ScoreReason {
                    factor,
                    weight: contribution,
                    description,
                });
            }
        };

        let type_score = self.profile.kind_weights.weight(file.kind);
        push(
            ScoreFactor::FileType,
            type_score,
            weights.file_type,
            format!("{} file", file.kind.as_str()),
        );

        let (language_score, language_note) = if file.language.same_family(ctx.language) {
            (1.0, format!("matches project language {}", ctx.language))
        } else {
            (
                self.profile.foreign_language_score,
                format!("{} differs from project language {}", file.language, ctx.language),
            )
        };
        push(ScoreFactor::Language, language_score, weights.language, language_note);

        let complexity_score = (file.complexity as f64 / 100.0).min(1.0);
        push(
            ScoreFactor::Complexity,
            complexity_score,
            weights.complexity,
            format!("complexity {}", file.complexity),
        );

        let ceiling = self.config.size_ceiling_bytes as f64;
        let size_score = ((ceiling - file.size_bytes as f64) / ceiling).max(0.0);
        push(
            ScoreFactor::Size,
            size_score,
            weights.size,
            format!("{} bytes", file.size_bytes),
        );

        let age_days = (ctx.reference_time - file.last_modified).num_seconds().max(0) as f64 / 86_400.0;
        let freshness_score = (1.0 - age_days / self.config.freshness_days.max(1) as f64).max(0.0);
        push(
            ScoreFactor::Freshness,
            freshness_score,
            weights.freshness,
            format!("modified {:.1} days ago", age_days),
        );

        let (keyword_score, keyword_note, category) = self.keyword_score(file, terms);
        push(ScoreFactor::TaskKeywords, keyword_score, weights.task_keywords, keyword_note);

        let (framework_score, framework_note) = self.framework_score(file, ctx);
        push(ScoreFactor::Framework, framework_score, weights.framework, framework_note);

        let score = total.clamp(0.0, 1.0);
        RelevanceScore {
            file_path: file.path.clone(),
            score,
            reasons,
            metadata: ScoreMetadata {
                file_type: file.kind,
                importance: ContextPriority::from_score(score),
                category: category.unwrap_or_else(|| file.kind.as_str().to_string()),
            },
        }
    }

    fn keyword_score(
        &self,
        file: &SourceFileDescriptor,
        terms: &TaskTerms,
    ) -> (f64, String, Option<String>) {
        let path = file.normalized_path();
        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mut score: f64 = 0.0;
        let mut matched = Vec::new();
        let mut category = None;

        for keyword in &terms.keywords {
            if stem.contains(keyword.as_str()) {
                score += 0.35;
                matched.push(keyword.clone());
            } else if path.contains(keyword.as_str()) {
                score += 0.2;
                matched.push(keyword.clone());
            } else if file
                .classes
                .iter()
                .chain(file.functions.iter())
                .any(|symbol| symbol.to_lowercase().contains(keyword.as_str()))
            {
                score += 0.1;
                matched.push(format!("{} (symbol)", keyword));
            }
        }

        for concept in &terms.concepts {
            if concept.markers.iter().any(|m| path.contains(m)) {
                score += 0.25;
                matched.push(format!("{} area", concept.name));
                category.get_or_insert_with(|| concept.name.to_string());
            }
        }

        let kind_bonus = match file.kind {
            FileKind::Test if mentions_any(&terms.keywords, TEST_WORDS) => true,
            FileKind::Config if mentions_any(&terms.keywords, CONFIG_WORDS) => true,
            FileKind::Documentation if mentions_any(&terms.keywords, DOC_WORDS) => true,
            _ => false,
        };
        if kind_bonus {
            score += 0.3;
            matched.push(format!("{} task", file.kind.as_str()));
        }

        let note = if matched.is_empty() {
            "no task keywords matched".to_string()
        } else {
            format!("matched {}", matched.join(", "))
        };
        (score.min(1.0), note, category)
    }

    fn framework_score(&self, file: &SourceFileDescriptor, ctx: &ProjectContext<'_>) -> (f64, String) {
        let path = file.normalized_path();

        if let Some(framework) = ctx.framework {
            let convention = self
                .profile
                .conventions
                .iter()
                .find(|c| c.framework.eq_ignore_ascii_case(framework));
            if let Some(marker) = convention.and_then(|c| c.markers.iter().find(|m| path.contains(m.as_str()))) {
                return (1.0, format!("{} convention ({})", framework, marker));
            }
        }

        let name = file.file_name().to_lowercase();
        if self.profile.entry_points.contains(&name) {
            return (0.5, format!("entry point {}", name));
        }
        (0.0, String::new())
    }
}
