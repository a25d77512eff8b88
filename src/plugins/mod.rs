//! Language plugins
//!
//! A plugin is plain data (name, language, priority, detection markers) plus
//! four injected capabilities: a project parser, a dependency analyzer, a
//! relevance scorer, and optionally a documentation provider.

pub mod dependencies;
pub mod docs;
pub mod languages;
pub mod parser;
pub mod registry;

use crate::error::{ContextError, Result};
use crate::project::{DependencyGraph, Language, OutdatedDependency, ProjectStructure, SourceFileDescriptor};
use crate::scoring::{ProjectContext, RelevanceScore, RelevanceScorer};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub use dependencies::{DependencyTree, Ecosystem, HttpRegistryClient, ManifestAnalyzer, RegistryClient, Vulnerability};
pub use docs::{DocSearchOptions, DocumentationResult, LocalDocsProvider};
pub use languages::builtin_registry;
pub use parser::HeuristicParser;
pub use registry::PluginRegistry;

/// Directory depth searched when sniffing extensions
const SNIFF_DEPTH: usize = 3;
const SNIFF_SKIP_DIRS: &[&str] = &["node_modules", "target", "build", "dist", "venv", "__pycache__"];

/// Turns a project directory into structured metadata.
///
/// Implementations must not fail on unreadable files; they skip them and
/// return what they could parse.
#[async_trait]
pub trait ProjectParser: Send + Sync {
    async fn parse_project(&self, root: &Path) -> Result<ProjectStructure>;

    async fn get_source_files(&self, root: &Path) -> Result<Vec<SourceFileDescriptor>>;

    async fn analyze_complexity(&self, file: &Path) -> Result<u32>;

    async fn extract_metadata(&self, file: &Path) -> Result<BTreeMap<String, serde_json::Value>>;
}

#[async_trait]
pub trait DependencyAnalyzer: Send + Sync {
    async fn analyze_dependencies(&self, root: &Path) -> Result<DependencyGraph>;

    async fn check_for_updates(&self, root: &Path) -> Result<Vec<OutdatedDependency>>;

    async fn find_vulnerabilities(&self, root: &Path) -> Result<Vec<Vulnerability>>;

    async fn resolve_dependency_tree(&self, root: &Path) -> Result<DependencyTree>;
}

/// Ranks files against a task for one language
pub trait ContextScorer: Send + Sync {
    fn score_file_relevance(&self, path: &Path, task: &str, ctx: &ProjectContext<'_>) -> RelevanceScore;

    /// Scores sorted by descending score
    fn score_files(&self, paths: &[PathBuf], task: &str, ctx: &ProjectContext<'_>) -> Vec<RelevanceScore>;

    /// Scores above the minimum, at most `max_files` of them
    fn select_context_files(
        &self,
        paths: &[PathBuf],
        task: &str,
        ctx: &ProjectContext<'_>,
        max_files: Option<usize>,
    ) -> Vec<RelevanceScore>;
}

impl ContextScorer for RelevanceScorer {
    fn score_file_relevance(&self, path: &Path, task: &str, ctx: &ProjectContext<'_>) -> RelevanceScore {
        self.score(path, task, ctx)
    }

    fn score_files(&self, paths: &[PathBuf], task: &str, ctx: &ProjectContext<'_>) -> Vec<RelevanceScore> {
        self.rank(paths, task, ctx)
    }

    fn select_context_files(
        &self,
        paths: &[PathBuf],
        task: &str,
        ctx: &ProjectContext<'_>,
        max_files: Option<usize>,
    ) -> Vec<RelevanceScore> {
        self.select(paths, task, ctx, max_files)
    }
}

#[async_trait]
pub trait DocumentationProvider: Send + Sync {
    async fn search(&self, root: &Path, options: &DocSearchOptions) -> Result<Vec<DocumentationResult>>;
}

/// Identity and detection markers of a plugin
#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub language: Language,
    /// Higher wins when several plugins apply
    pub priority: i32,
    /// Files whose presence at the root marks a project
    pub manifests: Vec<String>,
    /// Source extensions sniffed when no manifest is present
    pub extensions: Vec<String>,
}

impl PluginDescriptor {
    pub fn new(name: &str, language: Language, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            language,
            priority,
            manifests: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn with_manifests(mut self, manifests: &[&str]) -> Self {
        self.manifests = manifests.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }
}

/// A language plugin assembled from its capabilities
#[derive(Clone)]
pub struct LanguagePlugin {
    descriptor: PluginDescriptor,
    parser: Arc<dyn ProjectParser>,
    dependencies: Arc<dyn DependencyAnalyzer>,
    scorer: Arc<dyn ContextScorer>,
    docs: Option<Arc<dyn DocumentationProvider>>,
}

impl LanguagePlugin {
    pub fn new(
        descriptor: PluginDescriptor,
        parser: Arc<dyn ProjectParser>,
        dependencies: Arc<dyn DependencyAnalyzer>,
        scorer: Arc<dyn ContextScorer>,
    ) -> Self {
        Self {
            descriptor,
            parser,
            dependencies,
            scorer,
            docs: None,
        }
    }

    pub fn with_docs(mut self, docs: Arc<dyn DocumentationProvider>) -> Self {
        self.docs = Some(docs);
        self
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn language(&self) -> Language {
        self.descriptor.language
    }

    pub fn priority(&self) -> i32 {
        self.descriptor.priority
    }

    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn parser(&self) -> &dyn ProjectParser {
        self.parser.as_ref()
    }

    pub fn dependency_analyzer(&self) -> &dyn DependencyAnalyzer {
        self.dependencies.as_ref()
    }

    pub fn scorer(&self) -> &dyn ContextScorer {
        self.scorer.as_ref()
    }

    pub fn docs(&self) -> Option<&dyn DocumentationProvider> {
        self.docs.as_deref()
    }

    /// Manifest presence first, then a shallow extension sniff
    pub async fn is_applicable(&self, root: &Path) -> Result<bool> {
        let metadata = tokio::fs::metadata(root).await?;
        if !metadata.is_dir() {
            return Ok(false);
        }

        for manifest in &self.descriptor.manifests {
            if tokio::fs::try_exists(root.join(manifest)).await.unwrap_or(false) {
                return Ok(true);
            }
        }

        if self.descriptor.extensions.is_empty() {
            return Ok(false);
        }
        let root = root.to_path_buf();
        let extensions = self.descriptor.extensions.clone();
        tokio::task::spawn_blocking(move || sniff_extensions(&root, &extensions))
            .await
            .map_err(|e| ContextError::Internal(format!("extension sniff panicked: {}", e)))
    }
}

impl std::fmt::Debug for LanguagePlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanguagePlugin")
            .field("descriptor", &self.descriptor)
            .field("has_docs", &self.docs.is_some())
            .finish()
    }
}

fn sniff_extensions(root: &Path, extensions: &[String]) -> bool {
    WalkDir::new(root)
        .max_depth(SNIFF_DEPTH)
        .into_iter()
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            entry.depth() == 0 || !(name.starts_with('.') || SNIFF_SKIP_DIRS.contains(&name.as_ref()))
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .any(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| {
                    let ext = ext.to_string_lossy();
                    extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
                })
                .unwrap_or(false)
        })
}
