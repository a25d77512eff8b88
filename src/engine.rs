//! Context engine
//!
//! The single owner of all mutable state: snapshot cache, optimizer history
//! and token usage ledger. Every operation resolves a project by its path,
//! and `get_context`/`optimize` only ever work from a valid cached snapshot.
//! They never scan implicitly.

use crate::cache::{CacheEntry, CacheLookup, ProjectCache};
use crate::config::Config;
use crate::context::{
    ContextFile, ContextOptimizer, OptimizationConstraints, OptimizationResult, TokenUsageLedger,
};
use crate::error::{ContextError, Result};
use crate::metrics;
use crate::plugins::{
    builtin_registry, DependencyTree, DocSearchOptions, DocumentationResult, LanguagePlugin,
    PluginRegistry, Vulnerability,
};
use crate::project::{
    normalize_path, BuildTarget, DependencyGraph, Language, ProjectId, ProjectSnapshot, ScanLevel,
};
use crate::scoring::{ProjectContext, RelevanceScore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Time limit used by [`OptimizeMode::RealTime`]
pub const REALTIME_LIMIT_MS: u64 = 1000;
const FOCUSED_MAX_FILES: usize = 5;
const RESCAN_HINT: &str = "No valid snapshot for this project; run scan first";

/// Outcome of an engine call.
///
/// A missing precondition is a response, not an error; `Err` is reserved
/// for internal faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum EngineResponse<T> {
    Ready(T),
    NotFound { project_path: PathBuf, hint: String },
    LimitReached { message: String },
}

impl<T> EngineResponse<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, EngineResponse::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            EngineResponse::Ready(value) => Some(value),
            _ => None,
        }
    }

    fn not_found(path: &Path, hint: &str) -> Self {
        EngineResponse::NotFound {
            project_path: path.to_path_buf(),
            hint: hint.to_string(),
        }
    }
}

/// How much context `get_context` gathers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMode {
    Focused,
    #[default]
    Balanced,
    Comprehensive,
}

impl ContextMode {
    pub fn max_files(&self, configured: usize) -> usize {
        match self {
            ContextMode::Focused => FOCUSED_MAX_FILES.min(configured.max(1)),
            ContextMode::Balanced => configured,
            ContextMode::Comprehensive => configured.saturating_mul(2),
        }
    }

    pub fn quality(&self) -> f64 {
        match self {
            ContextMode::Focused => 0.6,
            ContextMode::Balanced => 0.7,
            ContextMode::Comprehensive => 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizeMode {
    #[default]
    Intelligent,
    RealTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub project_id: ProjectId,
    pub name: String,
    pub root_path: PathBuf,
    pub language: Language,
    pub framework: Option<String>,
    pub plugin: String,
    pub level: ScanLevel,
    pub file_count: usize,
    pub files_by_kind: BTreeMap<String, usize>,
    pub total_size_bytes: u64,
    pub total_complexity: u64,
    pub targets: Vec<BuildTarget>,
    pub dependency_count: usize,
    pub conflict_count: usize,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
    /// True when the snapshot came from the cache
    pub cached: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_tree: Option<DependencyTree>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub project_id: ProjectId,
    pub task: String,
    pub mode: ContextMode,
    /// Selected files, most relevant first
    pub files: Vec<RelevanceScore>,
    pub result: OptimizationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizeResponse {
    pub project_id: ProjectId,
    pub mode: OptimizeMode,
    pub target_tokens: usize,
    /// Estimated tokens of the selected files before optimization
    pub original_tokens: usize,
    /// Output tokens over original tokens, 0 when there was no input
    pub compression_ratio: f64,
    pub result: OptimizationResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyReport {
    pub project_id: ProjectId,
    pub plugin: String,
    pub graph: DependencyGraph,
    pub vulnerabilities: Vec<Vulnerability>,
    pub updates_checked: bool,
}

pub struct ContextEngine {
    config: Config,
    registry: PluginRegistry,
    cache: ProjectCache,
    optimizer: ContextOptimizer,
    ledger: TokenUsageLedger,
    recent_tasks: VecDeque<String>,
}

impl ContextEngine {
    /// Engine with the built-in plugins and the persisted cache
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let registry = builtin_registry(&config)?;
        Ok(Self::with_registry(config, registry).await)
    }

    pub async fn with_registry(config: Config, registry: PluginRegistry) -> Self {
        let (cache, ledger) = ProjectCache::load(&config.cache).await;
        let ledger = ledger.with_limits(config.limits.clone());
        let optimizer = ContextOptimizer::new(config.optimizer.clone());
        info!(
            plugins = registry.len(),
            cached_projects = cache.len(),
            "context engine ready"
        );
        Self {
            config,
            registry,
            cache,
            optimizer,
            ledger,
            recent_tasks: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ProjectCache {
        &self.cache
    }

    pub fn optimizer(&self) -> &ContextOptimizer {
        &self.optimizer
    }

    pub fn token_usage(&self) -> &TokenUsageLedger {
        &self.ledger
    }

    /// Parse a project, or reuse its snapshot while it is still valid
    pub async fn scan(
        &mut self,
        path: &Path,
        level: ScanLevel,
        force_refresh: bool,
    ) -> Result<EngineResponse<ScanSummary>> {
        let root = normalize_path(path);
        if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            record_scan("not_found");
            return Ok(EngineResponse::not_found(path, "Project path does not exist"));
        }
        let id = ProjectId::from_path(&root);
        let now = Utc::now();

        if !force_refresh {
            let lookup = self.cache.lookup(&id, now);
            record_cache_lookup(&lookup);
            match lookup {
                CacheLookup::Hit(entry) if entry.covers(level) => {
                    let entry = entry.clone();
                    debug!(project_id = %id, "using cached snapshot");
                    record_scan("cached");
                    let plugin = self.registry.get(&entry.plugin);
                    let summary = self.summarize(&id, &entry, level, true, plugin.as_deref()).await;
                    return Ok(EngineResponse::Ready(summary));
                }
                CacheLookup::Hit(_) => {
                    debug!(project_id = %id, ?level, "cached snapshot has no dependency graph, rescanning");
                }
                _ => {}
            }
        }

        let analysis = match self.registry.analyze_project(&root).await {
            Ok(analysis) => analysis,
            Err(e) => {
                record_scan("failed");
                return Err(e);
            }
        };
        let plugin = analysis.plugin;

        let graph = if level.includes_dependencies() {
            match plugin.dependency_analyzer().analyze_dependencies(&root).await {
                Ok(graph) => graph,
                Err(e) => {
                    warn!(project_id = %id, "Dependency analysis failed: {}", e);
                    DependencyGraph::default()
                }
            }
        } else {
            DependencyGraph::default()
        };

        let snapshot = ProjectSnapshot::new(analysis.structure, graph, now);
        let entry = CacheEntry::new(snapshot, plugin.name()).with_level(level);
        info!(
            project_id = %id,
            plugin = plugin.name(),
            files = entry.snapshot.file_count(),
            hash = %entry.snapshot.content_hash,
            "project scanned"
        );

        self.cache.insert(id.clone(), entry.clone());
        self.cache.persist(&self.ledger).await;
        record_scan("fresh");

        let summary = self.summarize(&id, &entry, level, false, Some(plugin.as_ref())).await;
        Ok(EngineResponse::Ready(summary))
    }

    async fn summarize(
        &self,
        id: &ProjectId,
        entry: &CacheEntry,
        level: ScanLevel,
        cached: bool,
        plugin: Option<&LanguagePlugin>,
    ) -> ScanSummary {
        let snapshot = &entry.snapshot;
        let mut files_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for file in snapshot.files() {
            *files_by_kind.entry(file.kind.as_str().to_string()).or_default() += 1;
        }

        let (dependency_tree, vulnerabilities) = match (level, plugin) {
            (ScanLevel::Deep, Some(plugin)) => {
                let analyzer = plugin.dependency_analyzer();
                let tree = analyzer
                    .resolve_dependency_tree(&snapshot.root_path)
                    .await
                    .map_err(|e| warn!(project_id = %id, "Dependency tree failed: {}", e))
                    .ok();
                let vulnerabilities = analyzer
                    .find_vulnerabilities(&snapshot.root_path)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(project_id = %id, "Vulnerability check failed: {}", e);
                        Vec::new()
                    });
                (tree, vulnerabilities)
            }
            _ => (None, Vec::new()),
        };

        ScanSummary {
            project_id: id.clone(),
            name: snapshot.name.clone(),
            root_path: snapshot.root_path.clone(),
            language: snapshot.language,
            framework: snapshot.framework.clone(),
            plugin: entry.plugin.clone(),
            level,
            file_count: snapshot.file_count(),
            files_by_kind,
            total_size_bytes: snapshot.total_size_bytes(),
            total_complexity: snapshot.total_complexity(),
            targets: snapshot.targets.clone(),
            dependency_count: snapshot.dependency_graph.total_size,
            conflict_count: snapshot.dependency_graph.conflicts.len(),
            content_hash: snapshot.content_hash.clone(),
            captured_at: entry.captured_at,
            cached,
            dependency_tree,
            vulnerabilities,
        }
    }

    /// Valid snapshot and its plugin, or the response explaining why not
    fn resolve<T>(&self, path: &Path) -> std::result::Result<(ProjectId, CacheEntry, Arc<LanguagePlugin>), EngineResponse<T>> {
        let id = ProjectId::from_path(path);
        let lookup = self.cache.lookup(&id, Utc::now());
        record_cache_lookup(&lookup);
        let entry = match lookup {
            CacheLookup::Hit(entry) => entry.clone(),
            _ => return Err(EngineResponse::not_found(path, RESCAN_HINT)),
        };
        match self.registry.get(&entry.plugin) {
            Some(plugin) => Ok((id, entry, plugin)),
            None => {
                warn!(plugin = %entry.plugin, "Cached snapshot names an unregistered plugin");
                Err(EngineResponse::not_found(path, RESCAN_HINT))
            }
        }
    }

    fn check_limits<T>(&mut self, tokens: usize) -> std::result::Result<(), EngineResponse<T>> {
        self.ledger.check(tokens as u64).map_err(|e| {
            warn!("Token limit reached: {}", e);
            EngineResponse::LimitReached {
                message: e.to_string(),
            }
        })
    }

    /// Rank the snapshot's files for a task and load the selected ones
    async fn gather(
        &self,
        entry: &CacheEntry,
        plugin: &LanguagePlugin,
        task: &str,
        max_files: usize,
    ) -> (Vec<RelevanceScore>, Vec<ContextFile>) {
        let snapshot = &entry.snapshot;
        let ctx = ProjectContext::from_snapshot(snapshot);
        let paths: Vec<PathBuf> = snapshot.source_files.keys().cloned().collect();

        let started = Instant::now();
        let selected = plugin
            .scorer()
            .select_context_files(&paths, task, &ctx, Some(max_files));
        if let Some(m) = metrics::global() {
            m.scoring_duration.observe(started.elapsed().as_secs_f64());
        }

        let mut files = Vec::with_capacity(selected.len());
        for score in &selected {
            let Some(descriptor) = snapshot.file(&score.file_path) else {
                continue;
            };
            let absolute = snapshot.root_path.join(&descriptor.path);
            match tokio::fs::read_to_string(&absolute).await {
                Ok(content) => files.push(ContextFile::from_descriptor(descriptor, content).with_relevance(score.score)),
                Err(e) => warn!(path = %absolute.display(), "Skipping unreadable context file: {}", e),
            }
        }
        debug!(candidates = paths.len(), selected = files.len(), "context files gathered");
        (selected, files)
    }

    fn previous_tasks(&self) -> Vec<String> {
        self.recent_tasks.iter().cloned().collect()
    }

    async fn finish_request(&mut self, task: &str, tokens: usize) {
        self.ledger.record(tokens as u64);
        if self.config.optimizer.previous_tasks_limit > 0 {
            if self.recent_tasks.len() >= self.config.optimizer.previous_tasks_limit {
                self.recent_tasks.pop_front();
            }
            self.recent_tasks.push_back(task.to_string());
        }
        self.cache.persist(&self.ledger).await;
    }

    /// Relevant files for a task, optimized into `max_tokens`
    pub async fn get_context(
        &mut self,
        path: &Path,
        task: &str,
        max_tokens: usize,
        mode: ContextMode,
    ) -> Result<EngineResponse<ContextResponse>> {
        let (id, entry, plugin) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(response) => return Ok(response),
        };
        if let Err(response) = self.check_limits(max_tokens) {
            return Ok(response);
        }

        let max_files = mode.max_files(self.config.scoring.max_files);
        let (selected, files) = self.gather(&entry, &plugin, task, max_files).await;
        let constraints = OptimizationConstraints::new(max_tokens)
            .with_quality(mode.quality())
            .with_previous_tasks(self.previous_tasks());

        let result = self.optimizer.optimize_intelligently(&files, task, &constraints)?;
        self.finish_request(task, result.estimated_tokens).await;

        Ok(EngineResponse::Ready(ContextResponse {
            project_id: id,
            task: task.to_string(),
            mode,
            files: selected,
            result,
        }))
    }

    /// Compress the relevant files down to `target_tokens`
    pub async fn optimize(
        &mut self,
        path: &Path,
        task: &str,
        target_tokens: usize,
        mode: OptimizeMode,
    ) -> Result<EngineResponse<OptimizeResponse>> {
        if target_tokens == 0 {
            return Err(ContextError::Optimization {
                technique: "engine".to_string(),
                reason: "target token count must be positive".to_string(),
            });
        }
        let (id, entry, plugin) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(response) => return Ok(response),
        };
        if let Err(response) = self.check_limits(target_tokens) {
            return Ok(response);
        }

        let (_, files) = self.gather(&entry, &plugin, task, self.config.scoring.max_files).await;
        let original_tokens: usize = files
            .iter()
            .map(|f| self.optimizer.estimator().estimate(&f.content))
            .sum();

        let result = match mode {
            OptimizeMode::Intelligent => {
                let constraints =
                    OptimizationConstraints::new(target_tokens).with_previous_tasks(self.previous_tasks());
                self.optimizer.optimize_intelligently(&files, task, &constraints)?
            }
            OptimizeMode::RealTime => {
                self.optimizer
                    .optimize_real_time(&files, task, target_tokens, REALTIME_LIMIT_MS)?
            }
        };
        self.finish_request(task, result.estimated_tokens).await;

        let compression_ratio = if original_tokens == 0 {
            0.0
        } else {
            result.estimated_tokens as f64 / original_tokens as f64
        };
        Ok(EngineResponse::Ready(OptimizeResponse {
            project_id: id,
            mode,
            target_tokens,
            original_tokens,
            compression_ratio,
            result,
        }))
    }

    /// Dependency graph of a scanned project, optionally checked against registries
    pub async fn analyze_dependencies(
        &mut self,
        path: &Path,
        check_updates: bool,
    ) -> Result<EngineResponse<DependencyReport>> {
        let (id, entry, plugin) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(response) => return Ok(response),
        };
        let root = &entry.snapshot.root_path;
        let analyzer = plugin.dependency_analyzer();

        // Basic scans do not record dependencies
        let mut graph = if !entry.level.includes_dependencies() {
            analyzer.analyze_dependencies(root).await.unwrap_or_else(|e| {
                warn!(project_id = %id, "Dependency analysis failed: {}", e);
                DependencyGraph::default()
            })
        } else {
            entry.snapshot.dependency_graph.clone()
        };

        if check_updates {
            graph.outdated = analyzer.check_for_updates(root).await.unwrap_or_else(|e| {
                warn!(project_id = %id, "Update check failed: {}", e);
                Vec::new()
            });
        }
        let vulnerabilities = analyzer.find_vulnerabilities(root).await.unwrap_or_else(|e| {
            warn!(project_id = %id, "Vulnerability check failed: {}", e);
            Vec::new()
        });

        Ok(EngineResponse::Ready(DependencyReport {
            project_id: id,
            plugin: plugin.name().to_string(),
            graph,
            vulnerabilities,
            updates_checked: check_updates,
        }))
    }

    /// Search the project's documentation with its plugin's provider
    pub async fn search_documentation(
        &mut self,
        path: &Path,
        options: &DocSearchOptions,
    ) -> Result<EngineResponse<Vec<DocumentationResult>>> {
        let (_, entry, plugin) = match self.resolve(path) {
            Ok(resolved) => resolved,
            Err(response) => return Ok(response),
        };
        let results = match plugin.docs() {
            Some(docs) => docs.search(&entry.snapshot.root_path, options).await?,
            None => Vec::new(),
        };
        Ok(EngineResponse::Ready(results))
    }
}

fn record_scan(outcome: &str) {
    if let Some(m) = metrics::global() {
        m.record_scan(outcome);
    }
}

fn record_cache_lookup(lookup: &CacheLookup<'_>) {
    if let Some(m) = metrics::global() {
        m.record_cache_lookup(lookup.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::testing::stub_plugin;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.path = dir.path().join("cache.json");
        config.registry.enabled = false;
        config
    }

    #[test]
    fn test_context_modes() {
        assert_eq!(ContextMode::Focused.max_files(20), 5);
        assert_eq!(ContextMode::Focused.max_files(3), 3);
        assert_eq!(ContextMode::Balanced.max_files(20), 20);
        assert_eq!(ContextMode::Comprehensive.max_files(20), 40);
        assert!(ContextMode::Comprehensive.quality() > ContextMode::Focused.quality());
    }

    #[test]
    fn test_response_serialization() {
        let response: EngineResponse<Vec<u32>> = EngineResponse::not_found(Path::new("/p"), RESCAN_HINT);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["data"]["project_path"], "/p");

        let ready: EngineResponse<Vec<u32>> = EngineResponse::Ready(vec![1]);
        assert_eq!(serde_json::to_value(&ready).unwrap()["data"], serde_json::json!([1]));
    }

    #[tokio::test]
    async fn test_missing_path_is_not_found() {
        let state = TempDir::new().unwrap();
        let mut engine = ContextEngine::with_registry(config(&state), PluginRegistry::new()).await;
        let response = engine
            .scan(Path::new("/no/such/project"), ScanLevel::Standard, false)
            .await
            .unwrap();
        assert!(matches!(response, EngineResponse::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_scan_without_plugin_fails() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();
        let mut engine = ContextEngine::with_registry(config(&state), registry).await;

        let err = engine.scan(project.path(), ScanLevel::Basic, false).await.unwrap_err();
        assert!(matches!(err, ContextError::NoApplicablePlugin { .. }));
    }

    #[tokio::test]
    async fn test_context_requires_scan() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let mut engine = ContextEngine::with_registry(config(&state), PluginRegistry::new()).await;

        let response = engine
            .get_context(project.path(), "fix login", 1000, ContextMode::Balanced)
            .await
            .unwrap();
        assert!(matches!(response, EngineResponse::NotFound { .. }));
        assert_eq!(engine.token_usage().total_used(), 0);
    }

    #[tokio::test]
    async fn test_limit_reached_response() {
        let state = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("package.json"), "{}").unwrap();

        let mut cfg = config(&state);
        cfg.limits.daily_tokens = 100;
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();
        let mut engine = ContextEngine::with_registry(cfg, registry).await;

        assert!(engine.scan(project.path(), ScanLevel::Basic, false).await.unwrap().is_ready());
        let response = engine
            .optimize(project.path(), "shrink", 500, OptimizeMode::RealTime)
            .await
            .unwrap();
        match response {
            EngineResponse::LimitReached { message } => assert!(message.contains("daily")),
            other => panic!("expected limit response, got {:?}", other.is_ready()),
        }
    }

    #[tokio::test]
    async fn test_zero_target_is_an_error() {
        let state = TempDir::new().unwrap();
        let mut engine = ContextEngine::with_registry(config(&state), PluginRegistry::new()).await;
        let err = engine
            .optimize(state.path(), "task", 0, OptimizeMode::Intelligent)
            .await
            .unwrap_err();
        assert!(matches!(err, ContextError::Optimization { .. }));
    }
}
