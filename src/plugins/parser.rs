//! Regex-driven project parser
//!
//! Extraction is line-pattern based, not a real grammar: it finds imports,
//! type and function declarations, and exported names well enough to rank
//! files and build outlines.

use super::ProjectParser;
use crate::config::ScanConfig;
use crate::error::{ContextError, Result};
use crate::project::{BuildTarget, FileKind, Language, ProjectStructure, SourceFileDescriptor};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use glob::Pattern;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name and targets read from a project manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestInfo {
    pub name: Option<String>,
    pub targets: Vec<BuildTarget>,
}

/// A framework recognised by a manifest entry or an import
#[derive(Debug, Clone, Copy)]
pub struct FrameworkMarker {
    pub framework: &'static str,
    /// Substring searched in manifest text
    pub manifest: &'static str,
    /// Import name (or prefix followed by a separator)
    pub import: &'static str,
}

/// Per-language extraction patterns, compiled by [`HeuristicParser::new`].
///
/// Every pattern's first capture group is the extracted name.
#[derive(Clone, Copy)]
pub struct SyntaxRules {
    pub language: Language,
    pub extensions: &'static [&'static str],
    pub imports: &'static [&'static str],
    pub classes: &'static [&'static str],
    pub functions: &'static [&'static str],
    pub exports: &'static [&'static str],
    /// Each match adds one to a file's complexity
    pub branches: &'static str,
    pub frameworks: &'static [FrameworkMarker],
    /// Manifest files in preference order
    pub manifests: &'static [&'static str],
    pub read_manifest: fn(file_name: &str, text: &str) -> ManifestInfo,
}

struct CompiledRules {
    imports: Vec<Regex>,
    classes: Vec<Regex>,
    functions: Vec<Regex>,
    exports: Vec<Regex>,
    branches: Regex,
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| ContextError::Configuration(format!("invalid pattern {}: {}", p, e))))
        .collect()
}

/// Symbols extracted from one file's text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub imports: Vec<String>,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub exports: BTreeSet<String>,
    pub complexity: u32,
}

pub struct HeuristicParser {
    rules: SyntaxRules,
    compiled: CompiledRules,
    scan: ScanConfig,
    ignore: Vec<Pattern>,
}

impl HeuristicParser {
    pub fn new(rules: SyntaxRules, scan: ScanConfig) -> Result<Self> {
        let compiled = CompiledRules {
            imports: compile(rules.imports)?,
            classes: compile(rules.classes)?,
            functions: compile(rules.functions)?,
            exports: compile(rules.exports)?,
            branches: Regex::new(rules.branches)
                .map_err(|e| ContextError::Configuration(format!("invalid branch pattern: {}", e)))?,
        };

        let ignore = scan
            .ignore
            .iter()
            .filter_map(|g| match Pattern::new(g) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("Ignoring invalid scan.ignore glob {}: {}", g, e);
                    None
                }
            })
            .collect();

        Ok(Self {
            rules,
            compiled,
            scan,
            ignore,
        })
    }

    pub fn rules(&self) -> &SyntaxRules {
        &self.rules
    }

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                self.rules.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
            })
            .unwrap_or(false)
    }

    /// Extract symbols from text written in this parser's language
    pub fn extract(&self, content: &str) -> Extracted {
        let collect = |patterns: &[Regex]| {
            let mut names: Vec<String> = Vec::new();
            for pattern in patterns {
                for caps in pattern.captures_iter(content) {
                    if let Some(m) = caps.get(1) {
                        let name = m.as_str().to_string();
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
            }
            names
        };

        Extracted {
            imports: collect(&self.compiled.imports),
            classes: collect(&self.compiled.classes),
            functions: collect(&self.compiled.functions),
            exports: collect(&self.compiled.exports).into_iter().collect(),
            complexity: 1 + self.compiled.branches.find_iter(content).count() as u32,
        }
    }

    fn is_ignored(&self, relative: &Path, is_dir: bool) -> bool {
        let mut probe = Path::new(".").join(relative);
        if is_dir {
            probe.push("_");
        }
        self.ignore.iter().any(|p| p.matches_path(&probe))
    }

    /// Walk the tree and return relative paths of candidate files
    fn candidate_paths(&self, root: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let walker = WalkDir::new(root).follow_links(false).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            !self.is_ignored(relative, entry.file_type().is_dir())
        });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %root.display(), "Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };
            if FileKind::classify(&relative) == FileKind::Other && !self.handles(&relative) {
                continue;
            }
            paths.push(relative);
        }
        paths.sort();
        paths
    }

    async fn describe(&self, root: &Path, relative: PathBuf) -> Option<SourceFileDescriptor> {
        let absolute = root.join(&relative);
        let metadata = match tokio::fs::metadata(&absolute).await {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %absolute.display(), "Skipping unreadable file: {}", e);
                return None;
            }
        };

        let language = relative
            .extension()
            .map(|e| Language::from_extension(&e.to_string_lossy()))
            .unwrap_or(Language::Unknown);
        let mut descriptor = SourceFileDescriptor::bare(relative.clone(), language, FileKind::classify(&relative));
        descriptor.size_bytes = metadata.len();
        if let Ok(modified) = metadata.modified() {
            descriptor.last_modified = DateTime::<Utc>::from(modified);
        }

        if !self.handles(&relative) {
            return Some(descriptor);
        }
        if metadata.len() > self.scan.max_file_bytes {
            debug!(path = %relative.display(), size = metadata.len(), "File too large to parse");
            return Some(descriptor);
        }

        match tokio::fs::read_to_string(&absolute).await {
            Ok(content) => {
                let extracted = self.extract(&content);
                descriptor.dependencies = extracted.imports;
                descriptor.classes = extracted.classes;
                descriptor.functions = extracted.functions;
                descriptor.exports = extracted.exports;
                descriptor.complexity = extracted.complexity;
                Some(descriptor)
            }
            Err(e) => {
                warn!(path = %absolute.display(), "Skipping unreadable file: {}", e);
                None
            }
        }
    }

    async fn read_manifests(&self, root: &Path) -> (ManifestInfo, String) {
        let mut info = ManifestInfo::default();
        let mut combined = String::new();
        for manifest in self.rules.manifests {
            if let Ok(text) = tokio::fs::read_to_string(root.join(manifest)).await {
                let parsed = (self.rules.read_manifest)(manifest, &text);
                if info.name.is_none() {
                    info.name = parsed.name;
                }
                if info.targets.is_empty() {
                    info.targets = parsed.targets;
                }
                combined.push_str(&text);
                combined.push('\n');
            }
        }
        (info, combined)
    }

    fn detect_framework(&self, manifest_text: &str, files: &[SourceFileDescriptor]) -> Option<String> {
        let imported = |marker: &str| {
            files.iter().flat_map(|f| f.dependencies.iter()).any(|dep| {
                dep == marker
                    || dep
                        .strip_prefix(marker)
                        .is_some_and(|rest| rest.starts_with('.') || rest.starts_with('/') || rest.starts_with("::"))
            })
        };
        let manifest_text = manifest_text.to_lowercase();
        self.rules
            .frameworks
            .iter()
            .find(|m| {
                (!m.manifest.is_empty() && manifest_text.contains(&m.manifest.to_lowercase()))
                    || imported(m.import)
            })
            .map(|m| m.framework.to_string())
    }
}

#[async_trait]
impl ProjectParser for HeuristicParser {
    async fn parse_project(&self, root: &Path) -> Result<ProjectStructure> {
        let source_files = self.get_source_files(root).await?;
        let (manifest, manifest_text) = self.read_manifests(root).await;
        let framework = self.detect_framework(&manifest_text, &source_files);

        let name = manifest.name.unwrap_or_else(|| {
            root.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        });

        debug!(
            project = %name,
            files = source_files.len(),
            framework = framework.as_deref().unwrap_or("none"),
            "project parsed"
        );

        Ok(ProjectStructure {
            name,
            root_path: root.to_path_buf(),
            language: self.rules.language,
            framework,
            targets: manifest.targets,
            source_files,
        })
    }

    async fn get_source_files(&self, root: &Path) -> Result<Vec<SourceFileDescriptor>> {
        let candidates = self.candidate_paths(root);
        let descriptors: Vec<SourceFileDescriptor> = stream::iter(candidates)
            .map(|relative| self.describe(root, relative))
            .buffered(self.scan.read_concurrency.max(1))
            .filter_map(|d| async move { d })
            .collect()
            .await;
        Ok(descriptors)
    }

    async fn analyze_complexity(&self, file: &Path) -> Result<u32> {
        if !self.handles(file) {
            return Ok(0);
        }
        match tokio::fs::read_to_string(file).await {
            Ok(content) => Ok(self.extract(&content).complexity),
            Err(e) => {
                warn!(path = %file.display(), "Cannot read file for complexity: {}", e);
                Ok(0)
            }
        }
    }

    async fn extract_metadata(&self, file: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut metadata = BTreeMap::new();
        let language = file
            .extension()
            .map(|e| Language::from_extension(&e.to_string_lossy()))
            .unwrap_or(Language::Unknown);
        metadata.insert("language".to_string(), serde_json::json!(language));
        metadata.insert("kind".to_string(), serde_json::json!(FileKind::classify(file)));

        let content = match tokio::fs::read_to_string(file).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %file.display(), "Cannot read file for metadata: {}", e);
                return Ok(metadata);
            }
        };
        metadata.insert("size_bytes".to_string(), serde_json::json!(content.len()));
        metadata.insert("lines".to_string(), serde_json::json!(content.lines().count()));

        if self.handles(file) {
            let extracted = self.extract(&content);
            metadata.insert("imports".to_string(), serde_json::json!(extracted.imports));
            metadata.insert("classes".to_string(), serde_json::json!(extracted.classes));
            metadata.insert("functions".to_string(), serde_json::json!(extracted.functions));
            metadata.insert("exports".to_string(), serde_json::json!(extracted.exports));
            metadata.insert("complexity".to_string(), serde_json::json!(extracted.complexity));
        }
        Ok(metadata)
    }
}
