//! Data models for parsed projects

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Languages understood by the built-in plugins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    JavaScript,
    TypeScript,
    Python,
    Swift,
    Rust,
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Python => "python",
            Language::Swift => "swift",
            Language::Rust => "rust",
            Language::Unknown => "unknown",
        }
    }

    /// Guess the language from a file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Language::JavaScript,
            "ts" | "tsx" | "mts" | "cts" => Language::TypeScript,
            "py" | "pyi" => Language::Python,
            "swift" => Language::Swift,
            "rs" => Language::Rust,
            _ => Language::Unknown,
        }
    }

    /// JavaScript and TypeScript share tooling and are scored as one family
    pub fn same_family(&self, other: Language) -> bool {
        let family = |l: Language| match l {
            Language::TypeScript => Language::JavaScript,
            other => other,
        };
        family(*self) == family(other)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a file plays in the project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Source,
    Test,
    Config,
    Module,
    Documentation,
    Other,
}

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt", "adoc"];
const CONFIG_EXTENSIONS: &[&str] = &[
    "json", "toml", "yaml", "yml", "ini", "cfg", "conf", "lock", "plist", "resolved", "xcconfig",
];
const CONFIG_NAMES: &[&str] = &[
    "package.swift",
    "setup.py",
    "makefile",
    "dockerfile",
    "pipfile",
    "gemfile",
    ".gitignore",
    ".editorconfig",
];
const MODULE_NAMES: &[&str] = &["__init__.py", "mod.rs", "lib.rs", "index.js", "index.ts", "index.jsx", "index.tsx", "index.mjs"];
const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs"];

impl FileKind {
    /// Classify a project-relative path by naming conventions
    pub fn classify(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower_name = name.to_lowercase();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower_stem = stem.to_lowercase();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if DOC_EXTENSIONS.contains(&ext.as_str()) {
            return FileKind::Documentation;
        }
        if CONFIG_EXTENSIONS.contains(&ext.as_str())
            || CONFIG_NAMES.contains(&lower_name.as_str())
            || lower_name.contains(".config.")
            || lower_name.starts_with(".eslintrc")
            || lower_name.starts_with(".prettierrc")
        {
            return FileKind::Config;
        }

        let in_test_dir = path.parent().is_some_and(|parent| {
            parent.components().any(|c| {
                let part = c.as_os_str().to_string_lossy().to_lowercase();
                TEST_DIRS.contains(&part.as_str())
            })
        });
        let test_name = lower_stem.starts_with("test_")
            || lower_stem.ends_with("_test")
            || lower_stem.ends_with("_spec")
            || lower_stem.ends_with(".test")
            || lower_stem.ends_with(".spec")
            || stem.ends_with("Tests")
            || stem.ends_with("Test")
            || lower_stem == "conftest";
        if in_test_dir || test_name {
            return FileKind::Test;
        }

        if MODULE_NAMES.contains(&lower_name.as_str()) {
            return FileKind::Module;
        }
        if Language::from_extension(&ext) != Language::Unknown {
            return FileKind::Source;
        }
        FileKind::Other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Source => "source",
            FileKind::Test => "test",
            FileKind::Config => "config",
            FileKind::Module => "module",
            FileKind::Documentation => "documentation",
            FileKind::Other => "other",
        }
    }
}

/// Metadata about a single project file, immutable within a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFileDescriptor {
    /// Path relative to the project root
    pub path: PathBuf,
    pub language: Language,
    pub kind: FileKind,
    pub size_bytes: u64,
    /// Heuristic cyclomatic count
    pub complexity: u32,
    /// Imported modules in source order
    pub dependencies: Vec<String>,
    pub exports: BTreeSet<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub functions: Vec<String>,
    pub last_modified: DateTime<Utc>,
}

impl SourceFileDescriptor {
    /// Minimal descriptor for a path with no parsed metadata
    pub fn bare(path: impl Into<PathBuf>, language: Language, kind: FileKind) -> Self {
        Self {
            path: path.into(),
            language,
            kind,
            size_bytes: 0,
            complexity: 0,
            dependencies: Vec::new(),
            exports: BTreeSet::new(),
            classes: Vec::new(),
            functions: Vec::new(),
            last_modified: DateTime::<Utc>::default(),
        }
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path with forward slashes, lowercased, for keyword matching
    pub fn normalized_path(&self) -> String {
        normalize_for_matching(&self.path)
    }
}

pub(crate) fn normalize_for_matching(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// Build or executable unit declared by the project manifest
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuildTarget {
    pub name: String,
    pub kind: String,
}

/// Raw output of a project parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStructure {
    pub name: String,
    pub root_path: PathBuf,
    pub language: Language,
    pub framework: Option<String>,
    pub targets: Vec<BuildTarget>,
    pub source_files: Vec<SourceFileDescriptor>,
}

/// A package declared in more than one manifest section with differing requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConflict {
    pub name: String,
    pub requirements: Vec<String>,
}

/// A declared package whose registry release is newer than the declared requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutdatedDependency {
    pub name: String,
    pub current: String,
    pub latest: String,
}

/// Declared dependencies of a project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub optional_dependencies: BTreeMap<String, String>,
    pub conflicts: Vec<DependencyConflict>,
    /// Number of declared packages across all sections
    pub total_size: usize,
    pub outdated: Vec<OutdatedDependency>,
}

impl DependencyGraph {
    /// All declared packages with their section name
    pub fn iter_all(&self) -> impl Iterator<Item = (&str, &String, &String)> {
        self.dependencies
            .iter()
            .map(|(n, v)| ("dependencies", n, v))
            .chain(self.dev_dependencies.iter().map(|(n, v)| ("dev", n, v)))
            .chain(
                self.optional_dependencies
                    .iter()
                    .map(|(n, v)| ("optional", n, v)),
            )
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }
}

/// How much work a scan performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanLevel {
    /// Structure only
    Basic,
    /// Structure plus dependency graph
    #[default]
    Standard,
    /// Standard plus dependency tree and advisories
    Deep,
}

impl ScanLevel {
    pub fn includes_dependencies(&self) -> bool {
        !matches!(self, ScanLevel::Basic)
    }
}

/// Parsed representation of a project captured at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub name: String,
    pub root_path: PathBuf,
    pub language: Language,
    pub framework: Option<String>,
    pub targets: Vec<BuildTarget>,
    pub source_files: BTreeMap<PathBuf, SourceFileDescriptor>,
    pub dependency_graph: DependencyGraph,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
}

impl ProjectSnapshot {
    /// Assemble a snapshot from parser and analyzer output
    pub fn new(
        structure: ProjectStructure,
        dependency_graph: DependencyGraph,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let source_files = structure
            .source_files
            .into_iter()
            .map(|f| (f.path.clone(), f))
            .collect();

        let mut snapshot = Self {
            name: structure.name,
            root_path: structure.root_path,
            language: structure.language,
            framework: structure.framework,
            targets: structure.targets,
            source_files,
            dependency_graph,
            content_hash: String::new(),
            captured_at,
        };
        snapshot.content_hash = super::identity::content_hash(&snapshot);
        snapshot
    }

    pub fn file(&self, path: &Path) -> Option<&SourceFileDescriptor> {
        self.source_files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFileDescriptor> {
        self.source_files.values()
    }

    pub fn file_count(&self) -> usize {
        self.source_files.len()
    }

    pub fn total_complexity(&self) -> u64 {
        self.files().map(|f| f.complexity as u64).sum()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.files().map(|f| f.size_bytes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure() -> ProjectStructure {
        ProjectStructure {
            name: "demo".to_string(),
            root_path: PathBuf::from("/work/demo"),
            language: Language::Python,
            framework: Some("django".to_string()),
            targets: vec![],
            source_files: vec![
                SourceFileDescriptor::bare("app/views.py", Language::Python, FileKind::Source),
                SourceFileDescriptor::bare("tests/test_views.py", Language::Python, FileKind::Test),
            ],
        }
    }

    #[test]
    fn test_language_from_extension() {
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("PY"), Language::Python);
        assert_eq!(Language::from_extension("md"), Language::Unknown);
    }

    #[test]
    fn test_classify_file_kinds() {
        assert_eq!(FileKind::classify(Path::new("src/auth.js")), FileKind::Source);
        assert_eq!(FileKind::classify(Path::new("src/auth.test.js")), FileKind::Test);
        assert_eq!(FileKind::classify(Path::new("tests/helpers.py")), FileKind::Test);
        assert_eq!(FileKind::classify(Path::new("Tests/AppTests.swift")), FileKind::Test);
        assert_eq!(FileKind::classify(Path::new("pkg/__init__.py")), FileKind::Module);
        assert_eq!(FileKind::classify(Path::new("package.json")), FileKind::Config);
        assert_eq!(FileKind::classify(Path::new("webpack.config.js")), FileKind::Config);
        assert_eq!(FileKind::classify(Path::new("docs/guide.md")), FileKind::Documentation);
        assert_eq!(FileKind::classify(Path::new("assets/logo.png")), FileKind::Other);
        // "latest" must not be mistaken for a test file
        assert_eq!(FileKind::classify(Path::new("src/latest.js")), FileKind::Source);
    }

    #[test]
    fn test_language_family() {
        assert!(Language::TypeScript.same_family(Language::JavaScript));
        assert!(!Language::Python.same_family(Language::JavaScript));
    }

    #[test]
    fn test_snapshot_keys_files_by_path() {
        let snapshot = ProjectSnapshot::new(structure(), DependencyGraph::default(), Utc::now());
        assert_eq!(snapshot.file_count(), 2);
        assert!(snapshot.file(Path::new("app/views.py")).is_some());
        assert!(!snapshot.content_hash.is_empty());
    }

    #[test]
    fn test_snapshot_hash_ignores_capture_time() {
        let a = ProjectSnapshot::new(structure(), DependencyGraph::default(), Utc::now());
        let b = ProjectSnapshot::new(
            structure(),
            DependencyGraph::default(),
            Utc::now() + chrono::Duration::hours(3),
        );
        assert_eq!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_snapshot_hash_tracks_content() {
        let a = ProjectSnapshot::new(structure(), DependencyGraph::default(), Utc::now());
        let mut changed = structure();
        changed.source_files[0].complexity = 12;
        let b = ProjectSnapshot::new(changed, DependencyGraph::default(), Utc::now());
        assert_ne!(a.content_hash, b.content_hash);
    }
}
