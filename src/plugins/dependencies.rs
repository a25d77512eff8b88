//! Manifest-based dependency analysis
//!
//! Reads the package manifests of one ecosystem, pins versions from a
//! lockfile when one exists, asks a package registry for newer releases, and
//! matches declared versions against a small built-in advisory table.

use super::DependencyAnalyzer;
use crate::config::RegistryConfig;
use crate::error::{ContextError, Result};
use crate::project::{DependencyConflict, DependencyGraph, OutdatedDependency};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

static VERSION: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)*").ok());
static REQUIREMENT_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*([^;]*)").ok()
});
static SWIFT_PACKAGE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"\.package\(\s*(?:name:\s*"[^"]*"\s*,\s*)?url:\s*"([^"]+)"\s*,\s*([^\n]*)"#).ok()
});
static QUOTED: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r#""([^"]+)""#).ok());

/// Package ecosystem a plugin's manifests belong to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    PyPI,
    Crates,
    SwiftPM,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "pypi",
            Ecosystem::Crates => "crates",
            Ecosystem::SwiftPM => "swiftpm",
        }
    }

    fn normalize_name(&self, name: &str) -> String {
        match self {
            Ecosystem::PyPI => name.to_lowercase().replace('_', "-"),
            _ => name.to_string(),
        }
    }
}

/// A declared package matched by an advisory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub package: String,
    pub installed: String,
    pub advisory_id: String,
    pub severity: String,
    pub summary: String,
    pub fixed_in: String,
}

/// A direct dependency with its lockfile version, when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub name: String,
    pub requirement: String,
    pub resolved: Option<String>,
    pub section: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTree {
    /// Lockfile the versions were pinned from
    pub lockfile: Option<String>,
    pub dependencies: Vec<ResolvedDependency>,
}

/// Looks up the newest published version of a package
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// `None` when the registry does not know the package
    async fn latest_version(&self, ecosystem: Ecosystem, package: &str) -> Result<Option<String>>;
}

/// Registry client for npm, PyPI and crates.io
pub struct HttpRegistryClient {
    http: Client,
    config: RegistryConfig,
}

impl HttpRegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("context-optimizer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ContextError::Registry(e.to_string()))?;
        Ok(Self { http, config })
    }

    async fn fetch_json(&self, url: &str) -> Result<Option<serde_json::Value>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ContextError::Registry(format!("request to {} failed: {}", url, e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ContextError::Registry(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ContextError::Registry(format!("invalid response from {}: {}", url, e)))?;
        Ok(Some(body))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn latest_version(&self, ecosystem: Ecosystem, package: &str) -> Result<Option<String>> {
        let (url, pointer) = match ecosystem {
            Ecosystem::Npm => (
                format!(
                    "{}/{}/latest",
                    self.config.npm_url.trim_end_matches('/'),
                    package.replace('/', "%2F")
                ),
                vec!["/version"],
            ),
            Ecosystem::PyPI => (
                format!("{}/{}/json", self.config.pypi_url.trim_end_matches('/'), package),
                vec!["/info/version"],
            ),
            Ecosystem::Crates => (
                format!("{}/{}", self.config.crates_url.trim_end_matches('/'), package),
                vec!["/crate/max_stable_version", "/crate/max_version"],
            ),
            Ecosystem::SwiftPM => return Ok(None),
        };

        let body = match self.fetch_json(&url).await? {
            Some(body) => body,
            None => return Ok(None),
        };
        Ok(pointer
            .iter()
            .find_map(|p| body.pointer(p).and_then(|v| v.as_str()))
            .map(str::to_string))
    }
}

struct Advisory {
    ecosystem: Ecosystem,
    package: &'static str,
    fixed_in: &'static str,
    id: &'static str,
    severity: &'static str,
    summary: &'static str,
}

const ADVISORIES: &[Advisory] = &[
    Advisory {
        ecosystem: Ecosystem::Npm,
        package: "lodash",
        fixed_in: "4.17.21",
        id: "CVE-2021-23337",
        severity: "high",
        summary: "Command injection via template",
    },
    Advisory {
        ecosystem: Ecosystem::Npm,
        package: "minimist",
        fixed_in: "1.2.6",
        id: "CVE-2021-44906",
        severity: "critical",
        summary: "Prototype pollution",
    },
    Advisory {
        ecosystem: Ecosystem::Npm,
        package: "axios",
        fixed_in: "0.21.1",
        id: "CVE-2020-28168",
        severity: "medium",
        summary: "Server-side request forgery through redirects",
    },
    Advisory {
        ecosystem: Ecosystem::Npm,
        package: "node-fetch",
        fixed_in: "2.6.7",
        id: "CVE-2022-0235",
        severity: "high",
        summary: "Credentials forwarded to third-party hosts on redirect",
    },
    Advisory {
        ecosystem: Ecosystem::PyPI,
        package: "django",
        fixed_in: "3.2.14",
        id: "CVE-2022-34265",
        severity: "critical",
        summary: "SQL injection in Trunc and Extract",
    },
    Advisory {
        ecosystem: Ecosystem::PyPI,
        package: "requests",
        fixed_in: "2.31.0",
        id: "CVE-2023-32681",
        severity: "medium",
        summary: "Proxy-Authorization header leaked on redirect",
    },
    Advisory {
        ecosystem: Ecosystem::PyPI,
        package: "pyyaml",
        fixed_in: "5.4",
        id: "CVE-2020-14343",
        severity: "critical",
        summary: "Arbitrary code execution in full_load",
    },
    Advisory {
        ecosystem: Ecosystem::PyPI,
        package: "jinja2",
        fixed_in: "2.11.3",
        id: "CVE-2020-28493",
        severity: "medium",
        summary: "Regular expression denial of service in urlize",
    },
    Advisory {
        ecosystem: Ecosystem::Crates,
        package: "hyper",
        fixed_in: "0.14.10",
        id: "CVE-2021-32714",
        severity: "high",
        summary: "Integer overflow in chunked transfer decoding",
    },
    Advisory {
        ecosystem: Ecosystem::Crates,
        package: "smallvec",
        fixed_in: "1.6.1",
        id: "CVE-2021-25900",
        severity: "high",
        summary: "Buffer overflow in insert_many",
    },
    Advisory {
        ecosystem: Ecosystem::Crates,
        package: "time",
        fixed_in: "0.2.23",
        id: "CVE-2020-26235",
        severity: "medium",
        summary: "Segfault through localtime_r on Unix",
    },
];

/// First dotted number in a requirement, e.g. `4.17.0` from `^4.17.0`
pub fn extract_version(requirement: &str) -> Option<String> {
    VERSION
        .as_ref()?
        .find(requirement)
        .map(|m| m.as_str().to_string())
}

/// Compare dotted versions numerically; missing components count as zero
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        extract_version(v)
            .map(|v| v.split('.').filter_map(|p| p.parse().ok()).collect())
            .unwrap_or_default()
    };
    let (left, right) = (parse(a), parse(b));
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Section {
    Runtime,
    Dev,
    Optional,
}

#[derive(Debug, Clone)]
struct Declaration {
    section: Section,
    name: String,
    requirement: String,
}

fn declare(out: &mut Vec<Declaration>, section: Section, name: &str, requirement: &str) {
    let requirement = requirement.trim();
    out.push(Declaration {
        section,
        name: name.trim().to_string(),
        requirement: if requirement.is_empty() {
            "*".to_string()
        } else {
            requirement.to_string()
        },
    });
}

fn build_graph(ecosystem: Ecosystem, declarations: Vec<Declaration>) -> DependencyGraph {
    let mut graph = DependencyGraph::default();
    let mut by_name: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut sections: BTreeMap<String, BTreeSet<Section>> = BTreeMap::new();

    for decl in declarations {
        let name = ecosystem.normalize_name(&decl.name);
        let requirements = by_name.entry(name.clone()).or_default();
        if !requirements.contains(&decl.requirement) {
            requirements.push(decl.requirement.clone());
        }
        sections.entry(name.clone()).or_default().insert(decl.section);

        let section = match decl.section {
            Section::Runtime => &mut graph.dependencies,
            Section::Dev => &mut graph.dev_dependencies,
            Section::Optional => &mut graph.optional_dependencies,
        };
        section.entry(name).or_insert(decl.requirement);
    }

    // Only cross-section disagreements count; repeats within one section keep the first
    graph.conflicts = by_name
        .into_iter()
        .filter(|(name, requirements)| {
            requirements.len() > 1 && sections.get(name).is_some_and(|s| s.len() > 1)
        })
        .map(|(name, requirements)| DependencyConflict { name, requirements })
        .collect();
    graph.total_size =
        graph.dependencies.len() + graph.dev_dependencies.len() + graph.optional_dependencies.len();
    graph
}

fn parse_package_json(text: &str) -> Result<Vec<Declaration>> {
    let manifest: serde_json::Value = serde_json::from_str(text)?;
    let mut out = Vec::new();
    for (key, section) in [
        ("dependencies", Section::Runtime),
        ("devDependencies", Section::Dev),
        ("optionalDependencies", Section::Optional),
        ("peerDependencies", Section::Optional),
    ] {
        if let Some(table) = manifest.get(key).and_then(|v| v.as_object()) {
            for (name, requirement) in table {
                declare(&mut out, section, name, requirement.as_str().unwrap_or("*"));
            }
        }
    }
    Ok(out)
}

fn parse_requirement_line(line: &str) -> Option<(String, String)> {
    let line = line.split(" #").next().unwrap_or("").trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('-') || line.contains("://") {
        return None;
    }
    let caps = REQUIREMENT_LINE.as_ref()?.captures(line)?;
    let name = caps.get(1)?.as_str().to_string();
    let spec = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
    Some((name, spec))
}

fn parse_requirements(text: &str, section: Section) -> Vec<Declaration> {
    let mut out = Vec::new();
    for line in text.lines() {
        if let Some((name, spec)) = parse_requirement_line(line) {
            declare(&mut out, section, &name, &spec);
        }
    }
    out
}

fn toml_requirement(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) => {
            if let Some(v) = t.get("version").and_then(|v| v.as_str()) {
                v.to_string()
            } else if let Some(p) = t.get("path").and_then(|v| v.as_str()) {
                format!("path:{}", p)
            } else if let Some(g) = t.get("git").and_then(|v| v.as_str()) {
                format!("git:{}", g)
            } else {
                "*".to_string()
            }
        }
        _ => "*".to_string(),
    }
}

fn is_optional(value: &toml::Value) -> bool {
    value
        .get("optional")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

fn parse_pyproject(text: &str) -> Result<Vec<Declaration>> {
    let doc: toml::Value = toml::from_str(text)
        .map_err(|e| ContextError::Internal(format!("invalid pyproject.toml: {}", e)))?;
    let mut out = Vec::new();

    let pep508 = |out: &mut Vec<Declaration>, items: Option<&toml::Value>, section: Section| {
        for item in items.and_then(|v| v.as_array()).into_iter().flatten() {
            if let Some((name, spec)) = item.as_str().and_then(parse_requirement_line) {
                declare(out, section, &name, &spec);
            }
        }
    };

    if let Some(project) = doc.get("project") {
        pep508(&mut out, project.get("dependencies"), Section::Runtime);
        if let Some(groups) = project.get("optional-dependencies").and_then(|v| v.as_table()) {
            for items in groups.values() {
                pep508(&mut out, Some(items), Section::Optional);
            }
        }
    }

    if let Some(poetry) = doc.get("tool").and_then(|t| t.get("poetry")) {
        let mut poetry_table = |table: Option<&toml::Value>, section: Section| {
            for (name, value) in table.and_then(|v| v.as_table()).into_iter().flatten() {
                if name == "python" {
                    continue;
                }
                let section = if is_optional(value) { Section::Optional } else { section };
                declare(&mut out, section, name, &toml_requirement(value));
            }
        };
        poetry_table(poetry.get("dependencies"), Section::Runtime);
        poetry_table(poetry.get("dev-dependencies"), Section::Dev);
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                poetry_table(group.get("dependencies"), Section::Dev);
            }
        }
    }
    Ok(out)
}

fn parse_cargo_toml(text: &str) -> Result<Vec<Declaration>> {
    let doc: toml::Value = toml::from_str(text)
        .map_err(|e| ContextError::Internal(format!("invalid Cargo.toml: {}", e)))?;
    let mut out = Vec::new();

    let mut read = |table: Option<&toml::Value>, section: Section| {
        for (name, value) in table.and_then(|v| v.as_table()).into_iter().flatten() {
            let section = if is_optional(value) { Section::Optional } else { section };
            declare(&mut out, section, name, &toml_requirement(value));
        }
    };

    read(doc.get("dependencies"), Section::Runtime);
    read(doc.get("dev-dependencies"), Section::Dev);
    read(doc.get("build-dependencies"), Section::Dev);
    if let Some(targets) = doc.get("target").and_then(|t| t.as_table()) {
        for target in targets.values() {
            read(target.get("dependencies"), Section::Runtime);
            read(target.get("dev-dependencies"), Section::Dev);
        }
    }
    Ok(out)
}

fn parse_package_swift(text: &str) -> Vec<Declaration> {
    let (Some(package), Some(quoted)) = (SWIFT_PACKAGE.as_ref(), QUOTED.as_ref()) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for caps in package.captures_iter(text) {
        let Some(url) = caps.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .trim_end_matches(".git");
        let rest = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let version = quoted
            .captures(rest)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let requirement = if rest.trim_start().starts_with("branch:") {
            format!("branch:{}", version)
        } else {
            version
        };
        declare(&mut out, Section::Runtime, name, &requirement);
    }
    out
}

fn parse_lockfile(ecosystem: Ecosystem, text: &str) -> Result<BTreeMap<String, String>> {
    let mut pinned = BTreeMap::new();
    match ecosystem {
        Ecosystem::Npm => {
            let lock: serde_json::Value = serde_json::from_str(text)?;
            if let Some(packages) = lock.get("packages").and_then(|p| p.as_object()) {
                for (key, entry) in packages {
                    let Some(name) = key.rsplit("node_modules/").next().filter(|_| key.contains("node_modules/")) else {
                        continue;
                    };
                    let Some(version) = entry.get("version").and_then(|v| v.as_str()) else {
                        continue;
                    };
                    // Top-level installs win over nested copies
                    if key.matches("node_modules/").count() == 1 {
                        pinned.insert(name.to_string(), version.to_string());
                    } else {
                        pinned.entry(name.to_string()).or_insert_with(|| version.to_string());
                    }
                }
            } else if let Some(deps) = lock.get("dependencies").and_then(|d| d.as_object()) {
                for (name, entry) in deps {
                    if let Some(version) = entry.get("version").and_then(|v| v.as_str()) {
                        pinned.insert(name.clone(), version.to_string());
                    }
                }
            }
        }
        Ecosystem::Crates | Ecosystem::PyPI => {
            let lock: toml::Value = toml::from_str(text)
                .map_err(|e| ContextError::Internal(format!("invalid lockfile: {}", e)))?;
            for package in lock.get("package").and_then(|p| p.as_array()).into_iter().flatten() {
                if let (Some(name), Some(version)) = (
                    package.get("name").and_then(|v| v.as_str()),
                    package.get("version").and_then(|v| v.as_str()),
                ) {
                    pinned
                        .entry(ecosystem.normalize_name(name))
                        .or_insert_with(|| version.to_string());
                }
            }
        }
        Ecosystem::SwiftPM => {
            let lock: serde_json::Value = serde_json::from_str(text)?;
            let pins = lock
                .get("pins")
                .or_else(|| lock.pointer("/object/pins"))
                .and_then(|p| p.as_array());
            for pin in pins.into_iter().flatten() {
                let name = pin
                    .get("identity")
                    .or_else(|| pin.get("package"))
                    .and_then(|v| v.as_str());
                let version = pin.pointer("/state/version").and_then(|v| v.as_str());
                if let (Some(name), Some(version)) = (name, version) {
                    pinned.insert(name.to_lowercase(), version.to_string());
                }
            }
        }
    }
    Ok(pinned)
}

/// Dependency analyzer for one ecosystem's manifests
pub struct ManifestAnalyzer {
    ecosystem: Ecosystem,
    registry: Option<Arc<dyn RegistryClient>>,
}

impl ManifestAnalyzer {
    pub fn new(ecosystem: Ecosystem) -> Self {
        Self {
            ecosystem,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<dyn RegistryClient>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn ecosystem(&self) -> Ecosystem {
        self.ecosystem
    }

    fn manifests(&self) -> &'static [&'static str] {
        match self.ecosystem {
            Ecosystem::Npm => &["package.json"],
            Ecosystem::PyPI => &["requirements.txt", "requirements-dev.txt", "dev-requirements.txt", "pyproject.toml"],
            Ecosystem::Crates => &["Cargo.toml"],
            Ecosystem::SwiftPM => &["Package.swift"],
        }
    }

    fn lockfile(&self) -> &'static str {
        match self.ecosystem {
            Ecosystem::Npm => "package-lock.json",
            Ecosystem::PyPI => "poetry.lock",
            Ecosystem::Crates => "Cargo.lock",
            Ecosystem::SwiftPM => "Package.resolved",
        }
    }

    fn parse_manifest(&self, file: &str, text: &str) -> Result<Vec<Declaration>> {
        match file {
            "package.json" => parse_package_json(text),
            "requirements.txt" => Ok(parse_requirements(text, Section::Runtime)),
            "requirements-dev.txt" | "dev-requirements.txt" => Ok(parse_requirements(text, Section::Dev)),
            "pyproject.toml" => parse_pyproject(text),
            "Cargo.toml" => parse_cargo_toml(text),
            "Package.swift" => Ok(parse_package_swift(text)),
            other => Err(ContextError::Internal(format!("unsupported manifest {}", other))),
        }
    }

    async fn pinned_versions(&self, root: &Path) -> Option<BTreeMap<String, String>> {
        let path = root.join(self.lockfile());
        let text = tokio::fs::read_to_string(&path).await.ok()?;
        match parse_lockfile(self.ecosystem, &text) {
            Ok(pinned) => Some(pinned),
            Err(e) => {
                warn!(path = %path.display(), "Ignoring unreadable lockfile: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DependencyAnalyzer for ManifestAnalyzer {
    async fn analyze_dependencies(&self, root: &Path) -> Result<DependencyGraph> {
        let mut declarations = Vec::new();
        for manifest in self.manifests() {
            let path = root.join(manifest);
            let Ok(text) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            match self.parse_manifest(manifest, &text) {
                Ok(found) => declarations.extend(found),
                Err(e) => warn!(path = %path.display(), "Skipping unparseable manifest: {}", e),
            }
        }
        let graph = build_graph(self.ecosystem, declarations);
        debug!(
            ecosystem = self.ecosystem.as_str(),
            packages = graph.total_size,
            conflicts = graph.conflicts.len(),
            "dependencies analyzed"
        );
        Ok(graph)
    }

    async fn check_for_updates(&self, root: &Path) -> Result<Vec<OutdatedDependency>> {
        let Some(registry) = &self.registry else {
            debug!(ecosystem = self.ecosystem.as_str(), "No registry client, skipping update check");
            return Ok(Vec::new());
        };

        let graph = self.analyze_dependencies(root).await?;
        let mut outdated = Vec::new();
        for (section, name, requirement) in graph.iter_all() {
            if section == "optional" {
                continue;
            }
            let Some(current) = extract_version(requirement) else {
                continue;
            };
            match registry.latest_version(self.ecosystem, name).await {
                Ok(Some(latest)) if compare_versions(&latest, &current) == Ordering::Greater => {
                    outdated.push(OutdatedDependency {
                        name: name.to_string(),
                        current: requirement.clone(),
                        latest,
                    });
                }
                Ok(_) => {}
                Err(e) => warn!(package = %name, "Update check failed: {}", e),
            }
        }
        Ok(outdated)
    }

    async fn find_vulnerabilities(&self, root: &Path) -> Result<Vec<Vulnerability>> {
        let graph = self.analyze_dependencies(root).await?;
        let pinned = self.pinned_versions(root).await.unwrap_or_default();

        let mut found = Vec::new();
        for (_, name, requirement) in graph.iter_all() {
            let installed = pinned
                .get(name)
                .cloned()
                .or_else(|| extract_version(requirement));
            let Some(installed) = installed else {
                continue;
            };
            for advisory in ADVISORIES
                .iter()
                .filter(|a| a.ecosystem == self.ecosystem && a.package.eq_ignore_ascii_case(name))
            {
                if compare_versions(&installed, advisory.fixed_in) == Ordering::Less {
                    found.push(Vulnerability {
                        package: name.to_string(),
                        installed: installed.clone(),
                        advisory_id: advisory.id.to_string(),
                        severity: advisory.severity.to_string(),
                        summary: advisory.summary.to_string(),
                        fixed_in: advisory.fixed_in.to_string(),
                    });
                }
            }
        }
        Ok(found)
    }

    async fn resolve_dependency_tree(&self, root: &Path) -> Result<DependencyTree> {
        let graph = self.analyze_dependencies(root).await?;
        let pinned = self.pinned_versions(root).await;
        let lockfile = pinned.as_ref().map(|_| self.lockfile().to_string());
        let pinned = pinned.unwrap_or_default();

        let dependencies = graph
            .iter_all()
            .map(|(section, name, requirement)| ResolvedDependency {
                name: name.to_string(),
                requirement: requirement.clone(),
                resolved: pinned
                    .get(name)
                    .or_else(|| pinned.get(&name.to_lowercase()))
                    .cloned(),
                section: section.to_string(),
            })
            .collect();
        Ok(DependencyTree {
            lockfile,
            dependencies,
        })
    }
}
