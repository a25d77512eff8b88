//! Local markdown documentation search

use super::DocumentationProvider;
use crate::error::{ContextError, Result};
use crate::scoring::keywords::tokenize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const DOC_DIRS: &[&str] = &["docs", "doc", "documentation"];
const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt"];
const MAX_DOC_DEPTH: usize = 4;
const SNIPPET_CHARS: usize = 240;

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocSearchOptions {
    pub query: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl DocSearchOptions {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            max_results: default_max_results(),
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// One matching documentation section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationResult {
    /// Heading of the section, or the file name for preamble text
    pub title: String,
    /// Path relative to the project root
    pub path: PathBuf,
    pub snippet: String,
    pub score: f64,
    pub source: String,
}

/// Searches README files and `docs/` markdown under the project root
#[derive(Debug, Clone, Default)]
pub struct LocalDocsProvider;

impl LocalDocsProvider {
    pub fn new() -> Self {
        Self
    }
}

struct Section {
    title: String,
    body: String,
}

fn split_sections(file_name: &str, text: &str) -> Vec<Section> {
    let mut sections = vec![Section {
        title: file_name.to_string(),
        body: String::new(),
    }];
    for line in text.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            let title = trimmed.trim_start_matches('#').trim();
            if !title.is_empty() {
                sections.push(Section {
                    title: title.to_string(),
                    body: String::new(),
                });
                continue;
            }
        }
        if let Some(current) = sections.last_mut() {
            current.body.push_str(line);
            current.body.push('\n');
        }
    }
    sections.retain(|s| !s.body.trim().is_empty() || s.title != file_name);
    sections
}

fn snippet(body: &str, keywords: &[String]) -> String {
    let lines: Vec<&str> = body.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines
        .iter()
        .position(|l| {
            let lower = l.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .unwrap_or(0);
    let joined = lines[start.min(lines.len())..].join(" ");
    let mut out: String = joined.chars().take(SNIPPET_CHARS).collect();
    if joined.chars().count() > SNIPPET_CHARS {
        out.push_str("...");
    }
    out
}

fn score_section(section: &Section, keywords: &[String]) -> f64 {
    let title = section.title.to_lowercase();
    let body = section.body.to_lowercase();
    let hits: usize = keywords
        .iter()
        .map(|k| 2 * title.matches(k.as_str()).count() + body.matches(k.as_str()).count())
        .sum();
    if hits == 0 {
        return 0.0;
    }
    let matched = keywords
        .iter()
        .filter(|k| title.contains(k.as_str()) || body.contains(k.as_str()))
        .count();
    // Coverage of the query matters more than raw repetition
    let coverage = matched as f64 / keywords.len() as f64;
    (0.7 * coverage + 0.3 * (hits as f64 / (hits as f64 + 5.0))).min(1.0)
}

fn doc_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| n.to_string_lossy().to_lowercase().starts_with("readme"))
                    .unwrap_or(false)
        })
        .collect();

    for dir in DOC_DIRS {
        let dir = root.join(dir);
        if !dir.is_dir() {
            continue;
        }
        files.extend(
            WalkDir::new(&dir)
                .max_depth(MAX_DOC_DEPTH)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| {
                    p.extension()
                        .map(|ext| DOC_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
                        .unwrap_or(false)
                }),
        );
    }
    files.sort();
    files
}

#[async_trait]
impl DocumentationProvider for LocalDocsProvider {
    async fn search(&self, root: &Path, options: &DocSearchOptions) -> Result<Vec<DocumentationResult>> {
        let keywords = tokenize(&options.query);
        if keywords.is_empty() || options.max_results == 0 {
            return Ok(Vec::new());
        }

        let base = root.to_path_buf();
        let files = tokio::task::spawn_blocking(move || doc_files(&base))
            .await
            .map_err(|e| ContextError::Internal(format!("documentation walk panicked: {}", e)))?;

        let mut results = Vec::new();
        for file in files {
            let text = match tokio::fs::read_to_string(&file).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %file.display(), "Skipping unreadable documentation file: {}", e);
                    continue;
                }
            };
            let relative = file.strip_prefix(root).unwrap_or(&file).to_path_buf();
            let file_name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            for section in split_sections(&file_name, &text) {
                let score = score_section(&section, &keywords);
                if score <= 0.0 {
                    continue;
                }
                results.push(DocumentationResult {
                    snippet: snippet(&section.body, &keywords),
                    title: section.title,
                    path: relative.clone(),
                    score,
                    source: "local".to_string(),
                });
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(options.max_results);
        debug!(query = %options.query, results = results.len(), "documentation searched");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn docs_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("README.md"),
            "# Blog\nA small blog engine.\n\n## Installation\nRun pip install.\n\n## Authentication\nLogin uses session cookies and password hashing.\n",
        )
        .unwrap();
        std::fs::create_dir_all(dir.path().join("docs/guides")).unwrap();
        std::fs::write(
            dir.path().join("docs/guides/deploy.md"),
            "# Deployment\nDeploy with docker. Session storage needs redis.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("docs/logo.png"), [0u8, 1, 2]).unwrap();
        dir
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections("README.md", "intro\n# One\nbody\n## Two\nmore\n");
        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["README.md", "One", "Two"]);
    }

    #[tokio::test]
    async fn test_search_ranks_heading_matches_first() {
        let dir = docs_project();
        let results = LocalDocsProvider::new()
            .search(dir.path(), &DocSearchOptions::new("authentication session"))
            .await
            .unwrap();

        assert!(!results.is_empty());
        assert_eq!(results[0].title, "Authentication");
        assert_eq!(results[0].path, PathBuf::from("README.md"));
        assert!(results[0].snippet.contains("session"));
        assert!(results.iter().any(|r| r.path == Path::new("docs/guides/deploy.md")));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[tokio::test]
    async fn test_search_respects_max_results() {
        let dir = docs_project();
        let results = LocalDocsProvider::new()
            .search(dir.path(), &DocSearchOptions::new("session").with_max_results(1))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_no_keywords_or_no_docs() {
        let dir = TempDir::new().unwrap();
        let provider = LocalDocsProvider::new();
        assert!(provider
            .search(dir.path(), &DocSearchOptions::new("the and"))
            .await
            .unwrap()
            .is_empty());
        assert!(provider
            .search(dir.path(), &DocSearchOptions::new("deployment"))
            .await
            .unwrap()
            .is_empty());
    }
}
