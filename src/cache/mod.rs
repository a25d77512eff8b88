//! Time-bounded project snapshot cache
//!
//! Entries are keyed by [`ProjectId`] and valid for a fixed window after the
//! snapshot was captured. The whole cache, together with the token usage
//! ledger, is persisted as one JSON document. Reading or writing that file
//! never fails the caller: an unreadable document means an empty cache.

use crate::config::CacheConfig;
use crate::context::TokenUsageLedger;
use crate::project::{ProjectId, ProjectSnapshot, ScanLevel};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A cached snapshot and the plugin that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub snapshot: ProjectSnapshot,
    pub plugin: String,
    pub captured_at: DateTime<Utc>,
    /// Level the snapshot was captured at
    #[serde(default)]
    pub level: ScanLevel,
}

impl CacheEntry {
    pub fn new(snapshot: ProjectSnapshot, plugin: &str) -> Self {
        Self {
            captured_at: snapshot.captured_at,
            snapshot,
            plugin: plugin.to_string(),
            level: ScanLevel::default(),
        }
    }

    pub fn with_level(mut self, level: ScanLevel) -> Self {
        self.level = level;
        self
    }

    /// Whether the snapshot holds everything a scan at `requested` reports
    pub fn covers(&self, requested: ScanLevel) -> bool {
        !requested.includes_dependencies() || self.level.includes_dependencies()
    }

    /// Valid while strictly less than `ttl` has elapsed since capture
    pub fn is_valid_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now.signed_duration_since(self.captured_at) < ttl
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CacheLookup<'a> {
    Hit(&'a CacheEntry),
    Stale(&'a CacheEntry),
    Miss,
}

impl CacheLookup<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit(_) => "hit",
            CacheLookup::Stale(_) => "stale",
            CacheLookup::Miss => "miss",
        }
    }
}

/// On-disk layout of the cache file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheDocument {
    #[serde(default)]
    pub projects: Vec<(ProjectId, CacheEntry)>,
    #[serde(default)]
    pub token_stats: TokenUsageLedger,
}

#[derive(Debug)]
pub struct ProjectCache {
    entries: BTreeMap<ProjectId, CacheEntry>,
    ttl: Duration,
    /// Where the document is written; `None` keeps the cache in memory
    path: Option<PathBuf>,
}

impl ProjectCache {
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            entries: BTreeMap::new(),
            ttl,
            path: None,
        }
    }

    /// Load the cache and token ledger from the configured path.
    ///
    /// A missing or corrupt document yields an empty cache and a fresh
    /// ledger. With persistence off the file is never touched.
    pub async fn load(config: &CacheConfig) -> (Self, TokenUsageLedger) {
        let mut cache = Self::in_memory(config.ttl());
        if !config.persist {
            return (cache, TokenUsageLedger::default());
        }
        cache.path = Some(config.path.clone());

        let document = match read_document(&config.path).await {
            Some(document) => document,
            None => return (cache, TokenUsageLedger::default()),
        };

        cache.entries = document.projects.into_iter().collect();
        info!(
            path = %config.path.display(),
            projects = cache.entries.len(),
            "project cache loaded"
        );
        (cache, document.token_stats)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn lookup(&self, id: &ProjectId, now: DateTime<Utc>) -> CacheLookup<'_> {
        match self.entries.get(id) {
            Some(entry) if entry.is_valid_at(now, self.ttl) => CacheLookup::Hit(entry),
            Some(entry) => CacheLookup::Stale(entry),
            None => CacheLookup::Miss,
        }
    }

    /// Entry for `id` if it is still inside the validity window
    pub fn get_valid(&self, id: &ProjectId, now: DateTime<Utc>) -> Option<&CacheEntry> {
        match self.lookup(id, now) {
            CacheLookup::Hit(entry) => Some(entry),
            _ => None,
        }
    }

    /// Insert or wholesale replace the entry for `id`
    pub fn insert(&mut self, id: ProjectId, entry: CacheEntry) {
        debug!(project_id = %id, files = entry.snapshot.file_count(), "cache entry stored");
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: &ProjectId) -> Option<CacheEntry> {
        self.entries.remove(id)
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.is_valid_at(now, ttl));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite the cache document. Failures are logged and ignored.
    pub async fn persist(&self, ledger: &TokenUsageLedger) {
        let Some(path) = &self.path else {
            return;
        };
        let document = CacheDocument {
            projects: self
                .entries
                .iter()
                .map(|(id, entry)| (id.clone(), entry.clone()))
                .collect(),
            token_stats: ledger.clone(),
        };
        if let Err(e) = write_document(path, &document).await {
            warn!(path = %path.display(), "Failed to persist project cache: {}", e);
        }
    }
}

async fn read_document(path: &Path) -> Option<CacheDocument> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), "Cannot read project cache, starting empty: {}", e);
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(document) => Some(document),
        Err(e) => {
            warn!(path = %path.display(), "Corrupt project cache, starting empty: {}", e);
            None
        }
    }
}

async fn write_document(path: &Path, document: &CacheDocument) -> crate::error::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{DependencyGraph, Language, ProjectStructure};
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn snapshot(captured_at: DateTime<Utc>) -> ProjectSnapshot {
        ProjectSnapshot::new(
            ProjectStructure {
                name: "demo".to_string(),
                root_path: PathBuf::from("/tmp/demo"),
                language: Language::Python,
                framework: None,
                targets: Vec::new(),
                source_files: Vec::new(),
            },
            DependencyGraph::default(),
            captured_at,
        )
    }

    fn captured() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_validity_window_boundary() {
        let entry = CacheEntry::new(snapshot(captured()), "python");
        let ttl = Duration::hours(24);

        let almost = captured() + Duration::hours(23) + Duration::minutes(59);
        assert!(entry.is_valid_at(almost, ttl));
        assert!(!entry.is_valid_at(captured() + Duration::hours(24), ttl));
        let past = captured() + Duration::hours(24) + Duration::seconds(1);
        assert!(!entry.is_valid_at(past, ttl));
    }

    #[test]
    fn test_lookup_hit_stale_miss() {
        let mut cache = ProjectCache::in_memory(Duration::hours(24));
        let id = ProjectId::from_path(Path::new("/tmp/demo"));
        assert_eq!(cache.lookup(&id, captured()), CacheLookup::Miss);

        cache.insert(id.clone(), CacheEntry::new(snapshot(captured()), "python"));
        assert_eq!(cache.lookup(&id, captured() + Duration::hours(1)).as_str(), "hit");
        assert_eq!(cache.lookup(&id, captured() + Duration::hours(25)).as_str(), "stale");
        assert!(cache.get_valid(&id, captured() + Duration::hours(25)).is_none());

        assert_eq!(cache.purge_expired(captured() + Duration::hours(25)), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_insert_replaces_wholesale() {
        let mut cache = ProjectCache::in_memory(Duration::hours(24));
        let id = ProjectId::from_path(Path::new("/tmp/demo"));
        cache.insert(id.clone(), CacheEntry::new(snapshot(captured()), "python"));
        let later = captured() + Duration::hours(2);
        cache.insert(id.clone(), CacheEntry::new(snapshot(later), "javascript"));

        let entry = cache.get_valid(&id, later).unwrap();
        assert_eq!(entry.plugin, "javascript");
        assert_eq!(entry.captured_at, later);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            path: dir.path().join("nested/cache.json"),
            ttl_hours: 24,
            persist: true,
        };
        let (mut cache, mut ledger) = ProjectCache::load(&config).await;
        assert!(cache.is_empty());

        let id = ProjectId::from_path(Path::new("/tmp/demo"));
        cache.insert(id.clone(), CacheEntry::new(snapshot(captured()), "python"));
        ledger.record(1200);
        cache.persist(&ledger).await;

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&config.path).unwrap()).unwrap();
        assert!(raw["projects"][0][0].is_string());
        assert!(raw["tokenStats"]["totalUsed"].is_number());

        let (reloaded, ledger) = ProjectCache::load(&config).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.lookup(&id, captured()).as_str(), "hit");
        assert_eq!(ledger.total_used(), 1200);
    }

    #[tokio::test]
    async fn test_corrupt_document_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ truncated").unwrap();
        let config = CacheConfig {
            path,
            ttl_hours: 24,
            persist: true,
        };

        let (cache, ledger) = ProjectCache::load(&config).await;
        assert!(cache.is_empty());
        assert_eq!(ledger.total_used(), 0);
    }

    #[tokio::test]
    async fn test_in_memory_cache_never_writes() {
        let dir = TempDir::new().unwrap();
        let config = CacheConfig {
            path: dir.path().join("cache.json"),
            ttl_hours: 24,
            persist: false,
        };
        let (mut cache, ledger) = ProjectCache::load(&config).await;
        cache.insert(
            ProjectId::from_path(Path::new("/tmp/demo")),
            CacheEntry::new(snapshot(captured()), "python"),
        );
        cache.persist(&ledger).await;
        assert!(!config.path.exists());
    }

    #[tokio::test]
    async fn test_in_memory_cache_ignores_existing_document() {
        let dir = TempDir::new().unwrap();
        let persisted = CacheConfig {
            path: dir.path().join("cache.json"),
            ttl_hours: 24,
            persist: true,
        };
        let (mut cache, mut ledger) = ProjectCache::load(&persisted).await;
        cache.insert(
            ProjectId::from_path(Path::new("/tmp/demo")),
            CacheEntry::new(snapshot(captured()), "python"),
        );
        ledger.record(300);
        cache.persist(&ledger).await;

        let in_memory = CacheConfig {
            persist: false,
            ..persisted
        };
        let (cache, ledger) = ProjectCache::load(&in_memory).await;
        assert!(cache.is_empty());
        assert_eq!(ledger.total_used(), 0);
    }

    #[test]
    fn test_basic_entry_does_not_cover_dependency_scans() {
        let basic = CacheEntry::new(snapshot(captured()), "python").with_level(ScanLevel::Basic);
        assert!(basic.covers(ScanLevel::Basic));
        assert!(!basic.covers(ScanLevel::Standard));
        assert!(!basic.covers(ScanLevel::Deep));

        let standard = CacheEntry::new(snapshot(captured()), "python");
        assert!(standard.covers(ScanLevel::Basic));
        assert!(standard.covers(ScanLevel::Deep));
    }

    #[test]
    fn test_entry_without_level_reads_as_standard() {
        let entry = CacheEntry::new(snapshot(captured()), "python").with_level(ScanLevel::Basic);
        let mut raw = serde_json::to_value(&entry).unwrap();
        assert_eq!(raw["level"], "basic");
        raw.as_object_mut().unwrap().remove("level");
        let decoded: CacheEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(decoded.level, ScanLevel::Standard);
    }
}
