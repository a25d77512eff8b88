//! Stable identifiers and digests for projects

use super::models::ProjectSnapshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Deterministic identifier of a project, derived from its normalized root path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Derive the identifier for a project root
    pub fn from_path(path: &Path) -> Self {
        let normalized = normalize_path(path);
        let mut hasher = Sha256::new();
        hasher.update(normalized.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..16].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve a project path to an absolute form without trailing separators.
///
/// Symlinks are resolved when the path exists; otherwise `.` and `..`
/// components are folded lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Fields of a snapshot that participate in change detection
#[derive(Serialize)]
struct HashedView<'a> {
    name: &'a str,
    root_path: &'a Path,
    language: &'a super::models::Language,
    framework: &'a Option<String>,
    targets: &'a [super::models::BuildTarget],
    source_files: Vec<&'a super::models::SourceFileDescriptor>,
    dependency_graph: &'a super::models::DependencyGraph,
}

/// SHA-256 over the serialized snapshot, excluding the hash itself and the capture time
pub fn content_hash(snapshot: &ProjectSnapshot) -> String {
    let view = HashedView {
        name: &snapshot.name,
        root_path: &snapshot.root_path,
        language: &snapshot.language,
        framework: &snapshot.framework,
        targets: &snapshot.targets,
        source_files: snapshot.source_files.values().collect(),
        dependency_graph: &snapshot.dependency_graph,
    };

    let mut hasher = Sha256::new();
    match serde_json::to_vec(&view) {
        Ok(bytes) => hasher.update(&bytes),
        // Serialization of plain data cannot fail in practice; fall back to the name
        Err(_) => hasher.update(snapshot.name.as_bytes()),
    }
    hex::encode(hasher.finalize())
}
