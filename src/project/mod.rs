//! Project data model
//!
//! Snapshots are produced by a language plugin's parser and dependency
//! analyzer, keyed by a path-derived [`ProjectId`], and replaced wholesale on
//! rescan.

pub mod identity;
pub mod models;

pub use identity::{content_hash, normalize_path, ProjectId};
pub use models::{
    BuildTarget, DependencyConflict, DependencyGraph, FileKind, Language, OutdatedDependency,
    ProjectSnapshot, ProjectStructure, ScanLevel, SourceFileDescriptor,
};
