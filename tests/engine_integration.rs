//! End-to-end tests for the context engine
//!
//! Each test builds a small project in a temporary directory, scans it with
//! the built-in plugins and exercises the engine operations against the
//! cached snapshot.

use context_optimizer::{
    plugins::DocSearchOptions, Config, ContextEngine, ContextMode, EngineResponse, OptimizeMode,
    ScanLevel, Technique,
};
use context_optimizer::context::TaskClass;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn shop_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "package.json",
        r#"{"name": "shop", "main": "src/index.js", "dependencies": {"express": "^4.18.0", "lodash": "4.17.15"}}"#,
    );
    write(dir.path(), "requirements.txt", "requests==2.31.0\n");

    let mut login = String::from(
        "const express = require('express');\nconst { hash } = require('../utils/crypto');\n\n// Handles user login and session creation\nclass LoginController {\n",
    );
    for i in 0..40 {
        login.push_str(&format!(
            "  checkStep{i}(user) {{\n    if (user.attempts > {i} && !user.locked) {{ return this.fail(user, 'step {i}'); }}\n    return true;\n  }}\n"
        ));
    }
    login.push_str("}\n\nfunction login(req, res) {\n  return new LoginController().handle(req, res);\n}\n\nmodule.exports.login = login;\n");
    write(dir.path(), "src/auth/login.js", &login);
    write(
        dir.path(),
        "src/utils/format.js",
        "export function formatPrice(cents) {\n  return `$${(cents / 100).toFixed(2)}`;\n}\n",
    );
    write(dir.path(), "src/index.js", "const app = require('express')();\napp.listen(3000);\n");
    write(
        dir.path(),
        "README.md",
        "# Shop\nA tiny store.\n\n## Login flow\nThe login controller checks each step before creating a session.\n",
    );
    dir
}

fn config(state: &TempDir) -> Config {
    let mut config = Config::default();
    config.cache.path = state.path().join("cache.json");
    config.registry.enabled = false;
    config
}

#[tokio::test]
async fn test_scan_picks_highest_priority_plugin_and_reuses_snapshot() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();

    let first = engine
        .scan(project.path(), ScanLevel::Standard, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(first.plugin, "javascript");
    assert_eq!(first.name, "shop");
    assert!(!first.cached);
    assert_eq!(first.dependency_count, 2);
    assert!(first.file_count >= 3);

    let second = engine
        .scan(project.path(), ScanLevel::Standard, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(second.cached);
    assert_eq!(second.content_hash, first.content_hash);
    assert_eq!(second.captured_at, first.captured_at);

    let refreshed = engine
        .scan(project.path(), ScanLevel::Standard, true)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(!refreshed.cached);
    assert!(refreshed.captured_at >= first.captured_at);
}

#[tokio::test]
async fn test_snapshot_survives_engine_restart() {
    let state = TempDir::new().unwrap();
    let project = shop_project();

    let hash = {
        let mut engine = ContextEngine::new(config(&state)).await.unwrap();
        let summary = engine
            .scan(project.path(), ScanLevel::Basic, false)
            .await
            .unwrap()
            .ready()
            .unwrap();
        summary.content_hash
    };
    assert!(state.path().join("cache.json").exists());

    let mut engine = ContextEngine::new(config(&state)).await.unwrap();
    assert_eq!(engine.cache().len(), 1);
    let summary = engine
        .scan(project.path(), ScanLevel::Basic, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(summary.cached);
    assert_eq!(summary.content_hash, hash);
}

#[tokio::test]
async fn test_context_requires_a_scan_first() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();

    let response = engine
        .get_context(project.path(), "fix login bug", 2000, ContextMode::Focused)
        .await
        .unwrap();
    match response {
        EngineResponse::NotFound { hint, .. } => assert!(hint.contains("scan")),
        _ => panic!("expected a not-found response"),
    }
}

#[tokio::test]
async fn test_get_context_ranks_login_first() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();
    engine.scan(project.path(), ScanLevel::Standard, false).await.unwrap();

    let context = engine
        .get_context(project.path(), "fix login bug", 2000, ContextMode::Focused)
        .await
        .unwrap()
        .ready()
        .unwrap();

    assert_eq!(context.files[0].file_path, PathBuf::from("src/auth/login.js"));
    assert!(context.files.len() <= 5);
    assert!(context.files.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(context.result.technique, Technique::ContextualFiltering);
    assert!(context.result.content.contains("login"));
    assert_eq!(
        engine.token_usage().total_used(),
        context.result.estimated_tokens as u64
    );
}

#[tokio::test]
async fn test_real_time_optimize_compresses_toward_target() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();
    engine.scan(project.path(), ScanLevel::Basic, false).await.unwrap();

    let response = engine
        .optimize(project.path(), "login session", 40, OptimizeMode::RealTime)
        .await
        .unwrap()
        .ready()
        .unwrap();

    assert_eq!(response.result.technique, Technique::ExtremeCompression);
    assert!(response.result.secondary_compression);
    assert!(response.result.estimated_tokens <= response.result.primary_tokens);
    assert!(response.original_tokens > response.result.estimated_tokens);
    assert!(response.compression_ratio < 1.0);
    // Real-time runs bypass selection and leave no history behind
    assert!(engine.optimizer().history().is_empty());
}

#[tokio::test]
async fn test_intelligent_optimize_learns_history() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();
    engine.scan(project.path(), ScanLevel::Basic, false).await.unwrap();

    let first = engine
        .optimize(project.path(), "refactor the login controller", 800, OptimizeMode::Intelligent)
        .await
        .unwrap()
        .ready()
        .unwrap();
    let second = engine
        .optimize(project.path(), "refactor the login controller", 800, OptimizeMode::Intelligent)
        .await
        .unwrap()
        .ready()
        .unwrap();

    assert_eq!(first.result.task_class, TaskClass::Refactoring);
    assert_eq!(second.result.technique, first.result.technique);
    assert_eq!(engine.optimizer().history().len(), 1);
}

#[tokio::test]
async fn test_dependencies_and_vulnerabilities() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();

    let deep = engine
        .scan(project.path(), ScanLevel::Deep, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(deep.dependency_tree.is_some());
    assert!(deep
        .vulnerabilities
        .iter()
        .any(|v| v.package == "lodash" && v.advisory_id == "CVE-2021-23337"));

    let report = engine
        .analyze_dependencies(project.path(), true)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(report.plugin, "javascript");
    assert!(report.graph.dependencies.contains_key("express"));
    assert!(report.updates_checked);
    // No registry client when update checks are disabled in config
    assert!(report.graph.outdated.is_empty());
    assert_eq!(report.vulnerabilities.len(), 1);
}

#[tokio::test]
async fn test_basic_scan_defers_dependency_analysis() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();

    let basic = engine
        .scan(project.path(), ScanLevel::Basic, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(basic.dependency_count, 0);

    let report = engine
        .analyze_dependencies(project.path(), false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(report.graph.total_size, 2);
    assert!(!report.updates_checked);
}

#[tokio::test]
async fn test_standard_scan_after_basic_scan_includes_dependencies() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();

    let basic = engine
        .scan(project.path(), ScanLevel::Basic, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(basic.dependency_count, 0);

    let standard = engine
        .scan(project.path(), ScanLevel::Standard, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(!standard.cached);
    assert_eq!(standard.dependency_count, 2);

    let again = engine
        .scan(project.path(), ScanLevel::Standard, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(again.cached);
    assert_eq!(again.content_hash, standard.content_hash);

    // A dependency-level snapshot also answers structure-only scans
    let basic_again = engine
        .scan(project.path(), ScanLevel::Basic, false)
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert!(basic_again.cached);
    assert_eq!(basic_again.content_hash, standard.content_hash);
}

#[tokio::test]
async fn test_search_documentation() {
    let state = TempDir::new().unwrap();
    let project = shop_project();
    let mut engine = ContextEngine::new(config(&state)).await.unwrap();
    engine.scan(project.path(), ScanLevel::Basic, false).await.unwrap();

    let results = engine
        .search_documentation(project.path(), &DocSearchOptions::new("login flow"))
        .await
        .unwrap()
        .ready()
        .unwrap();
    assert_eq!(results[0].title, "Login flow");
    assert_eq!(results[0].path, PathBuf::from("README.md"));
}
