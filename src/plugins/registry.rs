//! Plugin registration and primary-plugin detection

use super::LanguagePlugin;
use crate::error::{ContextError, Result};
use crate::project::ProjectStructure;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Structure produced by the primary plugin
#[derive(Debug)]
pub struct ProjectAnalysis {
    pub plugin: Arc<LanguagePlugin>,
    pub structure: ProjectStructure,
}

/// Registered plugins in registration order
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<LanguagePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin; names must be unique
    pub fn register(&mut self, plugin: LanguagePlugin) -> Result<()> {
        if self.get(plugin.name()).is_some() {
            return Err(ContextError::DuplicatePlugin {
                name: plugin.name().to_string(),
            });
        }
        debug!(plugin = plugin.name(), priority = plugin.priority(), "plugin registered");
        self.plugins.push(Arc::new(plugin));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<LanguagePlugin>> {
        self.plugins.iter().find(|p| p.name() == name).cloned()
    }

    pub fn plugins(&self) -> &[Arc<LanguagePlugin>] {
        &self.plugins
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Plugins that apply to `root`, highest priority first.
    ///
    /// Plugins are probed one at a time. A plugin whose probe fails is
    /// logged and treated as not applicable.
    pub async fn detect_applicable_plugins(&self, root: &Path) -> Vec<Arc<LanguagePlugin>> {
        let mut applicable = Vec::new();
        for plugin in &self.plugins {
            match plugin.is_applicable(root).await {
                Ok(true) => applicable.push(Arc::clone(plugin)),
                Ok(false) => {}
                Err(e) => warn!(
                    plugin = plugin.name(),
                    path = %root.display(),
                    "applicability check failed: {}",
                    e
                ),
            }
        }
        // Stable sort keeps registration order among equal priorities
        applicable.sort_by(|a, b| b.priority().cmp(&a.priority()));
        applicable
    }

    pub async fn detect_primary_plugin(&self, root: &Path) -> Option<Arc<LanguagePlugin>> {
        self.detect_applicable_plugins(root).await.into_iter().next()
    }

    /// Parse a project with its primary plugin
    pub async fn analyze_project(&self, root: &Path) -> Result<ProjectAnalysis> {
        let plugin = self
            .detect_primary_plugin(root)
            .await
            .ok_or_else(|| ContextError::NoApplicablePlugin {
                path: root.to_path_buf(),
            })?;

        info!(plugin = plugin.name(), path = %root.display(), "analyzing project");
        let structure = plugin.parser().parse_project(root).await?;
        Ok(ProjectAnalysis { plugin, structure })
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::stub_plugin;
    use super::*;
    use tempfile::TempDir;

    fn polyglot() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();
        dir
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("python", 75, "requirements.txt")).unwrap();
        let err = registry
            .register(stub_plugin("python", 10, "setup.py"))
            .unwrap_err();
        assert!(matches!(err, ContextError::DuplicatePlugin { name } if name == "python"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_primary_plugin_is_highest_priority() {
        let dir = polyglot();
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("python", 75, "requirements.txt")).unwrap();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();
        registry.register(stub_plugin("rust", 85, "Cargo.toml")).unwrap();

        let applicable = registry.detect_applicable_plugins(dir.path()).await;
        let names: Vec<&str> = applicable.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["javascript", "python"]);

        let primary = registry.detect_primary_plugin(dir.path()).await.unwrap();
        assert_eq!(primary.name(), "javascript");
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_registration_order() {
        let dir = polyglot();
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("first", 50, "requirements.txt")).unwrap();
        registry.register(stub_plugin("second", 50, "package.json")).unwrap();

        let primary = registry.detect_primary_plugin(dir.path()).await.unwrap();
        assert_eq!(primary.name(), "first");
    }

    #[tokio::test]
    async fn test_failing_probe_is_skipped() {
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();
        let applicable = registry
            .detect_applicable_plugins(Path::new("/no/such/project"))
            .await;
        assert!(applicable.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_without_plugin_fails() {
        let dir = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();

        let err = registry.analyze_project(dir.path()).await.unwrap_err();
        assert!(matches!(err, ContextError::NoApplicablePlugin { .. }));
    }

    #[tokio::test]
    async fn test_analyze_uses_primary_parser() {
        let dir = polyglot();
        let mut registry = PluginRegistry::new();
        registry.register(stub_plugin("javascript", 80, "package.json")).unwrap();

        let analysis = registry.analyze_project(dir.path()).await.unwrap();
        assert_eq!(analysis.plugin.name(), "javascript");
        assert_eq!(analysis.structure.name, "stub");
    }
}
