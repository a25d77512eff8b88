//! Built-in language plugins
//!
//! Every built-in plugin shares the same capability implementations
//! (regex parser, manifest analyzer, relevance scorer, local docs) and
//! differs only in syntax rules, ecosystem and scoring profile.

pub mod javascript;
pub mod python;
pub mod rust;
pub mod swift;

use super::dependencies::{Ecosystem, HttpRegistryClient, ManifestAnalyzer, RegistryClient};
use super::docs::LocalDocsProvider;
use super::parser::{HeuristicParser, SyntaxRules};
use super::registry::PluginRegistry;
use super::{LanguagePlugin, PluginDescriptor};
use crate::config::Config;
use crate::error::Result;
use crate::scoring::{RelevanceScorer, ScorerProfile};
use std::sync::Arc;
use tracing::info;

fn assemble(
    descriptor: PluginDescriptor,
    rules: SyntaxRules,
    ecosystem: Ecosystem,
    profile: ScorerProfile,
    config: &Config,
    registry: Option<Arc<dyn RegistryClient>>,
) -> Result<LanguagePlugin> {
    let parser = HeuristicParser::new(rules, config.scan.clone())?;
    let mut analyzer = ManifestAnalyzer::new(ecosystem);
    if let Some(client) = registry {
        analyzer = analyzer.with_registry(client);
    }
    let scorer = RelevanceScorer::new(profile, config.scoring.clone());

    Ok(
        LanguagePlugin::new(descriptor, Arc::new(parser), Arc::new(analyzer), Arc::new(scorer))
            .with_docs(Arc::new(LocalDocsProvider::new())),
    )
}

/// Registry with the Swift, Rust, JavaScript and Python plugins.
///
/// One HTTP registry client is shared by all plugins when update checks
/// are enabled.
pub fn builtin_registry(config: &Config) -> Result<PluginRegistry> {
    let client: Option<Arc<dyn RegistryClient>> = if config.registry.enabled {
        Some(Arc::new(HttpRegistryClient::new(config.registry.clone())?))
    } else {
        None
    };

    let mut registry = PluginRegistry::new();
    registry.register(swift::plugin(config, client.clone())?)?;
    registry.register(rust::plugin(config, client.clone())?)?;
    registry.register(javascript::plugin(config, client.clone())?)?;
    registry.register(python::plugin(config, client)?)?;

    info!(plugins = registry.len(), "built-in plugins registered");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.registry.enabled = false;
        config
    }

    #[test]
    fn test_builtin_priorities() {
        let registry = builtin_registry(&offline_config()).unwrap();
        let plugins: Vec<(&str, i32)> = registry.plugins().iter().map(|p| (p.name(), p.priority())).collect();
        assert_eq!(
            plugins,
            vec![("swift", 90), ("rust", 85), ("javascript", 80), ("python", 75)]
        );
        assert!(registry.plugins().iter().all(|p| p.docs().is_some()));
    }

    #[tokio::test]
    async fn test_javascript_wins_over_python() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package.json"), r#"{"name": "web"}"#).unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();

        let registry = builtin_registry(&offline_config()).unwrap();
        let names: Vec<String> = registry
            .detect_applicable_plugins(dir.path())
            .await
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["javascript", "python"]);
    }
}
