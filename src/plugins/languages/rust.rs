//! Rust plugin

use super::assemble;
use crate::config::Config;
use crate::error::Result;
use crate::plugins::dependencies::{Ecosystem, RegistryClient};
use crate::plugins::parser::{FrameworkMarker, ManifestInfo, SyntaxRules};
use crate::plugins::{LanguagePlugin, PluginDescriptor};
use crate::project::{BuildTarget, Language};
use crate::scoring::{KindWeights, ScorerProfile};
use std::sync::Arc;

pub const RUST: SyntaxRules = SyntaxRules {
    language: Language::Rust,
    extensions: &["rs"],
    imports: &[
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([\w:]+)",
        r"(?m)^\s*extern\s+crate\s+(\w+)",
    ],
    classes: &[
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait|union)\s+([A-Za-z_]\w*)",
        r"(?m)^\s*impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?([A-Za-z_]\w*)",
    ],
    functions: &[
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+([A-Za-z_]\w*)",
    ],
    exports: &[
        r"(?m)^\s*pub\s+(?:async\s+)?(?:unsafe\s+)?(?:fn|struct|enum|trait|type|const|static|mod)\s+([A-Za-z_]\w*)",
    ],
    branches: r"\b(?:if|match|for|while|loop)\b|=>|&&|\|\||\?[;.)]",
    frameworks: &[
        FrameworkMarker {
            framework: "axum",
            manifest: "axum",
            import: "axum",
        },
        FrameworkMarker {
            framework: "actix-web",
            manifest: "actix-web",
            import: "actix_web",
        },
        FrameworkMarker {
            framework: "rocket",
            manifest: "rocket",
            import: "rocket",
        },
    ],
    manifests: &["Cargo.toml"],
    read_manifest,
};

fn read_manifest(_file_name: &str, text: &str) -> ManifestInfo {
    let Ok(doc) = toml::from_str::<toml::Value>(text) else {
        return ManifestInfo::default();
    };
    let name = doc
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(str::to_string);

    let mut targets = Vec::new();
    if let Some(lib) = doc.get("lib") {
        let lib_name = lib
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string)
            .or_else(|| name.as_ref().map(|n| n.replace('-', "_")));
        if let Some(lib_name) = lib_name {
            targets.push(BuildTarget {
                name: lib_name,
                kind: "lib".to_string(),
            });
        }
    }
    for (section, kind) in [("bin", "bin"), ("example", "example"), ("test", "test"), ("bench", "bench")] {
        for entry in doc.get(section).and_then(|b| b.as_array()).into_iter().flatten() {
            if let Some(target) = entry.get("name").and_then(|n| n.as_str()) {
                targets.push(BuildTarget {
                    name: target.to_string(),
                    kind: kind.to_string(),
                });
            }
        }
    }
    ManifestInfo { name, targets }
}

fn profile() -> ScorerProfile {
    // lib.rs and mod.rs usually hold code, not just re-exports
    let weights = KindWeights {
        module: 0.95,
        ..KindWeights::default()
    };
    ScorerProfile::new(Language::Rust)
        .with_kind_weights(weights)
        .with_convention("axum", &["routes", "handlers", "router", "extract", "middleware"])
        .with_convention("actix-web", &["routes", "handlers", "services", "middleware"])
        .with_convention("rocket", &["routes", "guards", "fairings"])
        .with_entry_points(&["main.rs", "lib.rs", "build.rs"])
}

pub fn plugin(config: &Config, registry: Option<Arc<dyn RegistryClient>>) -> Result<LanguagePlugin> {
    let descriptor = PluginDescriptor::new("rust", Language::Rust, 85)
        .with_manifests(&["Cargo.toml"])
        .with_extensions(RUST.extensions);
    assemble(descriptor, RUST, Ecosystem::Crates, profile(), config, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::plugins::parser::HeuristicParser;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cargo_manifest_targets() {
        let info = read_manifest(
            "Cargo.toml",
            "[package]\nname = \"todo-api\"\n[lib]\npath = \"src/lib.rs\"\n[[bin]]\nname = \"todo\"\npath = \"src/main.rs\"\n",
        );
        assert_eq!(info.name.as_deref(), Some("todo-api"));
        assert_eq!(
            info.targets,
            vec![
                BuildTarget {
                    name: "todo_api".to_string(),
                    kind: "lib".to_string()
                },
                BuildTarget {
                    name: "todo".to_string(),
                    kind: "bin".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_extract_rust_symbols() {
        let parser = HeuristicParser::new(RUST, ScanConfig::default()).unwrap();
        let source = "use axum::Router;\nuse std::sync::Arc;\n\npub struct Store {\n    items: Vec<u32>,\n}\n\nimpl Store {\n    pub async fn load(id: u32) -> Option<u32> {\n        if id > 0 && id < 10 {\n            return Some(id);\n        }\n        None\n    }\n\n    fn reset(&mut self) {}\n}\n";
        let extracted = parser.extract(source);
        assert_eq!(extracted.imports, vec!["axum::Router", "std::sync::Arc"]);
        assert_eq!(extracted.classes, vec!["Store"]);
        assert_eq!(extracted.functions, vec!["load", "reset"]);
        assert_eq!(
            extracted.exports,
            ["Store", "load"].iter().map(|s| s.to_string()).collect()
        );
        // base 1 + if + &&
        assert_eq!(extracted.complexity, 3);
    }
}
