//! JavaScript and TypeScript plugin

use super::assemble;
use crate::config::Config;
use crate::error::Result;
use crate::plugins::dependencies::{Ecosystem, RegistryClient};
use crate::plugins::parser::{FrameworkMarker, ManifestInfo, SyntaxRules};
use crate::plugins::{LanguagePlugin, PluginDescriptor};
use crate::project::{BuildTarget, Language};
use crate::scoring::ScorerProfile;
use std::sync::Arc;

pub const JAVASCRIPT: SyntaxRules = SyntaxRules {
    language: Language::JavaScript,
    extensions: &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"],
    imports: &[
        r#"(?m)^\s*import\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#,
        r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
    ],
    classes: &[
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)",
        r"(?m)^\s*(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)",
    ],
    functions: &[
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)",
        r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>",
    ],
    exports: &[
        r"(?m)^\s*export\s+(?:default\s+)?(?:async\s+)?(?:function\s*\*?|class|const|let|var|interface|type|enum)\s+([A-Za-z_$][\w$]*)",
        r"(?m)^\s*module\.exports\.([A-Za-z_$][\w$]*)",
    ],
    branches: r"\b(?:if|for|while|case|catch)\b|&&|\|\||\?\?",
    frameworks: &[
        FrameworkMarker {
            framework: "next",
            manifest: "\"next\"",
            import: "next",
        },
        FrameworkMarker {
            framework: "react",
            manifest: "\"react\"",
            import: "react",
        },
        FrameworkMarker {
            framework: "vue",
            manifest: "\"vue\"",
            import: "vue",
        },
        FrameworkMarker {
            framework: "angular",
            manifest: "\"@angular/core\"",
            import: "@angular/core",
        },
        FrameworkMarker {
            framework: "nestjs",
            manifest: "\"@nestjs/core\"",
            import: "@nestjs/common",
        },
        FrameworkMarker {
            framework: "express",
            manifest: "\"express\"",
            import: "express",
        },
    ],
    manifests: &["package.json"],
    read_manifest,
};

fn read_manifest(_file_name: &str, text: &str) -> ManifestInfo {
    let Ok(manifest) = serde_json::from_str::<serde_json::Value>(text) else {
        return ManifestInfo::default();
    };
    let name = manifest.get("name").and_then(|n| n.as_str()).map(str::to_string);

    let mut targets = Vec::new();
    if let Some(main) = manifest.get("main").and_then(|m| m.as_str()) {
        targets.push(BuildTarget {
            name: main.to_string(),
            kind: "main".to_string(),
        });
    }
    match manifest.get("bin") {
        Some(serde_json::Value::String(path)) => targets.push(BuildTarget {
            name: name.clone().unwrap_or_else(|| path.clone()),
            kind: "bin".to_string(),
        }),
        Some(serde_json::Value::Object(bins)) => targets.extend(bins.keys().map(|b| BuildTarget {
            name: b.clone(),
            kind: "bin".to_string(),
        })),
        _ => {}
    }
    if let Some(scripts) = manifest.get("scripts").and_then(|s| s.as_object()) {
        targets.extend(scripts.keys().map(|s| BuildTarget {
            name: s.clone(),
            kind: "script".to_string(),
        }));
    }
    ManifestInfo { name, targets }
}

fn profile() -> ScorerProfile {
    ScorerProfile::new(Language::JavaScript)
        .with_convention("react", &["components", "hooks", "pages", "context", ".jsx", ".tsx"])
        .with_convention("next", &["pages", "app/", "components", "api/", "middleware"])
        .with_convention("vue", &["components", "views", "store", "router", ".vue"])
        .with_convention("angular", &[".component.", ".service.", ".module.", ".guard."])
        .with_convention("express", &["routes", "controllers", "middleware", "models", "app.js", "server.js"])
        .with_convention("nestjs", &[".controller.", ".service.", ".module.", ".dto."])
        .with_entry_points(&["index.js", "index.ts", "main.js", "main.ts", "app.js", "app.ts", "server.js", "server.ts"])
}

pub fn plugin(config: &Config, registry: Option<Arc<dyn RegistryClient>>) -> Result<LanguagePlugin> {
    let descriptor = PluginDescriptor::new("javascript", Language::JavaScript, 80)
        .with_manifests(&["package.json", "tsconfig.json"])
        .with_extensions(JAVASCRIPT.extensions);
    assemble(descriptor, JAVASCRIPT, Ecosystem::Npm, profile(), config, registry)
}
