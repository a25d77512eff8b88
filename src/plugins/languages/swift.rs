//! Swift plugin

use super::assemble;
use crate::config::Config;
use crate::error::Result;
use crate::plugins::dependencies::{Ecosystem, RegistryClient};
use crate::plugins::parser::{FrameworkMarker, ManifestInfo, SyntaxRules};
use crate::plugins::{LanguagePlugin, PluginDescriptor};
use crate::project::{BuildTarget, Language};
use crate::scoring::ScorerProfile;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static PACKAGE_NAME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"Package\s*\(\s*name:\s*"([^"]+)""#).ok());
static TARGET: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"\.(executableTarget|testTarget|target)\s*\(\s*name:\s*"([^"]+)""#).ok());

pub const SWIFT: SyntaxRules = SyntaxRules {
    language: Language::Swift,
    extensions: &["swift"],
    imports: &[r"(?m)^\s*(?:@testable\s+)?import\s+(?:(?:class|struct|enum|protocol|func)\s+)?([\w.]+)"],
    classes: &[
        r"(?m)^\s*(?:(?:public|private|internal|fileprivate|open|final)\s+)*(?:class|struct|enum|protocol|actor)\s+([A-Za-z_]\w*)",
        r"(?m)^\s*(?:(?:public|private|internal|fileprivate)\s+)*extension\s+([A-Za-z_]\w*)",
    ],
    functions: &[
        r"(?m)^\s*(?:@\w+\s+)*(?:(?:public|private|internal|fileprivate|open|static|class|override|mutating|final)\s+)*func\s+([A-Za-z_]\w*)",
    ],
    exports: &[
        r"(?m)^\s*(?:public|open)\s+(?:(?:final|static)\s+)*(?:class|struct|enum|protocol|actor|func|var|let)\s+([A-Za-z_]\w*)",
    ],
    branches: r"\b(?:if|guard|for|while|case|catch)\b|&&|\|\||\?\?",
    frameworks: &[
        FrameworkMarker {
            framework: "vapor",
            manifest: "vapor/vapor",
            import: "Vapor",
        },
        FrameworkMarker {
            framework: "swiftui",
            manifest: "",
            import: "SwiftUI",
        },
        FrameworkMarker {
            framework: "uikit",
            manifest: "",
            import: "UIKit",
        },
    ],
    manifests: &["Package.swift"],
    read_manifest,
};

fn read_manifest(_file_name: &str, text: &str) -> ManifestInfo {
    let name = PACKAGE_NAME
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let targets = TARGET
        .as_ref()
        .map(|re| {
            re.captures_iter(text)
                .filter_map(|c| {
                    let kind = match c.get(1)?.as_str() {
                        "executableTarget" => "executable",
                        "testTarget" => "test",
                        _ => "library",
                    };
                    Some(BuildTarget {
                        name: c.get(2)?.as_str().to_string(),
                        kind: kind.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    ManifestInfo { name, targets }
}

fn profile() -> ScorerProfile {
    ScorerProfile::new(Language::Swift)
        .with_convention("vapor", &["controllers", "models", "migrations", "routes.swift", "configure.swift"])
        .with_convention("swiftui", &["views", "view.swift", "viewmodel", "app.swift"])
        .with_convention("uikit", &["viewcontroller", "appdelegate", "scenedelegate", "storyboard"])
        .with_entry_points(&["main.swift", "app.swift", "appdelegate.swift", "configure.swift"])
}

pub fn plugin(config: &Config, registry: Option<Arc<dyn RegistryClient>>) -> Result<LanguagePlugin> {
    let descriptor = PluginDescriptor::new("swift", Language::Swift, 90)
        .with_manifests(&["Package.swift"])
        .with_extensions(SWIFT.extensions);
    assemble(descriptor, SWIFT, Ecosystem::SwiftPM, profile(), config, registry)
}
