//! Python plugin

use super::assemble;
use crate::config::Config;
use crate::error::Result;
use crate::plugins::dependencies::{Ecosystem, RegistryClient};
use crate::plugins::parser::{FrameworkMarker, ManifestInfo, SyntaxRules};
use crate::plugins::{LanguagePlugin, PluginDescriptor};
use crate::project::{BuildTarget, Language};
use crate::scoring::ScorerProfile;
use std::sync::Arc;

pub const PYTHON: SyntaxRules = SyntaxRules {
    language: Language::Python,
    extensions: &["py", "pyi"],
    imports: &[r"(?m)^\s*import\s+([\w.]+)", r"(?m)^\s*from\s+([\w.]+)\s+import"],
    classes: &[r"(?m)^\s*class\s+([A-Za-z_]\w*)"],
    functions: &[r"(?m)^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)"],
    exports: &[r"(?m)^(?:class|def|async\s+def)\s+([A-Za-z]\w*)"],
    branches: r"\b(?:if|elif|for|while|except|and|or)\b",
    frameworks: &[
        FrameworkMarker {
            framework: "django",
            manifest: "django",
            import: "django",
        },
        FrameworkMarker {
            framework: "fastapi",
            manifest: "fastapi",
            import: "fastapi",
        },
        FrameworkMarker {
            framework: "flask",
            manifest: "flask",
            import: "flask",
        },
    ],
    manifests: &["pyproject.toml", "setup.py", "requirements.txt", "Pipfile"],
    read_manifest,
};

fn read_manifest(file_name: &str, text: &str) -> ManifestInfo {
    match file_name {
        "pyproject.toml" => read_pyproject(text),
        "setup.py" => ManifestInfo {
            name: setup_py_name(text),
            targets: Vec::new(),
        },
        _ => ManifestInfo::default(),
    }
}

fn read_pyproject(text: &str) -> ManifestInfo {
    let Ok(doc) = toml::from_str::<toml::Value>(text) else {
        return ManifestInfo::default();
    };
    let poetry = doc.get("tool").and_then(|t| t.get("poetry"));
    let name = doc
        .get("project")
        .and_then(|p| p.get("name"))
        .or_else(|| poetry.and_then(|p| p.get("name")))
        .and_then(|n| n.as_str())
        .map(str::to_string);

    let scripts = doc
        .get("project")
        .and_then(|p| p.get("scripts"))
        .or_else(|| poetry.and_then(|p| p.get("scripts")))
        .and_then(|s| s.as_table());
    let targets = scripts
        .into_iter()
        .flat_map(|table| table.keys())
        .map(|name| BuildTarget {
            name: name.clone(),
            kind: "script".to_string(),
        })
        .collect();

    ManifestInfo { name, targets }
}

fn setup_py_name(text: &str) -> Option<String> {
    let start = text.find("name=")? + "name=".len();
    let rest = text[start..].trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let rest = &rest[1..];
    rest.find(quote).map(|end| rest[..end].to_string())
}

fn profile() -> ScorerProfile {
    ScorerProfile::new(Language::Python)
        .with_convention(
            "django",
            &["models.py", "views.py", "urls.py", "admin.py", "forms.py", "serializers.py", "settings.py"],
        )
        .with_convention("flask", &["app.py", "routes", "views.py", "models.py", "blueprints"])
        .with_convention("fastapi", &["main.py", "routers", "schemas.py", "models.py", "dependencies.py"])
        .with_entry_points(&["main.py", "app.py", "__main__.py", "manage.py", "wsgi.py", "asgi.py"])
}

pub fn plugin(config: &Config, registry: Option<Arc<dyn RegistryClient>>) -> Result<LanguagePlugin> {
    let descriptor = PluginDescriptor::new("python", Language::Python, 75)
        .with_manifests(&["pyproject.toml", "setup.py", "requirements.txt", "Pipfile"])
        .with_extensions(PYTHON.extensions);
    assemble(descriptor, PYTHON, Ecosystem::PyPI, profile(), config, registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pyproject_name_and_scripts() {
        let info = read_manifest(
            "pyproject.toml",
            "[project]\nname = \"blog\"\n[project.scripts]\nblog-admin = \"blog.cli:main\"\n",
        );
        assert_eq!(info.name.as_deref(), Some("blog"));
        assert_eq!(
            info.targets,
            vec![BuildTarget {
                name: "blog-admin".to_string(),
                kind: "script".to_string()
            }]
        );

        let poetry = read_manifest("pyproject.toml", "[tool.poetry]\nname = \"shop\"\n");
        assert_eq!(poetry.name.as_deref(), Some("shop"));
    }

    #[test]
    fn test_setup_py_name() {
        let info = read_manifest("setup.py", "from setuptools import setup\nsetup(name='legacy', version='1.0')\n");
        assert_eq!(info.name.as_deref(), Some("legacy"));
        assert_eq!(read_manifest("requirements.txt", "django"), ManifestInfo::default());
    }
}
