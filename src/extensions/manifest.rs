//! Extension manifest parsing.
//!
//! Each extension ships a `manifest.json` that defines:
//! - Extension metadata (name, author, title, version, ...)
//! - Activation scripts (event + match rules + entry file)
//! - Declared settings schema (see [`super::settings`])

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::matcher;
use crate::model::Request;

use super::error::{ExtensionError, ExtensionResult};
use super::settings::SettingSchema;

/// Complete extension manifest parsed from `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Unique name within the author's namespace.
    pub name: String,

    #[serde(default)]
    pub author: String,

    /// Human-readable display name.
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub icon: String,

    /// Semantic version string, like "1.0.0".
    pub version: String,

    #[serde(default)]
    pub homepage: String,

    #[serde(default)]
    pub repository: Option<Repository>,

    /// Activation scripts. An extension with no scripts never runs.
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,

    /// Declared settings schema; immutable after load.
    #[serde(default)]
    pub settings: Vec<SettingSchema>,
}

impl Manifest {
    /// Load a manifest from a directory containing `manifest.json`.
    pub fn load(extension_dir: &Path) -> ExtensionResult<Self> {
        let manifest_path = extension_dir.join("manifest.json");

        if !manifest_path.exists() {
            return Err(ExtensionError::ManifestNotFound(
                extension_dir.to_path_buf(),
            ));
        }

        let content = std::fs::read_to_string(&manifest_path)?;

        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|e| ExtensionError::ManifestInvalid {
                path: manifest_path.clone(),
                message: e.to_string(),
            })?;
        manifest.validate().map_err(|message| {
            ExtensionError::ManifestInvalid {
                path: manifest_path,
                message,
            }
        })?;
        Ok(manifest)
    }

    /// Validate required fields and constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.title.is_empty() {
            return Err("title is required".to_string());
        }
        if self.version.is_empty() {
            return Err("version is required".to_string());
        }
        for script in &self.scripts {
            if script.event.is_empty() {
                return Err("script.event is required".to_string());
            }
            if script.entry.is_empty() {
                return Err(format!("script '{}' requires an entry file", script.event));
            }
        }
        Ok(())
    }

    /// Globally unique identity: `author@name`, or bare `name` when the
    /// author field is empty.
    pub fn identity(&self) -> String {
        if self.author.is_empty() {
            self.name.clone()
        } else {
            format!("{}@{}", self.author, self.name)
        }
    }
}

/// Source repository info.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub url: String,

    #[serde(default)]
    pub directory: String,
}

/// One activation script: which event it reacts to, which requests activate
/// it, and the entry file to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// Activation event name, e.g. "onResolve".
    pub event: String,

    /// Match rules. A script with no rules never fires.
    #[serde(default)]
    pub r#match: Option<MatchRule>,

    /// Entry script path relative to the extension directory.
    pub entry: String,
}

impl ScriptConfig {
    /// Whether this script activates for the given event and request.
    pub fn matches(&self, event: &str, req: &Request) -> bool {
        if self.event.is_empty() || self.event != event {
            return false;
        }
        let Some(rule) = &self.r#match else {
            return false;
        };
        if rule.urls.is_empty() && rule.labels.is_empty() {
            return false;
        }

        if rule
            .urls
            .iter()
            .any(|pattern| matcher::match_url(pattern, &req.url))
        {
            return true;
        }

        rule.labels
            .iter()
            .any(|label| req.labels.contains_key(label))
    }
}

/// Request match rules for an activation script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    /// URL match patterns, Chrome match-pattern style.
    #[serde(default)]
    pub urls: Vec<String>,

    /// Request labels; any present label activates.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::settings::SettingType;

    fn parse(json: &str) -> Manifest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = parse(
            r#"{
                "name": "test",
                "title": "Test Extension",
                "version": "1.0.0"
            }"#,
        );
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.identity(), "test");
        assert!(manifest.scripts.is_empty());
        assert!(manifest.settings.is_empty());
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = parse(
            r#"{
                "name": "release-grabber",
                "author": "acme",
                "title": "Release Grabber",
                "description": "Resolves release pages into asset downloads",
                "version": "0.2.1",
                "repository": {"url": "https://example.com/acme/release-grabber"},
                "scripts": [
                    {
                        "event": "onResolve",
                        "match": {"urls": ["*://github.com/*"], "labels": ["release"]},
                        "entry": "index.js"
                    }
                ],
                "settings": [
                    {"name": "token", "title": "API token", "type": "string"},
                    {"name": "limit", "title": "Asset limit", "type": "number", "default": 5}
                ]
            }"#,
        );
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.identity(), "acme@release-grabber");
        assert_eq!(manifest.scripts.len(), 1);
        assert_eq!(manifest.settings[1].setting_type, SettingType::Number);
    }

    #[test]
    fn test_validate_missing_fields() {
        let manifest = parse(r#"{"name": "", "title": "T", "version": "1.0.0"}"#);
        assert!(manifest.validate().is_err());

        let manifest = parse(
            r#"{
                "name": "x", "title": "T", "version": "1.0.0",
                "scripts": [{"event": "onResolve", "entry": ""}]
            }"#,
        );
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_script_matching() {
        let script: ScriptConfig = serde_json::from_str(
            r#"{
                "event": "onResolve",
                "match": {"urls": ["*://github.com/*"], "labels": ["test"]},
                "entry": "index.js"
            }"#,
        )
        .unwrap();

        let url_req = Request::new("https://github.com/owner/repo");
        assert!(script.matches("onResolve", &url_req));
        assert!(!script.matches("onError", &url_req));

        let mut label_req = Request::new("https://elsewhere.example/");
        assert!(!script.matches("onResolve", &label_req));
        label_req
            .labels
            .insert("test".to_string(), "true".to_string());
        assert!(script.matches("onResolve", &label_req));
    }

    #[test]
    fn test_script_without_rules_never_matches() {
        let script: ScriptConfig =
            serde_json::from_str(r#"{"event": "onResolve", "entry": "index.js"}"#).unwrap();
        let req = Request::new("https://github.com/x");
        assert!(!script.matches("onResolve", &req));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ExtensionError::ManifestNotFound(_)));
    }
}
