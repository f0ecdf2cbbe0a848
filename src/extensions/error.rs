//! Error types for the extension system.

use std::path::PathBuf;

use thiserror::Error;

use super::settings::SettingType;

/// Errors that can occur in the extension system.
///
/// The handler-facing variants draw a hard line between "your code crashed"
/// ([`ExtensionError::Handler`]), "your code ran but produced garbage"
/// ([`ExtensionError::Validation`]) and "your code never got to run"
/// ([`ExtensionError::Load`], [`ExtensionError::SettingsType`]).
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Extension directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("manifest.json not found in extension: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest in {path}: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    #[error("Extension '{0}' not found")]
    ExtensionNotFound(String),

    /// Top-level script execution failed before any handler registered.
    /// The extension fails to activate and none of its handlers are callable.
    #[error("Failed to load extension '{identity}': {message}")]
    Load { identity: String, message: String },

    /// A registered handler threw, or its asynchronous result rejected.
    /// The extension stays loaded and later events still invoke it.
    #[error("Extension '{identity}' handler failed: {message}")]
    Handler { identity: String, message: String },

    /// The handler settled cleanly but produced a malformed result shape.
    #[error("Extension '{identity}' produced an invalid result: {message}")]
    Validation { identity: String, message: String },

    /// An override value could not be coerced to the declared setting type.
    /// Raised at settings-resolution time, before the handler runs.
    #[error("Setting '{key}' cannot be coerced to {expected}: {value}")]
    SettingsType {
        key: String,
        expected: SettingType,
        value: String,
    },

    /// The handler did not settle within the invocation window.
    #[error("Extension '{identity}' invocation timed out after {seconds}s")]
    Timeout { identity: String, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtensionError {
    /// Whether this is a per-invocation handler failure (including timeouts)
    /// rather than a structural or host-level problem.
    pub fn is_handler_failure(&self) -> bool {
        matches!(
            self,
            ExtensionError::Handler { .. } | ExtensionError::Timeout { .. }
        )
    }
}

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;
