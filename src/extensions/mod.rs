//! Extension system for the Volley download engine.
//!
//! This module provides the infrastructure for running untrusted JavaScript
//! extensions inside embedded V8 isolates.
//!
//! # Architecture
//!
//! ```text
//! ExtensionHost
//! ├── extensions: Vec<InstalledExtension>      (durable registry)
//! ├── isolates: HashMap<ExtensionId, ExtensionIsolate>
//! └── runtime: tokio current-thread Runtime    (drives event loops)
//!
//! engine ──invoke(event, task)──▶ host
//!   host: resolve settings ─▶ build payload ─▶ isolate dispatch
//!   isolate: bootstrap ctx ─▶ handler ─▶ await settlement ─▶ settle op
//!   host: validate ctx.res / ctx.task mutations ─▶ outcome to engine
//! ```
//!
//! Extensions are loaded on demand when a matching event fires. Isolates
//! stay warm until idle-timeout or LRU eviction. Each extension sees only
//! the capability objects the bootstrap injects: a logger, its settings
//! view, and its own storage namespace — a handler that throws fails its
//! invocation, never the host.

mod dispatcher;
mod error;
mod host;
mod ipc;
mod isolate;
mod manifest;
pub mod settings;
mod storage;

pub use dispatcher::{ErrorAction, Event};
pub use error::{ExtensionError, ExtensionResult};
pub use host::{ExtensionHost, ExtensionHostConfig, InstalledExtension};
pub use ipc::{ErrorInfo, ExtensionInfo};
pub use manifest::{Manifest, MatchRule, Repository, ScriptConfig};
pub use settings::{SettingOption, SettingSchema, SettingType};
pub use storage::ExtensionStorage;

/// Unique identifier for an installed extension (`author@name`).
pub type ExtensionId = String;
