//! Volley - extension runtime for the Volley download engine.
//!
//! Volley lets untrusted third-party scripts customize how the engine
//! resolves and recovers downloads without touching its core. Each extension
//! runs in its own embedded V8 isolate with a capability-scoped API surface:
//! event registration, a logging sink, a resolved settings view, and a
//! durable per-extension storage namespace.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`config`] - Configuration loading and management
//! - [`model`] - The Request/Resource/Task contract shared with the engine
//! - [`matcher`] - URL match patterns for script activation
//! - [`extensions`] - The extension host, isolates, settings and storage
//! - [`hooks`] - Out-of-process hook scripts for terminal task events
//!
//! # Example
//!
//! ```ignore
//! use volley::{ExtensionHost, ExtensionHostConfig, Request};
//!
//! let mut host = ExtensionHost::new(ExtensionHostConfig::default())?;
//! host.install_from_folder(Path::new("./my-extension"), false)?;
//!
//! // Engine-side: offer extensions the chance to resolve a request.
//! if let Some(res) = host.on_resolve(&Request::new("https://github.com/..."))? {
//!     // download the files the extension described
//! }
//! ```
//!
//! Script-side, the injected `crypto` polyfill is backed by a pseudo-random
//! generator and is **not** cryptographically secure; identifiers derived
//! from it must not be treated as secrets.

pub mod config;
pub mod extensions;
pub mod hooks;
pub mod matcher;
pub mod model;

pub use config::Config;
pub use extensions::{
    ErrorAction, ErrorInfo, Event, ExtensionError, ExtensionHost, ExtensionHostConfig,
    ExtensionResult, InstalledExtension, Manifest,
};
pub use model::{FileInfo, Request, Resource, Task, TaskStatus};
