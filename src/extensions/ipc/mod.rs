//! IPC module for extension-to-host communication.
//!
//! This module is the bridge between JavaScript extensions running in V8
//! isolates and the Rust host. It uses deno_core's op2 system to expose the
//! capability surface (logging, storage, settings, invocation settlement) to
//! extension scripts; the per-isolate [`ExtensionContext`] lives in the
//! runtime's `OpState`.

mod context;
mod ops;
mod types;

pub use context::ExtensionContext;
pub use ops::volley_extension;
pub use types::{ErrorInfo, ExtensionInfo, InvocationPayload, InvokeResult, SettleMessage};
