//! Per-isolate context for extension execution.
//!
//! `ExtensionContext` holds everything an extension needs while its code
//! runs: identity, storage namespace, the current effective settings view,
//! and the settlement slot the bootstrap writes into. It is stored in the
//! isolate's `OpState` and accessed by ops.

use serde_json::{Map, Value};

use super::super::storage::ExtensionStorage;
use super::types::{ExtensionInfo, SettleMessage};

const LOG_TARGET: &str = "volley::extension";

/// Context provided to an extension isolate, refreshed per invocation.
pub struct ExtensionContext {
    /// Static extension metadata.
    pub info: ExtensionInfo,

    /// Dev-mode installs get debug-level script logging.
    pub dev_mode: bool,

    /// Extension-specific storage namespace.
    pub storage: ExtensionStorage,

    /// Effective settings view for the current invocation.
    pub settings: Map<String, Value>,

    /// Whether the current handler called `ctx.continue()`.
    pub continue_requested: bool,

    /// Settlement recorded by the bootstrap when the handler finishes.
    settle: Option<SettleMessage>,
}

impl ExtensionContext {
    pub fn new(info: ExtensionInfo, storage: ExtensionStorage, dev_mode: bool) -> Self {
        Self {
            info,
            dev_mode,
            storage,
            settings: Map::new(),
            continue_requested: false,
            settle: None,
        }
    }

    /// Reset per-invocation state and install the freshly resolved settings.
    pub fn begin_invocation(&mut self, settings: Map<String, Value>) {
        self.settings = settings;
        self.continue_requested = false;
        self.settle = None;
    }

    /// Record the handler's settlement. First write wins.
    pub fn record_settle(&mut self, msg: SettleMessage) {
        if self.settle.is_none() {
            self.settle = Some(msg);
        }
    }

    pub fn take_settle(&mut self) -> Option<SettleMessage> {
        self.settle.take()
    }

    /// Script logging sink. Debug messages are only emitted for dev-mode
    /// installs; failures never reach the script.
    pub fn log(&self, level: &str, message: &str) {
        let identity = self.info.identity.as_str();
        match level {
            "debug" => {
                if self.dev_mode {
                    tracing::debug!(target: LOG_TARGET, identity, "{message}");
                }
            }
            "info" => tracing::info!(target: LOG_TARGET, identity, "{message}"),
            "warn" => tracing::warn!(target: LOG_TARGET, identity, "{message}"),
            _ => tracing::error!(target: LOG_TARGET, identity, "{message}"),
        }
    }
}
