//! Wire types crossing the host ↔ isolate boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::{Request, Task};

/// Opaque error description passed to `onError` handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Static extension metadata exposed to scripts as `volley.info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    pub identity: String,
    pub name: String,
    pub author: String,
    pub title: String,
    pub version: String,
}

/// Per-invocation payload handed to the JS dispatch function. The bootstrap
/// materializes the handler-facing `ctx` from this.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationPayload {
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub req: Option<Request>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,

    /// Effective settings view, already resolved.
    pub settings: Map<String, Value>,
}

/// What the bootstrap reports back once an invocation settles.
///
/// `res`/`req` come back as raw JSON: the handler may have produced any
/// shape, and distinguishing "malformed" from "crashed" happens on the Rust
/// side during validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SettleMessage {
    /// No handler registered for the event; the engine falls back to its
    /// default behavior.
    NoHandler,

    /// Handler settled without throwing.
    Ok {
        #[serde(default)]
        res: Option<Value>,
        #[serde(default)]
        req: Option<Value>,
    },

    /// Handler threw, or its asynchronous result rejected.
    Failed { message: String },
}

/// Result of driving one invocation to completion.
#[derive(Debug)]
pub struct InvokeResult {
    pub settle: SettleMessage,

    /// Whether the handler called `ctx.continue()`.
    pub continued: bool,
}
