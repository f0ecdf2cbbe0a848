//! Ops exposed to extension scripts.
//!
//! Each op is exposed via deno_core's #[op2] macro and registered with the
//! volley_extension declaration at the bottom. All ops are synchronous: the
//! storage layer is a local file-backed store and must never block on
//! network I/O.

use deno_core::{error::AnyError, op2, OpState};

use super::context::ExtensionContext;
use super::types::{ExtensionInfo, SettleMessage};

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Write a message to the host logging sink. Never fails.
#[op2(fast)]
fn op_volley_log(state: &mut OpState, #[string] level: String, #[string] message: String) {
    let ctx = state.borrow::<ExtensionContext>();
    ctx.log(&level, &message);
}

// ─────────────────────────────────────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────────────────────────────────────

/// Get a value from extension storage. `null` if absent.
#[op2]
#[string]
fn op_volley_storage_get(state: &mut OpState, #[string] key: String) -> Option<String> {
    state.borrow::<ExtensionContext>().storage.get(&key)
}

/// Upsert a value in extension storage.
#[op2(fast)]
fn op_volley_storage_set(state: &mut OpState, #[string] key: String, #[string] value: String) {
    state
        .borrow_mut::<ExtensionContext>()
        .storage
        .set(&key, value);
}

/// Remove a key from extension storage. No-op if absent.
#[op2(fast)]
fn op_volley_storage_remove(state: &mut OpState, #[string] key: String) {
    state.borrow_mut::<ExtensionContext>().storage.remove(&key);
}

/// All current keys in the extension's namespace.
#[op2]
#[serde]
fn op_volley_storage_keys(state: &mut OpState) -> Vec<String> {
    state.borrow::<ExtensionContext>().storage.keys()
}

/// Remove every key in the extension's namespace.
#[op2(fast)]
fn op_volley_storage_clear(state: &mut OpState) {
    state.borrow_mut::<ExtensionContext>().storage.clear();
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings and metadata
// ─────────────────────────────────────────────────────────────────────────────

/// The effective settings view for the current invocation.
#[op2]
#[serde]
fn op_volley_settings(state: &mut OpState) -> serde_json::Value {
    serde_json::Value::Object(state.borrow::<ExtensionContext>().settings.clone())
}

/// Static extension metadata.
#[op2]
#[serde]
fn op_volley_extension_info(state: &mut OpState) -> ExtensionInfo {
    state.borrow::<ExtensionContext>().info.clone()
}

// ─────────────────────────────────────────────────────────────────────────────
// Invocation lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Mark the current task for retry. Only wired into `ctx.continue()` on
/// error events.
#[op2(fast)]
fn op_volley_task_continue(state: &mut OpState) {
    state.borrow_mut::<ExtensionContext>().continue_requested = true;
}

/// Record the settlement of the current invocation. Called exactly once by
/// the bootstrap when the handler (or its returned promise) finishes.
#[op2(fast)]
fn op_volley_invoke_settle(state: &mut OpState, #[string] payload: String) -> Result<(), AnyError> {
    let msg: SettleMessage = serde_json::from_str(&payload)
        .map_err(|e| anyhow::anyhow!("invalid settle payload: {e}"))?;
    state.borrow_mut::<ExtensionContext>().record_settle(msg);
    Ok(())
}

deno_core::extension!(
    volley_extension,
    ops = [
        op_volley_log,
        op_volley_storage_get,
        op_volley_storage_set,
        op_volley_storage_remove,
        op_volley_storage_keys,
        op_volley_storage_clear,
        op_volley_settings,
        op_volley_extension_info,
        op_volley_task_continue,
        op_volley_invoke_settle,
    ],
);
