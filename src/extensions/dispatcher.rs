//! Event dispatch: payload construction and outcome validation.
//!
//! The host owns the invocation lifecycle — build context, call, await
//! settlement, validate, propagate — and this module implements the
//! validate/propagate half. A handler that settled cleanly can still have
//! produced garbage; that is reported as a `Validation` error, distinct from
//! the `Handler` error a crash produces.

use std::fmt;

use serde_json::{Map, Value};

use crate::model::{Request, Resource, Task};

use super::error::{ExtensionError, ExtensionResult};
use super::ipc::{ErrorInfo, InvocationPayload, InvokeResult, SettleMessage};

/// Lifecycle events the host raises against extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Turn a raw request into a named, multi-file resource.
    Resolve,
    /// A task started.
    Start,
    /// A task failed; the extension may repair the request and retry.
    Error,
    /// A task finished.
    Done,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Resolve => "onResolve",
            Event::Start => "onStart",
            Event::Error => "onError",
            Event::Done => "onDone",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the engine should do after an `onError` dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorAction {
    /// Retry the task with this (possibly extension-mutated) request.
    Retry(Request),
    /// No recovery requested; the original task error propagates unchanged.
    Propagate,
}

/// Assemble the per-invocation payload handed to the isolate.
pub fn build_payload(
    event: Event,
    req: Option<&Request>,
    task: Option<&Task>,
    error: Option<&ErrorInfo>,
    settings: Map<String, Value>,
) -> InvocationPayload {
    InvocationPayload {
        event: event.as_str().to_string(),
        req: req.cloned(),
        task: task.cloned(),
        error: error.cloned(),
        settings,
    }
}

/// Map a `resolve` settlement to the engine-facing result.
///
/// A valid resource is sanitized and its total size recomputed before it
/// reaches the engine. `None` means the extension declined (no handler, or
/// the handler left `ctx.res` empty) and the engine falls back to default
/// resolution.
pub fn resolve_outcome(
    identity: &str,
    result: InvokeResult,
) -> ExtensionResult<Option<Resource>> {
    match result.settle {
        SettleMessage::NoHandler => Ok(None),
        SettleMessage::Failed { message } => Err(ExtensionError::Handler {
            identity: identity.to_string(),
            message,
        }),
        SettleMessage::Ok { res, .. } => match non_null(res) {
            None => Ok(None),
            Some(value) => {
                let mut resource: Resource =
                    serde_json::from_value(value).map_err(|e| ExtensionError::Validation {
                        identity: identity.to_string(),
                        message: format!("resource shape: {e}"),
                    })?;
                resource
                    .validate()
                    .map_err(|message| ExtensionError::Validation {
                        identity: identity.to_string(),
                        message,
                    })?;
                resource.sanitize_names();
                resource.calc_size();
                Ok(Some(resource))
            }
        },
    }
}

/// Map an `onError` settlement to the engine-facing action.
///
/// Recovery happens only when the handler explicitly called
/// `ctx.continue()`; the retry uses the task request as it stood when the
/// handler settled.
pub fn error_outcome(
    identity: &str,
    task: &Task,
    result: InvokeResult,
) -> ExtensionResult<Option<Request>> {
    match result.settle {
        SettleMessage::NoHandler => Ok(None),
        SettleMessage::Failed { message } => Err(ExtensionError::Handler {
            identity: identity.to_string(),
            message,
        }),
        SettleMessage::Ok { req, .. } => {
            if !result.continued {
                return Ok(None);
            }
            let request = match non_null(req) {
                Some(value) => {
                    serde_json::from_value(value).map_err(|e| ExtensionError::Validation {
                        identity: identity.to_string(),
                        message: format!("request shape: {e}"),
                    })?
                }
                None => task.meta.req.clone(),
            };
            validate_request(identity, &request)?;
            Ok(Some(request))
        }
    }
}

/// Map a notification settlement (`onStart` / `onDone`). Only failures are
/// interesting; these events carry no result back to the engine.
pub fn notify_outcome(identity: &str, result: InvokeResult) -> ExtensionResult<()> {
    match result.settle {
        SettleMessage::Failed { message } => Err(ExtensionError::Handler {
            identity: identity.to_string(),
            message,
        }),
        _ => Ok(()),
    }
}

fn validate_request(identity: &str, request: &Request) -> ExtensionResult<()> {
    request
        .validate()
        .map_err(|message| ExtensionError::Validation {
            identity: identity.to_string(),
            message,
        })
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok_result(res: Value, continued: bool) -> InvokeResult {
        InvokeResult {
            settle: SettleMessage::Ok {
                res: Some(res.clone()),
                req: Some(res),
            },
            continued,
        }
    }

    #[test]
    fn test_resolve_no_handler_falls_back() {
        let result = InvokeResult {
            settle: SettleMessage::NoHandler,
            continued: false,
        };
        assert_eq!(resolve_outcome("x", result).unwrap(), None);
    }

    #[test]
    fn test_resolve_failed_is_handler_error() {
        let result = InvokeResult {
            settle: SettleMessage::Failed {
                message: "boom".to_string(),
            },
            continued: false,
        };
        let err = resolve_outcome("x", result).unwrap_err();
        assert!(err.is_handler_failure());
    }

    #[test]
    fn test_resolve_valid_resource_is_finalized() {
        let res = json!({
            "name": "te:st",
            "files": [
                {"name": "a.txt", "size": 10},
                {"name": "b.txt", "size": 20}
            ]
        });
        let result = InvokeResult {
            settle: SettleMessage::Ok {
                res: Some(res),
                req: None,
            },
            continued: false,
        };
        let resource = resolve_outcome("x", result).unwrap().unwrap();
        assert_eq!(resource.name, "te_st");
        assert_eq!(resource.size, 30);
    }

    #[test]
    fn test_resolve_malformed_resource_is_validation_error() {
        // size of the wrong type: settled cleanly but produced garbage
        let res = json!({"name": "t", "files": [{"name": "a", "size": "big"}]});
        let result = InvokeResult {
            settle: SettleMessage::Ok {
                res: Some(res),
                req: None,
            },
            continued: false,
        };
        let err = resolve_outcome("x", result).unwrap_err();
        assert!(matches!(err, ExtensionError::Validation { .. }));

        // structurally valid JSON, invalid shape
        let res = json!({"name": "", "files": [{"name": "a", "size": 1}]});
        let result = InvokeResult {
            settle: SettleMessage::Ok {
                res: Some(res),
                req: None,
            },
            continued: false,
        };
        assert!(matches!(
            resolve_outcome("x", result),
            Err(ExtensionError::Validation { .. })
        ));
    }

    #[test]
    fn test_error_without_continue_propagates() {
        let task = Task::default();
        let result = ok_result(json!({"url": "https://example.com"}), false);
        assert_eq!(error_outcome("x", &task, result).unwrap(), None);
    }

    #[test]
    fn test_error_with_continue_returns_mutated_request() {
        let task = Task::default();
        let result = ok_result(json!({"url": "https://mutated.example"}), true);
        let req = error_outcome("x", &task, result).unwrap().unwrap();
        assert_eq!(req.url, "https://mutated.example");
    }

    #[test]
    fn test_error_continue_with_empty_url_is_validation_error() {
        let task = Task::default();
        let result = ok_result(json!({"url": ""}), true);
        assert!(matches!(
            error_outcome("x", &task, result),
            Err(ExtensionError::Validation { .. })
        ));
    }

    #[test]
    fn test_event_names() {
        assert_eq!(Event::Resolve.as_str(), "onResolve");
        assert_eq!(Event::Error.to_string(), "onError");
    }
}
