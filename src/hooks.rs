//! Out-of-process hook scripts.
//!
//! The simpler sibling of the in-process extension API: user-configured
//! scripts run as separate processes when a task reaches a terminal state.
//! Event data travels one way — environment variables plus a JSON document
//! on stdin — and the exit code is logged; unlike an in-process `onError`
//! handler a hook cannot mutate or retry the task.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use wait_timeout::ChildExt;

use crate::config::HooksConfig;
use crate::model::Task;

/// Terminal task events hooks fire on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HookEvent {
    DownloadDone,
    DownloadError,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::DownloadDone => "DOWNLOAD_DONE",
            HookEvent::DownloadError => "DOWNLOAD_ERROR",
        }
    }
}

/// JSON document written to a hook's stdin.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookData<'a> {
    event: HookEvent,
    /// Unix timestamp in milliseconds.
    time: i64,
    payload: HookPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HookPayload<'a> {
    task: &'a Task,
}

/// Outcome of one hook execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    Success,
    /// Non-zero exit; carries the code when the process was not killed by a
    /// signal.
    Failed(Option<i32>),
    TimedOut,
}

/// Fire all configured hooks for an event. Each hook runs on its own thread
/// so a slow script never stalls the engine; outcomes are logged.
pub fn trigger(config: &HooksConfig, event: HookEvent, task: &Task) {
    if !config.enable || config.paths.is_empty() {
        return;
    }
    let timeout = Duration::from_secs(config.timeout_secs);
    for path in &config.paths {
        let path = path.clone();
        let task = task.clone();
        thread::spawn(move || match run_hook(&path, event, &task, timeout) {
            Ok(HookOutcome::Success) => {
                tracing::debug!(path = %path.display(), event = event.as_str(), "hook succeeded");
            }
            Ok(HookOutcome::Failed(code)) => {
                tracing::warn!(path = %path.display(), event = event.as_str(), ?code, "hook failed");
            }
            Ok(HookOutcome::TimedOut) => {
                tracing::warn!(path = %path.display(), event = event.as_str(), "hook timed out");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), event = event.as_str(), error = %e, "hook failed to execute");
            }
        });
    }
}

/// Run a single hook script and wait for it, bounded by `timeout`.
pub fn run_hook(
    script: &Path,
    event: HookEvent,
    task: &Task,
    timeout: Duration,
) -> std::io::Result<HookOutcome> {
    if !script.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("hook script does not exist: {}", script.display()),
        ));
    }

    let mut cmd = interpreter_for(script);

    let file_name = task.name();
    let file_path = if task.meta.opts.path.is_empty() {
        PathBuf::from(&file_name)
    } else {
        Path::new(&task.meta.opts.path).join(&file_name)
    };

    cmd.env("EVENT", event.as_str())
        .env("TASK_NAME", &file_name)
        .env("FILE_PATH", &file_path)
        .env("FILE_NAME", &file_name)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = cmd.spawn()?;

    let data = HookData {
        event,
        time: chrono::Utc::now().timestamp_millis(),
        payload: HookPayload { task },
    };
    if let Some(mut stdin) = child.stdin.take() {
        // A hook that never reads stdin closes the pipe early; that's fine.
        let _ = stdin.write_all(serde_json::to_string(&data)?.as_bytes());
    }

    match child.wait_timeout(timeout)? {
        Some(status) if status.success() => Ok(HookOutcome::Success),
        Some(status) => Ok(HookOutcome::Failed(status.code())),
        None => {
            child.kill()?;
            child.wait()?;
            Ok(HookOutcome::TimedOut)
        }
    }
}

/// Pick an interpreter by file extension; unknown extensions are executed
/// directly (shebang or native executable).
fn interpreter_for(script: &Path) -> Command {
    let ext = script
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match ext {
        "sh" | "bash" => {
            let mut cmd = Command::new("bash");
            cmd.arg(script);
            cmd
        }
        "py" => {
            let mut cmd = Command::new("python3");
            cmd.arg(script);
            cmd
        }
        "js" => {
            let mut cmd = Command::new("node");
            cmd.arg(script);
            cmd
        }
        _ => Command::new(script),
    }
}
