//! V8 isolate wrapper for extension execution.
//!
//! Each extension runs in its own isolate for memory isolation and crash
//! containment. The only globals an extension sees are the ones the
//! bootstrap installs; there is no ambient access to host resources.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};

use super::error::{ExtensionError, ExtensionResult};
use super::ipc::{volley_extension, ExtensionContext, InvocationPayload, InvokeResult};
use super::manifest::Manifest;
use super::ExtensionId;

/// API shim and polyfills executed before any extension code.
static BOOTSTRAP: &str = include_str!("bootstrap.js");

/// State of an extension isolate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IsolateState {
    /// Not yet loaded into memory.
    Unloaded,
    /// Currently loading (initializing runtime, running top-level code).
    Loading,
    /// Ready to dispatch events.
    Ready,
    /// Currently running a handler.
    Executing { event: String },
    /// Load failed; no handlers are callable until a reload.
    Error { message: String },
}

/// Wrapper around a `JsRuntime` for a single extension.
pub struct ExtensionIsolate {
    pub identity: ExtensionId,

    pub manifest: Manifest,

    /// Path to the extension directory.
    pub extension_dir: PathBuf,

    pub state: IsolateState,

    /// Last time this isolate was used.
    pub last_active: Instant,

    /// The V8 runtime (None when unloaded).
    runtime: Option<JsRuntime>,
}

impl ExtensionIsolate {
    /// Create a new isolate for an extension (starts unloaded).
    pub fn new(identity: ExtensionId, manifest: Manifest, extension_dir: PathBuf) -> Self {
        Self {
            identity,
            manifest,
            extension_dir,
            state: IsolateState::Unloaded,
            last_active: Instant::now(),
            runtime: None,
        }
    }

    /// Load the extension: create the runtime, install the bootstrap, and
    /// run each script entry's top-level code.
    ///
    /// A top-level throw means the extension fails to activate: the error is
    /// recorded, no handlers are callable, and the load is not retried until
    /// the isolate is dropped or explicitly unloaded.
    pub fn load(&mut self, ctx: ExtensionContext) -> ExtensionResult<()> {
        if self.state == IsolateState::Ready {
            return Ok(());
        }

        self.state = IsolateState::Loading;

        let options = RuntimeOptions {
            extensions: vec![volley_extension::init_ops()],
            ..Default::default()
        };
        let mut runtime = JsRuntime::new(options);

        runtime.op_state().borrow_mut().put(ctx);

        if let Err(e) = runtime.execute_script("volley:bootstrap", BOOTSTRAP) {
            return Err(self.fail_load(format!("bootstrap failed: {e}")));
        }

        // Each distinct entry file runs once, in declaration order.
        let mut entries: Vec<String> = Vec::new();
        for script in &self.manifest.scripts {
            if !entries.contains(&script.entry) {
                entries.push(script.entry.clone());
            }
        }
        for entry in entries {
            let entry_path = self.extension_dir.join(&entry);
            let code = match std::fs::read_to_string(&entry_path) {
                Ok(code) => code,
                Err(e) => {
                    return Err(
                        self.fail_load(format!("read {} failed: {e}", entry_path.display()))
                    );
                }
            };
            if let Err(e) = runtime.execute_script("volley:extension", code) {
                return Err(self.fail_load(e.to_string()));
            }
        }

        self.runtime = Some(runtime);
        self.state = IsolateState::Ready;
        self.last_active = Instant::now();
        Ok(())
    }

    fn fail_load(&mut self, message: String) -> ExtensionError {
        self.runtime = None;
        self.state = IsolateState::Error {
            message: message.clone(),
        };
        ExtensionError::Load {
            identity: self.identity.clone(),
            message,
        }
    }

    /// Dispatch one event into the isolate and drive it to settlement.
    ///
    /// The payload carries the freshly resolved settings view; per-invocation
    /// state in the `OpState` context is reset before the handler runs. A
    /// watchdog thread terminates V8 if the invocation wall clock expires, so
    /// a busy-looping handler is fatal to the invocation, not the host.
    pub fn invoke(
        &mut self,
        rt: &tokio::runtime::Runtime,
        payload: &InvocationPayload,
        timeout: Duration,
    ) -> ExtensionResult<InvokeResult> {
        match &self.state {
            IsolateState::Error { message } => {
                return Err(ExtensionError::Load {
                    identity: self.identity.clone(),
                    message: message.clone(),
                });
            }
            IsolateState::Unloaded | IsolateState::Loading => {
                return Err(ExtensionError::Load {
                    identity: self.identity.clone(),
                    message: "isolate not loaded".to_string(),
                });
            }
            _ => {}
        }
        let runtime = self.runtime.as_mut().ok_or_else(|| ExtensionError::Load {
            identity: self.identity.clone(),
            message: "runtime not initialized".to_string(),
        })?;

        self.state = IsolateState::Executing {
            event: payload.event.clone(),
        };
        self.last_active = Instant::now();

        {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            let ctx = op_state.borrow_mut::<ExtensionContext>();
            ctx.begin_invocation(payload.settings.clone());
        }

        let payload_json = serde_json::to_string(payload)?;
        let call = format!(
            "globalThis.__volley_dispatch({})",
            serde_json::to_string(&payload_json)?
        );

        // Watchdog: terminate V8 execution if the handler neither settles nor
        // yields within the invocation window.
        let isolate_handle = runtime.v8_isolate().thread_safe_handle();
        let terminated = Arc::new(AtomicBool::new(false));
        let watchdog_flag = Arc::clone(&terminated);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let watchdog = thread::spawn(move || {
            if matches!(
                done_rx.recv_timeout(timeout),
                Err(mpsc::RecvTimeoutError::Timeout)
            ) {
                watchdog_flag.store(true, Ordering::SeqCst);
                isolate_handle.terminate_execution();
            }
        });

        let exec_result = runtime
            .execute_script("volley:invoke", call)
            .map(|_| ())
            .and_then(|()| rt.block_on(runtime.run_event_loop(PollEventLoopOptions::default())));

        let _ = done_tx.send(());
        let _ = watchdog.join();

        if terminated.load(Ordering::SeqCst) {
            // The isolate's JS state is suspect after a forced termination;
            // drop it so the next event reloads from scratch.
            self.runtime = None;
            self.state = IsolateState::Unloaded;
            return Err(ExtensionError::Timeout {
                identity: self.identity.clone(),
                seconds: timeout.as_secs(),
            });
        }

        if let Err(e) = exec_result {
            self.state = IsolateState::Ready;
            self.last_active = Instant::now();
            return Err(ExtensionError::Handler {
                identity: self.identity.clone(),
                message: e.to_string(),
            });
        }

        let (settle, continued) = {
            let op_state = runtime.op_state();
            let mut op_state = op_state.borrow_mut();
            let ctx = op_state.borrow_mut::<ExtensionContext>();
            (ctx.take_settle(), ctx.continue_requested)
        };

        self.state = IsolateState::Ready;
        self.last_active = Instant::now();

        match settle {
            Some(settle) => Ok(InvokeResult { settle, continued }),
            // Event loop drained without a settlement: the handler returned a
            // promise that can never settle.
            None => Err(ExtensionError::Timeout {
                identity: self.identity.clone(),
                seconds: timeout.as_secs(),
            }),
        }
    }

    /// Unload the extension from memory.
    pub fn unload(&mut self) {
        self.runtime = None;
        self.state = IsolateState::Unloaded;
    }

    /// Check if this isolate has been idle longer than the given duration.
    pub fn is_idle(&self, timeout: Duration) -> bool {
        self.last_active.elapsed() > timeout
    }
}
