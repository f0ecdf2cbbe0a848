//! Extension host - manages installed extensions and their isolates.
//!
//! The `ExtensionHost` is responsible for:
//! - Installing extensions from folders and keeping the durable registry
//! - Loading/unloading isolates on demand, with LRU eviction
//! - Resolving each extension's effective settings per invocation
//! - Dispatching engine lifecycle events to matching extensions
//!
//! Invocations are serialized per extension instance (`&mut self`); distinct
//! extensions share nothing beyond the host itself.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::model::{Request, Resource, Task};

use super::dispatcher::{self, ErrorAction, Event};
use super::error::{ExtensionError, ExtensionResult};
use super::ipc::{ErrorInfo, ExtensionContext, ExtensionInfo, InvokeResult};
use super::isolate::{ExtensionIsolate, IsolateState};
use super::manifest::Manifest;
use super::settings;
use super::storage::ExtensionStorage;
use super::ExtensionId;

/// Directory entries never copied into the managed extensions dir.
const COPY_IGNORE: [&str; 2] = [".git", "node_modules"];

/// Configuration for the extension host.
#[derive(Debug, Clone)]
pub struct ExtensionHostConfig {
    /// Directory holding managed (non-dev) extension installs.
    pub extensions_dir: PathBuf,

    /// Host data directory: installed-extension registry and storage
    /// namespaces.
    pub data_dir: PathBuf,

    /// Maximum number of isolates to keep loaded.
    pub max_isolates: usize,

    /// How long to keep an isolate loaded after last use.
    pub idle_timeout: Duration,

    /// Maximum wall-clock time for a single handler invocation.
    pub invocation_timeout: Duration,
}

impl Default for ExtensionHostConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("volley"))
            .unwrap_or_else(|| PathBuf::from("~/.volley"));
        Self {
            extensions_dir: data_dir.join("extensions"),
            data_dir,
            max_isolates: 10,
            idle_timeout: Duration::from_secs(30),
            invocation_timeout: Duration::from_secs(30),
        }
    }
}

impl ExtensionHostConfig {
    /// Build a host config from the loaded application config.
    pub fn from_config(cfg: &crate::config::ExtensionsConfig) -> Self {
        let mut config = Self::default();
        if let Some(dir) = &cfg.directory {
            config.extensions_dir = dir.clone();
        }
        if let Some(dir) = &cfg.data_dir {
            config.data_dir = dir.clone();
        }
        config.max_isolates = cfg.max_isolates;
        config.idle_timeout = Duration::from_secs(cfg.idle_timeout_secs);
        config.invocation_timeout = Duration::from_secs(cfg.invocation_timeout_secs);
        config
    }
}

/// Durable record of one installed extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledExtension {
    pub identity: ExtensionId,

    pub manifest: Manifest,

    /// Disabled extensions are skipped by dispatch.
    #[serde(default)]
    pub disabled: bool,

    /// Dev-mode installs run from their source folder.
    #[serde(default)]
    pub dev_mode: bool,

    #[serde(default)]
    pub dev_path: Option<PathBuf>,

    /// User-supplied setting override values, keyed by schema entry name.
    #[serde(default)]
    pub setting_values: HashMap<String, Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstalledExtension {
    fn new(manifest: Manifest, dev_mode: bool, dev_path: Option<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            identity: manifest.identity(),
            manifest,
            disabled: false,
            dev_mode,
            dev_path,
            setting_values: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a reinstall: user setting values survive only for entries that
    /// still exist in the new schema with an unchanged type.
    fn update_from(&mut self, manifest: Manifest, dev_mode: bool, dev_path: Option<PathBuf>) {
        let old_types: HashMap<String, settings::SettingType> = self
            .manifest
            .settings
            .iter()
            .map(|s| (s.name.clone(), s.setting_type))
            .collect();
        self.setting_values.retain(|key, _| {
            manifest
                .settings
                .iter()
                .any(|s| &s.name == key && old_types.get(key) == Some(&s.setting_type))
        });
        self.manifest = manifest;
        self.dev_mode = dev_mode;
        self.dev_path = dev_path;
        self.updated_at = Utc::now();
    }
}

/// The extension host: composition root of the extension system.
pub struct ExtensionHost {
    config: ExtensionHostConfig,

    /// Installed extensions, in install order.
    extensions: Vec<InstalledExtension>,

    /// Loaded isolates by extension identity.
    isolates: HashMap<ExtensionId, ExtensionIsolate>,

    /// Order of isolate loading (for LRU eviction).
    load_order: Vec<ExtensionId>,

    /// Current-thread runtime driving isolate event loops.
    runtime: tokio::runtime::Runtime,
}

impl ExtensionHost {
    /// Create a host and load the installed-extension registry.
    pub fn new(config: ExtensionHostConfig) -> ExtensionResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let mut host = Self {
            config,
            extensions: Vec::new(),
            isolates: HashMap::new(),
            load_order: Vec::new(),
            runtime,
        };
        host.load_registry()?;
        Ok(host)
    }

    fn registry_path(&self) -> PathBuf {
        self.config.data_dir.join("extensions.json")
    }

    fn storage_dir(&self) -> PathBuf {
        self.config.data_dir.join("storage")
    }

    fn load_registry(&mut self) -> ExtensionResult<()> {
        let path = self.registry_path();
        if !path.exists() {
            return Ok(());
        }
        let content = fs::read_to_string(&path)?;
        self.extensions = serde_json::from_str(&content)?;
        Ok(())
    }

    fn save_registry(&self) -> ExtensionResult<()> {
        fs::create_dir_all(&self.config.data_dir)?;
        let content = serde_json::to_string_pretty(&self.extensions)?;
        fs::write(self.registry_path(), content)?;
        Ok(())
    }

    /// Install (or reinstall) an extension from a folder.
    ///
    /// Non-dev installs are copied into the managed extensions directory,
    /// skipping VCS and dependency litter. Dev installs run from their
    /// source folder. Returns the extension identity.
    pub fn install_from_folder(
        &mut self,
        path: &Path,
        dev_mode: bool,
    ) -> ExtensionResult<ExtensionId> {
        if !path.is_dir() {
            return Err(ExtensionError::DirectoryNotFound(path.to_path_buf()));
        }
        let manifest = Manifest::load(path)?;
        let identity = manifest.identity();

        let dev_path = if dev_mode {
            Some(fs::canonicalize(path)?)
        } else {
            let dest = self.config.extensions_dir.join(&identity);
            copy_dir(path, &dest)?;
            None
        };

        match self.extensions.iter_mut().find(|e| e.identity == identity) {
            Some(existing) => existing.update_from(manifest, dev_mode, dev_path),
            None => self
                .extensions
                .push(InstalledExtension::new(manifest, dev_mode, dev_path)),
        }

        // Force a fresh isolate so the next event picks up the new code.
        self.drop_isolate(&identity);
        self.save_registry()?;
        Ok(identity)
    }

    /// Uninstall an extension: files (non-dev), registry record, and the
    /// storage namespace.
    pub fn uninstall(&mut self, identity: &str) -> ExtensionResult<()> {
        let index = self
            .extensions
            .iter()
            .position(|e| e.identity == identity)
            .ok_or_else(|| ExtensionError::ExtensionNotFound(identity.to_string()))?;
        let ext = self.extensions.remove(index);

        if !ext.dev_mode {
            let dir = self.config.extensions_dir.join(identity);
            if dir.exists() {
                fs::remove_dir_all(&dir)?;
            }
        }
        ExtensionStorage::delete_namespace(&self.storage_dir(), identity);
        self.drop_isolate(identity);
        self.save_registry()
    }

    /// All installed extensions, in install order.
    pub fn extensions(&self) -> &[InstalledExtension] {
        &self.extensions
    }

    pub fn get(&self, identity: &str) -> ExtensionResult<&InstalledExtension> {
        self.extensions
            .iter()
            .find(|e| e.identity == identity)
            .ok_or_else(|| ExtensionError::ExtensionNotFound(identity.to_string()))
    }

    /// Store user setting override values. Keys outside the declared schema
    /// are ignored; coercion happens at resolution time, per invocation.
    pub fn update_settings(
        &mut self,
        identity: &str,
        values: HashMap<String, Value>,
    ) -> ExtensionResult<()> {
        let ext = self
            .extensions
            .iter_mut()
            .find(|e| e.identity == identity)
            .ok_or_else(|| ExtensionError::ExtensionNotFound(identity.to_string()))?;
        for (key, value) in values {
            if ext.manifest.settings.iter().any(|s| s.name == key) {
                ext.setting_values.insert(key, value);
            }
        }
        ext.updated_at = Utc::now();
        self.save_registry()
    }

    /// Enable or disable an extension. Disabled extensions are skipped by
    /// dispatch but keep their storage and settings.
    pub fn set_enabled(&mut self, identity: &str, enabled: bool) -> ExtensionResult<()> {
        let ext = self
            .extensions
            .iter_mut()
            .find(|e| e.identity == identity)
            .ok_or_else(|| ExtensionError::ExtensionNotFound(identity.to_string()))?;
        ext.disabled = !enabled;
        self.save_registry()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Ask extensions to resolve a request into a resource.
    ///
    /// Matching extensions are consulted in install order, each with a fresh
    /// context; the first one producing a valid resource wins. `None` means
    /// the engine should fall back to default resolution. Load failures are
    /// logged and skipped; handler, validation and settings failures
    /// propagate.
    pub fn on_resolve(&mut self, req: &Request) -> ExtensionResult<Option<Resource>> {
        for identity in self.matching_extensions(Event::Resolve, req) {
            match self.invoke_extension(&identity, Event::Resolve, Some(req), None, None) {
                Ok(result) => {
                    if let Some(resource) = dispatcher::resolve_outcome(&identity, result)? {
                        return Ok(Some(resource));
                    }
                }
                Err(e @ ExtensionError::Load { .. }) => {
                    tracing::warn!(identity = %identity, error = %e, "extension skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Offer extensions a chance to recover from a task error.
    ///
    /// The first extension that calls `ctx.continue()` decides; its mutated
    /// `task.meta.req` comes back in [`ErrorAction::Retry`]. Without a
    /// continuation the original error propagates unchanged.
    pub fn on_error(&mut self, task: &Task, error: &ErrorInfo) -> ExtensionResult<ErrorAction> {
        for identity in self.matching_extensions(Event::Error, &task.meta.req) {
            match self.invoke_extension(&identity, Event::Error, None, Some(task), Some(error)) {
                Ok(result) => {
                    if let Some(req) = dispatcher::error_outcome(&identity, task, result)? {
                        return Ok(ErrorAction::Retry(req));
                    }
                }
                Err(e @ ExtensionError::Load { .. }) => {
                    tracing::warn!(identity = %identity, error = %e, "extension skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(ErrorAction::Propagate)
    }

    /// Notify extensions that a task started.
    pub fn on_start(&mut self, task: &Task) -> ExtensionResult<()> {
        self.notify(Event::Start, task)
    }

    /// Notify extensions that a task finished.
    pub fn on_done(&mut self, task: &Task) -> ExtensionResult<()> {
        self.notify(Event::Done, task)
    }

    fn notify(&mut self, event: Event, task: &Task) -> ExtensionResult<()> {
        for identity in self.matching_extensions(event, &task.meta.req) {
            match self.invoke_extension(&identity, event, None, Some(task), None) {
                Ok(result) => dispatcher::notify_outcome(&identity, result)?,
                Err(e @ ExtensionError::Load { .. }) => {
                    tracing::warn!(identity = %identity, error = %e, "extension skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Identities of enabled extensions with a script matching this event
    /// and request.
    fn matching_extensions(&self, event: Event, req: &Request) -> Vec<ExtensionId> {
        self.extensions
            .iter()
            .filter(|ext| !ext.disabled)
            .filter(|ext| {
                ext.manifest
                    .scripts
                    .iter()
                    .any(|s| s.matches(event.as_str(), req))
            })
            .map(|ext| ext.identity.clone())
            .collect()
    }

    /// Run one invocation against one extension: resolve its settings,
    /// build the payload, make sure its isolate is warm, dispatch.
    fn invoke_extension(
        &mut self,
        identity: &str,
        event: Event,
        req: Option<&Request>,
        task: Option<&Task>,
        error: Option<&ErrorInfo>,
    ) -> ExtensionResult<InvokeResult> {
        let timeout = self.config.invocation_timeout;
        let payload = {
            let ext = self.get(identity)?;
            let view = settings::resolve(&ext.manifest.settings, &ext.setting_values)?;
            dispatcher::build_payload(event, req, task, error, view)
        };

        self.ensure_isolate_loaded(identity)?;
        let isolate = self.isolates.get_mut(identity).unwrap();
        isolate.invoke(&self.runtime, &payload, timeout)
    }

    fn ensure_isolate_loaded(&mut self, identity: &str) -> ExtensionResult<()> {
        let needs_load = match self.isolates.get(identity) {
            Some(isolate) => isolate.state == IsolateState::Unloaded,
            None => true,
        };

        if !self.isolates.contains_key(identity)
            && self.isolates.len() >= self.config.max_isolates
        {
            self.evict_lru_isolate();
        }

        let context = if needs_load {
            Some(self.create_context(identity)?)
        } else {
            None
        };

        if !self.isolates.contains_key(identity) {
            let ext = self.get(identity)?;
            let manifest = ext.manifest.clone();
            let dir = self.extension_path(ext);
            self.isolates.insert(
                identity.to_string(),
                ExtensionIsolate::new(identity.to_string(), manifest, dir),
            );
        }
        self.load_order.retain(|id| id != identity);
        self.load_order.push(identity.to_string());

        let isolate = self.isolates.get_mut(identity).unwrap();
        if isolate.state == IsolateState::Unloaded {
            if let Some(ctx) = context {
                isolate.load(ctx)?;
            }
        }
        Ok(())
    }

    /// Create the isolate context for an extension: storage bound to its
    /// namespace plus static metadata.
    fn create_context(&self, identity: &str) -> ExtensionResult<ExtensionContext> {
        let ext = self.get(identity)?;
        let storage = ExtensionStorage::new(&ext.identity, &self.storage_dir());
        let info = ExtensionInfo {
            identity: ext.identity.clone(),
            name: ext.manifest.name.clone(),
            author: ext.manifest.author.clone(),
            title: ext.manifest.title.clone(),
            version: ext.manifest.version.clone(),
        };
        Ok(ExtensionContext::new(info, storage, ext.dev_mode))
    }

    fn extension_path(&self, ext: &InstalledExtension) -> PathBuf {
        if ext.dev_mode {
            ext.dev_path
                .clone()
                .unwrap_or_else(|| self.config.extensions_dir.join(&ext.identity))
        } else {
            self.config.extensions_dir.join(&ext.identity)
        }
    }

    fn drop_isolate(&mut self, identity: &str) {
        self.isolates.remove(identity);
        self.load_order.retain(|id| id != identity);
    }

    /// Evict the least recently used isolate.
    fn evict_lru_isolate(&mut self) {
        if let Some(identity) = self.load_order.first().cloned() {
            if let Some(mut isolate) = self.isolates.remove(&identity) {
                isolate.unload();
            }
            self.load_order.retain(|id| id != &identity);
        }
    }

    /// Unload isolates idle longer than the configured timeout.
    pub fn cleanup_idle(&mut self) {
        let idle: Vec<ExtensionId> = self
            .isolates
            .iter()
            .filter(|(_, isolate)| isolate.is_idle(self.config.idle_timeout))
            .map(|(id, _)| id.clone())
            .collect();
        for identity in idle {
            self.drop_isolate(&identity);
        }
    }

    /// Explicitly unload one extension's isolate. Storage stays durable.
    pub fn unload(&mut self, identity: &str) {
        self.drop_isolate(identity);
    }

    /// Number of installed extensions.
    pub fn extension_count(&self) -> usize {
        self.extensions.len()
    }

    /// Number of currently loaded isolates.
    pub fn isolate_count(&self) -> usize {
        self.isolates.len()
    }
}

/// Copy an extension folder, skipping VCS and dependency directories.
fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;

    let walker = WalkDir::new(src).into_iter().filter_entry(|e| {
        e.file_name()
            .to_str()
            .map(|name| !COPY_IGNORE.contains(&name))
            .unwrap_or(true)
    });
    for entry in walker {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(std::io::Error::other)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
