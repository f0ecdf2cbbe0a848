//! Engine-facing data model.
//!
//! The host and the download engine talk through these types: a [`Request`]
//! goes in, an extension resolves it into a [`Resource`], and error recovery
//! works against a live [`Task`]. All of them cross the JS boundary and are
//! persisted as part of task state, so wire names are camelCase.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Characters that are invalid in file names on at least one supported
/// platform. Replaced with `_` before a resolved resource reaches the engine.
const INVALID_PATH_CHARS: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Replace invalid path characters in a file name with underscores.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| if INVALID_PATH_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// A download request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Request {
    pub url: String,

    /// Protocol extras (method, headers, body).
    pub extra: RequestExtra,

    /// Free-form labels attached by the engine or by extensions. Also used
    /// for script activation matching.
    pub labels: HashMap<String, String>,
}

impl Request {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Structural check used before the engine acts on a request an
    /// extension handed back.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("request url is required".to_string());
        }
        Ok(())
    }
}

/// Extra request data interpreted by the protocol layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestExtra {
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// One file of a resolved resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,

    /// Directory path relative to the resource root.
    pub path: String,

    /// Size in bytes. `0` when unknown.
    pub size: i64,

    /// Nested request used to fetch this file.
    pub req: Option<Request>,
}

/// What a `resolve` handler populates: a named, multi-file response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Resource {
    pub name: String,

    /// Total size in bytes, recomputed from the file list.
    pub size: i64,

    /// Whether the source supports ranged requests.
    pub range: bool,

    pub files: Vec<FileInfo>,
}

impl Resource {
    /// Structural check on a handler-produced resource: non-empty resource
    /// name, at least one file, every file named, no negative sizes.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("resource name is required".to_string());
        }
        if self.files.is_empty() {
            return Err("resource has no files".to_string());
        }
        for (i, file) in self.files.iter().enumerate() {
            if file.name.is_empty() {
                return Err(format!("file #{i} has no name"));
            }
            if file.size < 0 {
                return Err(format!("file '{}' has negative size", file.name));
            }
        }
        Ok(())
    }

    /// Recompute the total size as the sum of file sizes.
    pub fn calc_size(&mut self) {
        self.size = self.files.iter().map(|f| f.size).sum();
    }

    /// Replace invalid path characters in the resource and file names.
    pub fn sanitize_names(&mut self) {
        self.name = safe_filename(&self.name);
        for file in &mut self.files {
            file.name = safe_filename(&file.name);
        }
    }
}

/// Task lifecycle states as reported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Ready,
    Running,
    Pause,
    Wait,
    Error,
    Done,
}

/// User-facing download options attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskOptions {
    /// Override for the saved file or folder name.
    pub name: String,

    /// Destination directory.
    pub path: String,

    pub connections: u32,
}

/// Task metadata: the request being fetched plus the resolved resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskMeta {
    pub req: Request,
    pub res: Option<Resource>,
    pub opts: TaskOptions,
}

/// Handle to a live download task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub meta: TaskMeta,
}

impl Task {
    /// Display name: explicit option, then resolved resource name, then the
    /// single file name, then the last URL segment.
    pub fn name(&self) -> String {
        if !self.meta.opts.name.is_empty() {
            return self.meta.opts.name.clone();
        }
        if let Some(res) = &self.meta.res {
            if !res.name.is_empty() {
                return res.name.clone();
            }
            if let Some(file) = res.files.first() {
                if !file.name.is_empty() {
                    return file.name.clone();
                }
            }
        }
        self.meta
            .req
            .url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_file_resource() -> Resource {
        Resource {
            name: "test".to_string(),
            size: 0,
            range: false,
            files: (0..2)
                .map(|i| FileInfo {
                    name: format!("test-{i}.txt"),
                    path: String::new(),
                    size: 1024,
                    req: Some(Request::new(format!("https://example.com/{i}"))),
                })
                .collect(),
        }
    }

    #[test]
    fn test_resource_validate() {
        let res = two_file_resource();
        assert!(res.validate().is_ok());

        let mut unnamed = res.clone();
        unnamed.name.clear();
        assert!(unnamed.validate().is_err());

        let mut empty = res.clone();
        empty.files.clear();
        assert!(empty.validate().is_err());

        let mut negative = res;
        negative.files[1].size = -1;
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_resource_calc_size() {
        let mut res = two_file_resource();
        res.calc_size();
        assert_eq!(res.size, 2048);
    }

    #[test]
    fn test_sanitize_names() {
        let mut res = two_file_resource();
        res.name = "a/b:c".to_string();
        res.files[0].name = "x?y".to_string();
        res.sanitize_names();
        assert_eq!(res.name, "a_b_c");
        assert_eq!(res.files[0].name, "x_y");
    }

    #[test]
    fn test_task_name_fallbacks() {
        let mut task = Task {
            meta: TaskMeta {
                req: Request::new("https://example.com/archive.zip"),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(task.name(), "archive.zip");

        task.meta.res = Some(two_file_resource());
        assert_eq!(task.name(), "test");

        task.meta.opts.name = "renamed".to_string();
        assert_eq!(task.name(), "renamed");
    }

    #[test]
    fn test_camel_case_wire_names() {
        let task = Task::default();
        let json = serde_json::to_value(&task).unwrap();
        assert!(json.get("meta").is_some());
        assert!(json["meta"].get("req").is_some());
        assert_eq!(json["status"], "ready");
    }
}
