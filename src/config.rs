/*!
 * VFS Configuration
 * Typed configuration for mountpoints, watching and MIME overrides
 *
 * Environment variables:
 * - VFS_WATCH: enable or disable watching globally (`1`/`true`, `0`/`false`)
 * - VFS_PUBLIC_PATH: URL prefix used by `url` requests
 * - VFS_SLOW_REQUEST_MS: slow-request warning threshold in milliseconds
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::core::limits::{DEFAULT_PUBLIC_PATH, DEFAULT_SLOW_REQUEST_MS, EVENT_BUS_CAPACITY};
use crate::vfs::types::{MountSpec, VfsError, VfsResult};

/// MIME overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MimeConfig {
    /// MIME type -> extensions
    pub define: HashMap<String, Vec<String>>,
    /// Exact filename -> MIME type
    pub filenames: HashMap<String, String>,
}

/// Filesystem service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VfsConfig {
    /// Global watch switch; mountpoints still opt in individually
    pub watch: bool,
    pub mountpoints: Vec<MountSpec>,
    pub mime: MimeConfig,
    pub public_path: String,
    pub event_capacity: usize,
    /// Requests slower than this are logged at warn
    pub slow_request_ms: u64,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            watch: true,
            mountpoints: Vec::new(),
            mime: MimeConfig::default(),
            public_path: DEFAULT_PUBLIC_PATH.to_string(),
            event_capacity: EVENT_BUS_CAPACITY,
            slow_request_ms: DEFAULT_SLOW_REQUEST_MS,
        }
    }
}

impl VfsConfig {
    pub fn from_json(json: &str) -> VfsResult<Self> {
        serde_json::from_str(json).map_err(|e| VfsError::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> VfsResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| VfsError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Overlay environment overrides
    pub fn apply_env(mut self) -> Self {
        if let Some(watch) = std::env::var("VFS_WATCH").ok().and_then(|v| parse_flag(&v)) {
            self.watch = watch;
        }
        if let Ok(public_path) = std::env::var("VFS_PUBLIC_PATH") {
            if !public_path.is_empty() {
                self.public_path = public_path;
            }
        }
        if let Some(ms) = std::env::var("VFS_SLOW_REQUEST_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.slow_request_ms = ms;
        }
        self
    }

    pub fn with_mount(mut self, spec: MountSpec) -> Self {
        self.mountpoints.push(spec);
        self
    }

    pub fn without_watch(mut self) -> Self {
        self.watch = false;
        self
    }

    #[inline]
    pub fn watch_enabled(&self) -> bool {
        self.watch
    }

    pub fn mountpoints(&self) -> &[MountSpec] {
        &self.mountpoints
    }

    pub fn mime(&self) -> &MimeConfig {
        &self.mime
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
