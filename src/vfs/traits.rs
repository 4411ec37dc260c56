/*!
 * VFS Traits
 * Capability adapter contract
 */

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::paths::path_join;
use super::types::*;

/// A path inside one mountpoint, as handed to an adapter for one call
#[derive(Debug, Clone)]
pub struct MountPath {
    pub mountpoint: Arc<Mountpoint>,
    /// Relative path without leading slash; empty at the mount root
    pub relative: String,
}

impl MountPath {
    pub fn new<S: Into<String>>(mountpoint: Arc<Mountpoint>, relative: S) -> Self {
        Self {
            mountpoint,
            relative: relative.into(),
        }
    }

    /// `mount:/relative`
    pub fn virtual_path(&self) -> String {
        self.mountpoint.virtual_path(&self.relative)
    }

    /// Virtual path of a direct child
    pub fn child(&self, name: &str) -> String {
        path_join(&[self.virtual_path().as_str(), name])
    }

    /// Final segment, or the mountpoint name at the root
    pub fn filename(&self) -> &str {
        match self.relative.trim_end_matches('/').rsplit('/').next() {
            Some(name) if !name.is_empty() => name,
            _ => &self.mountpoint.name,
        }
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.relative.trim_matches('/').is_empty()
    }
}

/// Kind of a native change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "addDir")]
    AddDir,
    #[serde(rename = "change")]
    Change,
    #[serde(rename = "unlink")]
    Unlink,
    #[serde(rename = "unlinkDir")]
    UnlinkDir,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Add => "add",
            ChangeKind::AddDir => "addDir",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
            ChangeKind::UnlinkDir => "unlinkDir",
        })
    }
}

/// Raw change reported by an adapter watch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    /// Metadata hints used to filter listeners (e.g. `username`)
    pub hints: BTreeMap<String, String>,
    /// Changed path relative to the mountpoint root
    pub dir: String,
    pub kind: ChangeKind,
}

impl RawChange {
    pub fn new<S: Into<String>>(dir: S, kind: ChangeKind) -> Self {
        Self {
            hints: BTreeMap::new(),
            dir: dir.into(),
            kind,
        }
    }

    pub fn with_hint<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.hints.insert(key.into(), value.into());
        self
    }
}

/// Stream of native changes; errors are reported in-band
pub type WatchStream = BoxStream<'static, VfsResult<RawChange>>;

/// Releases native watch resources
pub type WatchCloser = Box<dyn FnOnce() -> BoxFuture<'static, VfsResult<()>> + Send + Sync>;

/// A native watch opened by an adapter
pub struct NativeWatch {
    events: WatchStream,
    closer: Option<WatchCloser>,
}

impl NativeWatch {
    /// Watch whose resources are released when the stream is dropped
    pub fn new(events: WatchStream) -> Self {
        Self {
            events,
            closer: None,
        }
    }

    pub fn with_closer(mut self, closer: WatchCloser) -> Self {
        self.closer = Some(closer);
        self
    }

    pub fn into_parts(self) -> (WatchStream, Option<WatchCloser>) {
        (self.events, self.closer)
    }
}

impl fmt::Debug for NativeWatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeWatch")
            .field("closable", &self.closer.is_some())
            .finish()
    }
}

/// Storage adapter
///
/// An adapter declares what it implements through `capabilities()`; the
/// router consults that set and never calls an operation outside it. The
/// default method bodies reject the call, so adapters only override what
/// they declare.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter type name (e.g. "system")
    fn name(&self) -> &str;

    /// Operations this adapter implements
    fn capabilities(&self) -> CapabilitySet;

    /// Adapter-side location for a mount path
    fn realpath(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<String> {
        Ok(target.virtual_path())
    }

    async fn read(&self, _ctx: &VfsContext, _target: &MountPath) -> VfsResult<Bytes> {
        Err(VfsError::unsupported(Capability::Read.as_str(), self.name()))
    }

    /// Write a whole file, returning the number of bytes written
    async fn write(&self, _ctx: &VfsContext, _target: &MountPath, _data: Bytes) -> VfsResult<u64> {
        Err(VfsError::unsupported(Capability::Write.as_str(), self.name()))
    }

    async fn stat(&self, _ctx: &VfsContext, _target: &MountPath) -> VfsResult<DirEntry> {
        Err(VfsError::unsupported(Capability::Stat.as_str(), self.name()))
    }

    async fn readdir(&self, _ctx: &VfsContext, _target: &MountPath) -> VfsResult<Vec<DirEntry>> {
        Err(VfsError::unsupported(Capability::Readdir.as_str(), self.name()))
    }

    async fn mkdir(&self, _ctx: &VfsContext, _target: &MountPath) -> VfsResult<()> {
        Err(VfsError::unsupported(Capability::Mkdir.as_str(), self.name()))
    }

    /// Remove a file or a directory tree
    async fn unlink(&self, _ctx: &VfsContext, _target: &MountPath) -> VfsResult<()> {
        Err(VfsError::unsupported(Capability::Unlink.as_str(), self.name()))
    }

    async fn rename(&self, _ctx: &VfsContext, _from: &MountPath, _to: &MountPath) -> VfsResult<()> {
        Err(VfsError::unsupported(Capability::Rename.as_str(), self.name()))
    }

    async fn copy(&self, _ctx: &VfsContext, _from: &MountPath, _to: &MountPath) -> VfsResult<()> {
        Err(VfsError::unsupported(Capability::Copy.as_str(), self.name()))
    }

    /// Entries below `root` whose filename matches `pattern`
    async fn search(
        &self,
        _ctx: &VfsContext,
        _root: &MountPath,
        _pattern: &str,
    ) -> VfsResult<Vec<DirEntry>> {
        Err(VfsError::unsupported(Capability::Search.as_str(), self.name()))
    }

    /// Open a native watch on a mountpoint's root
    async fn watch(&self, _mountpoint: &Mountpoint) -> VfsResult<NativeWatch> {
        Err(VfsError::unsupported(Capability::Watch.as_str(), self.name()))
    }
}

impl fmt::Debug for dyn Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("name", &self.name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Whether two handles point at the same adapter instance
#[inline]
pub fn same_adapter(a: &Arc<dyn Adapter>, b: &Arc<dyn Adapter>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Case-insensitive filename match used by adapter searches
pub fn matches_pattern(filename: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    pattern.is_empty() || filename.to_lowercase().contains(&pattern.to_lowercase())
}
