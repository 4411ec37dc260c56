/*!
 * Mount Registry
 * Owns the active mountpoints and resolves virtual paths to adapters
 */

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::paths;
use super::traits::{Adapter, MountPath};
use super::types::*;
use crate::core::limits::DEFAULT_ADAPTER;

/// Registered mountpoint with its adapter
#[derive(Clone)]
struct MountEntry {
    mountpoint: Arc<Mountpoint>,
    adapter: Arc<dyn Adapter>,
}

/// Result of resolving a virtual path
#[derive(Clone)]
pub struct Resolved {
    pub mountpoint: Arc<Mountpoint>,
    pub adapter: Arc<dyn Adapter>,
    pub path: MountPath,
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolved")
            .field("mountpoint", &self.mountpoint.name)
            .field("adapter", &self.adapter.name())
            .field("relative", &self.path.relative)
            .finish()
    }
}

/// Mount registry
///
/// Mountpoints are kept in insertion order behind a single lock, so
/// insert/remove are mutually exclusive with each other and with resolution.
/// Adapters are fixed at construction.
pub struct MountRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    mounts: RwLock<Vec<MountEntry>>,
}

impl MountRegistry {
    pub fn new(adapters: HashMap<String, Arc<dyn Adapter>>) -> Self {
        Self {
            adapters,
            mounts: RwLock::new(Vec::new()),
        }
    }

    /// Adapter instance by type name
    pub fn adapter(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.adapters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Validate and register a mountpoint
    pub fn insert(&self, spec: MountSpec) -> VfsResult<(Arc<Mountpoint>, Arc<dyn Adapter>)> {
        let adapter_name = spec
            .attributes
            .adapter
            .clone()
            .unwrap_or_else(|| DEFAULT_ADAPTER.to_string());

        let adapter = self.adapter(&adapter_name).ok_or_else(|| {
            VfsError::InvalidArgument(format!(
                "unknown adapter '{}' for mountpoint '{}'",
                adapter_name, spec.name
            ))
        })?;

        let mountpoint = Arc::new(Mountpoint::from_spec(spec)?);

        let mut mounts = self.mounts.write();
        if let Some(existing) = mounts
            .iter()
            .find(|entry| entry.mountpoint.name == mountpoint.name || entry.mountpoint.id == mountpoint.id)
        {
            return Err(VfsError::AlreadyExists(format!(
                "mountpoint '{}'",
                existing.mountpoint.name
            )));
        }

        mounts.push(MountEntry {
            mountpoint: Arc::clone(&mountpoint),
            adapter: Arc::clone(&adapter),
        });

        Ok((mountpoint, adapter))
    }

    /// Remove a mountpoint; false if it was not registered
    pub fn remove(&self, id: MountId) -> bool {
        let mut mounts = self.mounts.write();
        let before = mounts.len();
        mounts.retain(|entry| entry.mountpoint.id != id);
        mounts.len() != before
    }

    pub fn clear(&self) -> usize {
        let mut mounts = self.mounts.write();
        let count = mounts.len();
        mounts.clear();
        count
    }

    pub fn contains(&self, id: MountId) -> bool {
        self.mounts.read().iter().any(|entry| entry.mountpoint.id == id)
    }

    pub fn get(&self, id: MountId) -> Option<Arc<Mountpoint>> {
        self.mounts
            .read()
            .iter()
            .find(|entry| entry.mountpoint.id == id)
            .map(|entry| Arc::clone(&entry.mountpoint))
    }

    pub fn find(&self, name: &str) -> Option<Arc<Mountpoint>> {
        self.mounts
            .read()
            .iter()
            .find(|entry| entry.mountpoint.name == name)
            .map(|entry| Arc::clone(&entry.mountpoint))
    }

    /// Resolve `name:/rel` to its mountpoint, adapter and relative path
    pub fn resolve(&self, path: &str) -> VfsResult<Resolved> {
        let prefix = paths::parse_mount_prefix(path)
            .ok_or_else(|| VfsError::NotFound(format!("no mountpoint prefix in '{}'", path)))?;

        let mounts = self.mounts.read();
        let entry = mounts
            .iter()
            .find(|entry| entry.mountpoint.name == prefix)
            .ok_or_else(|| VfsError::NotFound(format!("mountpoint '{}'", prefix)))?;

        Ok(Resolved {
            mountpoint: Arc::clone(&entry.mountpoint),
            adapter: Arc::clone(&entry.adapter),
            path: MountPath::new(Arc::clone(&entry.mountpoint), paths::strip_mount_prefix(path)),
        })
    }

    /// Snapshot of active mountpoints in mount order
    pub fn mountpoints(&self) -> Vec<Arc<Mountpoint>> {
        self.mounts
            .read()
            .iter()
            .map(|entry| Arc::clone(&entry.mountpoint))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.read().is_empty()
    }
}

impl std::fmt::Debug for MountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRegistry")
            .field("adapters", &self.adapter_names())
            .field("mounts", &self.len())
            .finish()
    }
}
