/*!
 * Memory Adapter
 * Volatile in-memory backend, namespaced per mountpoint
 *
 * Every mutation is reported to watch sessions with an empty hint set.
 */

mod node;

use ahash::RandomState;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_stream::wrappers::BroadcastStream;

use super::observable::EventBroadcaster;
use super::paths::basename;
use super::traits::*;
use super::types::*;
use crate::core::limits::{EVENT_BUS_CAPACITY, MEMORY_ADAPTER};
use node::Node;

/// Change tagged with the mountpoint it happened on
type MountChange = (String, RawChange);

/// In-memory adapter
///
/// Nodes are keyed by their virtual path (`mount:/clean/path`); the root of
/// each mountpoint exists implicitly.
#[derive(Debug, Clone)]
pub struct MemoryAdapter {
    nodes: Arc<DashMap<String, Node, RandomState>>,
    changes: EventBroadcaster<MountChange>,
}

/// Split a key into mount name and absolute path
fn split_key(key: &str) -> (&str, &str) {
    key.split_once(':').unwrap_or((key, "/"))
}

fn is_root_key(key: &str) -> bool {
    split_key(key).1 == "/"
}

fn parent_key(key: &str) -> Option<String> {
    let (mount, path) = split_key(key);
    if path == "/" {
        return None;
    }
    match path.rfind('/') {
        Some(0) | None => Some(format!("{}:/", mount)),
        Some(idx) => Some(format!("{}:{}", mount, &path[..idx])),
    }
}

/// Prefix shared by every descendant of `key`
fn descendant_prefix(key: &str) -> String {
    if is_root_key(key) {
        key.to_string()
    } else {
        format!("{}/", key)
    }
}

fn relative(key: &str) -> &str {
    split_key(key).1.trim_start_matches('/')
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::with_hasher(RandomState::new())),
            changes: EventBroadcaster::new(EVENT_BUS_CAPACITY),
        }
    }

    /// Node key for a mount path
    fn key(target: &MountPath) -> String {
        let cleaned = path_clean::clean(format!("/{}", target.relative));
        format!("{}:{}", target.mountpoint.name, cleaned.to_string_lossy())
    }

    fn notify(&self, key: &str, kind: ChangeKind) {
        let (mount, _) = split_key(key);
        self.changes
            .emit((mount.to_string(), RawChange::new(relative(key), kind)));
    }

    /// Push a native change for a mountpoint, as if the backing store
    /// reported it
    pub fn inject<S: Into<String>>(&self, mountpoint: S, change: RawChange) -> usize {
        self.changes.emit((mountpoint.into(), change))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn is_dir(&self, key: &str) -> bool {
        is_root_key(key) || self.nodes.get(key).map_or(false, |n| n.is_dir())
    }

    /// Create missing ancestors of `key`
    fn ensure_parents(&self, key: &str) -> VfsResult<()> {
        let mut missing = Vec::new();
        let mut current = parent_key(key);

        while let Some(parent) = current {
            if is_root_key(&parent) {
                break;
            }
            match self.nodes.get(&parent).map(|n| n.is_dir()) {
                Some(true) => break,
                Some(false) => return Err(VfsError::NotADirectory(parent)),
                None => {
                    current = parent_key(&parent);
                    missing.push(parent);
                }
            }
        }

        for dir in missing.into_iter().rev() {
            self.nodes.entry(dir.clone()).or_insert_with(Node::directory);
            self.notify(&dir, ChangeKind::AddDir);
        }
        Ok(())
    }

    fn entry_for(key: &str, node: &Node) -> DirEntry {
        let filename = basename(key);
        if node.is_dir() {
            DirEntry::directory(filename, key, node.stat())
        } else {
            DirEntry::file(filename, key, node.stat())
        }
    }

    /// `key` and all its descendants
    fn subtree(&self, key: &str) -> Vec<(String, Node)> {
        let prefix = descendant_prefix(key);
        self.nodes
            .iter()
            .filter(|entry| entry.key() == key || entry.key().starts_with(&prefix))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Copy a subtree to a new location, returning the copied nodes
    fn transplant(&self, from: &str, to: &str) -> VfsResult<Vec<(String, Node)>> {
        if is_root_key(from) {
            return Err(VfsError::InvalidPath(format!("cannot move or copy root {}", from)));
        }
        if to == from || to.starts_with(&descendant_prefix(from)) {
            return Err(VfsError::InvalidArgument(format!(
                "cannot move or copy {} into itself",
                from
            )));
        }

        let tree = self.subtree(from);
        if tree.is_empty() {
            return Err(VfsError::NotFound(from.to_string()));
        }
        if self.nodes.contains_key(to) || is_root_key(to) {
            return Err(VfsError::AlreadyExists(to.to_string()));
        }
        self.ensure_parents(to)?;

        for (key, node) in &tree {
            let moved = format!("{}{}", to, &key[from.len()..]);
            self.nodes.insert(moved, node.clone());
        }
        Ok(tree)
    }

    fn added_kind(node: &Node) -> ChangeKind {
        if node.is_dir() {
            ChangeKind::AddDir
        } else {
            ChangeKind::Add
        }
    }
}

impl Default for MemoryAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        MEMORY_ADAPTER
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
    }

    async fn read(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<Bytes> {
        let key = Self::key(target);
        match self.nodes.get(&key).as_deref() {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Directory { .. }) => Err(VfsError::IsADirectory(key)),
            None if is_root_key(&key) => Err(VfsError::IsADirectory(key)),
            None => Err(VfsError::NotFound(key)),
        }
    }

    async fn write(&self, _ctx: &VfsContext, target: &MountPath, data: Bytes) -> VfsResult<u64> {
        let key = Self::key(target);
        if self.is_dir(&key) {
            return Err(VfsError::IsADirectory(key));
        }
        self.ensure_parents(&key)?;

        let size = data.len() as u64;
        let now = SystemTime::now();
        let created = self.nodes.get(&key).map(|node| node.created());
        let kind = if created.is_some() {
            ChangeKind::Change
        } else {
            ChangeKind::Add
        };

        self.nodes.insert(
            key.clone(),
            Node::File {
                data,
                modified: now,
                created: created.unwrap_or(now),
            },
        );

        self.notify(&key, kind);
        Ok(size)
    }

    async fn stat(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<DirEntry> {
        let key = Self::key(target);
        if let Some(node) = self.nodes.get(&key) {
            return Ok(Self::entry_for(&key, &node));
        }
        if is_root_key(&key) {
            return Ok(DirEntry::directory(
                target.mountpoint.name.clone(),
                key,
                Stat::default(),
            ));
        }
        Err(VfsError::NotFound(key))
    }

    async fn readdir(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<Vec<DirEntry>> {
        let key = Self::key(target);
        if !self.is_dir(&key) {
            return Err(if self.nodes.contains_key(&key) {
                VfsError::NotADirectory(key)
            } else {
                VfsError::NotFound(key)
            });
        }

        Ok(self
            .nodes
            .iter()
            .filter(|entry| parent_key(entry.key()).as_deref() == Some(key.as_str()))
            .map(|entry| Self::entry_for(entry.key(), entry.value()))
            .collect())
    }

    async fn mkdir(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<()> {
        let key = Self::key(target);
        if self.is_dir(&key) {
            return Ok(());
        }
        if self.nodes.contains_key(&key) {
            return Err(VfsError::AlreadyExists(key));
        }

        self.ensure_parents(&key)?;
        self.nodes.insert(key.clone(), Node::directory());
        self.notify(&key, ChangeKind::AddDir);
        Ok(())
    }

    async fn unlink(&self, _ctx: &VfsContext, target: &MountPath) -> VfsResult<()> {
        let key = Self::key(target);
        if is_root_key(&key) {
            return Err(VfsError::InvalidPath(format!("refusing to unlink root {}", key)));
        }

        let tree = self.subtree(&key);
        let Some(node) = self.nodes.get(&key).map(|n| n.value().clone()) else {
            return Err(VfsError::NotFound(key));
        };
        for (child, _) in tree {
            self.nodes.remove(&child);
        }

        let kind = if node.is_dir() {
            ChangeKind::UnlinkDir
        } else {
            ChangeKind::Unlink
        };
        self.notify(&key, kind);
        Ok(())
    }

    async fn rename(&self, _ctx: &VfsContext, from: &MountPath, to: &MountPath) -> VfsResult<()> {
        let (src, dst) = (Self::key(from), Self::key(to));
        let tree = self.transplant(&src, &dst)?;

        let mut kind = ChangeKind::Unlink;
        for (key, node) in &tree {
            self.nodes.remove(key);
            if key == &src && node.is_dir() {
                kind = ChangeKind::UnlinkDir;
            }
        }

        self.notify(&src, kind);
        let added = if kind == ChangeKind::UnlinkDir {
            ChangeKind::AddDir
        } else {
            ChangeKind::Add
        };
        self.notify(&dst, added);
        Ok(())
    }

    async fn copy(&self, _ctx: &VfsContext, from: &MountPath, to: &MountPath) -> VfsResult<()> {
        let (src, dst) = (Self::key(from), Self::key(to));
        let tree = self.transplant(&src, &dst)?;

        if let Some((_, node)) = tree.iter().find(|(key, _)| key == &src) {
            self.notify(&dst, Self::added_kind(node));
        }
        Ok(())
    }

    async fn search(
        &self,
        _ctx: &VfsContext,
        root: &MountPath,
        pattern: &str,
    ) -> VfsResult<Vec<DirEntry>> {
        let key = Self::key(root);
        if !self.is_dir(&key) {
            return Err(VfsError::NotADirectory(key));
        }

        Ok(self
            .subtree(&key)
            .into_iter()
            .filter(|(path, _)| path != &key && matches_pattern(basename(path), pattern))
            .map(|(path, node)| Self::entry_for(&path, &node))
            .collect())
    }

    async fn watch(&self, mountpoint: &Mountpoint) -> VfsResult<NativeWatch> {
        let name = mountpoint.name.clone();
        let events = BroadcastStream::new(self.changes.subscribe()).filter_map(move |item| {
            let result = match item {
                Ok((mount, change)) if mount == name => Some(Ok(change)),
                Ok(_) => None,
                Err(e) => Some(Err(VfsError::adapter("memory watch", e))),
            };
            futures::future::ready(result)
        });

        Ok(NativeWatch::new(events.boxed()))
    }
}
