/*!
 * System Adapter
 * Local disk backend over tokio::fs with native change notifications
 *
 * The host root comes from the mountpoint's `root` attribute and may carry
 * `{username}`, substituted from the caller on every request.
 */

use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};

use super::paths::{self, path_join};
use super::traits::*;
use super::types::*;
use crate::core::limits::{DEFAULT_ADAPTER, WATCH_CHANNEL_CAPACITY};

/// Host root template such as `/srv/home/{username}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTemplate {
    raw: String,
}

impl RootTemplate {
    pub fn new<S: Into<String>>(raw: S) -> Self {
        Self { raw: raw.into() }
    }

    /// Template for a mountpoint: the `root` attribute, or a host path given
    /// as the mount root
    pub fn for_mountpoint(mountpoint: &Mountpoint) -> VfsResult<Self> {
        if let Some(root) = &mountpoint.attributes.root {
            return Ok(Self::new(root.clone()));
        }
        if paths::parse_mount_prefix(&mountpoint.root).is_none() && !mountpoint.root.is_empty() {
            return Ok(Self::new(mountpoint.root.clone()));
        }
        Err(VfsError::InvalidArgument(format!(
            "mountpoint '{}' has no host root",
            mountpoint.name
        )))
    }

    fn is_placeholder(segment: &str) -> bool {
        segment.starts_with('{') && segment.ends_with('}') && segment.len() > 2
    }

    pub fn has_placeholders(&self) -> bool {
        self.raw.split('/').any(Self::is_placeholder)
    }

    /// Host root for a caller
    pub fn resolve(&self, identity: &CallerIdentity) -> VfsResult<PathBuf> {
        if !self.raw.contains("{username}") {
            return Ok(PathBuf::from(&self.raw));
        }

        let username = identity.username.as_str();
        if username.is_empty()
            || username.contains('/')
            || username.contains('\\')
            || username == "."
            || username == ".."
        {
            return Err(VfsError::PermissionDenied(format!(
                "username '{}' cannot be used in a host root",
                username
            )));
        }

        Ok(PathBuf::from(self.raw.replace("{username}", username)))
    }

    /// Directory watched natively: the template up to its first placeholder
    pub fn watch_base(&self) -> PathBuf {
        let fixed: Vec<&str> = self
            .raw
            .split('/')
            .take_while(|segment| !Self::is_placeholder(segment))
            .collect();
        let base = fixed.join("/");
        if base.is_empty() {
            PathBuf::from("/")
        } else {
            PathBuf::from(base)
        }
    }

    /// Split a changed host path into placeholder hints and the path
    /// relative to the caller's root. `None` if the path is outside the
    /// template or does not reach every placeholder.
    pub fn match_path(&self, changed: &Path) -> Option<(BTreeMap<String, String>, String)> {
        let base = self.watch_base();
        let rest = changed.strip_prefix(&base).ok()?;
        let mut segments = rest
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            });

        let pattern: Vec<&str> = self
            .raw
            .split('/')
            .skip_while(|segment| !Self::is_placeholder(segment))
            .filter(|segment| !segment.is_empty())
            .collect();

        let mut hints = BTreeMap::new();
        for expected in pattern {
            let actual = segments.next()?;
            if Self::is_placeholder(expected) {
                hints.insert(expected[1..expected.len() - 1].to_string(), actual.to_string());
            } else if expected != actual {
                return None;
            }
        }

        let relative: Vec<&str> = segments.collect();
        Some((hints, relative.join("/")))
    }
}

/// Join a relative virtual path onto a host root. `..` never climbs above
/// the root; `.`, roots and prefixes are dropped.
pub fn confine(root: &Path, relative: &str) -> PathBuf {
    let mut components = Vec::with_capacity(8);
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(name) => components.push(name),
            Component::ParentDir => {
                components.pop();
            }
            _ => {}
        }
    }

    let mut result = root.to_path_buf();
    for component in components {
        result.push(component);
    }
    result
}

fn convert_metadata(md: &std::fs::Metadata) -> Stat {
    #[cfg(unix)]
    let mode = {
        use std::os::unix::fs::PermissionsExt;
        Some(md.permissions().mode())
    };
    #[cfg(not(unix))]
    let mode = None;

    Stat {
        size: md.len(),
        mtime: md.modified().ok(),
        ctime: md.created().ok(),
        atime: md.accessed().ok(),
        mode,
    }
}

fn make_entry(filename: &str, virtual_path: String, md: &std::fs::Metadata) -> DirEntry {
    let stat = convert_metadata(md);
    if md.is_dir() {
        DirEntry::directory(filename, virtual_path, stat)
    } else {
        DirEntry::file(filename, virtual_path, stat)
    }
}

/// Kind of a native event for one of its paths
fn change_kind(kind: &EventKind, path: &Path) -> Option<ChangeKind> {
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    match kind {
        EventKind::Create(CreateKind::Folder) => Some(ChangeKind::AddDir),
        EventKind::Create(_) if path.is_dir() => Some(ChangeKind::AddDir),
        EventKind::Create(_) => Some(ChangeKind::Add),
        EventKind::Modify(ModifyKind::Name(_)) => Some(if path.is_dir() {
            ChangeKind::AddDir
        } else if path.exists() {
            ChangeKind::Add
        } else {
            ChangeKind::Unlink
        }),
        EventKind::Modify(_) => Some(ChangeKind::Change),
        EventKind::Remove(RemoveKind::Folder) => Some(ChangeKind::UnlinkDir),
        EventKind::Remove(_) => Some(ChangeKind::Unlink),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

/// Translate a native event into raw changes relative to the mount root
pub fn translate_event(template: &RootTemplate, event: &Event) -> Vec<RawChange> {
    event
        .paths
        .iter()
        .filter_map(|path| {
            let kind = change_kind(&event.kind, path)?;
            let (hints, dir) = template.match_path(path)?;
            Some(RawChange { hints, dir, kind })
        })
        .collect()
}

/// Local disk adapter
#[derive(Debug, Clone, Default)]
pub struct SystemAdapter;

impl SystemAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Host path for a mount path, as seen by the calling user
    pub fn host_path(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<PathBuf> {
        let root = RootTemplate::for_mountpoint(&target.mountpoint)?.resolve(&ctx.identity)?;
        Ok(confine(&root, &target.relative))
    }

    async fn metadata(path: &Path, context: &str) -> VfsResult<std::fs::Metadata> {
        fs::metadata(path)
            .await
            .map_err(|e| VfsError::from_io(e, context))
    }

    async fn ensure_parent(path: &Path) -> VfsResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| VfsError::from_io(e, format!("create parent of {}", path.display())))?;
        }
        Ok(())
    }

    async fn copy_tree(from: PathBuf, to: PathBuf) -> VfsResult<()> {
        let mut stack = vec![(from, to)];

        while let Some((src, dst)) = stack.pop() {
            let md = fs::symlink_metadata(&src)
                .await
                .map_err(|e| VfsError::from_io(e, src.display().to_string()))?;

            if md.is_dir() {
                fs::create_dir_all(&dst)
                    .await
                    .map_err(|e| VfsError::from_io(e, dst.display().to_string()))?;
                let mut entries = fs::read_dir(&src)
                    .await
                    .map_err(|e| VfsError::from_io(e, src.display().to_string()))?;
                while let Some(entry) = entries
                    .next_entry()
                    .await
                    .map_err(|e| VfsError::from_io(e, src.display().to_string()))?
                {
                    stack.push((entry.path(), dst.join(entry.file_name())));
                }
            } else {
                fs::copy(&src, &dst)
                    .await
                    .map_err(|e| VfsError::from_io(e, format!("copy {}", src.display())))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Adapter for SystemAdapter {
    fn name(&self) -> &str {
        DEFAULT_ADAPTER
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::all()
    }

    fn realpath(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<String> {
        Ok(self.host_path(ctx, target)?.to_string_lossy().into_owned())
    }

    async fn read(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<Bytes> {
        let path = self.host_path(ctx, target)?;
        let vpath = target.virtual_path();
        if Self::metadata(&path, &vpath).await?.is_dir() {
            return Err(VfsError::IsADirectory(vpath));
        }

        let data = fs::read(&path)
            .await
            .map_err(|e| VfsError::from_io(e, vpath))?;
        Ok(Bytes::from(data))
    }

    async fn write(&self, ctx: &VfsContext, target: &MountPath, data: Bytes) -> VfsResult<u64> {
        let path = self.host_path(ctx, target)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, &data)
            .await
            .map_err(|e| VfsError::from_io(e, target.virtual_path()))?;
        Ok(data.len() as u64)
    }

    async fn stat(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<DirEntry> {
        let path = self.host_path(ctx, target)?;
        let vpath = target.virtual_path();
        let md = Self::metadata(&path, &vpath).await?;
        Ok(make_entry(target.filename(), vpath, &md))
    }

    async fn readdir(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<Vec<DirEntry>> {
        let path = self.host_path(ctx, target)?;
        let vpath = target.virtual_path();
        if !Self::metadata(&path, &vpath).await?.is_dir() {
            return Err(VfsError::NotADirectory(vpath));
        }

        let mut reader = fs::read_dir(&path)
            .await
            .map_err(|e| VfsError::from_io(e, vpath.clone()))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| VfsError::from_io(e, vpath.clone()))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Follow symlinks, falling back to the link itself when dangling
            let md = match fs::metadata(entry.path()).await {
                Ok(md) => md,
                Err(_) => entry
                    .metadata()
                    .await
                    .map_err(|e| VfsError::from_io(e, target.child(&name)))?,
            };
            entries.push(make_entry(&name, target.child(&name), &md));
        }

        Ok(entries)
    }

    async fn mkdir(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<()> {
        let path = self.host_path(ctx, target)?;
        fs::create_dir_all(&path)
            .await
            .map_err(|e| VfsError::from_io(e, target.virtual_path()))
    }

    async fn unlink(&self, ctx: &VfsContext, target: &MountPath) -> VfsResult<()> {
        let path = self.host_path(ctx, target)?;
        let vpath = target.virtual_path();
        if target.is_root() {
            return Err(VfsError::InvalidPath(format!("refusing to unlink root {}", vpath)));
        }

        let md = fs::symlink_metadata(&path)
            .await
            .map_err(|e| VfsError::from_io(e, vpath.clone()))?;
        let result = if md.is_dir() {
            fs::remove_dir_all(&path).await
        } else {
            fs::remove_file(&path).await
        };
        result.map_err(|e| VfsError::from_io(e, vpath))
    }

    async fn rename(&self, ctx: &VfsContext, from: &MountPath, to: &MountPath) -> VfsResult<()> {
        let src = self.host_path(ctx, from)?;
        let dst = self.host_path(ctx, to)?;
        Self::ensure_parent(&dst).await?;
        fs::rename(&src, &dst)
            .await
            .map_err(|e| VfsError::from_io(e, format!("rename {} to {}", from.virtual_path(), to.virtual_path())))
    }

    async fn copy(&self, ctx: &VfsContext, from: &MountPath, to: &MountPath) -> VfsResult<()> {
        let src = self.host_path(ctx, from)?;
        let dst = self.host_path(ctx, to)?;
        Self::ensure_parent(&dst).await?;
        Self::copy_tree(src, dst).await
    }

    async fn search(
        &self,
        ctx: &VfsContext,
        root: &MountPath,
        pattern: &str,
    ) -> VfsResult<Vec<DirEntry>> {
        let base = self.host_path(ctx, root)?;
        let vroot = root.virtual_path();
        if !Self::metadata(&base, &vroot).await?.is_dir() {
            return Err(VfsError::NotADirectory(vroot));
        }

        let mut results = Vec::new();
        let mut stack = vec![(base, vroot)];

        while let Some((dir, vdir)) = stack.pop() {
            let mut reader = match fs::read_dir(&dir).await {
                Ok(reader) => reader,
                Err(e) => {
                    trace!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            while let Ok(Some(entry)) = reader.next_entry().await {
                let name = entry.file_name().to_string_lossy().into_owned();
                let vpath = path_join(&[vdir.as_str(), name.as_str()]);
                let Ok(md) = entry.metadata().await else {
                    continue;
                };

                if md.is_dir() {
                    stack.push((entry.path(), vpath.clone()));
                }
                if matches_pattern(&name, pattern) {
                    results.push(make_entry(&name, vpath, &md));
                }
            }
        }

        Ok(results)
    }

    async fn watch(&self, mountpoint: &Mountpoint) -> VfsResult<NativeWatch> {
        let template = RootTemplate::for_mountpoint(mountpoint)?;
        let base = template.watch_base();
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);

        let handler_template = template.clone();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            // Runs on the notifier's thread; a closed receiver ends delivery
            match result {
                Ok(event) => {
                    for change in translate_event(&handler_template, &event) {
                        if tx.blocking_send(Ok(change)).is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.blocking_send(Err(VfsError::adapter("native watch", e)));
                }
            }
        })
        .map_err(|e| VfsError::adapter(format!("create watcher for {}", mountpoint.name), e))?;

        watcher
            .watch(&base, RecursiveMode::Recursive)
            .map_err(|e| VfsError::adapter(format!("watch {}", base.display()), e))?;

        debug!(mountpoint = %mountpoint.name, base = %base.display(), "Native watch opened");

        let closer: WatchCloser = Box::new(move || {
            async move {
                drop(watcher);
                Ok(())
            }
            .boxed()
        });

        Ok(NativeWatch::new(ReceiverStream::new(rx).boxed()).with_closer(closer))
    }
}
