/*!
 * Request Router
 * Validates a method call, resolves its paths and dispatches to the
 * adapter's declared capabilities
 *
 * Checks run in a fixed order before any adapter I/O: mount resolution,
 * group restriction, read-only flag, then the adapter's capability set.
 */

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, Instrument};

use super::listing::{transform_readdir, ListingOptions};
use super::mime::MimeResolver;
use super::mount::{MountRegistry, Resolved};
use super::traits::same_adapter;
use super::types::*;
use crate::core::limits::DEFAULT_SLOW_REQUEST_MS;
use crate::monitoring::RequestSpan;

/// Capabilities a read-only mountpoint never exposes
const WRITE_CAPABILITIES: [Capability; 5] = [
    Capability::Write,
    Capability::Mkdir,
    Capability::Unlink,
    Capability::Rename,
    Capability::Copy,
];

/// Request router
pub struct Router {
    registry: Arc<MountRegistry>,
    mime: MimeResolver,
    public_path: String,
    slow_after: Duration,
}

impl Router {
    pub fn new<S: Into<String>>(registry: Arc<MountRegistry>, mime: MimeResolver, public_path: S) -> Self {
        Self {
            registry,
            mime,
            public_path: public_path.into(),
            slow_after: Duration::from_millis(DEFAULT_SLOW_REQUEST_MS),
        }
    }

    /// Threshold above which requests are logged as slow
    pub fn with_slow_request_ms(mut self, millis: u64) -> Self {
        self.slow_after = Duration::from_millis(millis);
        self
    }

    pub fn registry(&self) -> &Arc<MountRegistry> {
        &self.registry
    }

    pub fn mime(&self) -> &MimeResolver {
        &self.mime
    }

    /// Route a transport-shaped request
    pub async fn request(&self, method: VfsMethod, request: VfsRequest) -> VfsResult<VfsResponse> {
        let span = RequestSpan::new(method.as_str(), &request.identity.username)
            .with_slow_threshold(self.slow_after);

        let result = match request.validate(method) {
            Ok(()) => {
                self.dispatch(method, &request)
                    .instrument(span.span().clone())
                    .await
            }
            Err(e) => Err(e),
        };

        span.record_outcome(&result);
        result
    }

    async fn dispatch(&self, method: VfsMethod, request: &VfsRequest) -> VfsResult<VfsResponse> {
        let who = &request.identity;

        match method {
            VfsMethod::Capabilities => self
                .capabilities(who, request.text("path")?)
                .map(VfsResponse::Capabilities),
            VfsMethod::Realpath => self.realpath(who, request.text("path")?).map(VfsResponse::Text),
            VfsMethod::Exists => self
                .exists(who, request.text("path")?)
                .await
                .map(VfsResponse::Bool),
            VfsMethod::Stat => self
                .stat(who, request.text("path")?)
                .await
                .map(VfsResponse::Entry),
            VfsMethod::Readdir => {
                let options: ListingOptions = request.options("options")?;
                self.readdir(who, request.text("path")?, &options)
                    .await
                    .map(VfsResponse::Entries)
            }
            VfsMethod::Readfile => {
                let path = request.text("path")?;
                let bytes = self.readfile(who, path).await?;
                Ok(VfsResponse::Data {
                    mime: self.mime.lookup(path),
                    bytes,
                })
            }
            VfsMethod::Writefile => self
                .writefile(who, request.text("path")?, request.body()?)
                .await
                .map(VfsResponse::Written),
            VfsMethod::Mkdir => self
                .mkdir(who, request.text("path")?)
                .await
                .map(|_| VfsResponse::Done),
            VfsMethod::Unlink => self
                .unlink(who, request.text("path")?)
                .await
                .map(|_| VfsResponse::Done),
            VfsMethod::Rename => self
                .rename(who, request.text("from")?, request.text("to")?)
                .await
                .map(|_| VfsResponse::Done),
            VfsMethod::Copy => self
                .copy(who, request.text("from")?, request.text("to")?)
                .await
                .map(|_| VfsResponse::Done),
            VfsMethod::Search => self
                .search(who, request.text("root")?, request.text("pattern")?)
                .await
                .map(VfsResponse::Entries),
            VfsMethod::Url => self.url(who, request.text("path")?).map(VfsResponse::Text),
            VfsMethod::Download => self
                .download(who, request.text("path")?)
                .await
                .map(VfsResponse::Download),
        }
    }

    /// Resolve a path and run the caller and mountpoint checks
    fn authorize(&self, identity: &CallerIdentity, path: &str, write: bool) -> VfsResult<Resolved> {
        let resolved = self.registry.resolve(path)?;
        let attributes = &resolved.mountpoint.attributes;

        if !attributes.admits(identity) {
            return Err(VfsError::PermissionDenied(format!(
                "'{}' is restricted to groups {:?} ({:?})",
                resolved.mountpoint.name,
                attributes.groups.as_deref().unwrap_or_default(),
                attributes.group_policy
            )));
        }

        if write && attributes.read_only {
            return Err(VfsError::ReadOnly(resolved.mountpoint.name.clone()));
        }

        Ok(resolved)
    }

    /// Authorize and require the method's capability
    fn target(
        &self,
        identity: &CallerIdentity,
        method: VfsMethod,
        path: &str,
    ) -> VfsResult<(Resolved, VfsContext)> {
        let resolved = self.authorize(identity, path, method.is_write())?;
        if let Some(capability) = method.capability() {
            require(&resolved, capability)?;
        }
        Ok((resolved, VfsContext::new(identity.clone(), method)))
    }

    fn annotate(&self, mut entry: DirEntry) -> DirEntry {
        if entry.is_file && entry.mime.is_none() {
            entry.mime = Some(self.mime.lookup(&entry.filename));
        }
        entry
    }

    /// Effective capabilities of the mountpoint behind `path`
    pub fn capabilities(&self, identity: &CallerIdentity, path: &str) -> VfsResult<CapabilitySet> {
        let resolved = self.authorize(identity, path, false)?;
        let mut capabilities = resolved.adapter.capabilities();
        if resolved.mountpoint.attributes.read_only {
            for capability in WRITE_CAPABILITIES {
                capabilities.remove(capability);
            }
        }
        Ok(capabilities)
    }

    pub fn realpath(&self, identity: &CallerIdentity, path: &str) -> VfsResult<String> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Realpath, path)?;
        resolved.adapter.realpath(&ctx, &resolved.path)
    }

    /// Whether `path` exists; a missing path is `false`, not an error
    pub async fn exists(&self, identity: &CallerIdentity, path: &str) -> VfsResult<bool> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Exists, path)?;
        match resolved.adapter.stat(&ctx, &resolved.path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn stat(&self, identity: &CallerIdentity, path: &str) -> VfsResult<DirEntry> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Stat, path)?;
        let entry = resolved.adapter.stat(&ctx, &resolved.path).await?;
        Ok(self.annotate(entry))
    }

    /// Transformed listing: `..` first, then directories, then files
    pub async fn readdir(
        &self,
        identity: &CallerIdentity,
        path: &str,
        options: &ListingOptions,
    ) -> VfsResult<Vec<DirEntry>> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Readdir, path)?;
        let entries = resolved.adapter.readdir(&ctx, &resolved.path).await?;
        let entries = entries.into_iter().map(|e| self.annotate(e)).collect();
        Ok(transform_readdir(&resolved.path.virtual_path(), entries, options))
    }

    pub async fn readfile(&self, identity: &CallerIdentity, path: &str) -> VfsResult<Bytes> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Readfile, path)?;
        resolved.adapter.read(&ctx, &resolved.path).await
    }

    pub async fn writefile(&self, identity: &CallerIdentity, path: &str, data: Bytes) -> VfsResult<u64> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Writefile, path)?;
        let written = resolved.adapter.write(&ctx, &resolved.path, data).await?;
        debug!(path, bytes = written, "File written");
        Ok(written)
    }

    pub async fn mkdir(&self, identity: &CallerIdentity, path: &str) -> VfsResult<()> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Mkdir, path)?;
        resolved.adapter.mkdir(&ctx, &resolved.path).await
    }

    pub async fn unlink(&self, identity: &CallerIdentity, path: &str) -> VfsResult<()> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Unlink, path)?;
        resolved.adapter.unlink(&ctx, &resolved.path).await?;
        debug!(path, "Unlinked");
        Ok(())
    }

    pub async fn rename(&self, identity: &CallerIdentity, from: &str, to: &str) -> VfsResult<()> {
        self.transfer(identity, VfsMethod::Rename, from, to).await
    }

    pub async fn copy(&self, identity: &CallerIdentity, from: &str, to: &str) -> VfsResult<()> {
        self.transfer(identity, VfsMethod::Copy, from, to).await
    }

    /// Rename or copy. Within one adapter instance the adapter does the
    /// work; across adapters the file is read, written, and for a rename
    /// unlinked at the source. Every check on both sides runs before I/O.
    async fn transfer(
        &self,
        identity: &CallerIdentity,
        method: VfsMethod,
        from: &str,
        to: &str,
    ) -> VfsResult<()> {
        let moving = method == VfsMethod::Rename;
        let source = self.authorize(identity, from, moving)?;
        let destination = self.authorize(identity, to, true)?;
        let ctx = VfsContext::new(identity.clone(), method);

        if same_adapter(&source.adapter, &destination.adapter) {
            let capability = if moving { Capability::Rename } else { Capability::Copy };
            require(&source, capability)?;
            if moving {
                source.adapter.rename(&ctx, &source.path, &destination.path).await?;
            } else {
                source.adapter.copy(&ctx, &source.path, &destination.path).await?;
            }
        } else {
            require(&source, Capability::Read)?;
            require(&destination, Capability::Write)?;
            if moving {
                require(&source, Capability::Unlink)?;
            }

            let data = source.adapter.read(&ctx, &source.path).await?;
            destination.adapter.write(&ctx, &destination.path, data).await?;
            if moving {
                source.adapter.unlink(&ctx, &source.path).await?;
            }
        }

        debug!(method = method.as_str(), from, to, "Transfer complete");
        Ok(())
    }

    /// Entries below `root` whose filename contains `pattern`
    pub async fn search(
        &self,
        identity: &CallerIdentity,
        root: &str,
        pattern: &str,
    ) -> VfsResult<Vec<DirEntry>> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Search, root)?;
        let entries = resolved.adapter.search(&ctx, &resolved.path, pattern).await?;
        Ok(entries.into_iter().map(|e| self.annotate(e)).collect())
    }

    /// Public URL serving the file through `readfile`
    pub fn url(&self, identity: &CallerIdentity, path: &str) -> VfsResult<String> {
        self.target(identity, VfsMethod::Url, path)?;
        let encoded: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
        Ok(format!(
            "{}/readfile?path={}",
            self.public_path.trim_end_matches('/'),
            encoded
        ))
    }

    pub async fn download(&self, identity: &CallerIdentity, path: &str) -> VfsResult<Download> {
        let (resolved, ctx) = self.target(identity, VfsMethod::Download, path)?;
        let bytes = resolved.adapter.read(&ctx, &resolved.path).await?;
        let filename = resolved.path.filename().to_string();
        Ok(Download {
            mime: self.mime.lookup(&filename),
            filename,
            bytes,
        })
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("registry", &self.registry)
            .field("public_path", &self.public_path)
            .field("slow_after", &self.slow_after)
            .finish()
    }
}

fn require(resolved: &Resolved, capability: Capability) -> VfsResult<()> {
    if resolved.adapter.capabilities().contains(capability) {
        Ok(())
    } else {
        Err(VfsError::unsupported(capability.as_str(), resolved.adapter.name()))
    }
}
