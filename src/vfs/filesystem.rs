/*!
 * Filesystem Service
 * Owns the mount registry, router and watch manager, and ties their
 * lifecycles together
 */

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::bus::{EventBus, LocalBus};
use super::local::SystemAdapter;
use super::memory::MemoryAdapter;
use super::mime::MimeResolver;
use super::mount::MountRegistry;
use super::router::Router;
use super::traits::Adapter;
use super::types::*;
use super::watch::WatchManager;
use crate::config::VfsConfig;
use crate::core::limits::{DEFAULT_ADAPTER, LISTENER_QUEUE_CAPACITY, MEMORY_ADAPTER};

/// Builder for Filesystem
pub struct FilesystemBuilder {
    config: VfsConfig,
    adapters: HashMap<String, Arc<dyn Adapter>>,
    bus: Option<Arc<dyn EventBus>>,
}

impl FilesystemBuilder {
    pub fn new() -> Self {
        Self {
            config: VfsConfig::default(),
            adapters: HashMap::new(),
            bus: None,
        }
    }

    pub fn with_config(mut self, config: VfsConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an adapter under a type name, replacing any built-in one
    pub fn with_adapter<S: Into<String>>(mut self, name: S, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.insert(name.into(), adapter);
        self
    }

    /// Use an existing bus instead of a private `LocalBus`
    pub fn with_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn build(self) -> Filesystem {
        let mut adapters = self.adapters;
        adapters
            .entry(DEFAULT_ADAPTER.to_string())
            .or_insert_with(|| Arc::new(SystemAdapter::new()) as Arc<dyn Adapter>);
        adapters
            .entry(MEMORY_ADAPTER.to_string())
            .or_insert_with(|| Arc::new(MemoryAdapter::new()) as Arc<dyn Adapter>);

        let config = self.config;
        let bus = self.bus.unwrap_or_else(|| {
            Arc::new(LocalBus::with_capacity(
                config.event_capacity,
                LISTENER_QUEUE_CAPACITY,
            )) as Arc<dyn EventBus>
        });

        let registry = Arc::new(MountRegistry::new(adapters));
        let router = Router::new(
            Arc::clone(&registry),
            MimeResolver::new(config.mime()),
            config.public_path.clone(),
        )
        .with_slow_request_ms(config.slow_request_ms);
        let watches = WatchManager::new(bus, config.watch_enabled());

        info!(
            adapters = ?registry.adapter_names(),
            watch = config.watch_enabled(),
            "Filesystem initialized"
        );

        Filesystem {
            config,
            registry,
            router,
            watches,
            lifecycle: Mutex::new(()),
        }
    }
}

impl Default for FilesystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem service
///
/// `mount`/`unmount`/`destroy` are serialized against each other; requests
/// run concurrently and only contend on the registry's read lock.
pub struct Filesystem {
    config: VfsConfig,
    registry: Arc<MountRegistry>,
    router: Router,
    watches: WatchManager,
    lifecycle: Mutex<()>,
}

impl Filesystem {
    pub fn builder() -> FilesystemBuilder {
        FilesystemBuilder::new()
    }

    /// Mount every configured mountpoint. Failures are logged and skipped;
    /// returns the number mounted.
    pub async fn init(&self) -> usize {
        let specs = self.config.mountpoints().to_vec();
        let results = join_all(specs.into_iter().map(|spec| {
            let name = spec.name.clone();
            async move { (name, self.mount(spec).await) }
        }))
        .await;

        results
            .into_iter()
            .filter(|(name, result)| match result {
                Ok(_) => true,
                Err(e) => {
                    warn!(mountpoint = %name, error = %e, "Failed to mount");
                    false
                }
            })
            .count()
    }

    /// Register a mountpoint and start watching it if requested. Watch
    /// failures leave the mountpoint mounted without notifications.
    pub async fn mount(&self, spec: MountSpec) -> VfsResult<Arc<Mountpoint>> {
        let _guard = self.lifecycle.lock().await;

        let (mountpoint, adapter) = self.registry.insert(spec)?;
        info!(
            mountpoint = %mountpoint.name,
            id = %mountpoint.id,
            adapter = adapter.name(),
            "Mounted"
        );

        if let Err(e) = self.watches.watch(&mountpoint, &adapter).await {
            warn!(mountpoint = %mountpoint.name, error = %e, "Mounted without watching");
        }

        Ok(mountpoint)
    }

    /// Close the mountpoint's watch, then remove it. Returns false if it
    /// was not mounted.
    pub async fn unmount(&self, id: MountId) -> bool {
        let _guard = self.lifecycle.lock().await;

        let Some(mountpoint) = self.registry.get(id) else {
            return false;
        };

        self.watches.unwatch(id).await;
        let removed = self.registry.remove(id);
        if removed {
            info!(mountpoint = %mountpoint.name, id = %id, "Unmounted");
        }
        removed
    }

    /// Close every watch and drop all mountpoints
    pub async fn destroy(&self) {
        let _guard = self.lifecycle.lock().await;

        let watches = self.watches.len();
        let closed = self.watches.close_all().await;
        let mounts = self.registry.clear();
        info!(mounts, watches, closed, "Filesystem destroyed");
    }

    pub fn mountpoints(&self) -> Vec<Arc<Mountpoint>> {
        self.registry.mountpoints()
    }

    /// Invoke a method without a transport request
    pub async fn call(&self, options: CallOptions, args: Vec<CallArg>) -> VfsResult<VfsResponse> {
        let method = options.method;
        self.router.request(method, options.into_request(args)).await
    }

    pub async fn request(&self, method: VfsMethod, request: VfsRequest) -> VfsResult<VfsResponse> {
        self.router.request(method, request).await
    }

    /// Adapter-side location of a virtual path, for the given caller or
    /// an anonymous one
    pub fn realpath(&self, path: &str, identity: Option<&CallerIdentity>) -> VfsResult<String> {
        let anonymous = CallerIdentity::anonymous();
        self.router.realpath(identity.unwrap_or(&anonymous), path)
    }

    pub fn mime(&self, filename: &str) -> String {
        self.router.mime().lookup(filename)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn watches(&self) -> &WatchManager {
        &self.watches
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }
}

impl std::fmt::Debug for Filesystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Filesystem")
            .field("registry", &self.registry)
            .field("watches", &self.watches)
            .finish()
    }
}
