/*!
 * AI-OS VFS Library
 * Virtual filesystem layer exposed as a library
 */

pub mod config;
pub mod core;
pub mod monitoring;
pub mod vfs;

// Re-exports
pub use config::{MimeConfig, VfsConfig};
pub use monitoring::init_tracing;
pub use vfs::{
    Adapter, CallArg, CallOptions, CallerIdentity, Capability, CapabilitySet, DirEntry,
    Filesystem, ListingOptions, LocalBus, MemoryAdapter, MountSpec, Mountpoint, SystemAdapter,
    VfsError, VfsMethod, VfsRequest, VfsResponse, VfsResult,
};
