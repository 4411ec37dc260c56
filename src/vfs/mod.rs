/*!
 * Virtual File System Module
 * Mountpoint-prefixed namespace over pluggable storage adapters
 */

pub mod bus;
pub mod filesystem;
pub mod listing;
pub mod local;
pub mod memory;
pub mod mime;
pub mod mount;
pub mod observable;
pub mod paths;
pub mod router;
pub mod traits;
pub mod types;
pub mod watch;

// Re-exports
pub use bus::{BroadcastMessage, BusEvent, EventBus, Listener, ListenerAttributes, LocalBus, WatchNotice};
pub use filesystem::{Filesystem, FilesystemBuilder};
pub use listing::{human_file_size, transform_readdir, ListingOptions, SortDirection};
pub use local::SystemAdapter;
pub use memory::MemoryAdapter;
pub use mime::MimeResolver;
pub use mount::{MountRegistry, Resolved};
pub use router::Router;
pub use traits::{Adapter, ChangeKind, MountPath, NativeWatch, RawChange};
pub use types::*;
pub use watch::{WatchEvent, WatchManager, WatchSession};
