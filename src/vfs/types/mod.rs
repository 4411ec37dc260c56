/*!
 * VFS Types
 * Shared types for mountpoints, requests and directory entries
 */

mod capability;
mod entry;
mod errors;
mod identity;
mod method;
mod mountpoint;
mod request;

pub use capability::{Capability, CapabilitySet};
pub use entry::{DirEntry, Stat};
pub use errors::{AdapterCause, VfsError, VfsResult};
pub use identity::{CallerIdentity, VfsContext};
pub use method::{ArgKind, ArgSpec, VfsMethod};
pub use mountpoint::{GroupPolicy, MountAttributes, MountId, MountSpec, Mountpoint};
pub use request::{CallArg, CallOptions, Download, VfsRequest, VfsResponse};
