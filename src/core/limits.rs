/*!
 * VFS Limits and Constants
 *
 * Centralized location for defaults shared by the mount registry, the
 * request router and the watch manager.
 */

// =============================================================================
// ADAPTERS
// =============================================================================

/// Adapter used when a mountpoint does not name one
pub const DEFAULT_ADAPTER: &str = "system";

/// Adapter name of the volatile in-memory backend
pub const MEMORY_ADAPTER: &str = "memory";

// =============================================================================
// EVENTS
// =============================================================================

/// Event name carried by translated watch notifications
pub const WATCH_CHANGE_EVENT: &str = "vfs:watch:change";

/// In-process event bus capacity (1024 events)
/// Slow in-process subscribers lag instead of stalling watch delivery
pub const EVENT_BUS_CAPACITY: usize = 1024;

/// Outbound queue per remote listener (256 messages)
pub const LISTENER_QUEUE_CAPACITY: usize = 256;

/// Bridge channel between a native watcher thread and its session (512 events)
pub const WATCH_CHANNEL_CAPACITY: usize = 512;

// =============================================================================
// REQUESTS
// =============================================================================

/// MIME type used when nothing else matches
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// Public URL prefix for `url` requests
pub const DEFAULT_PUBLIC_PATH: &str = "/vfs";

/// Requests slower than this are logged as slow unless configured (500ms)
pub const DEFAULT_SLOW_REQUEST_MS: u64 = 500;

// =============================================================================
// LISTINGS
// =============================================================================

/// Binary (IEC) size step
pub const IEC_THRESHOLD: f64 = 1024.0;

/// Decimal (SI) size step
pub const SI_THRESHOLD: f64 = 1000.0;

pub const IEC_UNITS: [&str; 8] = ["KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

pub const SI_UNITS: [&str; 8] = ["kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];
