/*!
 * VFS Error Types
 * Structured, type-safe error handling for filesystem operations
 */

use miette::Diagnostic;
use std::sync::Arc;
use thiserror::Error;

/// VFS operation result
///
/// # Must Use
/// VFS operations can fail and must be handled to prevent data loss
#[must_use = "VFS operations can fail and must be handled"]
pub type VfsResult<T> = Result<T, VfsError>;

/// Boxed backend failure kept as the source of an adapter error
pub type AdapterCause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// VFS errors
///
/// Resolution and permission failures are raised before any adapter I/O.
/// Backend failures are wrapped in `Adapter` with the original cause attached.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum VfsError {
    #[error("Not found: {0}")]
    #[diagnostic(
        code(vfs::not_found),
        help("Check the mountpoint prefix and that the path exists.")
    )]
    NotFound(String),

    #[error("Already exists: {0}")]
    #[diagnostic(code(vfs::already_exists))]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    #[diagnostic(
        code(vfs::permission_denied),
        help("The caller's groups do not satisfy the mountpoint's group restriction.")
    )]
    PermissionDenied(String),

    #[error("Read-only mountpoint: {0}")]
    #[diagnostic(code(vfs::read_only))]
    ReadOnly(String),

    #[error("Operation '{method}' is not supported by adapter '{adapter}'")]
    #[diagnostic(
        code(vfs::unsupported_operation),
        help("The adapter does not declare this capability.")
    )]
    UnsupportedOperation { method: String, adapter: String },

    #[error("Invalid argument: {0}")]
    #[diagnostic(code(vfs::invalid_argument))]
    InvalidArgument(String),

    #[error("Invalid path: {0}")]
    #[diagnostic(code(vfs::invalid_path))]
    InvalidPath(String),

    #[error("Not a directory: {0}")]
    #[diagnostic(code(vfs::not_a_directory))]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    #[diagnostic(code(vfs::is_a_directory))]
    IsADirectory(String),

    #[error("Adapter error: {context}")]
    #[diagnostic(code(vfs::adapter))]
    Adapter {
        context: String,
        #[source]
        source: AdapterCause,
    },

    #[error("Watch setup failed for {mountpoint}: {reason}")]
    #[diagnostic(
        code(vfs::watch_setup),
        help("The mountpoint stays usable without change notifications.")
    )]
    WatchSetup { mountpoint: String, reason: String },

    #[error("Configuration error: {0}")]
    #[diagnostic(code(vfs::config))]
    Config(String),
}

impl VfsError {
    /// Wrap a backend failure, keeping it as the error source
    pub fn adapter<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        VfsError::Adapter {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    pub fn unsupported(method: impl Into<String>, adapter: impl Into<String>) -> Self {
        VfsError::UnsupportedOperation {
            method: method.into(),
            adapter: adapter.into(),
        }
    }

    /// Map an I/O error onto the taxonomy, keeping context for the message
    pub fn from_io(e: std::io::Error, context: impl Into<String>) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::NotFound => VfsError::NotFound(context.into()),
            ErrorKind::PermissionDenied => VfsError::PermissionDenied(context.into()),
            ErrorKind::AlreadyExists => VfsError::AlreadyExists(context.into()),
            _ => VfsError::adapter(context, e),
        }
    }

    /// Stable snake_case code for transports
    pub fn code(&self) -> &'static str {
        match self {
            VfsError::NotFound(_) => "not_found",
            VfsError::AlreadyExists(_) => "already_exists",
            VfsError::PermissionDenied(_) => "permission_denied",
            VfsError::ReadOnly(_) => "read_only",
            VfsError::UnsupportedOperation { .. } => "unsupported_operation",
            VfsError::InvalidArgument(_) => "invalid_argument",
            VfsError::InvalidPath(_) => "invalid_path",
            VfsError::NotADirectory(_) => "not_a_directory",
            VfsError::IsADirectory(_) => "is_a_directory",
            VfsError::Adapter { .. } => "adapter",
            VfsError::WatchSetup { .. } => "watch_setup",
            VfsError::Config(_) => "config",
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, VfsError::NotFound(_))
    }
}
