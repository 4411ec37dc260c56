/*!
 * Caller Identity
 * Opaque session identity passed into every VFS call
 */

use serde::{Deserialize, Serialize};

use super::method::VfsMethod;

/// Who is making a VFS call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallerIdentity {
    pub username: String,
    pub groups: Vec<String>,
}

impl CallerIdentity {
    pub fn new<U, G>(username: U, groups: impl IntoIterator<Item = G>) -> Self
    where
        U: Into<String>,
        G: Into<String>,
    {
        Self {
            username: username.into(),
            groups: groups.into_iter().map(Into::into).collect(),
        }
    }

    /// Identity with no username and no groups
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[inline]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

/// Per-request context handed to adapters; lives for one call
#[derive(Debug, Clone)]
pub struct VfsContext {
    pub identity: CallerIdentity,
    pub method: VfsMethod,
}

impl VfsContext {
    pub fn new(identity: CallerIdentity, method: VfsMethod) -> Self {
        Self { identity, method }
    }

    #[inline]
    pub fn username(&self) -> &str {
        &self.identity.username
    }
}
