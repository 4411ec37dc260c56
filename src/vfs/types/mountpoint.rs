/*!
 * Mountpoint Types
 * Named binding of a path prefix to an adapter and its root
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::errors::{VfsError, VfsResult};
use super::identity::CallerIdentity;
use crate::core::serde::is_default;
use crate::vfs::paths;

/// Opaque mountpoint identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountId(Uuid);

impl MountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a mountpoint's `groups` list is matched against the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// Caller must be in every listed group
    #[default]
    All,
    /// Caller must be in at least one listed group
    Any,
}

/// Mountpoint attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MountAttributes {
    /// Request change notifications for this mountpoint
    #[serde(skip_serializing_if = "is_default")]
    pub watch: bool,

    #[serde(skip_serializing_if = "is_default")]
    pub read_only: bool,

    /// Backing root understood by the adapter, may contain `{username}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Adapter name; the default adapter is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,

    #[serde(skip_serializing_if = "is_default")]
    pub group_policy: GroupPolicy,
}

impl MountAttributes {
    /// Group restriction check. An absent or empty list admits everyone.
    pub fn admits(&self, identity: &CallerIdentity) -> bool {
        let required = match &self.groups {
            Some(groups) if !groups.is_empty() => groups,
            _ => return true,
        };

        match self.group_policy {
            GroupPolicy::All => required.iter().all(|g| identity.has_group(g)),
            GroupPolicy::Any => required.iter().any(|g| identity.has_group(g)),
        }
    }
}

/// Mount request, as found in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<MountId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    pub attributes: MountAttributes,
}

impl MountSpec {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_adapter<S: Into<String>>(mut self, adapter: S) -> Self {
        self.attributes.adapter = Some(adapter.into());
        self
    }

    pub fn with_root<S: Into<String>>(mut self, root: S) -> Self {
        self.attributes.root = Some(root.into());
        self
    }

    pub fn watched(mut self) -> Self {
        self.attributes.watch = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.attributes.read_only = true;
        self
    }

    pub fn with_groups<S: Into<String>>(
        mut self,
        groups: impl IntoIterator<Item = S>,
        policy: GroupPolicy,
    ) -> Self {
        self.attributes.groups = Some(groups.into_iter().map(Into::into).collect());
        self.attributes.group_policy = policy;
        self
    }
}

/// An active mountpoint, owned by the mount registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mountpoint {
    pub id: MountId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub root: String,
    pub attributes: MountAttributes,
}

impl Mountpoint {
    /// Build from a spec, assigning an id and defaulting `root` to `{name}:/`
    pub fn from_spec(spec: MountSpec) -> VfsResult<Self> {
        if !paths::is_valid_mount_name(&spec.name) {
            return Err(VfsError::InvalidArgument(format!(
                "invalid mountpoint name '{}'",
                spec.name
            )));
        }

        let root = spec.root.unwrap_or_else(|| format!("{}:/", spec.name));

        Ok(Self {
            id: spec.id.unwrap_or_default(),
            name: spec.name,
            label: spec.label,
            root,
            attributes: spec.attributes,
        })
    }

    /// Virtual path for a path relative to this mountpoint
    pub fn virtual_path(&self, relative: &str) -> String {
        format!("{}:/{}", self.name, relative.trim_start_matches('/'))
    }
}
