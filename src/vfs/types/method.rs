/*!
 * VFS Methods
 * Method names, static argument schemas and capability mapping
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::capability::Capability;
use super::errors::VfsError;

/// Kind of a positional argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Virtual path, resolved through the mount registry
    Path,
    /// Plain string
    Text,
    /// File contents
    Data,
    /// Free-form JSON options object
    Options,
}

/// One entry in a method's argument schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: ArgKind) -> ArgSpec {
    ArgSpec {
        name,
        kind,
        required: false,
    }
}

const PATH_ONLY: &[ArgSpec] = &[required("path", ArgKind::Path)];
const PATH_OPTIONS: &[ArgSpec] = &[
    required("path", ArgKind::Path),
    optional("options", ArgKind::Options),
];
const WRITE: &[ArgSpec] = &[
    required("path", ArgKind::Path),
    required("data", ArgKind::Data),
    optional("options", ArgKind::Options),
];
const FROM_TO: &[ArgSpec] = &[
    required("from", ArgKind::Path),
    required("to", ArgKind::Path),
];
const SEARCH: &[ArgSpec] = &[
    required("root", ArgKind::Path),
    required("pattern", ArgKind::Text),
];

/// Operations exposed by the request router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VfsMethod {
    Capabilities,
    Realpath,
    Exists,
    Stat,
    Readdir,
    Readfile,
    Writefile,
    Mkdir,
    Unlink,
    Rename,
    Copy,
    Search,
    Url,
    Download,
}

impl VfsMethod {
    pub const ALL: [VfsMethod; 14] = [
        VfsMethod::Capabilities,
        VfsMethod::Realpath,
        VfsMethod::Exists,
        VfsMethod::Stat,
        VfsMethod::Readdir,
        VfsMethod::Readfile,
        VfsMethod::Writefile,
        VfsMethod::Mkdir,
        VfsMethod::Unlink,
        VfsMethod::Rename,
        VfsMethod::Copy,
        VfsMethod::Search,
        VfsMethod::Url,
        VfsMethod::Download,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VfsMethod::Capabilities => "capabilities",
            VfsMethod::Realpath => "realpath",
            VfsMethod::Exists => "exists",
            VfsMethod::Stat => "stat",
            VfsMethod::Readdir => "readdir",
            VfsMethod::Readfile => "readfile",
            VfsMethod::Writefile => "writefile",
            VfsMethod::Mkdir => "mkdir",
            VfsMethod::Unlink => "unlink",
            VfsMethod::Rename => "rename",
            VfsMethod::Copy => "copy",
            VfsMethod::Search => "search",
            VfsMethod::Url => "url",
            VfsMethod::Download => "download",
        }
    }

    /// Positional argument schema, used for validation and simulated calls
    pub fn arguments(&self) -> &'static [ArgSpec] {
        match self {
            VfsMethod::Capabilities
            | VfsMethod::Realpath
            | VfsMethod::Exists
            | VfsMethod::Mkdir
            | VfsMethod::Unlink
            | VfsMethod::Url
            | VfsMethod::Download => PATH_ONLY,
            VfsMethod::Stat | VfsMethod::Readdir | VfsMethod::Readfile => PATH_OPTIONS,
            VfsMethod::Writefile => WRITE,
            VfsMethod::Rename | VfsMethod::Copy => FROM_TO,
            VfsMethod::Search => SEARCH,
        }
    }

    /// Adapter capability the method needs on a same-adapter call
    pub fn capability(&self) -> Option<Capability> {
        match self {
            VfsMethod::Capabilities | VfsMethod::Realpath | VfsMethod::Url => None,
            VfsMethod::Exists | VfsMethod::Stat => Some(Capability::Stat),
            VfsMethod::Readdir => Some(Capability::Readdir),
            VfsMethod::Readfile | VfsMethod::Download => Some(Capability::Read),
            VfsMethod::Writefile => Some(Capability::Write),
            VfsMethod::Mkdir => Some(Capability::Mkdir),
            VfsMethod::Unlink => Some(Capability::Unlink),
            VfsMethod::Rename => Some(Capability::Rename),
            VfsMethod::Copy => Some(Capability::Copy),
            VfsMethod::Search => Some(Capability::Search),
        }
    }

    /// Whether the method mutates the target mountpoint
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            VfsMethod::Writefile
                | VfsMethod::Mkdir
                | VfsMethod::Unlink
                | VfsMethod::Rename
                | VfsMethod::Copy
        )
    }
}

impl fmt::Display for VfsMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VfsMethod {
    type Err = VfsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VfsMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| VfsError::InvalidArgument(format!("unknown VFS method '{}'", s)))
    }
}
