/*!
 * VFS Directory Entry
 * Entries produced fresh by adapters for stat, readdir and search
 */

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::core::serde::optional_system_time_millis;

/// Adapter-native metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stat {
    pub size: u64,
    #[serde(
        with = "optional_system_time_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub mtime: Option<SystemTime>,
    #[serde(
        with = "optional_system_time_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub ctime: Option<SystemTime>,
    #[serde(
        with = "optional_system_time_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub atime: Option<SystemTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

impl Stat {
    pub fn sized(size: u64) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }
}

/// Directory entry as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    pub is_directory: bool,
    pub is_file: bool,
    /// Filled in by the router for files; `None` for directories
    pub mime: Option<String>,
    pub size: u64,
    pub stat: Stat,
    pub filename: String,
    /// Virtual path (`mount:/sub/path`)
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_size: Option<String>,
}

impl DirEntry {
    pub fn file<F: Into<String>, P: Into<String>>(filename: F, path: P, stat: Stat) -> Self {
        Self {
            is_directory: false,
            is_file: true,
            mime: None,
            size: stat.size,
            stat,
            filename: filename.into(),
            path: path.into(),
            id: None,
            parent_id: None,
            human_size: None,
        }
    }

    pub fn directory<F: Into<String>, P: Into<String>>(filename: F, path: P, stat: Stat) -> Self {
        Self {
            is_directory: true,
            is_file: false,
            mime: None,
            size: 0,
            stat,
            filename: filename.into(),
            path: path.into(),
            id: None,
            parent_id: None,
            human_size: None,
        }
    }

    /// Dotfiles are hidden
    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.filename.starts_with('.')
    }
}
