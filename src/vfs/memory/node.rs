/*!
 * Memory Nodes
 * Internal representation of files and directories
 */

use bytes::Bytes;
use std::time::SystemTime;

use super::super::types::Stat;

/// In-memory filesystem node
#[derive(Debug, Clone)]
pub(super) enum Node {
    File {
        data: Bytes,
        modified: SystemTime,
        created: SystemTime,
    },
    Directory {
        created: SystemTime,
    },
}

impl Node {
    pub fn directory() -> Self {
        Node::Directory {
            created: SystemTime::now(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn created(&self) -> SystemTime {
        match self {
            Node::File { created, .. } => *created,
            Node::Directory { created } => *created,
        }
    }

    pub fn stat(&self) -> Stat {
        match self {
            Node::File {
                data,
                modified,
                created,
            } => Stat {
                size: data.len() as u64,
                mtime: Some(*modified),
                ctime: Some(*created),
                ..Default::default()
            },
            Node::Directory { created } => Stat {
                mtime: Some(*created),
                ctime: Some(*created),
                ..Default::default()
            },
        }
    }
}
