/*!
 * Directory Listing Transformer
 * Sorts, filters and augments raw readdir results
 *
 * Output order is always: the synthetic `..` entry, then directories, then
 * files. Sorting happens within each group and never moves an entry across.
 */

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use super::paths::{is_mount_root, parent_directory};
use super::types::{DirEntry, Stat};
use crate::core::limits::{IEC_THRESHOLD, IEC_UNITS, SI_THRESHOLD, SI_UNITS};

/// Caller-supplied entry predicate
pub type EntryFilter = Arc<dyn Fn(&DirEntry) -> bool + Send + Sync>;

/// Sort direction; anything unrecognised reads as ascending
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Self {
        match s {
            "desc" => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

impl<'de> Deserialize<'de> for SortDirection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(SortDirection::parse)
            .unwrap_or_default())
    }
}

/// Listing options, deserializable from a request's `options` field
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingOptions {
    pub show_hidden_files: bool,
    pub sort_by: String,
    pub sort_dir: SortDirection,
    /// Render sizes with decimal (kB) units instead of binary (KiB)
    pub si_units: bool,
    #[serde(skip)]
    pub filter: Option<EntryFilter>,
}

impl Default for ListingOptions {
    fn default() -> Self {
        Self {
            show_hidden_files: false,
            sort_by: "filename".to_string(),
            sort_dir: SortDirection::Asc,
            si_units: false,
            filter: None,
        }
    }
}

impl fmt::Debug for ListingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingOptions")
            .field("show_hidden_files", &self.show_hidden_files)
            .field("sort_by", &self.sort_by)
            .field("sort_dir", &self.sort_dir)
            .field("si_units", &self.si_units)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl ListingOptions {
    pub fn sorted_by<S: Into<String>>(mut self, key: S, dir: SortDirection) -> Self {
        self.sort_by = key.into();
        self.sort_dir = dir;
        self
    }

    pub fn with_hidden(mut self) -> Self {
        self.show_hidden_files = true;
        self
    }

    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&DirEntry) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }
}

/// Human-readable file size
///
/// Values below the unit step render as whole bytes (`"500 B"`); otherwise
/// the value is divided until it drops below the step (`"1.0 KiB"`).
pub fn human_file_size(bytes: u64, si: bool) -> String {
    let (thresh, units) = if si {
        (SI_THRESHOLD, &SI_UNITS)
    } else {
        (IEC_THRESHOLD, &IEC_UNITS)
    };

    if (bytes as f64) < thresh {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0usize;
    loop {
        value /= thresh;
        if value < thresh || unit == units.len() - 1 {
            break;
        }
        unit += 1;
    }

    format!("{:.1} {}", value, units[unit])
}

/// The synthetic `..` entry, present unless `root` is a mount root
pub fn create_specials(root: &str) -> Vec<DirEntry> {
    if is_mount_root(root) {
        return Vec::new();
    }

    vec![DirEntry::directory("..", parent_directory(root), Stat::default())]
}

#[derive(Clone, Copy)]
enum SortKind {
    Text,
    Number,
    Date,
    Generic,
}

fn sort_kind(key: &str) -> SortKind {
    match key {
        "size" => SortKind::Number,
        "mtime" | "ctime" | "atime" => SortKind::Date,
        "filename" | "path" | "mime" | "id" | "parentId" | "humanSize" => SortKind::Text,
        _ => SortKind::Generic,
    }
}

/// Precomputed sort key, so each entry is inspected once
enum SortValue {
    Text(String),
    Number(u64),
    Date(Option<SystemTime>),
    Generic(Value),
}

fn sort_value(entry: &DirEntry, key: &str, kind: SortKind) -> SortValue {
    match kind {
        SortKind::Number => SortValue::Number(entry.size),
        SortKind::Date => SortValue::Date(match key {
            "mtime" => entry.stat.mtime,
            "ctime" => entry.stat.ctime,
            _ => entry.stat.atime,
        }),
        SortKind::Text => SortValue::Text(
            match key {
                "filename" => Some(entry.filename.as_str()),
                "path" => Some(entry.path.as_str()),
                "mime" => entry.mime.as_deref(),
                "id" => entry.id.as_deref(),
                "parentId" => entry.parent_id.as_deref(),
                _ => entry.human_size.as_deref(),
            }
            .unwrap_or_default()
            .to_string(),
        ),
        SortKind::Generic => SortValue::Generic(
            serde_json::to_value(entry)
                .ok()
                .and_then(|v| v.get(key).cloned())
                .unwrap_or(Value::Null),
        ),
    }
}

/// Case-insensitive first, then codepoint order as a tie-break
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

fn compare_generic(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn compare(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Text(x), SortValue::Text(y)) => compare_text(x, y),
        (SortValue::Number(x), SortValue::Number(y)) => x.cmp(y),
        (SortValue::Date(x), SortValue::Date(y)) => x.cmp(y),
        (SortValue::Generic(x), SortValue::Generic(y)) => compare_generic(x, y),
        _ => Ordering::Equal,
    }
}

/// Stable sort of one partition by the configured key and direction
fn sort_entries(entries: Vec<DirEntry>, key: &str, dir: SortDirection) -> Vec<DirEntry> {
    let kind = sort_kind(key);
    let mut keyed: Vec<(SortValue, DirEntry)> = entries
        .into_iter()
        .map(|entry| (sort_value(&entry, key, kind), entry))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = compare(a, b);
        match dir {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    keyed.into_iter().map(|(_, entry)| entry).collect()
}

/// Transform a raw listing of `root`
pub fn transform_readdir(
    root: &str,
    entries: Vec<DirEntry>,
    options: &ListingOptions,
) -> Vec<DirEntry> {
    let show_hidden = options.show_hidden_files;
    let keep = |entry: &DirEntry| {
        (show_hidden || !entry.is_hidden())
            && options.filter.as_ref().map_or(true, |f| f(entry))
    };
    let augment = |mut entry: DirEntry| {
        entry.human_size = Some(human_file_size(entry.size, options.si_units));
        entry
    };

    let (directories, files): (Vec<_>, Vec<_>) =
        entries.into_iter().partition(|entry| entry.is_directory);

    let specials = create_specials(root).into_iter().map(augment);
    let directories = sort_entries(directories, &options.sort_by, options.sort_dir)
        .into_iter()
        .filter(|e| keep(e))
        .map(augment);
    let files = sort_entries(files, &options.sort_by, options.sort_dir)
        .into_iter()
        .filter(|e| keep(e))
        .map(augment);

    specials.chain(directories).chain(files).collect()
}
