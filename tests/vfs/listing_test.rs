/*!
 * Directory Listing Tests
 * Ordering, filtering and size formatting of transformed listings
 */

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::time::{Duration, UNIX_EPOCH};

use ai_os_vfs::vfs::types::{DirEntry, Stat};
use ai_os_vfs::vfs::{human_file_size, transform_readdir, ListingOptions, SortDirection};

const SORT_KEYS: [&str; 9] = [
    "filename", "size", "mtime", "ctime", "path", "mime", "humanSize", "isFile", "bogus",
];

fn entry(name: &str, is_dir: bool, size: u64, mtime_secs: u64) -> DirEntry {
    let stat = Stat {
        size,
        mtime: Some(UNIX_EPOCH + Duration::from_secs(mtime_secs)),
        ..Default::default()
    };
    let path = format!("home:/work/{}", name);
    if is_dir {
        DirEntry::directory(name, path, stat)
    } else {
        DirEntry::file(name, path, stat)
    }
}

fn sample() -> Vec<DirEntry> {
    vec![
        entry("zeta.txt", false, 10, 5),
        entry("Beta", true, 0, 9),
        entry("alpha.md", false, 4096, 1),
        entry(".cache", true, 0, 3),
        entry("gamma", true, 0, 2),
        entry(".env", false, 12, 7),
        entry("Delta.rs", false, 1, 8),
    ]
}

/// Index of the first file, checking no directory follows it
fn assert_grouped(entries: &[DirEntry]) {
    let first_file = entries.iter().position(|e| e.is_file).unwrap_or(entries.len());
    assert!(
        entries[first_file..].iter().all(|e| e.is_file),
        "directory after file: {:?}",
        entries.iter().map(|e| &e.filename).collect::<Vec<_>>()
    );
}

#[test]
fn test_directories_precede_files_for_every_key() {
    for key in SORT_KEYS {
        for dir in [SortDirection::Asc, SortDirection::Desc] {
            let options = ListingOptions::default().sorted_by(key, dir).with_hidden();
            let listing = transform_readdir("home:/work", sample(), &options);

            assert_eq!(listing[0].filename, "..", "key {} {:?}", key, dir);
            assert_eq!(listing.len(), sample().len() + 1);
            assert_grouped(&listing[1..]);
        }
    }
}

#[test]
fn test_sort_within_groups() {
    let options = ListingOptions::default().sorted_by("size", SortDirection::Desc);
    let listing = transform_readdir("home:/", sample(), &options);
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["Beta", "gamma", "alpha.md", "zeta.txt", "Delta.rs"]);

    let options = ListingOptions::default().sorted_by("mtime", SortDirection::Asc);
    let listing = transform_readdir("home:/", sample(), &options);
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["gamma", "Beta", "alpha.md", "zeta.txt", "Delta.rs"]);
}

#[test]
fn test_hidden_and_predicate_compose() {
    let options = ListingOptions::default().with_filter(|e: &DirEntry| e.size < 100);
    let listing = transform_readdir("home:/work", sample(), &options);
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["..", "Beta", "gamma", "Delta.rs", "zeta.txt"]);

    let options = ListingOptions::default()
        .with_hidden()
        .with_filter(|e: &DirEntry| e.filename.contains('e'));
    let listing = transform_readdir("home:/work", sample(), &options);
    let names: Vec<&str> = listing.iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names, vec!["..", ".cache", "Beta", ".env", "Delta.rs", "zeta.txt"]);
}

#[test]
fn test_parent_entry_only_below_mount_root() {
    let listing = transform_readdir("home:/", Vec::new(), &ListingOptions::default());
    assert!(listing.is_empty());

    let listing = transform_readdir("home:/a/b", Vec::new(), &ListingOptions::default());
    assert_eq!(listing.len(), 1);
    assert!(listing[0].is_directory);
    assert_eq!(listing[0].path, "home:/a/");
}

#[test]
fn test_human_sizes_attached() {
    let listing = transform_readdir("home:/", sample(), &ListingOptions::default());
    let alpha = listing.iter().find(|e| e.filename == "alpha.md").unwrap();
    assert_eq!(alpha.human_size.as_deref(), Some("4.0 KiB"));

    let options: ListingOptions = serde_json::from_str(r#"{"siUnits": true}"#).unwrap();
    let listing = transform_readdir("home:/", sample(), &options);
    let alpha = listing.iter().find(|e| e.filename == "alpha.md").unwrap();
    assert_eq!(alpha.human_size.as_deref(), Some("4.1 kB"));
}

#[test]
fn test_options_from_request_json() {
    let options: ListingOptions = serde_json::from_str(
        r#"{"showHiddenFiles": true, "sortBy": "size", "sortDir": "desc"}"#,
    )
    .unwrap();
    assert!(options.show_hidden_files);
    assert_eq!(options.sort_by, "size");
    assert_eq!(options.sort_dir, SortDirection::Desc);

    // Unknown directions fall back to ascending
    let options: ListingOptions = serde_json::from_str(r#"{"sortDir": "sideways"}"#).unwrap();
    assert_eq!(options.sort_dir, SortDirection::Asc);
    assert_eq!(options.sort_by, "filename");
}

#[test]
fn test_human_file_size() {
    assert_eq!(human_file_size(0, false), "0 B");
    assert_eq!(human_file_size(500, false), "500 B");
    assert_eq!(human_file_size(1023, false), "1023 B");
    assert_eq!(human_file_size(1024, false), "1.0 KiB");
    assert_eq!(human_file_size(1536, false), "1.5 KiB");
    assert_eq!(human_file_size(1024 * 1024, false), "1.0 MiB");
    assert_eq!(human_file_size(1000, true), "1.0 kB");
    assert_eq!(human_file_size(999, true), "999 B");
    assert_eq!(human_file_size(2_500_000, true), "2.5 MB");
}

proptest! {
    #[test]
    fn prop_grouping_holds(
        specs in prop::collection::vec(("[a-zA-Z.]{1,8}", any::<bool>(), 0u64..1_000_000, 0u64..1_000), 0..24),
        key_index in 0usize..SORT_KEYS.len(),
        desc in any::<bool>(),
    ) {
        let entries: Vec<DirEntry> = specs
            .iter()
            .map(|(name, is_dir, size, mtime)| entry(name, *is_dir, *size, *mtime))
            .collect();
        let dir = if desc { SortDirection::Desc } else { SortDirection::Asc };
        let options = ListingOptions::default()
            .sorted_by(SORT_KEYS[key_index], dir)
            .with_hidden();

        let listing = transform_readdir("home:/", entries.clone(), &options);
        prop_assert_eq!(listing.len(), entries.len());

        let first_file = listing.iter().position(|e| e.is_file).unwrap_or(listing.len());
        prop_assert!(listing[first_file..].iter().all(|e| e.is_file));
        prop_assert!(listing.iter().all(|e| e.human_size.is_some()));
    }
}
