/*!
 * Virtual Path Resolver
 * Pure helpers for `mount:/sub/path` strings
 *
 * All functions are total: malformed input yields a degenerate value
 * (usually the empty string) instead of an error.
 */

/// Character allowed in a mountpoint name
#[inline]
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Whether `name` can be used as a mountpoint prefix
pub fn is_valid_mount_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// Leading `name:` prefix of a virtual path, without the colon
///
/// ```
/// use ai_os_vfs::vfs::paths::parse_mount_prefix;
/// assert_eq!(parse_mount_prefix("home:/docs"), Some("home"));
/// assert_eq!(parse_mount_prefix("/docs"), None);
/// ```
pub fn parse_mount_prefix(path: &str) -> Option<&str> {
    let end = path.find(|c: char| !is_name_char(c))?;
    if end > 0 && path[end..].starts_with(':') {
        Some(&path[..end])
    } else {
        None
    }
}

/// Path relative to its mountpoint: prefix, colon and leading slashes removed
pub fn strip_mount_prefix(path: &str) -> &str {
    let rest = match parse_mount_prefix(path) {
        Some(prefix) => &path[prefix.len()..],
        None => path,
    };
    rest.trim_start_matches(':').trim_start_matches('/')
}

/// Parent directory with a trailing slash; idempotent at a mount root
///
/// `parent_directory("a:/x/y/")` is `"a:/x/"`, `parent_directory("a:/")` is `"a:/"`.
pub fn parent_directory(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.ends_with(':') {
        return format!("{}/", trimmed);
    }

    let head = match trimmed.rfind('/') {
        Some(idx) => &trimmed[..idx],
        None => "",
    };

    format!("{}/", head.trim_end_matches('/'))
}

/// Join segments: all but the first lose one leading slash, all but the
/// last lose one trailing slash
pub fn path_join<S: AsRef<str>>(segments: &[S]) -> String {
    let last = segments.len().saturating_sub(1);
    segments
        .iter()
        .enumerate()
        .map(|(index, segment)| {
            let mut s = segment.as_ref();
            if index > 0 {
                s = s.strip_prefix('/').unwrap_or(s);
            }
            if index < last {
                s = s.strip_suffix('/').unwrap_or(s);
            }
            s
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Final path segment
pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Path with the final segment dropped; a two-segment path keeps its
/// prefix with an empty second segment (`"a:/b"` becomes `"a:/"`)
pub fn pathname(path: &str) -> String {
    let mut split: Vec<&str> = path.split('/').collect();
    if split.len() == 2 {
        split[1] = "";
    } else {
        split.pop();
    }
    split.join("/")
}

/// Whether a listing root is the filesystem root of its mountpoint
pub fn is_mount_root(path: &str) -> bool {
    let stripped = strip_mount_prefix(path);
    stripped.split('/').all(str::is_empty)
}
