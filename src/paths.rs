//! Conversion between API paths and store paths
//!
//! API paths are forward-slash, root-relative paths as exchanged with the
//! host. Store paths are absolute, OS-native paths held internally; they
//! never leave the manager.

use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

/// Root the given path under `root_dir` if it is not already.
///
/// The test is a longest-common-prefix check over the textual form, not
/// strict ancestor resolution, so a root that is itself relative still
/// behaves consistently.
pub fn normalize_path(root_dir: &Path, path: &str) -> PathBuf {
    let root_s = root_dir.to_string_lossy();
    if path.starts_with(root_s.as_ref()) {
        PathBuf::from(path)
    } else {
        root_dir.join(path)
    }
}

/// [`normalize_path`] plus case normalization and lexical cleanup, for
/// managers whose store paths must compare equal across spellings.
pub fn normalize_path_strict(root_dir: &Path, path: &str) -> PathBuf {
    lexical_normalize(&normalize_case(normalize_path(root_dir, path)))
}

/// Convert a store path back to an API path. Returns `None` when the path
/// does not live under `root_dir`.
pub fn to_api_path(root_dir: &Path, path: &Path) -> Option<String> {
    let root_s = root_dir.to_string_lossy();
    let path_s = path.to_string_lossy();
    if !path_s.starts_with(root_s.as_ref()) {
        return None;
    }

    let rel = relative_to(path, root_dir);
    // always use forward slashes to delimit children
    Some(rel.to_string_lossy().replace(MAIN_SEPARATOR, "/"))
}

/// Glob pattern matching every descendant of `prefix` at any depth.
pub fn descendants_glob(prefix: &str, sep: char) -> String {
    format!("{prefix}{sep}*")
}

/// Rewrite a descendant path from under `old_prefix` to under `new_prefix`.
/// Paths that do not carry the old prefix are returned unchanged.
pub fn rebase_path(path: &str, old_prefix: &str, new_prefix: &str) -> String {
    match path.strip_prefix(old_prefix) {
        Some(rest) => format!("{new_prefix}{rest}"),
        None => path.to_string(),
    }
}

/// Store paths are kept as strings in the database.
pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Collapse `.`, `..` and repeated separators without touching the
/// filesystem, the way the store expects paths to be spelled.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // ".." at the root stays at the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(comp),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

#[cfg(windows)]
fn normalize_case(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase().replace('/', "\\"))
}

#[cfg(not(windows))]
fn normalize_case(path: PathBuf) -> PathBuf {
    path
}

/// Component-wise relative path, tolerating targets that merely share a
/// textual prefix with the base.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path_comps: Vec<Component<'_>> = path.components().collect();
    let base_comps: Vec<Component<'_>> = base.components().collect();
    let common = path_comps
        .iter()
        .zip(&base_comps)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_comps.len() {
        out.push("..");
    }
    for comp in &path_comps[common..] {
        out.push(comp);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn api_path_round_trip() {
        let root = Path::new("/srv/files");
        let store = normalize_path_strict(root, "notes/a.md");
        assert_eq!(store, PathBuf::from("/srv/files/notes/a.md"));
        assert_eq!(to_api_path(root, &store).as_deref(), Some("notes/a.md"));
    }

    #[test]
    fn already_rooted_path_is_untouched() {
        let root = Path::new("/srv/files");
        let store = normalize_path(root, "/srv/files/notes/a.md");
        assert_eq!(store, PathBuf::from("/srv/files/notes/a.md"));
    }

    #[test]
    fn outside_root_maps_to_none() {
        let root = Path::new("/srv/files");
        assert_eq!(to_api_path(root, Path::new("/etc/passwd")), None);
    }

    #[test]
    fn root_itself_maps_to_dot() {
        let root = Path::new("/srv/files");
        assert_eq!(to_api_path(root, root).as_deref(), Some("."));
    }

    #[test]
    fn lexical_normalize_collapses_dots_and_separators() {
        let root = Path::new("/srv/files");
        let store = normalize_path_strict(root, "a//b/./c/../d");
        assert_eq!(store, PathBuf::from("/srv/files/a/b/d"));
    }

    #[test]
    fn rebase_rewrites_descendants() {
        assert_eq!(
            rebase_path("/srv/files/d/x", "/srv/files/d", "/srv/files/e"),
            "/srv/files/e/x"
        );
        assert_eq!(rebase_path("/srv/files/q", "/srv/files/d", "/srv/files/e"), "/srv/files/q");
    }

    #[test]
    fn descendant_glob_shape() {
        assert_eq!(descendants_glob("/srv/files/d", '/'), "/srv/files/d/*");
    }
}
