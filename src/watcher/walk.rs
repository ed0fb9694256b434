//! Best-effort recursive directory enumeration.

use std::path::{Component, Path, PathBuf};

use jwalk::WalkDir;

/// Enumerate every directory under `root`, including `root` itself.
///
/// Unreadable entries surface as `Err` items so the caller can decide to
/// skip and continue; the walk itself never aborts early.
pub(super) fn walk_dirs(root: &Path) -> impl Iterator<Item = Result<PathBuf, jwalk::Error>> {
    WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_dir() => Some(Ok(e.path())),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
}

/// Lexically clean a path: drop `.` components and fold `..` into the
/// preceding normal component. No filesystem access, no symlink awareness.
///
/// Walked and notified paths keep whatever spelling the watch root had
/// (`./vendor` under a `.` root), so every path must be cleaned before it
/// is compared against the exclude list or stored in the watch set.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` stays `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(Component::ParentDir),
            },
            c => out.push(c),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(Component::CurDir);
    }
    out
}

/// Whole-segment prefix test on cleaned paths: a path is excluded when it
/// equals an exclude entry or sits anywhere below one. Never a substring
/// comparison. Exclude entries are expected pre-normalized.
pub(crate) fn is_excluded(path: &Path, excludes: &[PathBuf]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let path = normalize(path);
    excludes.iter().any(|entry| path.starts_with(entry))
}
