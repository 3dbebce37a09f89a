//! Directory listing: one level of children, classified, sorted and tallied.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use thiserror::Error;
use tracing::debug;

use super::collate::compare_names;
use super::paths::{join_relative, ResolvedPath};
use super::types::{classify, extension_of, format_modified, Entry, Listing, Stats};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("directory not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("failed to read directory: {0}")]
    Io(#[from] io::Error),
}

/// Stat `path` and require a directory. Shared with the archive entry point.
pub(crate) fn stat_directory(path: &Path) -> Result<(), ListError> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::NotADirectory) => {
            return Err(ListError::NotFound);
        }
        Err(e) => return Err(ListError::Io(e)),
    };
    if !meta.is_dir() {
        return Err(ListError::NotADirectory);
    }
    Ok(())
}

/// Directories first, then names in collation order.
pub fn order_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| compare_names(&a.name, &b.name))
}

fn build_entry(dir_rel: &str, path: &Path, name: String) -> io::Result<Entry> {
    let meta = fs::metadata(path)?;
    let is_directory = meta.is_dir();
    let extension = extension_of(&name);
    let modified = format_modified(meta.modified().unwrap_or(UNIX_EPOCH))
        .ok_or_else(|| io::Error::other("modification time out of range"))?;
    Ok(Entry {
        path: join_relative(dir_rel, &name),
        is_directory,
        size: if is_directory { 0 } else { meta.len() },
        modified,
        kind: classify(&extension, is_directory),
        extension,
        name,
    })
}

/// List the immediate children of a resolved directory.
///
/// Dot-prefixed names are hidden. A child whose stat fails (broken link,
/// permissions, non UTF-8 name, unrepresentable mtime) is dropped without
/// failing the listing.
pub fn list(resolved: &ResolvedPath) -> Result<Listing, ListError> {
    let dir = resolved.as_path();
    stat_directory(dir)?;

    let mut items = Vec::new();
    for dirent in fs::read_dir(dir)? {
        let dirent = dirent?;
        let Ok(name) = dirent.file_name().into_string() else {
            debug!(dir = %dir.display(), "skipping entry with non UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        match build_entry(resolved.relative(), &dirent.path(), name) {
            Ok(entry) => items.push(entry),
            Err(e) => debug!(path = %dirent.path().display(), error = %e, "skipping unreadable entry"),
        }
    }

    items.sort_by(order_entries);
    let stats = Stats::tally(&items);

    Ok(Listing {
        path: resolved.relative().to_string(),
        parent: resolved.parent_relative(),
        items,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explorer::paths::{resolve, Root, TraversalPolicy};
    use crate::explorer::types::TypeTag;
    use tempfile::tempdir;

    fn entry(name: &str, is_directory: bool) -> Entry {
        Entry {
            name: name.into(),
            path: name.into(),
            is_directory,
            size: 0,
            modified: String::new(),
            extension: extension_of(name),
            kind: classify(&extension_of(name), is_directory),
        }
    }

    #[test]
    fn directories_sort_before_files() {
        let mut v = vec![entry("b.txt", false), entry("a", true), entry("c.txt", false)];
        v.sort_by(order_entries);
        let names: Vec<_> = v.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b.txt", "c.txt"]);

        let mut v = vec![entry("zz", true), entry("aa.txt", false), entry("Mm", true)];
        v.sort_by(order_entries);
        let names: Vec<_> = v.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Mm", "zz", "aa.txt"]);
    }

    #[test]
    fn lists_classifies_and_tallies() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::create_dir(tmp.path().join("Inter.font")).unwrap();
        fs::write(tmp.path().join("notes.MD"), b"hello").unwrap();
        fs::write(tmp.path().join("song.mp3"), vec![0u8; 32]).unwrap();
        fs::write(tmp.path().join(".secret"), b"x").unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();

        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, None, TraversalPolicy::Reject).unwrap();
        let listing = list(&res).unwrap();

        assert_eq!(listing.path, "");
        assert_eq!(listing.parent, None);
        let names: Vec<_> = listing.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Inter.font", "sub", "notes.MD", "song.mp3"]);
        assert!(listing.items.iter().all(|e| !e.name.starts_with('.')));

        let font_dir = &listing.items[0];
        assert!(font_dir.is_directory);
        assert_eq!(font_dir.kind, TypeTag::Folder);
        assert_eq!(font_dir.size, 0);
        assert_eq!(font_dir.extension, "font");

        let notes = &listing.items[2];
        assert_eq!(notes.extension, "md");
        assert_eq!(notes.kind, TypeTag::Text);
        assert_eq!(notes.size, 5);

        assert_eq!(listing.stats, Stats { folders: 2, files: 2, total_size: 37 });
        assert_eq!(listing.stats.folders + listing.stats.files, listing.items.len());
    }

    #[test]
    fn nested_paths_and_parent() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("a/b")).unwrap();
        fs::write(tmp.path().join("a/b/c.rs"), b"fn main() {}").unwrap();

        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, Some("a/b"), TraversalPolicy::Reject).unwrap();
        let listing = list(&res).unwrap();
        assert_eq!(listing.path, "a/b");
        assert_eq!(listing.parent.as_deref(), Some("a"));
        assert_eq!(listing.items[0].path, "a/b/c.rs");
        assert_eq!(listing.items[0].kind, TypeTag::Code);

        let res = resolve(&root, Some("a"), TraversalPolicy::Reject).unwrap();
        assert_eq!(list(&res).unwrap().parent.as_deref(), Some(""));
    }

    #[test]
    fn missing_and_file_paths_fail_distinctly() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("plain.txt"), b"x").unwrap();
        let root = Root::new(tmp.path()).unwrap();

        let res = resolve(&root, Some("nope"), TraversalPolicy::Reject).unwrap();
        assert!(matches!(list(&res), Err(ListError::NotFound)));

        let res = resolve(&root, Some("plain.txt"), TraversalPolicy::Reject).unwrap();
        assert!(matches!(list(&res), Err(ListError::NotADirectory)));

        let res = resolve(&root, Some("plain.txt/below"), TraversalPolicy::Reject).unwrap();
        assert!(matches!(list(&res), Err(ListError::NotFound)));
    }

    #[test]
    fn dot_directories_are_listable_when_requested_directly() {
        let tmp = tempdir().unwrap();
        fs::create_dir(tmp.path().join(".config")).unwrap();
        fs::write(tmp.path().join(".config/app.toml"), b"k = 1").unwrap();
        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, Some(".config"), TraversalPolicy::Reject).unwrap();
        let listing = list(&res).unwrap();
        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.items[0].path, ".config/app.toml");
    }

    #[test]
    fn listing_twice_is_identical() {
        let tmp = tempdir().unwrap();
        for n in ["x.png", "y.woff", "z"] {
            fs::write(tmp.path().join(n), n.as_bytes()).unwrap();
        }
        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, None, TraversalPolicy::Reject).unwrap();
        assert_eq!(list(&res).unwrap(), list(&res).unwrap());
    }

    #[test]
    fn far_future_mtime_drops_only_that_entry() {
        use std::time::Duration;

        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("ok.txt"), b"ok").unwrap();
        let far = tmp.path().join("far.txt");
        fs::write(&far, b"far").unwrap();
        let stamp = UNIX_EPOCH + Duration::from_secs(1 << 62);
        if fs::File::options().write(true).open(&far).and_then(|f| f.set_modified(stamp)).is_err() {
            return;
        }
        let stored = fs::metadata(&far).unwrap().modified().unwrap();
        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, None, TraversalPolicy::Reject).unwrap();
        let listing = list(&res).unwrap();
        let names: Vec<_> = listing.items.iter().map(|e| e.name.as_str()).collect();
        if format_modified(stored).is_none() {
            assert_eq!(names, vec!["ok.txt"]);
            assert_eq!(listing.stats, Stats { folders: 0, files: 1, total_size: 2 });
        } else {
            // Filesystem clamped the timestamp; the entry stays listable.
            assert_eq!(names, vec!["far.txt", "ok.txt"]);
        }
    }

    #[cfg(unix)]
    #[test]
    fn broken_links_are_dropped_not_fatal() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("ok.txt"), b"ok").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();
        let root = Root::new(tmp.path()).unwrap();
        let res = resolve(&root, None, TraversalPolicy::Reject).unwrap();
        let listing = list(&res).unwrap();
        let names: Vec<_> = listing.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ok.txt"]);
    }
}
