//! Recursive zip of a resolved directory, written incrementally to a caller-owned sink.
//!
//! Entry names are relative to the archived directory itself, so the
//! directory's own name never appears as a path segment inside the archive.

use std::fs::{self, File, Metadata};
use std::io::{self, Write};
use std::path::Path;

use chrono::{Datelike, Local, Timelike};
use thiserror::Error;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::listing::{stat_directory, ListError};
use super::paths::{ResolvedPath, Root};
use super::types::utc_from_system_time;

const FONT_COLLECTION_SUFFIX: &str = ".font";
/// Years an MS-DOS timestamp can hold.
const DOS_YEARS: std::ops::RangeInclusive<i32> = 1980..=2107;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("directory not found")]
    NotFound,
    #[error("not a directory")]
    NotADirectory,
    #[error("archive i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("zip encoding failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

impl ArchiveError {
    /// True when the sink stopped accepting bytes (client went away).
    pub fn is_sink_closed(&self) -> bool {
        let kind = match self {
            ArchiveError::Io(e) => e.kind(),
            ArchiveError::Zip(zip::result::ZipError::Io(e)) => e.kind(),
            _ => return false,
        };
        kind == io::ErrorKind::BrokenPipe
    }
}

impl From<ListError> for ArchiveError {
    fn from(e: ListError) -> Self {
        match e {
            ListError::NotFound => ArchiveError::NotFound,
            ListError::NotADirectory => ArchiveError::NotADirectory,
            ListError::Io(io) => ArchiveError::Io(io),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    /// Include dot-prefixed files and directories.
    pub include_hidden: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self { Self { include_hidden: true } }
}

/// Same existence and directory checks as listing, run independently.
pub fn check_directory(resolved: &ResolvedPath) -> Result<(), ArchiveError> {
    stat_directory(resolved.as_path()).map_err(ArchiveError::from)
}

/// "Save as" name: final segment with a trailing `.font` removed, plus `.zip`.
/// At the root the root directory's own name is used.
pub fn archive_name(resolved: &ResolvedPath, root: &Root) -> String {
    let base = resolved
        .file_name()
        .or_else(|| root.dir_name())
        .unwrap_or_default();
    let stem = base.strip_suffix(FONT_COLLECTION_SUFFIX).unwrap_or(base);
    let stem = if stem.is_empty() { "archive" } else { stem };
    format!("{}.zip", stem)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|n| n.starts_with('.'))
}

fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("/")) }
}

/// Entry timestamp in local time; the zip default (1980-01-01) when the
/// mtime is missing or outside the DOS range.
fn zip_time(meta: &Metadata) -> zip::DateTime {
    meta.modified()
        .ok()
        .and_then(utc_from_system_time)
        .filter(|t| DOS_YEARS.contains(&t.year()))
        .map(|t| t.with_timezone(&Local))
        .and_then(|t| {
            zip::DateTime::from_date_and_time(
                u16::try_from(t.year()).ok()?,
                t.month() as u8,
                t.day() as u8,
                t.hour() as u8,
                t.minute() as u8,
                t.second() as u8,
            )
            .ok()
        })
        .unwrap_or_default()
}

fn file_options(meta: &Metadata) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(zip_time(meta))
        .large_file(meta.len() >= u64::from(u32::MAX))
}

/// Walk `resolved` recursively and write a Deflate (level 9) zip of its contents to `sink`.
///
/// Bytes reach `sink` as they are produced; the whole archive is never held in
/// memory. A write error from `sink` stops the walk at the next write.
pub fn stream<W: Write>(resolved: &ResolvedPath, sink: W, options: &ArchiveOptions) -> Result<(), ArchiveError> {
    check_directory(resolved)?;
    let base = resolved.as_path();

    let mut zip = ZipWriter::new_stream(sink);
    let walker = WalkDir::new(base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| options.include_hidden || !is_hidden(e));

    let mut files = 0usize;
    for entry in walker {
        let entry = entry?;
        let Some(name) = entry_name(base, entry.path()) else { continue };
        let file_type = entry.file_type();

        if file_type.is_dir() {
            let meta = entry.metadata()?;
            let dir_opts = SimpleFileOptions::default().last_modified_time(zip_time(&meta));
            zip.add_directory(format!("{}/", name), dir_opts)?;
            continue;
        }

        let meta = if file_type.is_file() {
            entry.metadata()?
        } else if file_type.is_symlink() {
            match fs::metadata(entry.path()) {
                Ok(m) if m.is_file() => m,
                _ => {
                    debug!(path = %entry.path().display(), "skipping symlink that is not a regular file");
                    continue;
                }
            }
        } else {
            continue;
        };

        zip.start_file(name, file_options(&meta))?;
        let mut src = File::open(entry.path())?;
        io::copy(&mut src, &mut zip)?;
        files += 1;
    }

    let mut out = zip.finish()?;
    out.flush()?;
    debug!(dir = %base.display(), files, "archive finished");
    Ok(())
}
