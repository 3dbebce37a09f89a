//! Listing wire types. Field names follow the JSON contract consumed by the browser UI.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Closed category derived from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    Folder,
    Image,
    Video,
    Audio,
    Font,
    Document,
    Text,
    Code,
    Archive,
    File,
}

/// Classify by extension (case-insensitive, without the dot). Directories are always folders.
pub fn classify(extension: &str, is_directory: bool) -> TypeTag {
    if is_directory {
        return TypeTag::Folder;
    }
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" | "svg" | "bmp" | "ico" | "avif" => TypeTag::Image,
        "mp4" | "webm" | "mov" | "avi" | "mkv" | "ogv" => TypeTag::Video,
        "mp3" | "wav" | "ogg" | "flac" | "m4a" | "aac" => TypeTag::Audio,
        "otf" | "ttf" | "woff" | "woff2" => TypeTag::Font,
        "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx" => TypeTag::Document,
        "txt" | "md" | "markdown" | "json" | "xml" | "yaml" | "yml" => TypeTag::Text,
        "js" | "ts" | "py" | "rb" | "go" | "rs" | "c" | "cpp" | "h" | "java" | "php" | "html" | "css"
        | "scss" | "sass" => TypeTag::Code,
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" => TypeTag::Archive,
        _ => TypeTag::File,
    }
}

/// Lowercased text after the last `.` of a file name, `""` when there is none.
/// A leading dot alone does not start an extension.
pub fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name[idx + 1..].to_lowercase(),
        _ => String::new(),
    }
}

/// Checked `SystemTime` conversion; `None` when the time lies outside chrono's range.
pub(crate) fn utc_from_system_time(t: SystemTime) -> Option<DateTime<Utc>> {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => DateTime::<Utc>::from_timestamp(i64::try_from(d.as_secs()).ok()?, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            let secs = i64::try_from(d.as_secs()).ok()?;
            match d.subsec_nanos() {
                0 => DateTime::<Utc>::from_timestamp(secs.checked_neg()?, 0),
                n => DateTime::<Utc>::from_timestamp(secs.checked_neg()?.checked_sub(1)?, 1_000_000_000 - n),
            }
        }
    }
}

/// RFC 3339 UTC with millisecond precision, e.g. `2024-01-02T03:04:05.678Z`.
/// `None` when the time cannot be represented.
pub fn format_modified(t: SystemTime) -> Option<String> {
    utc_from_system_time(t).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,
    /// Root-relative, always `/`-joined.
    pub path: String,
    pub is_directory: bool,
    /// Bytes; 0 for directories.
    pub size: u64,
    pub modified: String,
    pub extension: String,
    #[serde(rename = "type")]
    pub kind: TypeTag,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub folders: usize,
    pub files: usize,
    pub total_size: u64,
}

impl Stats {
    pub fn tally(items: &[Entry]) -> Self {
        items.iter().fold(Stats::default(), |mut acc, e| {
            if e.is_directory {
                acc.folders += 1;
            } else {
                acc.files += 1;
                acc.total_size += e.size;
            }
            acc
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub path: String,
    pub parent: Option<String>,
    pub items: Vec<Entry>,
    pub stats: Stats,
}
