//! Root confinement for client-supplied relative paths.
//!
//! A request path is untrusted text. It is split on `/` and `\`, `.` and empty
//! segments are dropped and `..` is collapsed lexically, then the result is
//! joined onto the root and re-normalized with `path-absolutize`. The final
//! component-wise prefix check against the root is the only thing that decides
//! whether a path is served; everything before it is normalization.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use path_absolutize::Absolutize;
use thiserror::Error;

/// How leading `..` segments that survive normalization are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalPolicy {
    /// Keep them; the confinement check then denies the request.
    #[default]
    Reject,
    /// Drop them before joining onto the root, so `../a` is served as `a`.
    StripLeading,
}

impl FromStr for TraversalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" | "deny" => Ok(TraversalPolicy::Reject),
            "strip" | "strip_leading" | "strip-leading" => Ok(TraversalPolicy::StripLeading),
            other => Err(format!("unknown traversal policy '{}': expected 'reject' or 'strip'", other)),
        }
    }
}

impl fmt::Display for TraversalPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalPolicy::Reject => f.write_str("reject"),
            TraversalPolicy::StripLeading => f.write_str("strip"),
        }
    }
}

/// The single directory beyond which nothing is served. Absolute and
/// normalized once at construction; symlinks are not resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    path: PathBuf,
}

impl Root {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let abs = path.as_ref().absolutize()?.into_owned();
        Ok(Self { path: abs })
    }

    pub fn as_path(&self) -> &Path { &self.path }

    /// Final component of the root directory, used when naming a root-level archive.
    pub fn dir_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// A path proven to be the root or a descendant of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    abs: PathBuf,
    rel: String,
}

impl ResolvedPath {
    pub fn as_path(&self) -> &Path { &self.abs }

    /// Root-relative, `/`-joined; empty at the root.
    pub fn relative(&self) -> &str { &self.rel }

    pub fn is_root(&self) -> bool { self.rel.is_empty() }

    /// Relative path of the parent directory: `None` at the root, `""` one level down.
    pub fn parent_relative(&self) -> Option<String> {
        if self.is_root() {
            return None;
        }
        Some(match self.rel.rfind('/') {
            Some(idx) => self.rel[..idx].to_string(),
            None => String::new(),
        })
    }

    /// Last relative segment; `None` at the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.rel.rsplit('/').next()
    }

    /// Iterate the relative segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.rel.split('/').filter(|s| !s.is_empty())
    }
}

/// Wire-format join of a relative directory path and a child name.
pub fn join_relative(dir: &str, name: &str) -> String {
    if dir.is_empty() { name.to_string() } else { format!("{}/{}", dir, name) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeniedReason {
    /// The normalized path lies outside the root.
    OutsideRoot,
    /// NUL bytes never name a real file.
    NulByte,
    /// Lexical normalization of the joined path failed.
    Unnormalizable,
}

impl fmt::Display for DeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeniedReason::OutsideRoot => f.write_str("path escapes root"),
            DeniedReason::NulByte => f.write_str("path contains NUL"),
            DeniedReason::Unnormalizable => f.write_str("path could not be normalized"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("access denied for {request:?}: {reason}")]
pub struct Denied {
    pub request: String,
    pub reason: DeniedReason,
}

impl Denied {
    fn new(request: &str, reason: DeniedReason) -> Self {
        Self { request: request.to_string(), reason }
    }
}

/// Collapse `.`/`..`/empty segments. Leading `..` that cannot be collapsed are kept.
pub fn normalize_segments(input: &str) -> Vec<&str> {
    let mut out: Vec<&str> = Vec::new();
    for seg in input.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                if matches!(out.last(), Some(last) if *last != "..") {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            s => out.push(s),
        }
    }
    out
}

/// Resolve an untrusted relative path against `root`. An absent path is the root itself.
pub fn resolve(root: &Root, request: Option<&str>, policy: TraversalPolicy) -> Result<ResolvedPath, Denied> {
    let request = request.unwrap_or("");
    if request.contains('\0') {
        return Err(Denied::new(request, DeniedReason::NulByte));
    }

    let mut segments = normalize_segments(request);
    if policy == TraversalPolicy::StripLeading {
        let leading = segments.iter().take_while(|s| **s == "..").count();
        segments.drain(..leading);
    }

    let mut joined = root.path.clone();
    for seg in &segments {
        joined.push(seg);
    }
    let abs = joined
        .absolutize()
        .map_err(|_| Denied::new(request, DeniedReason::Unnormalizable))?
        .into_owned();

    // Authoritative confinement check; runs under every policy.
    let Ok(inside) = abs.strip_prefix(&root.path) else {
        return Err(Denied::new(request, DeniedReason::OutsideRoot));
    };

    let mut parts: Vec<&str> = Vec::new();
    for comp in inside.components() {
        match comp {
            Component::Normal(os) => match os.to_str() {
                Some(s) => parts.push(s),
                None => return Err(Denied::new(request, DeniedReason::Unnormalizable)),
            },
            Component::CurDir => {}
            _ => return Err(Denied::new(request, DeniedReason::OutsideRoot)),
        }
    }
    let rel = parts.join("/");

    Ok(ResolvedPath { abs, rel })
}
