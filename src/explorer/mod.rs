//! File explorer core: root confinement, directory listing and zip streaming.
//! Every entity here is built fresh per request from live filesystem state.

pub mod paths;
pub mod types;
pub mod collate;
pub mod listing;
pub mod archive;

pub use paths::{resolve, join_relative, Denied, DeniedReason, ResolvedPath, Root, TraversalPolicy};
pub use types::{classify, extension_of, Entry, Listing, Stats, TypeTag};
pub use listing::{list, ListError};
pub use archive::{archive_name, check_directory, stream, ArchiveError, ArchiveOptions};
