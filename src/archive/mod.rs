//! Static-archive member extraction.
//!
//! Unpacks a Unix `ar` archive into an isolated working directory, one file
//! per member, preserving member names and archive order. The source archive
//! is opened read-only and never mutated. Member names are validated before
//! extraction to guard against path traversal.

pub mod merge;

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fs;
use std::io;
use tempfile::TempDir;
use thiserror::Error;

/// Errors arising from archive extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// I/O error while opening the archive or writing members.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive did not parse as a Unix `ar` file.
    #[error("{path} is not a readable static archive: {reason}")]
    Malformed {
        /// Path to the rejected archive.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The archive contains no members.
    #[error("{path} contains no members")]
    EmptyArchive {
        /// Path to the empty archive.
        path: Utf8PathBuf,
    },

    /// Two members share a name; the merge keys members by name, so the
    /// ambiguity is fatal rather than silently resolved.
    #[error("{path} contains duplicate member {name:?}")]
    DuplicateMember {
        /// Path to the offending archive.
        path: Utf8PathBuf,
        /// The duplicated member name.
        name: String,
    },

    /// A member name attempts to escape the working directory.
    #[error("{path} contains unsafe member name {name:?}")]
    UnsafeMemberName {
        /// Path to the offending archive.
        path: Utf8PathBuf,
        /// The offending member name.
        name: String,
    },
}

/// A transient directory holding one archive's extracted members.
///
/// Owned exclusively by a single merge invocation; the backing directory is
/// uniquely named and removed when the extraction is dropped, on the success
/// and failure paths alike.
#[derive(Debug)]
pub struct WorkingExtraction {
    dir: TempDir,
    members: Vec<String>,
}

impl WorkingExtraction {
    /// Member names in archive order.
    ///
    /// The order carries no meaning for the merge but is stable for a given
    /// archive, which keeps diagnostics reproducible.
    #[must_use]
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Whether the archive contained a member with this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m == name)
    }

    /// Path of an extracted member file.
    #[must_use]
    pub fn member_path(&self, name: &str) -> Utf8PathBuf {
        let mut path = Utf8PathBuf::from_path_buf(self.dir.path().to_owned())
            .unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()));
        path.push(name);
        path
    }
}

/// Extract every member of a static archive into a working directory.
///
/// `tag` disambiguates concurrent extractions of same-named archives (the
/// caller passes the architecture or input ordinal); together with the
/// randomised directory suffix it makes parallel merges safe.
///
/// # Errors
///
/// Returns [`ExtractionError::Malformed`] if the archive cannot be parsed,
/// [`ExtractionError::EmptyArchive`] if it has no members, and
/// [`ExtractionError::DuplicateMember`] /
/// [`ExtractionError::UnsafeMemberName`] for member names the merge cannot
/// key on.
pub fn extract_archive(
    archive: &Utf8Path,
    tag: &str,
) -> Result<WorkingExtraction, ExtractionError> {
    let file = fs::File::open(archive)?;
    let mut reader = ar::Archive::new(file);

    let stem = archive.file_stem().unwrap_or("archive");
    let dir = tempfile::Builder::new()
        .prefix(&format!("{stem}_{tag}_"))
        .tempdir()?;

    let mut members = Vec::new();
    let mut seen = HashSet::new();

    while let Some(entry) = reader.next_entry() {
        let mut entry = entry.map_err(|e| ExtractionError::Malformed {
            path: archive.to_owned(),
            reason: e.to_string(),
        })?;
        let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();

        validate_member_name(archive, &name)?;
        if !seen.insert(name.clone()) {
            return Err(ExtractionError::DuplicateMember {
                path: archive.to_owned(),
                name,
            });
        }

        let mut out = fs::File::create(dir.path().join(&name))?;
        io::copy(&mut entry, &mut out)?;
        members.push(name);
    }

    if members.is_empty() {
        return Err(ExtractionError::EmptyArchive {
            path: archive.to_owned(),
        });
    }

    log::debug!("extracted {} members from {archive}", members.len());

    Ok(WorkingExtraction { dir, members })
}

/// Reject member names that would resolve outside the working directory.
fn validate_member_name(archive: &Utf8Path, name: &str) -> Result<(), ExtractionError> {
    if name.is_empty() || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(ExtractionError::UnsafeMemberName {
            path: archive.to_owned(),
            name: name.to_owned(),
        });
    }
    Ok(())
}
