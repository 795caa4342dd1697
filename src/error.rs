//! Top-level error type for the unibuild CLI.
//!
//! Each stage of the build keeps its own semantic error enum close to the
//! code that raises it; this module ties them together into the single type
//! returned to the binary entrypoint.

use thiserror::Error;

use crate::archive::ExtractionError;
use crate::archive::merge::MergeError;
use crate::driver::BuildError;
use crate::macho::FormatError;

/// Errors that can occur during a universal build.
#[derive(Debug, Error)]
pub enum UnibuildError {
    /// An architecture name outside the supported set was supplied.
    #[error("unsupported architecture {value:?}; expected one of: {expected}")]
    UnsupportedArchitecture {
        /// The rejected architecture name.
        value: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// An artifact manifest file could not be read or parsed.
    #[error("invalid artifact manifest at {path}: {reason}")]
    InvalidManifest {
        /// Path to the manifest file.
        path: camino::Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A static archive could not be read or unpacked.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// An object or image was not a mergeable thin Mach-O file.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// A member-level archive merge failed.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// The external build process or the merge phase failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`UnibuildError`].
pub type Result<T> = std::result::Result<T, UnibuildError>;
