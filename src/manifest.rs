//! Explicit build-artifact manifests.
//!
//! The driver never discovers artifacts by globbing build directories; the
//! expected outputs are enumerated up front, either from the built-in
//! defaults or from a JSON manifest file. This keeps the merge phase
//! testable against a synthetic build tree.

use crate::error::{Result, UnibuildError};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fs;

/// The two artifact kinds the merge phase knows how to combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    /// A whole linked image: dynamic library or executable.
    DynamicImage,
    /// A static archive of object files.
    StaticArchive,
}

/// One expected build output, relative to each architecture's build
/// directory.
///
/// Produced once per architecture by the external build process and
/// consumed exactly once by the merge phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Path relative to a per-architecture build directory.
    pub path: Utf8PathBuf,
    /// Which merge strategy applies.
    pub kind: ArtifactKind,
}

impl BuildArtifact {
    /// An expected dynamic image.
    #[must_use]
    pub fn image(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::DynamicImage,
        }
    }

    /// An expected static archive.
    #[must_use]
    pub fn archive(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ArtifactKind::StaticArchive,
        }
    }
}

/// The set of artifacts one build is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Expected artifacts, merged in listed order.
    pub artifacts: Vec<BuildArtifact>,
}

impl ArtifactManifest {
    /// Create a manifest from a list of artifacts.
    #[must_use]
    pub fn new(artifacts: Vec<BuildArtifact>) -> Self {
        Self { artifacts }
    }

    /// Load a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`UnibuildError::InvalidManifest`] if the file cannot be
    /// read, does not parse, or lists an absolute artifact path.
    pub fn from_file(path: &Utf8Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| UnibuildError::InvalidManifest {
            path: path.to_owned(),
            reason: e.to_string(),
        })?;
        let manifest: Self =
            serde_json::from_str(&contents).map_err(|e| UnibuildError::InvalidManifest {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;

        if let Some(artifact) = manifest.artifacts.iter().find(|a| a.path.is_absolute()) {
            return Err(UnibuildError::InvalidManifest {
                path: path.to_owned(),
                reason: format!(
                    "artifact path {} must be relative to the build directory",
                    artifact.path
                ),
            });
        }

        Ok(manifest)
    }

    /// Iterate over the expected artifacts.
    pub fn iter(&self) -> impl Iterator<Item = &BuildArtifact> {
        self.artifacts.iter()
    }

    /// Number of expected artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether the manifest lists no artifacts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
