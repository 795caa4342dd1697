//! Dual-architecture build orchestration.
//!
//! Runs the external configure+make process once per target architecture
//! into architecture-tagged build directories, strictly sequentially (the
//! external build tool is not assumed reentrant), then merges every
//! manifest artifact across the per-architecture build trees. Merged
//! outputs land at the first-listed (host) architecture's artifact paths,
//! so a downstream install step need not know that merging occurred.

use crate::arch::Architecture;
use crate::archive::merge::{CopyThroughPolicy, MemberDisposition, MergeError, merge_archives};
use crate::executor::{CommandExecutor, Invocation};
use crate::image::merge_images;
use crate::macho::FormatError;
use crate::manifest::{ArtifactKind, ArtifactManifest, BuildArtifact};
use crate::output::write_stderr_line;
use camino::Utf8PathBuf;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use thiserror::Error;

/// Errors that can occur while driving the dual-architecture build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The configuration lists no target architectures.
    #[error("no target architectures configured")]
    NoArchitectures,

    /// The configuration lists the same architecture twice.
    #[error("architecture {arch} is listed more than once")]
    DuplicateArchitecture {
        /// The repeated architecture.
        arch: Architecture,
    },

    /// The configure step exited non-zero.
    #[error("configure failed for {arch}: {reason}")]
    Configure {
        /// Architecture whose configure step failed.
        arch: Architecture,
        /// Captured stderr of the failed step.
        reason: String,
    },

    /// The make step exited non-zero.
    #[error("build failed for {arch}: {reason}")]
    Make {
        /// Architecture whose build failed.
        arch: Architecture,
        /// Captured stderr of the failed step.
        reason: String,
    },

    /// A completed build did not produce an artifact the manifest expects.
    #[error("{arch} build did not produce expected artifact {path}")]
    MissingArtifact {
        /// Architecture whose build is missing the artifact.
        arch: Architecture,
        /// Absolute path that was expected to exist.
        path: Utf8PathBuf,
    },

    /// Merging a dynamic image failed.
    #[error("failed to merge image {artifact}: {source}")]
    Image {
        /// Manifest-relative path of the failing artifact.
        artifact: Utf8PathBuf,
        /// The underlying image-merge failure.
        #[source]
        source: FormatError,
    },

    /// Merging a static archive failed.
    #[error("failed to merge archive {artifact}: {source}")]
    Archive {
        /// Manifest-relative path of the failing artifact.
        artifact: Utf8PathBuf,
        /// The underlying archive-merge failure.
        #[source]
        source: MergeError,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for one dual-architecture build.
///
/// Owned by the driver and passed explicitly to every subprocess
/// invocation; nothing here mutates ambient process state.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source tree containing the `Configure` script.
    pub source_dir: Utf8PathBuf,
    /// Installation prefix handed to the configure script.
    pub prefix: Utf8PathBuf,
    /// Configuration directory handed to the configure script.
    pub config_dir: Utf8PathBuf,
    /// Fixed feature toggles appended to every configure invocation.
    pub feature_toggles: Vec<String>,
    /// Target architectures in build order. The first entry's build
    /// directory receives the merged artifacts.
    pub architectures: Vec<Architecture>,
    /// Inherited environment variables scrubbed from every subprocess.
    pub scrub_env: Vec<String>,
    /// Expected build outputs.
    pub manifest: ArtifactManifest,
    /// Policy for archive members present in only one architecture.
    pub copy_through: CopyThroughPolicy,
}

impl BuildConfig {
    /// Configuration for an OpenSSL 1.1 style source tree: the exercised
    /// feature-toggle set, the host architecture and its counterpart, and
    /// the library artifacts that build produces.
    #[must_use]
    pub fn openssl_defaults(
        source_dir: Utf8PathBuf,
        prefix: Utf8PathBuf,
        config_dir: Utf8PathBuf,
    ) -> Self {
        let host = Architecture::host();
        let counterpart = host.counterpart();
        Self {
            source_dir,
            prefix,
            config_dir,
            feature_toggles: vec![
                "no-ssl3".to_owned(),
                "no-ssl3-method".to_owned(),
                "no-zlib".to_owned(),
                "enable-ec_nistp_64_gcc_128".to_owned(),
            ],
            architectures: vec![host, counterpart],
            scrub_env: vec!["OPENSSL_LOCAL_CONFIG_DIR".to_owned()],
            manifest: ArtifactManifest::new(vec![
                BuildArtifact::image("libcrypto.1.1.dylib"),
                BuildArtifact::image("libssl.1.1.dylib"),
                BuildArtifact::archive("libcrypto.a"),
                BuildArtifact::archive("libssl.a"),
            ]),
            copy_through: CopyThroughPolicy::Lenient,
        }
    }

    /// The architecture-tagged build directory for one architecture.
    #[must_use]
    pub fn build_dir(&self, arch: &Architecture) -> Utf8PathBuf {
        self.source_dir.join(format!("build_{arch}"))
    }

    /// The configure target string for one architecture.
    #[must_use]
    pub fn configure_target(&self, arch: &Architecture) -> String {
        format!("darwin64-{arch}-cc")
    }

    /// The full configure argument list for one architecture.
    ///
    /// The script path is relative because configure runs from inside the
    /// architecture's build directory.
    #[must_use]
    pub fn configure_args(&self, arch: &Architecture) -> Vec<String> {
        let mut args = vec![
            "../Configure".to_owned(),
            format!("--prefix={}", self.prefix),
            format!("--openssldir={}", self.config_dir),
        ];
        args.extend(self.feature_toggles.iter().cloned());
        args.push(self.configure_target(arch));
        args
    }
}

/// Build state of one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchState {
    /// The external build has not completed for this architecture.
    NotBuilt,
    /// The external build completed successfully.
    Built,
}

/// How one manifest artifact ended up after the merge phase.
#[derive(Debug)]
pub enum ArtifactReport {
    /// A universal dynamic image.
    Image {
        /// Final artifact path.
        path: Utf8PathBuf,
    },
    /// A merged static archive.
    Archive {
        /// Final artifact path.
        path: Utf8PathBuf,
        /// Per-member dispositions.
        members: Vec<(String, MemberDisposition)>,
    },
}

impl ArtifactReport {
    /// Final path of the merged artifact.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        match self {
            Self::Image { path } | Self::Archive { path, .. } => path,
        }
    }
}

/// Summary of a completed build.
#[derive(Debug)]
pub struct BuildReport {
    /// One entry per manifest artifact, in manifest order.
    pub artifacts: Vec<ArtifactReport>,
}

/// Drives the per-architecture builds and the merge phase.
pub struct Driver<'a> {
    config: &'a BuildConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> Driver<'a> {
    /// Create a driver over a configuration and an executor.
    #[must_use]
    pub fn new(config: &'a BuildConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Run the whole build: every architecture sequentially, then the merge
    /// phase over the manifest. Progress is written to `stderr`.
    ///
    /// # Errors
    ///
    /// Any configure, make, or merge failure aborts the build; no partially
    /// merged artifact is left at a destination path.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<BuildReport, BuildError> {
        self.validate_architectures()?;

        let mut states: Vec<(Architecture, ArchState)> = self
            .config
            .architectures
            .iter()
            .map(|arch| (arch.clone(), ArchState::NotBuilt))
            .collect();

        let total = states.len();
        for (index, (arch, state)) in states.iter_mut().enumerate() {
            write_stderr_line(stderr, format!("Building {arch} ({}/{total})...", index + 1));
            self.build_architecture(arch)?;
            *state = ArchState::Built;
        }

        // Merging starts only once every architecture is Built.
        debug_assert!(states.iter().all(|(_, s)| *s == ArchState::Built));

        let mut artifacts = Vec::with_capacity(self.config.manifest.len());
        for artifact in self.config.manifest.iter() {
            write_stderr_line(stderr, format!("Merging {}...", artifact.path));
            artifacts.push(self.merge_artifact(artifact)?);
        }

        Ok(BuildReport { artifacts })
    }

    /// Reject empty or duplicated architecture lists.
    fn validate_architectures(&self) -> Result<(), BuildError> {
        if self.config.architectures.is_empty() {
            return Err(BuildError::NoArchitectures);
        }
        let mut seen = HashSet::new();
        for arch in &self.config.architectures {
            if !seen.insert(arch.as_str()) {
                return Err(BuildError::DuplicateArchitecture { arch: arch.clone() });
            }
        }
        Ok(())
    }

    /// Configure and build one architecture in its tagged directory.
    fn build_architecture(&self, arch: &Architecture) -> Result<(), BuildError> {
        let build_dir = self.config.build_dir(arch);
        fs::create_dir_all(&build_dir)?;

        let configure = Invocation {
            program: "perl".to_owned(),
            args: self.config.configure_args(arch),
            cwd: build_dir.clone(),
            env_remove: self.config.scrub_env.clone(),
        };
        let output = self.executor.run(&configure)?;
        if !output.status.success() {
            return Err(BuildError::Configure {
                arch: arch.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        let make = Invocation {
            program: "make".to_owned(),
            args: Vec::new(),
            cwd: build_dir,
            env_remove: self.config.scrub_env.clone(),
        };
        let output = self.executor.run(&make)?;
        if !output.status.success() {
            return Err(BuildError::Make {
                arch: arch.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(())
    }

    /// Merge one manifest artifact across every architecture's build tree.
    fn merge_artifact(&self, artifact: &BuildArtifact) -> Result<ArtifactReport, BuildError> {
        let mut paths = Vec::with_capacity(self.config.architectures.len());
        for arch in &self.config.architectures {
            let path = self.config.build_dir(arch).join(&artifact.path);
            if !path.as_std_path().exists() {
                return Err(BuildError::MissingArtifact {
                    arch: arch.clone(),
                    path,
                });
            }
            paths.push(path);
        }

        // The first-listed architecture's path doubles as the destination.
        let dest = paths[0].clone();

        if paths.len() == 1 {
            log::debug!("single architecture configured; {dest} left thin");
            return Ok(ArtifactReport::Image { path: dest });
        }

        match artifact.kind {
            ArtifactKind::DynamicImage => {
                merge_images(&paths, &dest).map_err(|source| BuildError::Image {
                    artifact: artifact.path.clone(),
                    source,
                })?;
                Ok(ArtifactReport::Image { path: dest })
            }
            ArtifactKind::StaticArchive => {
                let merged = merge_archives(&paths, &dest, self.config.copy_through).map_err(
                    |source| BuildError::Archive {
                        artifact: artifact.path.clone(),
                        source,
                    },
                )?;
                Ok(ArtifactReport::Archive {
                    path: dest,
                    members: merged.members,
                })
            }
        }
    }
}
