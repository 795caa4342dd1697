//! Thin Mach-O slice inspection.
//!
//! The mergers never recompile, relink, or reinterpret their inputs; they
//! only need the identity of each input (cputype, cpusubtype, filetype) and
//! its raw bytes. This module reads exactly that, rejecting anything that is
//! not a single-architecture Mach-O file.

use crate::arch::Architecture;
use camino::{Utf8Path, Utf8PathBuf};
use goblin::mach::Mach;
use goblin::mach::cputype::{CpuSubType, CpuType};
use std::fs;
use thiserror::Error;

pub use goblin::mach::header::{MH_BUNDLE, MH_DYLIB, MH_EXECUTE, MH_OBJECT};

/// Errors arising from object and image merging.
#[derive(Debug, Error)]
pub enum FormatError {
    /// I/O error while reading an input or writing the merged output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input did not parse as a Mach-O file.
    #[error("{path} is not a Mach-O file: {reason}")]
    NotMachO {
        /// Path to the rejected input.
        path: Utf8PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The input is already a multi-architecture container.
    #[error("{path} is already a universal file; expected a single-architecture input")]
    FatInput {
        /// Path to the rejected input.
        path: Utf8PathBuf,
    },

    /// The input is a Mach-O file but not a relocatable object.
    #[error("{path} is not a relocatable object file")]
    NotThinObject {
        /// Path to the rejected input.
        path: Utf8PathBuf,
    },

    /// The input is a Mach-O file but not a linked image.
    #[error("{path} is not a linked image (dylib, bundle, or executable)")]
    NotThinImage {
        /// Path to the rejected input.
        path: Utf8PathBuf,
    },

    /// Two inputs declare the same architecture, so a single universal
    /// output cannot hold both.
    #[error("two inputs declare the same architecture {arch}; cannot merge")]
    ArchCollision {
        /// The duplicated architecture.
        arch: Architecture,
    },

    /// The input declares a cputype outside the supported set.
    #[error("{path} declares unsupported cputype {cputype:#x}")]
    UnknownArch {
        /// Path to the rejected input.
        path: Utf8PathBuf,
        /// The unrecognised cputype value.
        cputype: CpuType,
    },

    /// The combined slices do not fit in a 32-bit fat container.
    #[error("merged output for {path} exceeds the universal container size limit")]
    TooLarge {
        /// Destination path of the oversized output.
        path: Utf8PathBuf,
    },
}

/// A single-architecture Mach-O file read into memory.
///
/// Carries the raw bytes unchanged; when placed into a universal container
/// the payload is copied byte-for-byte.
#[derive(Debug, Clone)]
pub struct ThinSlice {
    /// Path the slice was read from, kept for error reporting.
    pub source: Utf8PathBuf,
    /// The architecture declared by the Mach-O header.
    pub arch: Architecture,
    /// Raw cputype from the header.
    pub cputype: CpuType,
    /// Raw cpusubtype from the header, including capability bits.
    pub cpusubtype: CpuSubType,
    /// Mach-O filetype (`MH_OBJECT`, `MH_DYLIB`, ...).
    pub filetype: u32,
    /// The complete file contents.
    pub data: Vec<u8>,
}

impl ThinSlice {
    /// Whether this slice is a relocatable object (`MH_OBJECT`).
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.filetype == MH_OBJECT
    }
}

/// Read a file and require it to be a thin (single-architecture) Mach-O.
///
/// # Errors
///
/// Returns [`FormatError::NotMachO`] if the file does not parse,
/// [`FormatError::FatInput`] if it is already universal, and
/// [`FormatError::UnknownArch`] if its cputype is outside the supported set.
pub fn read_thin(path: &Utf8Path) -> Result<ThinSlice, FormatError> {
    let data = fs::read(path)?;

    let macho = match Mach::parse(&data) {
        Ok(Mach::Binary(macho)) => macho,
        Ok(Mach::Fat(_)) => {
            return Err(FormatError::FatInput {
                path: path.to_owned(),
            });
        }
        Err(e) => {
            return Err(FormatError::NotMachO {
                path: path.to_owned(),
                reason: e.to_string(),
            });
        }
    };

    let cputype = macho.header.cputype;
    let cpusubtype = macho.header.cpusubtype;
    let filetype = macho.header.filetype;
    let arch = Architecture::from_cputype(cputype).ok_or(FormatError::UnknownArch {
        path: path.to_owned(),
        cputype,
    })?;

    log::trace!("{path}: thin {arch} mach-o, filetype {filetype:#x}, {} bytes", data.len());

    Ok(ThinSlice {
        source: path.to_owned(),
        arch,
        cputype,
        cpusubtype,
        filetype,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{thin_macho, write_fixture};
    use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};
    use rstest::rstest;

    #[test]
    fn reads_a_thin_object() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = write_fixture(
            temp.path(),
            "unit.o",
            &thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"text section"),
        );

        let slice = read_thin(&path).expect("parse");
        assert_eq!(slice.arch.as_str(), "x86_64");
        assert_eq!(slice.filetype, MH_OBJECT);
        assert!(slice.is_object());
        assert_eq!(slice.data.len(), 32 + b"text section".len());
    }

    #[test]
    fn reads_a_thin_dylib() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = write_fixture(
            temp.path(),
            "libdemo.dylib",
            &thin_macho(CPU_TYPE_ARM64, 0, MH_DYLIB, b"code"),
        );

        let slice = read_thin(&path).expect("parse");
        assert_eq!(slice.arch.as_str(), "arm64");
        assert!(!slice.is_object());
    }

    #[rstest]
    #[case::empty(&[][..])]
    #[case::garbage(b"definitely not mach-o at all".as_slice())]
    fn rejects_non_macho_input(#[case] contents: &[u8]) {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = write_fixture(temp.path(), "bogus.o", contents);

        let result = read_thin(&path);
        assert!(matches!(result, Err(FormatError::NotMachO { .. })));
    }

    #[test]
    fn rejects_missing_file_with_io_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = camino::Utf8PathBuf::try_from(temp.path().join("absent.o"))
            .expect("utf-8 temp path");

        let result = read_thin(&path);
        assert!(matches!(result, Err(FormatError::Io(_))));
    }
}
