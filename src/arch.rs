//! Target architecture identification for universal builds.
//!
//! Only the two architectures exercised by the dual-architecture build are
//! accepted. Any other name is rejected at construction time with a
//! descriptive error.

use crate::error::UnibuildError;
use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64, CpuType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The architecture names accepted by the build driver and the mergers.
const SUPPORTED_ARCHITECTURES: &[&str] = &["x86_64", "arm64"];

/// A validated target architecture name.
///
/// Construction via [`TryFrom`] rejects any name not in the supported set.
///
/// # Examples
///
/// ```
/// use unibuild::arch::Architecture;
///
/// let arch: Architecture = "arm64".try_into().expect("valid architecture");
/// assert_eq!(arch.as_str(), "arm64");
/// assert_eq!(arch.counterpart().as_str(), "x86_64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Architecture(String);

impl Architecture {
    /// Return the architecture name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the full list of supported architecture names.
    #[must_use]
    pub fn supported() -> &'static [&'static str] {
        SUPPORTED_ARCHITECTURES
    }

    /// Return the architecture of the running host.
    #[must_use]
    pub fn host() -> Self {
        #[cfg(target_arch = "aarch64")]
        {
            Self("arm64".to_owned())
        }
        #[cfg(not(target_arch = "aarch64"))]
        {
            Self("x86_64".to_owned())
        }
    }

    /// Return the other architecture of the supported pair.
    #[must_use]
    pub fn counterpart(&self) -> Self {
        if self.0 == "x86_64" {
            Self("arm64".to_owned())
        } else {
            Self("x86_64".to_owned())
        }
    }

    /// Return the Mach-O cputype identifying this architecture.
    #[must_use]
    pub fn cputype(&self) -> CpuType {
        if self.0 == "arm64" {
            CPU_TYPE_ARM64
        } else {
            CPU_TYPE_X86_64
        }
    }

    /// Look up the architecture for a Mach-O cputype.
    ///
    /// Returns `None` for cputypes outside the supported set.
    #[must_use]
    pub fn from_cputype(cputype: CpuType) -> Option<Self> {
        match cputype {
            CPU_TYPE_X86_64 => Some(Self("x86_64".to_owned())),
            CPU_TYPE_ARM64 => Some(Self("arm64".to_owned())),
            _ => None,
        }
    }

    /// Return the required fat-slice alignment for this architecture, as a
    /// power of two.
    ///
    /// Slices are placed in a universal container at offsets aligned to the
    /// architecture's page size: 2^14 for arm64, 2^12 for x86_64.
    #[must_use]
    pub fn slice_align(&self) -> u32 {
        if self.0 == "arm64" { 14 } else { 12 }
    }
}

impl TryFrom<&str> for Architecture {
    type Error = UnibuildError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if SUPPORTED_ARCHITECTURES.contains(&value) {
            Ok(Self(value.to_owned()))
        } else {
            Err(UnibuildError::UnsupportedArchitecture {
                value: value.to_owned(),
                expected: SUPPORTED_ARCHITECTURES.join(", "),
            })
        }
    }
}

impl TryFrom<String> for Architecture {
    type Error = UnibuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Architecture> for String {
    fn from(arch: Architecture) -> Self {
        arch.0
    }
}

impl AsRef<str> for Architecture {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn accepts_all_supported_architectures() {
        for name in SUPPORTED_ARCHITECTURES {
            let arch = Architecture::try_from(*name);
            assert!(arch.is_ok(), "expected {name} to be accepted");
        }
    }

    #[rstest]
    #[case::unknown("mips")]
    #[case::triple("x86_64-apple-darwin")]
    #[case::empty("")]
    fn rejects_unsupported_architecture(#[case] name: &str) {
        let result = Architecture::try_from(name);
        assert!(matches!(
            result,
            Err(UnibuildError::UnsupportedArchitecture { .. })
        ));
    }

    #[test]
    fn counterpart_swaps_the_pair() {
        let x86 = Architecture::try_from("x86_64").expect("valid");
        let arm = Architecture::try_from("arm64").expect("valid");
        assert_eq!(x86.counterpart(), arm);
        assert_eq!(arm.counterpart(), x86);
    }

    #[test]
    fn host_and_counterpart_cover_the_pair() {
        let host = Architecture::host();
        let other = host.counterpart();
        assert_ne!(host, other);
        assert!(SUPPORTED_ARCHITECTURES.contains(&host.as_str()));
        assert!(SUPPORTED_ARCHITECTURES.contains(&other.as_str()));
    }

    #[rstest]
    #[case::x86("x86_64", CPU_TYPE_X86_64, 12)]
    #[case::arm("arm64", CPU_TYPE_ARM64, 14)]
    fn cputype_and_alignment(#[case] name: &str, #[case] cputype: CpuType, #[case] align: u32) {
        let arch = Architecture::try_from(name).expect("valid");
        assert_eq!(arch.cputype(), cputype);
        assert_eq!(arch.slice_align(), align);
    }

    #[test]
    fn from_cputype_round_trips() {
        for name in SUPPORTED_ARCHITECTURES {
            let arch = Architecture::try_from(*name).expect("valid");
            assert_eq!(Architecture::from_cputype(arch.cputype()), Some(arch));
        }
        assert_eq!(Architecture::from_cputype(0), None);
    }

    #[test]
    fn display_shows_inner_value() {
        let arch = Architecture::try_from("arm64").expect("valid");
        assert_eq!(format!("{arch}"), "arm64");
    }
}
