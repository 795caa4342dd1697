//! Member-level merging of per-architecture static archives.
//!
//! Archives are matched member-by-member: a name present in every input is
//! merged into one universal object, while a name present in exactly one
//! input is carried through unchanged (an architecture-specific compilation
//! unit, such as an assembly variant, is valid single-architecture linker
//! input). The merged archive is packed to a temporary file and renamed over
//! the destination only once every member has been produced.

use super::{ExtractionError, WorkingExtraction, extract_archive};
use crate::macho::FormatError;
use crate::object::merge_objects;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors arising from a whole-archive merge.
#[derive(Debug, Error)]
pub enum MergeError {
    /// One of the input archives could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A member present in several inputs could not be merged.
    #[error("failed to merge member {name:?}: {source}")]
    Member {
        /// Name of the member that failed.
        name: String,
        /// The underlying object-merge failure.
        #[source]
        source: FormatError,
    },

    /// Under [`CopyThroughPolicy::Strict`], a member was present in only one
    /// input archive.
    #[error("member {name:?} is present in only one input archive")]
    UnmatchedMember {
        /// Name of the unmatched member.
        name: String,
    },

    /// Fewer than two input archives were given; there is nothing to merge.
    #[error("archive merging requires at least two input archives")]
    TooFewInputs,

    /// I/O failure while packing the merged archive.
    #[error("failed to pack merged archive: {0}")]
    Pack(#[from] io::Error),
}

/// What to do with a member present in only one input archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyThroughPolicy {
    /// Carry the member through unchanged. The resulting member is valid for
    /// one architecture only; a linker targeting the other architecture will
    /// simply not reference it.
    #[default]
    Lenient,
    /// Fail the merge instead of degrading to a single-architecture member.
    Strict,
}

/// How one member of the merged archive was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberDisposition {
    /// Present in two or more inputs; merged into a universal object.
    Universal,
    /// Present in exactly one input; copied through unchanged.
    CopiedThrough,
}

/// Summary of a completed archive merge.
#[derive(Debug)]
pub struct MergedArchive {
    /// Member names and their dispositions, in output-archive order.
    pub members: Vec<(String, MemberDisposition)>,
}

impl MergedArchive {
    /// Number of members merged into universal objects.
    #[must_use]
    pub fn universal_count(&self) -> usize {
        self.members
            .iter()
            .filter(|(_, d)| *d == MemberDisposition::Universal)
            .count()
    }

    /// Number of members copied through unchanged.
    #[must_use]
    pub fn copied_count(&self) -> usize {
        self.members.len() - self.universal_count()
    }
}

/// Merge per-architecture static archives into one universal archive.
///
/// Members are keyed by name; names are assumed stable across the
/// per-architecture builds of the same source tree. The output member order
/// is the order of first appearance across the inputs, so merging `(A, B)`
/// and `(B, A)` yields the same member-name set with identical
/// per-architecture content. On any failure the destination is left
/// untouched and every working directory is removed.
///
/// # Errors
///
/// Returns [`MergeError::Extraction`] if any input cannot be unpacked,
/// [`MergeError::Member`] if any shared member fails to merge, and
/// [`MergeError::UnmatchedMember`] for single-input members under
/// [`CopyThroughPolicy::Strict`].
pub fn merge_archives(
    inputs: &[Utf8PathBuf],
    dest: &Utf8Path,
    policy: CopyThroughPolicy,
) -> Result<MergedArchive, MergeError> {
    if inputs.len() < 2 {
        return Err(MergeError::TooFewInputs);
    }

    let extractions = inputs
        .iter()
        .enumerate()
        .map(|(idx, path)| extract_archive(path, &format!("in{idx}")))
        .collect::<Result<Vec<_>, _>>()?;

    let scratch = tempfile::Builder::new().prefix("merged_members_").tempdir()?;
    let scratch_dir = Utf8PathBuf::from_path_buf(scratch.path().to_owned())
        .unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()));

    let mut members = Vec::new();
    let mut packed: Vec<(String, Utf8PathBuf)> = Vec::new();

    for name in member_union(&extractions) {
        let holders: Vec<&WorkingExtraction> =
            extractions.iter().filter(|e| e.contains(&name)).collect();

        if holders.len() == 1 {
            if policy == CopyThroughPolicy::Strict {
                return Err(MergeError::UnmatchedMember { name });
            }
            log::debug!("member {name} present in one input, copied through");
            packed.push((name.clone(), holders[0].member_path(&name)));
            members.push((name, MemberDisposition::CopiedThrough));
        } else {
            let sources: Vec<Utf8PathBuf> =
                holders.iter().map(|e| e.member_path(&name)).collect();
            let merged_path = scratch_dir.join(&name);
            merge_objects(&sources, &merged_path).map_err(|source| MergeError::Member {
                name: name.clone(),
                source,
            })?;
            packed.push((name.clone(), merged_path));
            members.push((name, MemberDisposition::Universal));
        }
    }

    pack_archive(&packed, dest)?;

    Ok(MergedArchive { members })
}

/// Member names in order of first appearance across the inputs.
fn member_union(extractions: &[WorkingExtraction]) -> Vec<String> {
    let mut union = Vec::new();
    for extraction in extractions {
        for name in extraction.members() {
            if !union.contains(name) {
                union.push(name.clone());
            }
        }
    }
    union
}

/// Pack member files into an archive at `dest`, atomically.
fn pack_archive(members: &[(String, Utf8PathBuf)], dest: &Utf8Path) -> Result<(), io::Error> {
    let parent = dest.parent().unwrap_or(Utf8Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;

    {
        let mut builder = ar::Builder::new(tmp.as_file_mut());
        for (name, path) in members {
            let data = fs::read(path)?;
            let header = ar::Header::new(name.clone().into_bytes(), data.len() as u64);
            builder.append(&header, data.as_slice())?;
        }
    }

    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::read_fat;
    use crate::macho::MH_OBJECT;
    use crate::test_utils::{read_archive, thin_macho, write_archive};
    use goblin::mach::cputype::{CPU_TYPE_ARM64, CPU_TYPE_X86_64};
    use std::collections::BTreeMap;

    fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path).expect("utf-8 temp path")
    }

    /// Archives for the canonical `{a,b}` x `{b,c}` membership case.
    fn disjoint_pair(dir: &std::path::Path) -> (Utf8PathBuf, Utf8PathBuf) {
        let a_obj = thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"a.o intel");
        let b_x86 = thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"b.o intel");
        let b_arm = thin_macho(CPU_TYPE_ARM64, 0, MH_OBJECT, b"b.o arm");
        let c_obj = thin_macho(CPU_TYPE_ARM64, 0, MH_OBJECT, b"c.o arm");

        let first = write_archive(dir, "first.a", &[("a.o", &a_obj), ("b.o", &b_x86)]);
        let second = write_archive(dir, "second.a", &[("b.o", &b_arm), ("c.o", &c_obj)]);
        (first, second)
    }

    #[test]
    fn merges_shared_members_and_copies_unique_ones() {
        let temp = tempfile::tempdir().expect("temp dir");
        let (first, second) = disjoint_pair(temp.path());
        let dest = utf8(temp.path().join("merged.a"));

        let report =
            merge_archives(&[first, second], &dest, CopyThroughPolicy::Lenient).expect("merge");

        let names: Vec<&str> = report.members.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a.o", "b.o", "c.o"]);
        assert_eq!(report.universal_count(), 1);
        assert_eq!(report.copied_count(), 2);

        let members = read_archive(&dest);
        assert_eq!(members.len(), 3);
        // Unique members carried through byte-for-byte.
        assert_eq!(members[0].1, thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"a.o intel"));
        assert_eq!(members[2].1, thin_macho(CPU_TYPE_ARM64, 0, MH_OBJECT, b"c.o arm"));
        // Shared member is a universal object holding both slices.
        let merged_b = utf8(temp.path().join("b.o"));
        fs::write(&merged_b, &members[1].1).expect("write member for inspection");
        let slices = read_fat(&merged_b).expect("fat member");
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].data, thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"b.o intel"));
        assert_eq!(slices[1].data, thin_macho(CPU_TYPE_ARM64, 0, MH_OBJECT, b"b.o arm"));
    }

    #[test]
    fn membership_is_commutative() {
        let temp = tempfile::tempdir().expect("temp dir");
        let (first, second) = disjoint_pair(temp.path());
        let fwd = utf8(temp.path().join("fwd.a"));
        let rev = utf8(temp.path().join("rev.a"));

        merge_archives(
            &[first.clone(), second.clone()],
            &fwd,
            CopyThroughPolicy::Lenient,
        )
        .expect("forward merge");
        merge_archives(&[second, first], &rev, CopyThroughPolicy::Lenient).expect("reverse merge");

        let fwd_members: BTreeMap<String, Vec<u8>> = read_archive(&fwd).into_iter().collect();
        let rev_members: BTreeMap<String, Vec<u8>> = read_archive(&rev).into_iter().collect();
        assert_eq!(
            fwd_members.keys().collect::<Vec<_>>(),
            rev_members.keys().collect::<Vec<_>>()
        );
        // Per-member content matches: universal members are deterministic
        // (slices sorted by cputype) and unique members are untouched.
        assert_eq!(fwd_members, rev_members);
    }

    #[test]
    fn member_merge_failure_leaves_destination_untouched() {
        let temp = tempfile::tempdir().expect("temp dir");
        // Same architecture on both sides: the member merge must fail.
        let obj = thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"same arch");
        let first = write_archive(temp.path(), "first.a", &[("a.o", &obj)]);
        let second = write_archive(temp.path(), "second.a", &[("a.o", &obj)]);
        let dest = utf8(temp.path().join("merged.a"));
        fs::write(&dest, b"previous contents").expect("seed destination");

        let result = merge_archives(&[first, second], &dest, CopyThroughPolicy::Lenient);

        assert!(matches!(result, Err(MergeError::Member { .. })));
        let remaining = fs::read(&dest).expect("destination still present");
        assert_eq!(remaining, b"previous contents");
    }

    #[test]
    fn extraction_failure_produces_no_destination() {
        let temp = tempfile::tempdir().expect("temp dir");
        let obj = thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"fine");
        let good = write_archive(temp.path(), "good.a", &[("a.o", &obj)]);
        let bad = utf8(temp.path().join("bad.a"));
        fs::write(&bad, b"not an archive at all").expect("write fixture");
        let dest = utf8(temp.path().join("merged.a"));

        let result = merge_archives(&[good, bad], &dest, CopyThroughPolicy::Lenient);

        assert!(matches!(result, Err(MergeError::Extraction(_))));
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn strict_policy_rejects_unmatched_members() {
        let temp = tempfile::tempdir().expect("temp dir");
        let (first, second) = disjoint_pair(temp.path());
        let dest = utf8(temp.path().join("merged.a"));

        let result = merge_archives(&[first, second], &dest, CopyThroughPolicy::Strict);

        assert!(matches!(result, Err(MergeError::UnmatchedMember { .. })));
        assert!(!dest.as_std_path().exists());
    }

    #[test]
    fn fewer_than_two_inputs_is_rejected() {
        let temp = tempfile::tempdir().expect("temp dir");
        let obj = thin_macho(CPU_TYPE_X86_64, 3, MH_OBJECT, b"alone");
        let only = write_archive(temp.path(), "only.a", &[("a.o", &obj)]);
        let dest = utf8(temp.path().join("merged.a"));

        let result = merge_archives(&[only], &dest, CopyThroughPolicy::Lenient);
        assert!(matches!(result, Err(MergeError::TooFewInputs)));
    }
}
