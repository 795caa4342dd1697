//! Universal (fat) Mach-O container encoding and decoding.
//!
//! A universal file is a big-endian slice table followed by the unmodified
//! bytes of each single-architecture file, placed at offsets aligned to the
//! architecture's page size. Encoding never touches slice contents; decoding
//! returns each slice's byte range verbatim.

use crate::arch::Architecture;
use crate::macho::{FormatError, ThinSlice};
use camino::Utf8Path;
use goblin::mach::Mach;
use goblin::mach::cputype::{CpuSubType, CpuType};
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Magic number of a universal container, stored big-endian on disk.
const FAT_MAGIC: u32 = 0xcafe_babe;

/// Size of the fat header: magic plus slice count.
const FAT_HEADER_SIZE: u64 = 8;

/// Size of one slice-table record: cputype, cpusubtype, offset, size, align.
const FAT_ARCH_SIZE: u64 = 20;

/// One slice decoded from a universal container.
#[derive(Debug, Clone)]
pub struct FatEntry {
    /// Raw cputype from the slice table.
    pub cputype: CpuType,
    /// Raw cpusubtype from the slice table.
    pub cpusubtype: CpuSubType,
    /// The slice's bytes, exactly as stored.
    pub data: Vec<u8>,
}

/// Write a universal container holding the given slices.
///
/// Slices are sorted by cputype so the output is deterministic regardless of
/// argument order. Each payload is copied byte-for-byte to an offset aligned
/// per its architecture. The container is written to a temporary file beside
/// `dest` and atomically renamed into place; on failure no file is left at
/// `dest`.
///
/// # Errors
///
/// Returns [`FormatError::ArchCollision`] if two slices declare the same
/// cputype, and [`FormatError::TooLarge`] if the layout does not fit in the
/// 32-bit slice table.
pub fn write_fat(mut slices: Vec<ThinSlice>, dest: &Utf8Path) -> Result<(), FormatError> {
    if slices.is_empty() {
        return Err(FormatError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "cannot write a universal container with no slices",
        )));
    }

    slices.sort_by_key(|s| s.cputype);
    for pair in slices.windows(2) {
        if pair[0].cputype == pair[1].cputype {
            return Err(FormatError::ArchCollision {
                arch: pair[0].arch.clone(),
            });
        }
    }

    let layout = plan_layout(&slices, dest)?;

    let mut out: Vec<u8> = Vec::with_capacity(layout.total as usize);
    out.extend_from_slice(&FAT_MAGIC.to_be_bytes());
    let nfat = u32::try_from(slices.len()).map_err(|_| FormatError::TooLarge {
        path: dest.to_owned(),
    })?;
    out.extend_from_slice(&nfat.to_be_bytes());

    for (slice, offset) in slices.iter().zip(&layout.offsets) {
        let size = u32::try_from(slice.data.len()).map_err(|_| FormatError::TooLarge {
            path: dest.to_owned(),
        })?;
        out.extend_from_slice(&slice.cputype.to_be_bytes());
        out.extend_from_slice(&slice.cpusubtype.to_be_bytes());
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&slice.arch.slice_align().to_be_bytes());
    }

    for (slice, offset) in slices.iter().zip(&layout.offsets) {
        out.resize(*offset as usize, 0);
        out.extend_from_slice(&slice.data);
        log::debug!(
            "fat slice {} at offset {offset:#x}, {} bytes",
            slice.arch,
            slice.data.len()
        );
    }

    let parent = dest.parent().unwrap_or(Utf8Path::new("."));
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&out)?;
    tmp.persist(dest).map_err(|e| FormatError::Io(e.error))?;

    Ok(())
}

/// Slice offsets for one container, all within the 32-bit limit.
struct Layout {
    offsets: Vec<u32>,
    total: u64,
}

/// Place each slice at the next offset aligned to its architecture's page
/// size, after the header and slice table.
fn plan_layout(slices: &[ThinSlice], dest: &Utf8Path) -> Result<Layout, FormatError> {
    let mut cursor = FAT_HEADER_SIZE + FAT_ARCH_SIZE * slices.len() as u64;
    let mut offsets = Vec::with_capacity(slices.len());

    for slice in slices {
        let align = 1u64 << slice.arch.slice_align();
        let offset = cursor.div_ceil(align) * align;
        offsets.push(u32::try_from(offset).map_err(|_| FormatError::TooLarge {
            path: dest.to_owned(),
        })?);
        cursor = offset + slice.data.len() as u64;
        if cursor > u64::from(u32::MAX) {
            return Err(FormatError::TooLarge {
                path: dest.to_owned(),
            });
        }
    }

    Ok(Layout {
        offsets,
        total: cursor,
    })
}

/// Read back the slices of a universal container.
///
/// Used to verify merged outputs and by the round-trip tests; slice bytes
/// are returned exactly as stored.
///
/// # Errors
///
/// Returns [`FormatError::NotMachO`] if the file is not a universal
/// container or its slice table points outside the file.
pub fn read_fat(path: &Utf8Path) -> Result<Vec<FatEntry>, FormatError> {
    let data = fs::read(path)?;

    let arches = match Mach::parse(&data) {
        Ok(Mach::Fat(multi)) => multi.arches().map_err(|e| FormatError::NotMachO {
            path: path.to_owned(),
            reason: e.to_string(),
        })?,
        Ok(Mach::Binary(_)) => {
            return Err(FormatError::NotMachO {
                path: path.to_owned(),
                reason: "not a universal file".to_owned(),
            });
        }
        Err(e) => {
            return Err(FormatError::NotMachO {
                path: path.to_owned(),
                reason: e.to_string(),
            });
        }
    };

    let mut entries = Vec::with_capacity(arches.len());
    for arch in arches {
        let start = arch.offset as usize;
        let end = start + arch.size as usize;
        let payload = data.get(start..end).ok_or_else(|| FormatError::NotMachO {
            path: path.to_owned(),
            reason: format!("slice table points outside the file ({start}..{end})"),
        })?;
        entries.push(FatEntry {
            cputype: arch.cputype,
            cpusubtype: arch.cpusubtype,
            data: payload.to_vec(),
        });
    }

    Ok(entries)
}

/// The architectures present in a universal container, in slice-table order.
///
/// # Errors
///
/// Propagates the errors of [`read_fat`].
pub fn architectures(path: &Utf8Path) -> Result<Vec<Architecture>, FormatError> {
    let entries = read_fat(path)?;
    Ok(entries
        .iter()
        .filter_map(|e| Architecture::from_cputype(e.cputype))
        .collect())
}
