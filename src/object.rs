//! Compilation-unit object file merging.
//!
//! Two (or more) single-architecture object files representing the same
//! compilation unit are repackaged into one universal object. The inputs are
//! never recompiled or relinked; each becomes a byte-identical slice of the
//! output container.

use crate::fat::write_fat;
use crate::macho::{FormatError, ThinSlice, read_thin};
use camino::{Utf8Path, Utf8PathBuf};

/// Merge single-architecture object files into one universal object.
///
/// Every input must be a thin relocatable object (`MH_OBJECT`); the inputs
/// must declare pairwise-distinct architectures. Accepts one or more inputs
/// so the caller can fold over an arbitrary architecture set; the exercised
/// configuration passes exactly two. The destination is replaced atomically,
/// and is left untouched when the merge fails.
///
/// # Errors
///
/// Returns [`FormatError::NotThinObject`] for a linked-image input,
/// [`FormatError::ArchCollision`] when two inputs share an architecture,
/// and the [`read_thin`](crate::macho::read_thin) errors for inputs that are
/// not thin Mach-O files.
pub fn merge_objects(inputs: &[Utf8PathBuf], dest: &Utf8Path) -> Result<(), FormatError> {
    let slices = inputs
        .iter()
        .map(|path| read_object(path))
        .collect::<Result<Vec<_>, _>>()?;

    write_fat(slices, dest)
}

/// Read one input and require it to be a relocatable object.
fn read_object(path: &Utf8Path) -> Result<ThinSlice, FormatError> {
    let slice = read_thin(path)?;
    if !slice.is_object() {
        return Err(FormatError::NotThinObject {
            path: path.to_owned(),
        });
    }
    Ok(slice)
}
