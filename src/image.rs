//! Whole-image merging for dynamic libraries and executables.
//!
//! Structural merge: each input's slice identity is read from its Mach-O
//! header and a new universal container is emitted listing every slice.
//! Nothing beyond the container framing is rewritten.

use crate::fat::write_fat;
use crate::macho::{FormatError, ThinSlice, read_thin};
use camino::{Utf8Path, Utf8PathBuf};

/// Merge single-architecture images into one universal image.
///
/// Every input must be a thin linked image (dylib, bundle, or executable);
/// relocatable objects belong to [`merge_objects`](crate::object::merge_objects).
/// The destination may be one of the inputs: all inputs are read fully
/// before the destination is replaced, matching the build flow that merges a
/// host-architecture library with its sibling in place. Given the same
/// inputs the output bytes are identical (slices ordered by cputype, padding
/// deterministic).
///
/// # Errors
///
/// Returns [`FormatError::NotThinImage`] for an object-file input,
/// [`FormatError::ArchCollision`] when two inputs share an architecture,
/// and the [`read_thin`](crate::macho::read_thin) errors for inputs that do
/// not parse as thin Mach-O images.
pub fn merge_images(inputs: &[Utf8PathBuf], dest: &Utf8Path) -> Result<(), FormatError> {
    let slices = inputs
        .iter()
        .map(|path| read_image(path))
        .collect::<Result<Vec<_>, _>>()?;

    write_fat(slices, dest)
}

/// Read one input and require it to be a linked image.
fn read_image(path: &Utf8Path) -> Result<ThinSlice, FormatError> {
    let slice = read_thin(path)?;
    if slice.is_object() {
        return Err(FormatError::NotThinImage {
            path: path.to_owned(),
        });
    }
    Ok(slice)
}
