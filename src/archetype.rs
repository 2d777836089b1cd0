//
// archetype.rs
// voxread
//
// Generic ingestion: load any single-file input in its native scalar kind
// and orientation, then derive the RAS-to-IJK and RAS-to-local matrices
// from the source geometry and re-express the volume origin in the local
// de-rotated frame.
//

use tracing::{debug, info};

use crate::loader::{required_file, LoadError, LoadedImage};
use crate::request::{guess_from_extension, FileFormat, LoadRequest};
use crate::transform::{self, CoordinateTransform};
use crate::volume::OrientedVolume;
use crate::{dicom_series, meta, raw, slices, vtk, vtk_xml};

/// Load through the generic path. The format hint is honored when present;
/// otherwise the archetype's extension decides, independently of the
/// request's guessing flag (detection here belongs to the decoder, not to
/// the dispatch configuration).
pub fn load(request: &LoadRequest) -> Result<LoadedImage, LoadError> {
    let file = required_file(request)?;
    info!(archetype = %file.display(), "reading image through generic ingestion");

    let format = request
        .format
        .or_else(|| guess_from_extension(file))
        .ok_or_else(|| LoadError::UnsupportedFormat(String::new()))?;

    let oriented = match format {
        FileFormat::Dicom => {
            // Native orientation: no auto-orient flips on this path.
            dicom_series::read_file(file, false)?
        }
        FileFormat::Meta => meta::read_file(file)?,
        FileFormat::Raw => OrientedVolume::axis_aligned(raw::read(request)?),
        FileFormat::Png | FileFormat::Tiff => {
            OrientedVolume::axis_aligned(slices::read(request)?)
        }
        FileFormat::Vtk => OrientedVolume::axis_aligned(vtk::read_file(file)?),
        FileFormat::VtkXml => OrientedVolume::axis_aligned(vtk_xml::read_file(file)?),
    };

    let OrientedVolume {
        mut volume,
        direction_lps,
    } = oriented;

    let origin_lps = volume.origin;
    let ijk_to_ras = transform::ijk_to_ras(&direction_lps, volume.spacing, origin_lps);
    let ras_to_ijk = ijk_to_ras
        .try_inverse()
        .ok_or(LoadError::SingularGeometry)?;
    let transform = CoordinateTransform::from_ras_to_ijk(ras_to_ijk);

    // The volume's own origin moves to the local (de-rotated) frame;
    // callers needing the patient frame use ras_to_ijk instead.
    let ras_origin = [-origin_lps[0], -origin_lps[1], origin_lps[2]];
    volume.origin = transform::localized_origin(&transform.ras_to_local, ras_origin);
    debug!(origin = ?volume.origin, "rewrote volume origin in local frame");

    Ok(LoadedImage { volume, transform })
}
