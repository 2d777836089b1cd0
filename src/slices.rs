use std::path::Path;

use image::{ColorType, DynamicImage};
use ndarray::Array3;
use tracing::info;

use crate::loader::{file_or_series, LoadError, Source};
use crate::pattern;
use crate::raw::extent_dims;
use crate::request::LoadRequest;
use crate::volume::{ScalarBuffer, VolumeImage};

/// Read a PNG or TIFF input: a single file becomes a one-slice volume; a
/// prefix expands to one image per z index, stacked into a volume with the
/// request's extent, spacing and origin applied.
pub fn read(request: &LoadRequest) -> Result<VolumeImage, LoadError> {
    match file_or_series(request)? {
        Source::File(path) => {
            info!(path = %path.display(), "reading image file");
            let plane = decode_plane(path)?;
            Ok(VolumeImage::new(plane, [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]))
        }
        Source::Series { prefix, pattern } => {
            info!(prefix, "reading image series");
            let pattern = pattern.unwrap_or(pattern::DEFAULT_PATTERN);
            let (nx, ny, nz) = extent_dims(request.extent)?;

            let mut planes = Vec::with_capacity(nz);
            for z in request.extent[4]..=request.extent[5] {
                let name = pattern::expand(pattern, prefix, z)?;
                planes.push(decode_plane(Path::new(&name))?);
            }

            let stacked = crate::raw::stack_planes(planes)?;
            let (snz, sny, snx) = stacked.dim();
            if (snx, sny, snz) != (nx, ny, nz) {
                return Err(LoadError::InvalidExtent(request.extent));
            }
            Ok(
                VolumeImage::new(stacked, request.spacing, request.origin)
                    .with_extent(request.extent),
            )
        }
    }
}

/// Decode one image file into a single-slice grid: 16-bit sources keep
/// their depth, everything else collapses to 8-bit grayscale.
fn decode_plane(path: &Path) -> Result<ScalarBuffer, LoadError> {
    let img = image::open(path)?;
    Ok(match img.color() {
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => {
            to_buffer_16(img)?
        }
        _ => to_buffer_8(img)?,
    })
}

fn to_buffer_8(img: DynamicImage) -> Result<ScalarBuffer, LoadError> {
    let gray = img.to_luma8();
    let (w, h) = gray.dimensions();
    let grid = Array3::from_shape_vec((1, h as usize, w as usize), gray.into_raw())
        .map_err(|_| LoadError::ShapeMismatch)?;
    Ok(ScalarBuffer::UChar(grid))
}

fn to_buffer_16(img: DynamicImage) -> Result<ScalarBuffer, LoadError> {
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let grid = Array3::from_shape_vec((1, h as usize, w as usize), gray.into_raw())
        .map_err(|_| LoadError::ShapeMismatch)?;
    Ok(ScalarBuffer::UShort(grid))
}
