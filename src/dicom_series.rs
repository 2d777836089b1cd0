//
// dicom_series.rs
// voxread
//
// DICOM readers: a single file (multi-frame aware) and a directory series
// sorted by patient position, with optional auto-orientation to a
// left-to-right, posterior-to-anterior, inferior-to-superior volume.
//

use std::path::Path;

use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::PixelDecoder;
use dicom_dictionary_std::tags;
use nalgebra::{Matrix3, Vector3};
use ndarray::{s, Array2, Array3};
use rayon::prelude::*;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::loader::LoadError;
use crate::volume::{OrientedVolume, ScalarBuffer, VolumeImage};

struct SliceGeometry {
    spacing: [f64; 3],
    origin_lps: [f64; 3],
    direction_lps: Matrix3<f64>,
    position_z: Option<f64>,
    instance_number: Option<f64>,
}

fn geometry_of(obj: &FileDicomObject<InMemDicomObject>) -> SliceGeometry {
    let pixel_spacing = obj
        .element(tags::PIXEL_SPACING)
        .ok()
        .and_then(|e| e.to_multi_float64().ok());
    let thickness = obj
        .element(tags::SLICE_THICKNESS)
        .ok()
        .and_then(|e| e.to_float64().ok())
        .unwrap_or(1.0);
    let spacing = match pixel_spacing {
        // Pixel Spacing is (row spacing, column spacing): y then x.
        Some(ps) if ps.len() >= 2 => [ps[1], ps[0], thickness],
        _ => [1.0, 1.0, thickness],
    };

    let position = obj
        .element(tags::IMAGE_POSITION_PATIENT)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .filter(|p| p.len() >= 3);
    let origin_lps = position
        .as_ref()
        .map(|p| [p[0], p[1], p[2]])
        .unwrap_or([0.0, 0.0, 0.0]);
    let position_z = position.as_ref().map(|p| p[2]);

    let direction_lps = obj
        .element(tags::IMAGE_ORIENTATION_PATIENT)
        .ok()
        .and_then(|e| e.to_multi_float64().ok())
        .filter(|c| c.len() >= 6)
        .map(|c| {
            let row = Vector3::new(c[0], c[1], c[2]);
            let col = Vector3::new(c[3], c[4], c[5]);
            let normal = row.cross(&col);
            Matrix3::from_columns(&[row, col, normal])
        })
        .unwrap_or_else(Matrix3::identity);

    let instance_number = obj
        .element(tags::INSTANCE_NUMBER)
        .ok()
        .and_then(|e| e.to_int::<i32>().ok())
        .map(|n| n as f64);

    SliceGeometry {
        spacing,
        origin_lps,
        direction_lps,
        position_z,
        instance_number,
    }
}

/// Read one DICOM file into a volume; multi-frame objects become one slice
/// per frame. Pixel data is converted to unsigned 16-bit grids.
pub fn read_file(path: &Path, auto_orient: bool) -> Result<OrientedVolume, LoadError> {
    info!(path = %path.display(), "reading DICOM file");
    let obj = open_file(path)?;
    let decoded = obj.decode_pixel_data()?;
    let grid = decoded
        .to_ndarray::<u16>()?
        .slice_move(s![.., .., .., 0]);

    let geometry = geometry_of(&obj);
    let volume = VolumeImage::new(
        ScalarBuffer::UShort(grid),
        geometry.spacing,
        geometry.origin_lps,
    );
    Ok(finish(volume, geometry.direction_lps, auto_orient))
}

/// Read every `.dcm` file below a directory as one series: decode in
/// parallel, sort by Image Position (Patient) z with Instance Number as a
/// fallback, and stack into a volume.
pub fn read_directory(dir: &Path, auto_orient: bool) -> Result<OrientedVolume, LoadError> {
    info!(directory = %dir.display(), "reading DICOM directory");
    let paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    if paths.is_empty() {
        return Err(LoadError::EmptySeries(dir.to_path_buf()));
    }

    let mut slices = paths
        .par_iter()
        .map(|path| read_slice(path))
        .collect::<Result<Vec<_>, LoadError>>()?;

    // Prefer the patient position for ordering; fall back to the instance
    // number when any slice lacks it.
    let by_position = slices.iter().all(|(geom, _)| geom.position_z.is_some());
    slices.sort_by(|a, b| {
        let (ka, kb) = if by_position {
            (a.0.position_z, b.0.position_z)
        } else {
            (a.0.instance_number, b.0.instance_number)
        };
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let (rows, cols) = slices[0].1.dim();
    if slices.iter().any(|(_, image)| image.dim() != (rows, cols)) {
        return Err(LoadError::InconsistentSlices);
    }

    let mut grid = Array3::<u16>::zeros((slices.len(), rows, cols));
    for (z, (_, image)) in slices.iter().enumerate() {
        grid.slice_mut(s![z, .., ..]).assign(image);
    }

    let first = &slices[0].0;
    let mut spacing = first.spacing;
    if slices.len() >= 2 {
        if let (Some(z0), Some(z1)) = (first.position_z, slices[slices.len() - 1].0.position_z) {
            let step = (z1 - z0).abs() / (slices.len() - 1) as f64;
            if step > 0.0 {
                spacing[2] = step;
            }
        }
    }
    debug!(slices = slices.len(), ?spacing, "assembled DICOM series");

    let volume = VolumeImage::new(ScalarBuffer::UShort(grid), spacing, first.origin_lps);
    let direction = first.direction_lps;
    Ok(finish(volume, direction, auto_orient))
}

fn read_slice(path: &Path) -> Result<(SliceGeometry, Array2<u16>), LoadError> {
    let obj = open_file(path)?;
    let decoded = obj.decode_pixel_data()?;
    let image = decoded
        .to_ndarray::<u16>()?
        .slice_move(s![0, .., .., 0]);
    Ok((geometry_of(&obj), image))
}

fn finish(
    mut volume: VolumeImage,
    direction_lps: Matrix3<f64>,
    auto_orient: bool,
) -> OrientedVolume {
    if auto_orient {
        let flips = orientation_flips(&direction_lps);
        for (axis, flip) in flips.iter().enumerate() {
            if *flip {
                debug!(axis, "auto-orienting DICOM stack");
                volume.flip_axis(axis);
            }
        }
    }
    // Note: the stored direction describes the unflipped grid; only the
    // generic ingestion path consumes it, and that path never auto-orients.
    OrientedVolume {
        volume,
        direction_lps,
    }
}

/// For each grid axis, flip when the dominant RAS component of its
/// direction cosine points negative, so the volume ends up left-to-right,
/// posterior-to-anterior, inferior-to-superior.
fn orientation_flips(direction_lps: &Matrix3<f64>) -> [bool; 3] {
    let mut flips = [false; 3];
    for (axis, flip) in flips.iter_mut().enumerate() {
        let d = direction_lps.column(axis);
        let ras = [-d[0], -d[1], d[2]];
        let mut dominant = 0;
        for c in 1..3 {
            if ras[c].abs() > ras[dominant].abs() {
                dominant = c;
            }
        }
        *flip = ras[dominant] < 0.0;
    }
    flips
}
