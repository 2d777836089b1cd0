//
// loader.rs
// voxread
//
// The load operation itself: resolves the format, selects an ingestion
// strategy (with the generic-ingestion precedence override), dispatches to
// the per-format readers, chains the requested axis flips and hands the
// finished volume and transforms to the caller.
//

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::request::{FileFormat, LoadRequest};
use crate::transform::CoordinateTransform;
use crate::volume::VolumeImage;
use crate::{archetype, dicom_series, meta, raw, slices, vtk, vtk_xml};

/// Result of one load operation. The volume owns its buffer outright; no
/// decoder state survives the call.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub volume: VolumeImage,
    pub transform: CoordinateTransform,
}

#[derive(Debug, Error)]
pub enum LoadError {
    // Configuration errors: the request cannot select or feed a reader.
    #[error("no input file name given")]
    MissingInputFile,
    #[error("no input file name or file prefix given")]
    MissingFileOrPrefix,
    #[error("unsupported format '{0}'")]
    UnsupportedFormat(String),
    #[error("extent {0:?} does not describe a volume")]
    InvalidExtent([i32; 6]),
    #[error("file dimensionality must be 2 or 3, got {0}")]
    InvalidDimensionality(u8),
    #[error("bad file pattern {pattern:?}: {reason}")]
    BadPattern { pattern: String, reason: String },

    // Decode errors: the selected reader could not produce a volume.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
    #[error("DICOM pixel data error: {0}")]
    PixelData(#[from] dicom_pixeldata::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("no DICOM images found in {0}")]
    EmptySeries(PathBuf),
    #[error("series slices have inconsistent dimensions")]
    InconsistentSlices,
    #[error("malformed {format} header: {reason}")]
    MalformedHeader {
        format: &'static str,
        reason: String,
    },
    #[error("unsupported {format} encoding '{encoding}'")]
    UnsupportedEncoding {
        format: &'static str,
        encoding: String,
    },
    #[error("unsupported scalar type '{0}'")]
    UnsupportedScalarType(String),
    #[error("scalar buffer does not match the requested extent")]
    ShapeMismatch,
    #[error("image geometry is singular; cannot derive RAS-to-IJK")]
    SingularGeometry,
}

/// Where a reader should take its bytes from: a single named file, or a
/// numbered series expanded from a prefix and pattern.
pub(crate) enum Source<'a> {
    File(&'a Path),
    Series {
        prefix: &'a str,
        pattern: Option<&'a str>,
    },
}

pub(crate) fn required_file(request: &LoadRequest) -> Result<&Path, LoadError> {
    request
        .input_file
        .as_deref()
        .ok_or(LoadError::MissingInputFile)
}

pub(crate) fn file_or_series(request: &LoadRequest) -> Result<Source<'_>, LoadError> {
    if let Some(file) = request.input_file.as_deref() {
        return Ok(Source::File(file));
    }
    match request.input_file_prefix.as_deref() {
        Some(prefix) => Ok(Source::Series {
            prefix,
            pattern: request.input_file_pattern.as_deref(),
        }),
        None => Err(LoadError::MissingFileOrPrefix),
    }
}

/// Execute a load request: exactly one volume and one transform pair out,
/// or a fatal error.
pub fn execute(request: &LoadRequest) -> Result<LoadedImage, LoadError> {
    let format = request.resolved_format();
    debug!(format = format.map(|f| f.name()), "resolved input format");

    // Generic ingestion takes precedence over every dedicated reader
    // except the native XML one, and never handles directory input.
    let generic = request.use_generic_ingestion
        && format != Some(FileFormat::VtkXml)
        && request.input_directory.is_none();

    let mut loaded = if generic {
        archetype::load(request)?
    } else {
        let volume = dispatch(request, format)?;
        LoadedImage {
            volume,
            transform: CoordinateTransform::default(),
        }
    };

    for axis in 0..3 {
        if request.flip[axis] {
            info!(axis, "flipping image axis");
            loaded.volume.flip_axis(axis);
        }
    }

    Ok(loaded)
}

fn dispatch(
    request: &LoadRequest,
    format: Option<FileFormat>,
) -> Result<VolumeImage, LoadError> {
    match format {
        Some(FileFormat::VtkXml) => vtk_xml::read_file(required_file(request)?),
        Some(FileFormat::Vtk) => vtk::read_file(required_file(request)?),
        Some(FileFormat::Dicom) => match request.input_directory.as_deref() {
            Some(dir) => {
                Ok(dicom_series::read_directory(dir, request.auto_orient_dicom)?.volume)
            }
            None => Ok(dicom_series::read_file(
                required_file(request)?,
                request.auto_orient_dicom,
            )?
            .volume),
        },
        Some(FileFormat::Raw) => raw::read(request),
        Some(FileFormat::Meta) => Ok(meta::read_file(required_file(request)?)?.volume),
        Some(FileFormat::Png) | Some(FileFormat::Tiff) => slices::read(request),
        None => Err(LoadError::UnsupportedFormat(String::new())),
    }
}
