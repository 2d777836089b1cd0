use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteordered::{ByteOrdered, Endianness};
use ndarray::Array3;
use tracing::info;

use crate::loader::{file_or_series, LoadError, Source};
use crate::pattern;
use crate::request::{LoadRequest, ScalarKind, UNSET_EXTENT};
use crate::volume::{ScalarBuffer, VolumeImage};

/// Read a raw scalar block of `count` elements in the given kind and byte
/// order. Also used for the meta-image and legacy VTK payloads.
pub(crate) fn read_scalar_block<R: Read>(
    reader: R,
    kind: ScalarKind,
    endianness: Endianness,
    shape: (usize, usize, usize),
) -> Result<ScalarBuffer, LoadError> {
    let count = shape.0 * shape.1 * shape.2;
    let mut bo = ByteOrdered::runtime(reader, endianness);

    macro_rules! read_all {
        ($read:ident, $variant:ident) => {{
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(bo.$read()?);
            }
            ScalarBuffer::$variant(
                Array3::from_shape_vec(shape, values).map_err(|_| LoadError::ShapeMismatch)?,
            )
        }};
    }

    Ok(match kind {
        ScalarKind::UChar => read_all!(read_u8, UChar),
        ScalarKind::Short => read_all!(read_i16, Short),
        ScalarKind::UShort => read_all!(read_u16, UShort),
        ScalarKind::Int => read_all!(read_i32, Int),
        ScalarKind::Float => read_all!(read_f32, Float),
        ScalarKind::Double => read_all!(read_f64, Double),
    })
}

/// Dimensions described by a data extent, rejecting the unset sentinel and
/// inverted ranges.
pub(crate) fn extent_dims(extent: [i32; 6]) -> Result<(usize, usize, usize), LoadError> {
    if extent == UNSET_EXTENT
        || extent[1] < extent[0]
        || extent[3] < extent[2]
        || extent[5] < extent[4]
    {
        return Err(LoadError::InvalidExtent(extent));
    }
    Ok((
        (extent[1] - extent[0] + 1) as usize,
        (extent[3] - extent[2] + 1) as usize,
        (extent[5] - extent[4] + 1) as usize,
    ))
}

/// Read a raw binary volume. A named file is read as one contiguous block
/// for the whole extent; a prefix expands to one 2D file per z index.
pub fn read(request: &LoadRequest) -> Result<VolumeImage, LoadError> {
    if !matches!(request.file_dimensionality, 2 | 3) {
        return Err(LoadError::InvalidDimensionality(request.file_dimensionality));
    }
    let (nx, ny, nz) = extent_dims(request.extent)?;
    let endianness = request.byte_order.endianness();

    let data = match file_or_series(request)? {
        Source::File(path) => {
            info!(path = %path.display(), "reading RAW image file");
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(request.header_size))?;
            read_scalar_block(
                BufReader::new(file),
                request.scalar_kind,
                endianness,
                (nz, ny, nx),
            )?
        }
        Source::Series { prefix, pattern } => {
            info!(prefix, "reading RAW image series");
            let pattern = pattern.unwrap_or(pattern::DEFAULT_PATTERN);
            let mut planes = Vec::with_capacity(nz);
            for z in request.extent[4]..=request.extent[5] {
                let name = pattern::expand(pattern, prefix, z)?;
                let mut file = File::open(Path::new(&name))?;
                file.seek(SeekFrom::Start(request.header_size))?;
                planes.push(read_scalar_block(
                    BufReader::new(file),
                    request.scalar_kind,
                    endianness,
                    (1, ny, nx),
                )?);
            }
            stack_planes(planes)?
        }
    };

    Ok(
        VolumeImage::new(data, request.spacing, request.origin)
            .with_extent(request.extent),
    )
}

/// Concatenate single-slice grids along z. All planes must share one
/// scalar kind and shape.
pub(crate) fn stack_planes(planes: Vec<ScalarBuffer>) -> Result<ScalarBuffer, LoadError> {
    macro_rules! stack {
        ($planes:expr, $variant:ident) => {{
            let views: Vec<_> = $planes
                .iter()
                .map(|p| match p {
                    ScalarBuffer::$variant(arr) => Ok(arr.view()),
                    _ => Err(LoadError::InconsistentSlices),
                })
                .collect::<Result<_, _>>()?;
            ScalarBuffer::$variant(
                ndarray::concatenate(ndarray::Axis(0), &views)
                    .map_err(|_| LoadError::InconsistentSlices)?,
            )
        }};
    }

    match planes.first() {
        Some(ScalarBuffer::UChar(_)) => Ok(stack!(planes, UChar)),
        Some(ScalarBuffer::Short(_)) => Ok(stack!(planes, Short)),
        Some(ScalarBuffer::UShort(_)) => Ok(stack!(planes, UShort)),
        Some(ScalarBuffer::Int(_)) => Ok(stack!(planes, Int)),
        Some(ScalarBuffer::Float(_)) => Ok(stack!(planes, Float)),
        Some(ScalarBuffer::Double(_)) => Ok(stack!(planes, Double)),
        None => Err(LoadError::InconsistentSlices),
    }
}
