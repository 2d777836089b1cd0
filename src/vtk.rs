//
// vtk.rs
// voxread
//
// Legacy VTK structured-points reader: text header, then scalar point data
// as ASCII tokens or a big-endian binary block.
//

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use byteordered::Endianness;
use ndarray::Array3;
use tracing::info;

use crate::loader::LoadError;
use crate::raw::read_scalar_block;
use crate::request::ScalarKind;
use crate::volume::{ScalarBuffer, VolumeImage};

fn bad(reason: impl Into<String>) -> LoadError {
    LoadError::MalformedHeader {
        format: "vtk",
        reason: reason.into(),
    }
}

fn scalar_kind_of(type_name: &str) -> Result<ScalarKind, LoadError> {
    match type_name {
        "unsigned_char" => Ok(ScalarKind::UChar),
        "short" => Ok(ScalarKind::Short),
        "unsigned_short" => Ok(ScalarKind::UShort),
        "int" => Ok(ScalarKind::Int),
        "float" => Ok(ScalarKind::Float),
        "double" => Ok(ScalarKind::Double),
        other => Err(LoadError::UnsupportedScalarType(other.to_string())),
    }
}

fn read_trimmed_line<R: BufRead>(reader: &mut R) -> Result<String, LoadError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(bad("unexpected end of file"));
    }
    Ok(line.trim_end().to_string())
}

pub fn read_file(path: &Path) -> Result<VolumeImage, LoadError> {
    info!(path = %path.display(), "reading VTK image file");
    let mut reader = BufReader::new(File::open(path)?);

    if !read_trimmed_line(&mut reader)?.starts_with("# vtk DataFile Version") {
        return Err(bad("missing '# vtk DataFile Version' signature"));
    }
    let _title = read_trimmed_line(&mut reader)?;
    let binary = match read_trimmed_line(&mut reader)?.as_str() {
        "ASCII" => false,
        "BINARY" => true,
        other => return Err(bad(format!("unknown data mode {:?}", other))),
    };
    let dataset = read_trimmed_line(&mut reader)?;
    if dataset
        .split_whitespace()
        .nth(1)
        .map_or(true, |kind| kind != "STRUCTURED_POINTS")
    {
        return Err(bad(format!("dataset {:?} is not STRUCTURED_POINTS", dataset)));
    }

    let mut dims: Option<(usize, usize, usize)> = None;
    let mut spacing = [1.0, 1.0, 1.0];
    let mut origin = [0.0, 0.0, 0.0];
    let mut point_count: Option<usize> = None;

    // Attribute lines until the SCALARS declaration.
    let (kind, first_data_line) = loop {
        let line = read_trimmed_line(&mut reader)?;
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("DIMENSIONS") => {
                let values: Vec<usize> = tokens
                    .map(|t| t.parse().map_err(|_| bad("bad DIMENSIONS")))
                    .collect::<Result<_, _>>()?;
                if values.len() != 3 {
                    return Err(bad("DIMENSIONS needs three values"));
                }
                dims = Some((values[0], values[1], values[2]));
            }
            Some("SPACING") | Some("ASPECT_RATIO") => {
                for (axis, token) in tokens.take(3).enumerate() {
                    spacing[axis] = token.parse().map_err(|_| bad("bad SPACING"))?;
                }
            }
            Some("ORIGIN") => {
                for (axis, token) in tokens.take(3).enumerate() {
                    origin[axis] = token.parse().map_err(|_| bad("bad ORIGIN"))?;
                }
            }
            Some("POINT_DATA") => {
                point_count = Some(
                    tokens
                        .next()
                        .ok_or_else(|| bad("POINT_DATA needs a count"))?
                        .parse()
                        .map_err(|_| bad("bad POINT_DATA count"))?,
                );
            }
            Some("SCALARS") => {
                let _name = tokens.next().ok_or_else(|| bad("SCALARS needs a name"))?;
                let type_name = tokens.next().ok_or_else(|| bad("SCALARS needs a type"))?;
                let components: usize = tokens.next().map_or(Ok(1), |t| {
                    t.parse().map_err(|_| bad("bad component count"))
                })?;
                if components != 1 {
                    return Err(bad("only single-component scalars are supported"));
                }
                let kind = scalar_kind_of(type_name)?;

                // A LOOKUP_TABLE line follows the declaration; in binary
                // mode the payload starts right after it.
                if binary {
                    let lut = read_trimmed_line(&mut reader)?;
                    if !lut.starts_with("LOOKUP_TABLE") {
                        return Err(bad("expected LOOKUP_TABLE before binary scalars"));
                    }
                    break (kind, String::new());
                }
                let next = read_trimmed_line(&mut reader)?;
                if next.starts_with("LOOKUP_TABLE") {
                    break (kind, String::new());
                }
                break (kind, next);
            }
            Some(_) | None => {}
        }
    };

    let (nx, ny, nz) = dims.ok_or_else(|| bad("missing DIMENSIONS"))?;
    let count = nx * ny * nz;
    if let Some(declared) = point_count {
        if declared != count {
            return Err(bad(format!(
                "POINT_DATA count {} does not match dimensions {}x{}x{}",
                declared, nx, ny, nz
            )));
        }
    }

    let data = if binary {
        // Legacy VTK binary payloads are always big-endian.
        read_scalar_block(&mut reader, kind, Endianness::Big, (nz, ny, nx))?
    } else {
        let mut text = first_data_line;
        text.push('\n');
        reader.read_to_string(&mut text)?;
        parse_ascii_scalars(&text, kind, (nz, ny, nx), "vtk")?
    };

    Ok(VolumeImage::new(data, spacing, origin))
}

/// Parse whitespace-separated scalar tokens into a typed grid. Shared with
/// the VTK XML reader for its inline ASCII arrays.
pub(crate) fn parse_ascii_scalars(
    text: &str,
    kind: ScalarKind,
    shape: (usize, usize, usize),
    format: &'static str,
) -> Result<ScalarBuffer, LoadError> {
    let count = shape.0 * shape.1 * shape.2;
    let bad = |reason: String| LoadError::MalformedHeader { format, reason };

    macro_rules! parse_all {
        ($ty:ty, $variant:ident) => {{
            let values: Vec<$ty> = text
                .split_whitespace()
                .take(count)
                .map(|t| {
                    t.parse::<$ty>()
                        .map_err(|_| bad(format!("bad scalar token {:?}", t)))
                })
                .collect::<Result<_, _>>()?;
            if values.len() != count {
                return Err(bad(format!(
                    "expected {} scalars, found {}",
                    count,
                    values.len()
                )));
            }
            ScalarBuffer::$variant(
                Array3::from_shape_vec(shape, values).map_err(|_| LoadError::ShapeMismatch)?,
            )
        }};
    }

    Ok(match kind {
        ScalarKind::UChar => parse_all!(u8, UChar),
        ScalarKind::Short => parse_all!(i16, Short),
        ScalarKind::UShort => parse_all!(u16, UShort),
        ScalarKind::Int => parse_all!(i32, Int),
        ScalarKind::Float => parse_all!(f32, Float),
        ScalarKind::Double => parse_all!(f64, Double),
    })
}
