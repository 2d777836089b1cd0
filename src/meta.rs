//
// meta.rs
// voxread
//
// MetaImage reader: `Key = Value` header (either a standalone .mhd next to
// a raw data file, or a .mha with the payload appended after the header),
// optional zlib compression, optional direction matrix.
//

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use byteordered::Endianness;
use flate2::read::ZlibDecoder;
use nalgebra::{Matrix3, Vector3};
use tracing::info;

use crate::loader::LoadError;
use crate::raw::read_scalar_block;
use crate::request::ScalarKind;
use crate::volume::{OrientedVolume, VolumeImage};

fn bad(reason: impl Into<String>) -> LoadError {
    LoadError::MalformedHeader {
        format: "meta image",
        reason: reason.into(),
    }
}

struct MetaHeader {
    ndims: usize,
    dim_size: Vec<usize>,
    kind: ScalarKind,
    spacing: [f64; 3],
    origin: [f64; 3],
    direction: Matrix3<f64>,
    big_endian: bool,
    compressed: bool,
    header_size: u64,
    data_file: String,
}

impl Default for MetaHeader {
    fn default() -> Self {
        Self {
            ndims: 3,
            dim_size: Vec::new(),
            kind: ScalarKind::UChar,
            spacing: [1.0, 1.0, 1.0],
            origin: [0.0, 0.0, 0.0],
            direction: Matrix3::identity(),
            big_endian: false,
            compressed: false,
            header_size: 0,
            data_file: String::new(),
        }
    }
}

fn parse_numbers<T: std::str::FromStr>(value: &str, what: &str) -> Result<Vec<T>, LoadError> {
    value
        .split_whitespace()
        .map(|token| token.parse::<T>().map_err(|_| bad(format!("bad {}", what))))
        .collect()
}

fn scalar_kind_of(element_type: &str) -> Result<ScalarKind, LoadError> {
    match element_type {
        "MET_UCHAR" => Ok(ScalarKind::UChar),
        "MET_SHORT" => Ok(ScalarKind::Short),
        "MET_USHORT" => Ok(ScalarKind::UShort),
        "MET_INT" => Ok(ScalarKind::Int),
        "MET_FLOAT" => Ok(ScalarKind::Float),
        "MET_DOUBLE" => Ok(ScalarKind::Double),
        other => Err(LoadError::UnsupportedScalarType(other.to_string())),
    }
}

fn parse_header<R: BufRead>(reader: &mut R) -> Result<MetaHeader, LoadError> {
    let mut header = MetaHeader::default();
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(bad("missing ElementDataFile"));
        }
        let trimmed = line.trim_end();
        let Some((key, value)) = trimmed.split_once('=') else {
            return Err(bad(format!("expected 'Key = Value', got {:?}", trimmed)));
        };
        let (key, value) = (key.trim(), value.trim());

        match key {
            "ObjectType" => {
                if value != "Image" {
                    return Err(bad(format!("object type {:?} is not an image", value)));
                }
            }
            "NDims" => {
                header.ndims = value.parse().map_err(|_| bad("bad NDims"))?;
                if !matches!(header.ndims, 2 | 3) {
                    return Err(bad(format!("unsupported NDims {}", header.ndims)));
                }
            }
            "DimSize" => header.dim_size = parse_numbers(value, "DimSize")?,
            "ElementType" => header.kind = scalar_kind_of(value)?,
            "ElementSpacing" | "ElementSize" => {
                let values: Vec<f64> = parse_numbers(value, key)?;
                for (axis, v) in values.into_iter().take(3).enumerate() {
                    header.spacing[axis] = v;
                }
            }
            "Offset" | "Origin" | "Position" => {
                let values: Vec<f64> = parse_numbers(value, key)?;
                for (axis, v) in values.into_iter().take(3).enumerate() {
                    header.origin[axis] = v;
                }
            }
            "TransformMatrix" | "Orientation" | "Rotation" => {
                let values: Vec<f64> = parse_numbers(value, key)?;
                if values.len() == 9 {
                    // Each listed triplet is the direction cosine of one
                    // grid axis.
                    header.direction = Matrix3::from_columns(&[
                        Vector3::new(values[0], values[1], values[2]),
                        Vector3::new(values[3], values[4], values[5]),
                        Vector3::new(values[6], values[7], values[8]),
                    ]);
                }
            }
            "BinaryDataByteOrderMSB" | "ElementByteOrderMSB" => {
                header.big_endian = value.eq_ignore_ascii_case("true");
            }
            "CompressedData" => {
                header.compressed = value.eq_ignore_ascii_case("true");
            }
            "HeaderSize" => {
                let size: i64 = value.parse().map_err(|_| bad("bad HeaderSize"))?;
                if size < 0 {
                    return Err(bad("negative HeaderSize is not supported"));
                }
                header.header_size = size as u64;
            }
            "ElementNumberOfChannels" => {
                let channels: usize = value.parse().map_err(|_| bad("bad channel count"))?;
                if channels != 1 {
                    return Err(bad("only single-channel images are supported"));
                }
            }
            "ElementDataFile" => {
                header.data_file = value.to_string();
                break;
            }
            // BinaryData, AnatomicalOrientation, CenterOfRotation and
            // other informational keys are ignored.
            _ => {}
        }
    }

    if header.dim_size.len() != header.ndims {
        return Err(bad("DimSize does not match NDims"));
    }
    if header.data_file.contains('%') {
        return Err(bad("numbered ElementDataFile series are not supported"));
    }
    Ok(header)
}

pub fn read_file(path: &Path) -> Result<OrientedVolume, LoadError> {
    info!(path = %path.display(), "reading meta image file");
    let mut reader = BufReader::new(File::open(path)?);
    let header = parse_header(&mut reader)?;

    let nx = header.dim_size[0];
    let ny = header.dim_size[1];
    let nz = if header.ndims == 3 { header.dim_size[2] } else { 1 };
    let endianness = if header.big_endian {
        Endianness::Big
    } else {
        Endianness::Little
    };

    let data = if header.data_file == "LOCAL" {
        // Payload follows the header in the same file.
        read_payload(reader, &header, endianness, (nz, ny, nx))?
    } else {
        let sibling = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&header.data_file);
        let mut file = File::open(sibling)?;
        file.seek(SeekFrom::Start(header.header_size))?;
        read_payload(BufReader::new(file), &header, endianness, (nz, ny, nx))?
    };

    let volume = VolumeImage::new(data, header.spacing, header.origin);
    Ok(OrientedVolume {
        volume,
        direction_lps: header.direction,
    })
}

fn read_payload<R: Read>(
    reader: R,
    header: &MetaHeader,
    endianness: Endianness,
    shape: (usize, usize, usize),
) -> Result<crate::volume::ScalarBuffer, LoadError> {
    if header.compressed {
        read_scalar_block(ZlibDecoder::new(reader), header.kind, endianness, shape)
    } else {
        read_scalar_block(reader, header.kind, endianness, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_fields_are_extracted() {
        let text = "ObjectType = Image\nNDims = 3\nDimSize = 4 3 2\n\
                    ElementSpacing = 0.5 0.5 2\nOffset = 1 2 3\n\
                    ElementType = MET_SHORT\nBinaryDataByteOrderMSB = True\n\
                    ElementDataFile = volume.raw\n";
        let header = parse_header(&mut Cursor::new(text)).expect("header");
        assert_eq!(header.dim_size, vec![4, 3, 2]);
        assert_eq!(header.kind, ScalarKind::Short);
        assert_eq!(header.spacing, [0.5, 0.5, 2.0]);
        assert_eq!(header.origin, [1.0, 2.0, 3.0]);
        assert!(header.big_endian);
        assert_eq!(header.data_file, "volume.raw");
    }

    #[test]
    fn unknown_element_type_is_rejected() {
        let text = "ObjectType = Image\nNDims = 3\nDimSize = 1 1 1\n\
                    ElementType = MET_LONG\nElementDataFile = LOCAL\n";
        assert!(matches!(
            parse_header(&mut Cursor::new(text)),
            Err(LoadError::UnsupportedScalarType(_))
        ));
    }

    #[test]
    fn missing_data_file_is_malformed() {
        let text = "ObjectType = Image\nNDims = 3\nDimSize = 1 1 1\n";
        assert!(matches!(
            parse_header(&mut Cursor::new(text)),
            Err(LoadError::MalformedHeader { .. })
        ));
    }
}
