//
// vtk_xml.rs
// voxread
//
// VTK XML ImageData (.vti) reader. Parses the XML part with quick-xml and
// decodes the first point-data array, either inline ASCII or appended raw
// bytes. Base64-encoded payloads are rejected.
//

use std::fs;
use std::path::Path;

use byteordered::Endianness;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::info;

use crate::loader::LoadError;
use crate::raw::read_scalar_block;
use crate::request::ScalarKind;
use crate::volume::VolumeImage;

fn bad(reason: impl Into<String>) -> LoadError {
    LoadError::MalformedHeader {
        format: "vtkxml",
        reason: reason.into(),
    }
}

fn scalar_kind_of(type_name: &str) -> Result<ScalarKind, LoadError> {
    match type_name {
        "UInt8" => Ok(ScalarKind::UChar),
        "Int16" => Ok(ScalarKind::Short),
        "UInt16" => Ok(ScalarKind::UShort),
        "Int32" => Ok(ScalarKind::Int),
        "Float32" => Ok(ScalarKind::Float),
        "Float64" => Ok(ScalarKind::Double),
        other => Err(LoadError::UnsupportedScalarType(other.to_string())),
    }
}

fn attr_value(tag: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

fn parse_triplet(value: &str) -> Result<[f64; 3], LoadError> {
    let values: Vec<f64> = value
        .split_whitespace()
        .map(|t| t.parse().map_err(|_| bad(format!("bad number {:?}", t))))
        .collect::<Result<_, _>>()?;
    if values.len() != 3 {
        return Err(bad(format!("expected three values in {:?}", value)));
    }
    Ok([values[0], values[1], values[2]])
}

fn parse_extent(value: &str) -> Result<[i32; 6], LoadError> {
    let values: Vec<i32> = value
        .split_whitespace()
        .map(|t| t.parse().map_err(|_| bad(format!("bad extent {:?}", t))))
        .collect::<Result<_, _>>()?;
    if values.len() != 6 {
        return Err(bad("extent needs six values"));
    }
    Ok([values[0], values[1], values[2], values[3], values[4], values[5]])
}

#[derive(Default)]
struct DataArrayInfo {
    kind: Option<ScalarKind>,
    format: String,
    offset: u64,
    ascii: String,
}

pub fn read_file(path: &Path) -> Result<VolumeImage, LoadError> {
    info!(path = %path.display(), "reading VTK XML image file");
    let buf = fs::read(path)?;

    let mut reader = Reader::from_reader(&buf[..]);
    reader.config_mut().trim_text(true);

    let mut big_endian = false;
    let mut wide_header = false;
    let mut extent: Option<[i32; 6]> = None;
    let mut spacing = [1.0, 1.0, 1.0];
    let mut origin = [0.0, 0.0, 0.0];
    let mut in_point_data = false;
    let mut in_array = false;
    let mut array: Option<DataArrayInfo> = None;
    let mut appended_encoding: Option<String> = None;

    let mut event_buf = Vec::new();
    loop {
        event_buf.clear();
        let event = reader.read_event_into(&mut event_buf)?;
        let (tag, has_children) = match &event {
            Event::Start(tag) => (Some(tag), true),
            Event::Empty(tag) => (Some(tag), false),
            _ => (None, false),
        };

        if let Some(tag) = tag {
            match tag.name().as_ref() {
                b"VTKFile" => {
                    if attr_value(tag, b"type").as_deref() != Some("ImageData") {
                        return Err(bad("VTKFile type is not ImageData"));
                    }
                    big_endian =
                        attr_value(tag, b"byte_order").as_deref() == Some("BigEndian");
                    wide_header =
                        attr_value(tag, b"header_type").as_deref() == Some("UInt64");
                }
                b"ImageData" => {
                    if let Some(value) = attr_value(tag, b"WholeExtent") {
                        extent = Some(parse_extent(&value)?);
                    }
                    if let Some(value) = attr_value(tag, b"Spacing") {
                        spacing = parse_triplet(&value)?;
                    }
                    if let Some(value) = attr_value(tag, b"Origin") {
                        origin = parse_triplet(&value)?;
                    }
                }
                b"Piece" => {
                    if let Some(value) = attr_value(tag, b"Extent") {
                        extent = Some(parse_extent(&value)?);
                    }
                }
                b"PointData" => in_point_data = true,
                b"DataArray" if in_point_data && array.is_none() => {
                    let type_name = attr_value(tag, b"type")
                        .ok_or_else(|| bad("DataArray without a type"))?;
                    array = Some(DataArrayInfo {
                        kind: Some(scalar_kind_of(&type_name)?),
                        format: attr_value(tag, b"format").unwrap_or_default(),
                        offset: attr_value(tag, b"offset")
                            .and_then(|o| o.parse().ok())
                            .unwrap_or(0),
                        ascii: String::new(),
                    });
                    // Inline ASCII content arrives as text events inside
                    // the element; empty tags carry none.
                    in_array = has_children;
                }
                b"AppendedData" => {
                    appended_encoding =
                        Some(attr_value(tag, b"encoding").unwrap_or_default());
                    // Raw appended bytes are not XML; stop parsing here.
                    break;
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Text(text) if in_array => {
                if let Some(info) = array.as_mut() {
                    info.ascii.push_str(&text.unescape()?);
                    info.ascii.push('\n');
                }
            }
            Event::End(tag) => match tag.name().as_ref() {
                b"PointData" => in_point_data = false,
                b"DataArray" => in_array = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let extent = extent.ok_or_else(|| bad("missing WholeExtent"))?;
    let (nx, ny, nz) = crate::raw::extent_dims(extent)?;
    let array = array.ok_or_else(|| bad("no point-data DataArray found"))?;
    let kind = array.kind.ok_or_else(|| bad("DataArray without a type"))?;
    let endianness = if big_endian {
        Endianness::Big
    } else {
        Endianness::Little
    };

    let data = match array.format.as_str() {
        "ascii" => {
            crate::vtk::parse_ascii_scalars(&array.ascii, kind, (nz, ny, nx), "vtkxml")?
        }
        "appended" => {
            let encoding = appended_encoding.ok_or_else(|| bad("missing AppendedData"))?;
            if encoding != "raw" {
                return Err(LoadError::UnsupportedEncoding {
                    format: "vtkxml",
                    encoding,
                });
            }
            let payload = appended_payload(&buf, array.offset)?;
            let header_len = if wide_header { 8 } else { 4 };
            if payload.len() < header_len {
                return Err(bad("appended data is truncated"));
            }
            read_scalar_block(&payload[header_len..], kind, endianness, (nz, ny, nx))?
        }
        other => {
            return Err(LoadError::UnsupportedEncoding {
                format: "vtkxml",
                encoding: other.to_string(),
            })
        }
    };

    Ok(VolumeImage::new(data, spacing, origin).with_extent(extent))
}

/// Locate the raw appended block: the bytes after the `_` marker that
/// follows the `<AppendedData>` tag, shifted by the array's offset.
fn appended_payload(buf: &[u8], offset: u64) -> Result<&[u8], LoadError> {
    let tag_pos = buf
        .windows(b"<AppendedData".len())
        .position(|w| w == b"<AppendedData")
        .ok_or_else(|| bad("missing AppendedData section"))?;
    let marker = buf[tag_pos..]
        .iter()
        .position(|&b| b == b'_')
        .ok_or_else(|| bad("missing '_' data marker"))?;
    let start = tag_pos + marker + 1 + offset as usize;
    if start > buf.len() {
        return Err(bad("appended offset beyond end of file"));
    }
    Ok(&buf[start..])
}
