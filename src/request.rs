//
// request.rs
// voxread
//
// Defines the immutable load request consumed by the loader, the supported
// file formats and scalar kinds, and the extension-based format resolver.
//

use std::path::{Path, PathBuf};

use byteordered::Endianness;

/// Extent value meaning "the caller did not provide one".
pub const UNSET_EXTENT: [i32; 6] = [-1, -1, -1, -1, -1, -1];

/// On-disk representations the loader knows how to dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    VtkXml,
    Vtk,
    Dicom,
    Raw,
    Meta,
    Png,
    Tiff,
}

impl FileFormat {
    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::VtkXml => "vtkxml",
            FileFormat::Vtk => "vtk",
            FileFormat::Dicom => "dicom",
            FileFormat::Raw => "raw",
            FileFormat::Meta => "meta",
            FileFormat::Png => "png",
            FileFormat::Tiff => "tiff",
        }
    }
}

/// Byte ordering for raw scalar payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn endianness(&self) -> Endianness {
        match self {
            ByteOrder::LittleEndian => Endianness::Little,
            ByteOrder::BigEndian => Endianness::Big,
        }
    }
}

/// Scalar element kinds a volume can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScalarKind {
    #[default]
    Float,
    Double,
    Int,
    Short,
    UShort,
    UChar,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Int => "int",
            ScalarKind::Short => "short",
            ScalarKind::UShort => "ushort",
            ScalarKind::UChar => "uchar",
        }
    }
}

/// Everything a single load operation needs, populated once by the caller
/// and never mutated by the loader.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub format: Option<FileFormat>,
    pub guess_format: bool,
    pub use_generic_ingestion: bool,
    pub input_file: Option<PathBuf>,
    pub input_file_prefix: Option<String>,
    pub input_file_pattern: Option<String>,
    pub input_directory: Option<PathBuf>,
    pub extent: [i32; 6],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub byte_order: ByteOrder,
    pub scalar_kind: ScalarKind,
    pub header_size: u64,
    pub file_dimensionality: u8,
    pub flip: [bool; 3],
    pub auto_orient_dicom: bool,
}

impl Default for LoadRequest {
    fn default() -> Self {
        Self {
            format: None,
            guess_format: true,
            use_generic_ingestion: true,
            input_file: None,
            input_file_prefix: None,
            input_file_pattern: None,
            input_directory: None,
            extent: UNSET_EXTENT,
            spacing: [1.0, 1.0, 1.0],
            origin: [0.0, 0.0, 0.0],
            byte_order: ByteOrder::LittleEndian,
            scalar_kind: ScalarKind::Float,
            header_size: 0,
            file_dimensionality: 3,
            flip: [false, false, false],
            auto_orient_dicom: true,
        }
    }
}

impl LoadRequest {
    /// The format the dispatch will act on: the explicit one if given,
    /// otherwise the extension-derived one when guessing is enabled.
    pub fn resolved_format(&self) -> Option<FileFormat> {
        if self.format.is_some() {
            return self.format;
        }
        if self.guess_format {
            if let Some(file) = &self.input_file {
                return guess_from_extension(file);
            }
        }
        None
    }
}

/// Map a file extension to a format. Exact, case-sensitive matches only;
/// anything else leaves the format undetermined.
pub fn guess_from_extension(path: &Path) -> Option<FileFormat> {
    match path.extension().and_then(|e| e.to_str())? {
        "vti" => Some(FileFormat::VtkXml),
        "vtk" => Some(FileFormat::Vtk),
        "dcm" => Some(FileFormat::Dicom),
        "raw" => Some(FileFormat::Raw),
        "mhd" | "mha" => Some(FileFormat::Meta),
        "tif" => Some(FileFormat::Tiff),
        "png" => Some(FileFormat::Png),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping_matches_supported_formats() {
        let cases = [
            ("image.vti", FileFormat::VtkXml),
            ("image.vtk", FileFormat::Vtk),
            ("image.dcm", FileFormat::Dicom),
            ("image.raw", FileFormat::Raw),
            ("image.mhd", FileFormat::Meta),
            ("image.mha", FileFormat::Meta),
            ("image.tif", FileFormat::Tiff),
            ("image.png", FileFormat::Png),
        ];
        for (name, expected) in cases {
            assert_eq!(guess_from_extension(Path::new(name)), Some(expected));
        }
    }

    #[test]
    fn unknown_or_missing_extension_stays_unresolved() {
        assert_eq!(guess_from_extension(Path::new("image.foo")), None);
        assert_eq!(guess_from_extension(Path::new("image")), None);
        // Case-sensitive, exact match only.
        assert_eq!(guess_from_extension(Path::new("image.PNG")), None);
        assert_eq!(guess_from_extension(Path::new("image.tiff")), None);
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let request = LoadRequest {
            format: Some(FileFormat::Raw),
            input_file: Some(PathBuf::from("image.png")),
            ..LoadRequest::default()
        };
        assert_eq!(request.resolved_format(), Some(FileFormat::Raw));
    }

    #[test]
    fn guessing_can_be_disabled() {
        let request = LoadRequest {
            guess_format: false,
            input_file: Some(PathBuf::from("image.png")),
            ..LoadRequest::default()
        };
        assert_eq!(request.resolved_format(), None);
    }
}
