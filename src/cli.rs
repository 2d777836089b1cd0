//
// cli.rs
// voxread
//
// Defines the CLI surface with Clap, builds the load request from the
// parsed arguments and prints a report of the loaded volume and its
// coordinate transforms.
//

use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Parser, ValueEnum};

use crate::loader::{self, LoadedImage};
use crate::request::{ByteOrder, FileFormat, LoadRequest, ScalarKind, UNSET_EXTENT};

/// Command-line interface glue code: one verb, the full configuration
/// surface of the loader.
#[derive(Parser)]
#[command(name = "voxread")]
#[command(about = "Read a volumetric image into memory", long_about = None)]
pub struct Cli {
    /// Input file name
    #[arg(short = 'i', long)]
    pub input_file: Option<PathBuf>,
    /// Input file prefix for numbered series (e.g. foo_)
    #[arg(long)]
    pub prefix: Option<String>,
    /// Input file pattern for numbered series (e.g. %s%04d.png)
    #[arg(long)]
    pub pattern: Option<String>,
    /// Input directory name - dicom only
    #[arg(short = 'd', long)]
    pub input_directory: Option<PathBuf>,
    /// File format; guessed from the extension when omitted
    #[arg(short = 'f', long, value_enum)]
    pub format: Option<FormatArg>,
    /// Guess the file format from the extension
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub guess_format: bool,
    /// Prefer the generic ingestion path over the dedicated readers
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub generic_ingestion: bool,
    /// 3D extent of the image - raw and png/tiff series
    #[arg(long, num_args = 6, allow_negative_numbers = true,
          value_names = ["X0", "X1", "Y0", "Y1", "Z0", "Z1"])]
    pub extent: Option<Vec<i32>>,
    /// Size of the image header in bytes - raw only
    #[arg(long, default_value_t = 0)]
    pub header_size: u64,
    /// Spacing of the image - raw, tiff, png
    #[arg(long, num_args = 3, value_names = ["SX", "SY", "SZ"])]
    pub spacing: Option<Vec<f64>>,
    /// Origin of the image - raw, tiff, png
    #[arg(long, num_args = 3, allow_negative_numbers = true,
          value_names = ["OX", "OY", "OZ"])]
    pub origin: Option<Vec<f64>>,
    /// Byte ordering - raw only
    #[arg(long, value_enum, default_value_t = ByteOrderArg::Littleendian)]
    pub byte_order: ByteOrderArg,
    /// Scalar type - raw only
    #[arg(long, value_enum, default_value_t = ScalarTypeArg::Float)]
    pub scalar_type: ScalarTypeArg,
    /// Dimensionality of the files to read - raw only
    #[arg(long, default_value_t = 3)]
    pub file_dimensionality: u8,
    /// Toggle flipping of the corresponding axis
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
    pub flip: Option<Vec<bool>>,
    /// Flip a DICOM stack into a left-to-right, posterior-to-anterior,
    /// inferior-to-superior volume based on its orientation tags
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub auto_orient_dicom: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FormatArg {
    Vtkxml,
    Vtk,
    Dicom,
    Raw,
    Meta,
    Png,
    Tiff,
}

impl From<FormatArg> for FileFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Vtkxml => FileFormat::VtkXml,
            FormatArg::Vtk => FileFormat::Vtk,
            FormatArg::Dicom => FileFormat::Dicom,
            FormatArg::Raw => FileFormat::Raw,
            FormatArg::Meta => FileFormat::Meta,
            FormatArg::Png => FileFormat::Png,
            FormatArg::Tiff => FileFormat::Tiff,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ByteOrderArg {
    Littleendian,
    Bigendian,
}

impl From<ByteOrderArg> for ByteOrder {
    fn from(value: ByteOrderArg) -> Self {
        match value {
            ByteOrderArg::Littleendian => ByteOrder::LittleEndian,
            ByteOrderArg::Bigendian => ByteOrder::BigEndian,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ScalarTypeArg {
    Float,
    Double,
    Int,
    Short,
    Ushort,
    Uchar,
}

impl From<ScalarTypeArg> for ScalarKind {
    fn from(value: ScalarTypeArg) -> Self {
        match value {
            ScalarTypeArg::Float => ScalarKind::Float,
            ScalarTypeArg::Double => ScalarKind::Double,
            ScalarTypeArg::Int => ScalarKind::Int,
            ScalarTypeArg::Short => ScalarKind::Short,
            ScalarTypeArg::Ushort => ScalarKind::UShort,
            ScalarTypeArg::Uchar => ScalarKind::UChar,
        }
    }
}

impl Cli {
    fn into_request(self) -> LoadRequest {
        let defaults = LoadRequest::default();
        LoadRequest {
            format: self.format.map(Into::into),
            guess_format: self.guess_format,
            use_generic_ingestion: self.generic_ingestion,
            input_file: self.input_file,
            input_file_prefix: self.prefix,
            input_file_pattern: self.pattern,
            input_directory: self.input_directory,
            extent: self
                .extent
                .map(|e| [e[0], e[1], e[2], e[3], e[4], e[5]])
                .unwrap_or(UNSET_EXTENT),
            spacing: self
                .spacing
                .map(|s| [s[0], s[1], s[2]])
                .unwrap_or(defaults.spacing),
            origin: self
                .origin
                .map(|o| [o[0], o[1], o[2]])
                .unwrap_or(defaults.origin),
            byte_order: self.byte_order.into(),
            scalar_kind: self.scalar_type.into(),
            header_size: self.header_size,
            file_dimensionality: self.file_dimensionality,
            flip: self
                .flip
                .map(|f| [f[0], f[1], f[2]])
                .unwrap_or(defaults.flip),
            auto_orient_dicom: self.auto_orient_dicom,
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once, build the request and execute it.
    let cli = Cli::parse();
    let request = cli.into_request();

    let loaded = loader::execute(&request).context("Failed to load image")?;
    print_report(&loaded);
    Ok(())
}

fn print_report(loaded: &LoadedImage) {
    let volume = &loaded.volume;
    let (nx, ny, nz) = volume.dims();

    println!("{}", "=".repeat(80));
    println!("Volume loaded");
    println!("{}", "=".repeat(80));
    println!("IMAGE");
    println!("  Dimensions:  {} x {} x {}", nx, ny, nz);
    println!("  Extent:      {:?}", volume.extent);
    println!("  Spacing:     {:?}", volume.spacing);
    println!("  Origin:      {:?}", volume.origin);
    println!("  Scalar type: {}", volume.scalar_kind().name());

    println!("\nRAS TO IJK");
    print_matrix(loaded.transform.ras_to_ijk_row_major());
    println!("\nRAS TO LOCAL");
    print_matrix(loaded.transform.ras_to_local_row_major());
}

fn print_matrix(m: [f64; 16]) {
    for row in m.chunks(4) {
        println!(
            "  {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            row[0], row[1], row[2], row[3]
        );
    }
}
