//
// lib.rs
// voxread
//
// Library surface: the load request, the per-format readers and the
// coordinate transforms they produce.
//

pub mod archetype;
pub mod cli;
pub mod dicom_series;
pub mod loader;
pub mod meta;
pub mod pattern;
pub mod raw;
pub mod request;
pub mod slices;
pub mod transform;
pub mod volume;
pub mod vtk;
pub mod vtk_xml;

pub use loader::{execute, LoadError, LoadedImage};
pub use request::{ByteOrder, FileFormat, LoadRequest, ScalarKind};
pub use transform::CoordinateTransform;
pub use volume::{ScalarBuffer, VolumeImage};
