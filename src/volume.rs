//
// volume.rs
// voxread
//
// In-memory volume representation: one dense 3D grid per scalar kind,
// with extent, spacing and origin, plus the per-axis flip operation.
//

use nalgebra::Matrix3;
use ndarray::{Array3, Axis};

use crate::request::ScalarKind;

/// Dense scalar grid, indexed `(z, y, x)`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarBuffer {
    UChar(Array3<u8>),
    Short(Array3<i16>),
    UShort(Array3<u16>),
    Int(Array3<i32>),
    Float(Array3<f32>),
    Double(Array3<f64>),
}

macro_rules! on_buffer {
    ($buffer:expr, $arr:ident => $body:expr) => {
        match $buffer {
            ScalarBuffer::UChar($arr) => $body,
            ScalarBuffer::Short($arr) => $body,
            ScalarBuffer::UShort($arr) => $body,
            ScalarBuffer::Int($arr) => $body,
            ScalarBuffer::Float($arr) => $body,
            ScalarBuffer::Double($arr) => $body,
        }
    };
}

impl ScalarBuffer {
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarBuffer::UChar(_) => ScalarKind::UChar,
            ScalarBuffer::Short(_) => ScalarKind::Short,
            ScalarBuffer::UShort(_) => ScalarKind::UShort,
            ScalarBuffer::Int(_) => ScalarKind::Int,
            ScalarBuffer::Float(_) => ScalarKind::Float,
            ScalarBuffer::Double(_) => ScalarKind::Double,
        }
    }

    /// Grid shape as `(nz, ny, nx)`.
    pub fn dim(&self) -> (usize, usize, usize) {
        on_buffer!(self, arr => arr.dim())
    }

    fn invert_axis(&mut self, axis: Axis) {
        on_buffer!(self, arr => arr.invert_axis(axis));
    }
}

/// A decoded volumetric image.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeImage {
    pub data: ScalarBuffer,
    pub extent: [i32; 6],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
}

impl VolumeImage {
    /// Build a volume whose extent starts at index zero on every axis.
    pub fn new(data: ScalarBuffer, spacing: [f64; 3], origin: [f64; 3]) -> Self {
        let (nz, ny, nx) = data.dim();
        let extent = [
            0,
            nx as i32 - 1,
            0,
            ny as i32 - 1,
            0,
            nz as i32 - 1,
        ];
        Self {
            data,
            extent,
            spacing,
            origin,
        }
    }

    pub fn with_extent(mut self, extent: [i32; 6]) -> Self {
        self.extent = extent;
        self
    }

    /// Dimensions as `(nx, ny, nz)`.
    pub fn dims(&self) -> (usize, usize, usize) {
        let (nz, ny, nx) = self.data.dim();
        (nx, ny, nz)
    }

    pub fn scalar_kind(&self) -> ScalarKind {
        self.data.kind()
    }

    /// Reverse the indexing order along one volume axis (0 = x, 1 = y,
    /// 2 = z). Scalar values and geometry metadata are untouched.
    pub fn flip_axis(&mut self, axis: usize) {
        // Volume axes are (x, y, z); the grid is stored (z, y, x).
        let grid_axis = match axis {
            0 => Axis(2),
            1 => Axis(1),
            _ => Axis(0),
        };
        self.data.invert_axis(grid_axis);
    }
}

/// A volume together with the LPS direction cosines of its grid axes,
/// as reported by the source format. Formats without orientation
/// information use the identity direction.
#[derive(Debug, Clone)]
pub struct OrientedVolume {
    pub volume: VolumeImage,
    pub direction_lps: Matrix3<f64>,
}

impl OrientedVolume {
    pub fn axis_aligned(volume: VolumeImage) -> Self {
        Self {
            volume,
            direction_lps: Matrix3::identity(),
        }
    }
}
