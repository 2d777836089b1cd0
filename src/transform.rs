//
// transform.rs
// voxread
//
// Patient-space coordinate transforms: the RAS-to-IJK matrix extracted on
// the generic ingestion path and the rotation-only RAS-to-local matrix
// derived from it.
//

use nalgebra::{Matrix3, Matrix4, Vector4};

/// The two 4x4 matrices a load operation emits. Identity on every path
/// except generic ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTransform {
    pub ras_to_ijk: Matrix4<f64>,
    pub ras_to_local: Matrix4<f64>,
}

impl Default for CoordinateTransform {
    fn default() -> Self {
        Self {
            ras_to_ijk: Matrix4::identity(),
            ras_to_local: Matrix4::identity(),
        }
    }
}

impl CoordinateTransform {
    /// Derive the RAS-to-local companion from a RAS-to-IJK matrix: take the
    /// 3x3 rotational block, normalize each row independently, zero the
    /// translation and keep the homogeneous corner at 1.
    pub fn from_ras_to_ijk(ras_to_ijk: Matrix4<f64>) -> Self {
        let mut ras_to_local = Matrix4::identity();
        for row in 0..3 {
            let norm = (ras_to_ijk[(row, 0)].powi(2)
                + ras_to_ijk[(row, 1)].powi(2)
                + ras_to_ijk[(row, 2)].powi(2))
            .sqrt();
            for col in 0..3 {
                ras_to_local[(row, col)] = if norm > 0.0 {
                    ras_to_ijk[(row, col)] / norm
                } else {
                    ras_to_ijk[(row, col)]
                };
            }
        }
        Self {
            ras_to_ijk,
            ras_to_local,
        }
    }

    pub fn ras_to_ijk_row_major(&self) -> [f64; 16] {
        row_major(&self.ras_to_ijk)
    }

    pub fn ras_to_local_row_major(&self) -> [f64; 16] {
        row_major(&self.ras_to_local)
    }
}

fn row_major(m: &Matrix4<f64>) -> [f64; 16] {
    let mut out = [0.0; 16];
    for row in 0..4 {
        for col in 0..4 {
            out[row * 4 + col] = m[(row, col)];
        }
    }
    out
}

/// IJK-to-RAS matrix for a grid with the given LPS direction cosines,
/// spacing and LPS origin: `lps_to_ras * [D * diag(S) | O]`.
pub fn ijk_to_ras(
    direction_lps: &Matrix3<f64>,
    spacing: [f64; 3],
    origin_lps: [f64; 3],
) -> Matrix4<f64> {
    let mut m = Matrix4::identity();
    for row in 0..3 {
        // RAS flips the first two LPS axes.
        let sign = if row < 2 { -1.0 } else { 1.0 };
        for col in 0..3 {
            m[(row, col)] = sign * direction_lps[(row, col)] * spacing[col];
        }
        m[(row, 3)] = sign * origin_lps[row];
    }
    m
}

/// Map an origin through a RAS-to-local matrix as a direction-less
/// homogeneous vector (w = 0).
pub fn localized_origin(ras_to_local: &Matrix4<f64>, origin: [f64; 3]) -> [f64; 3] {
    let mapped = ras_to_local * Vector4::new(origin[0], origin[1], origin[2], 0.0);
    [mapped[0], mapped[1], mapped[2]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ras_to_local_rows_are_unit_length() {
        // A scaled axis permutation with translation.
        let ras_to_ijk = Matrix4::new(
            0.0, 2.0, 0.0, 4.0, //
            -3.0, 0.0, 0.0, 5.0, //
            0.0, 0.0, 1.5, 6.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let transform = CoordinateTransform::from_ras_to_ijk(ras_to_ijk);

        for row in 0..3 {
            let norm: f64 = (0..3)
                .map(|col| transform.ras_to_local[(row, col)].powi(2))
                .sum::<f64>()
                .sqrt();
            assert_relative_eq!(norm, 1.0, epsilon = 1e-12);
            // Translation is zeroed.
            assert_relative_eq!(transform.ras_to_local[(row, 3)], 0.0);
        }
        assert_relative_eq!(transform.ras_to_local[(3, 3)], 1.0);
        assert_relative_eq!(transform.ras_to_local[(0, 1)], 1.0);
        assert_relative_eq!(transform.ras_to_local[(1, 0)], -1.0);
    }

    #[test]
    fn origin_maps_as_direction_without_translation() {
        let ras_to_ijk = Matrix4::new(
            0.0, 1.0, 0.0, 10.0, //
            -1.0, 0.0, 0.0, 20.0, //
            0.0, 0.0, 1.0, 30.0, //
            0.0, 0.0, 0.0, 1.0,
        );
        let transform = CoordinateTransform::from_ras_to_ijk(ras_to_ijk);
        let origin = localized_origin(&transform.ras_to_local, [2.0, 3.0, 4.0]);
        // Rotation only: translation columns must not contribute.
        assert_relative_eq!(origin[0], 3.0);
        assert_relative_eq!(origin[1], -2.0);
        assert_relative_eq!(origin[2], 4.0);
    }

    #[test]
    fn identity_direction_gives_lps_flips() {
        let m = ijk_to_ras(&Matrix3::identity(), [1.0, 2.0, 3.0], [5.0, 6.0, 7.0]);
        assert_relative_eq!(m[(0, 0)], -1.0);
        assert_relative_eq!(m[(1, 1)], -2.0);
        assert_relative_eq!(m[(2, 2)], 3.0);
        assert_relative_eq!(m[(0, 3)], -5.0);
        assert_relative_eq!(m[(1, 3)], -6.0);
        assert_relative_eq!(m[(2, 3)], 7.0);
        assert_relative_eq!(m[(3, 3)], 1.0);
    }
}
