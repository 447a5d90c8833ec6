// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Column-major 4×4 transform carried by transform layers.
//!
//! Scene authors hand over full 4×4 matrices (the storage format used by
//! Flutter-style frameworks and GPU APIs). Traversal only needs the 2-D
//! projection, which [`Transform3d::to_affine`] extracts.

use core::ops::Mul;

use kurbo::Affine;

/// A column-major 4×4 transform stored as `[[f64; 4]; 4]`.
///
/// Each inner array is one *column* `[x, y, z, w]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform3d {
    /// Four columns, each a 4-element array `[x, y, z, w]`.
    pub cols: [[f64; 4]; 4],
}

impl Default for Transform3d {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform3d {
    /// The 4×4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Creates a transform from four column arrays.
    #[inline]
    #[must_use]
    pub const fn from_cols(col0: [f64; 4], col1: [f64; 4], col2: [f64; 4], col3: [f64; 4]) -> Self {
        Self {
            cols: [col0, col1, col2, col3],
        }
    }

    /// Creates a transform from sixteen column-major values.
    ///
    /// This is the layout hosts receive from scripting runtimes, where the
    /// matrix arrives as a flat list.
    #[must_use]
    pub fn from_col_major(values: &[f64; 16]) -> Self {
        let mut cols = [[0.0; 4]; 4];
        for (i, v) in values.iter().enumerate() {
            cols[i / 4][i % 4] = *v;
        }
        Self { cols }
    }

    /// Creates a pure translation transform.
    #[inline]
    #[must_use]
    pub const fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    /// Creates a non-uniform scale transform.
    #[inline]
    #[must_use]
    pub const fn from_scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            cols: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, sz, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Creates a rotation around the Z axis (radians).
    #[inline]
    #[must_use]
    pub fn from_rotation_z(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Lifts a 2-D affine into the XY plane.
    #[must_use]
    pub fn from_affine(affine: Affine) -> Self {
        let [a, b, c, d, e, f] = affine.as_coeffs();
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [e, f, 0.0, 1.0],
            ],
        }
    }

    /// Projects onto the XY plane, dropping Z and perspective terms.
    ///
    /// Exact for transforms built from 2-D operations. For anything else the
    /// result is the orthographic projection traversal uses for bounds.
    #[inline]
    #[must_use]
    pub fn to_affine(self) -> Affine {
        let c = &self.cols;
        Affine::new([c[0][0], c[0][1], c[1][0], c[1][1], c[3][0], c[3][1]])
    }

    /// Returns `true` if the matrix has no perspective row and no Z coupling,
    /// so [`to_affine`](Self::to_affine) loses nothing.
    #[must_use]
    pub fn is_planar(&self) -> bool {
        let c = &self.cols;
        c[0][3] == 0.0
            && c[1][3] == 0.0
            && c[3][3] == 1.0
            && c[0][2] == 0.0
            && c[1][2] == 0.0
            && c[2][0] == 0.0
            && c[2][1] == 0.0
    }

    /// Is every element [finite]?
    ///
    /// [finite]: f64::is_finite
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.cols.iter().flatten().all(|v| v.is_finite())
    }
}

impl Mul for Transform3d {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let mut out = [[0.0; 4]; 4];
        for (col, out_col) in out.iter_mut().enumerate() {
            for (row, cell) in out_col.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.cols[k][row] * rhs.cols[col][k]).sum();
            }
        }
        Self { cols: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Point;

    #[test]
    fn identity_projects_to_identity_affine() {
        assert_eq!(
            Transform3d::IDENTITY.to_affine(),
            Affine::IDENTITY,
            "identity must project to identity"
        );
        assert!(Transform3d::IDENTITY.is_planar(), "identity is planar");
    }

    #[test]
    fn translation_projects_to_translate() {
        let t = Transform3d::from_translation(10.0, -4.0, 7.0);
        let p = t.to_affine() * Point::new(1.0, 1.0);
        assert_eq!(p, Point::new(11.0, -3.0), "z translation is dropped");
    }

    #[test]
    fn affine_roundtrip_preserves_coefficients() {
        let a = Affine::new([2.0, 0.5, -0.5, 3.0, 4.0, 5.0]);
        assert_eq!(
            Transform3d::from_affine(a).to_affine(),
            a,
            "lifted affine must project back unchanged"
        );
    }

    #[test]
    fn multiply_applies_right_operand_first() {
        let t = Transform3d::from_translation(10.0, 0.0, 0.0);
        let s = Transform3d::from_scale(2.0, 2.0, 1.0);
        let p = (t * s).to_affine() * Point::new(1.0, 1.0);
        assert_eq!(p, Point::new(12.0, 2.0), "scale then translate");
    }

    #[test]
    fn col_major_flat_layout() {
        let mut flat = [0.0; 16];
        flat[0] = 1.0;
        flat[5] = 1.0;
        flat[10] = 1.0;
        flat[15] = 1.0;
        flat[12] = 3.0;
        flat[13] = 4.0;
        assert_eq!(
            Transform3d::from_col_major(&flat),
            Transform3d::from_translation(3.0, 4.0, 0.0),
            "elements 12 and 13 are the XY translation"
        );
    }

    #[test]
    fn perspective_is_not_planar() {
        let mut t = Transform3d::IDENTITY;
        t.cols[0][3] = 0.001;
        assert!(!t.is_planar(), "perspective term must be detected");
    }

    #[test]
    fn non_finite_detected() {
        let mut t = Transform3d::IDENTITY;
        t.cols[3][1] = f64::NAN;
        assert!(!t.is_finite(), "NaN element must fail is_finite");
        assert!(Transform3d::from_rotation_z(1.0).is_finite(), "rotation is finite");
    }
}
