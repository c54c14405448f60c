//! Placement transforms for positioning volumes inside their parent.
//!
//! A [`Transform`] maps a point from a volume's local frame into its
//! parent's frame: $\mathbf{p}_{parent} = R\,\mathbf{p}_{local} + \mathbf{t}$.
//! Rotations are proper (orthonormal, det = +1), so the inverse is
//! $R^T(\mathbf{p} - \mathbf{t})$.

use nalgebra::{Matrix3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// A rigid placement: rotation matrix + translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 3x3 rotation matrix.
    pub matrix: Matrix3<f64>,
    /// Translation vector (mm).
    pub translation: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl Transform {
    /// Create a pure translation.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix3::identity(),
            translation: Vector3::new(dx, dy, dz),
        }
    }

    /// Create a pure rotation from Euler angles (radians), applied about
    /// x, then y, then z.
    pub fn rotation(rx: f64, ry: f64, rz: f64) -> Self {
        Self {
            matrix: Rotation3::from_euler_angles(rx, ry, rz).into_inner(),
            translation: Vector3::zeros(),
        }
    }

    /// Rotation followed by translation.
    pub fn placement(rotation: [f64; 3], position: [f64; 3]) -> Self {
        Self::rotation(rotation[0], rotation[1], rotation[2]).then(&Self::translation(
            position[0],
            position[1],
            position[2],
        ))
    }

    /// Apply this transformation to a 3D point.
    pub fn apply(&self, point: &[f64; 3]) -> [f64; 3] {
        let v = Vector3::new(point[0], point[1], point[2]);
        let result = self.matrix * v + self.translation;
        [result.x, result.y, result.z]
    }

    /// Map a point from the parent frame back into the local frame.
    pub fn apply_inverse(&self, point: &[f64; 3]) -> [f64; 3] {
        let v = Vector3::new(point[0], point[1], point[2]) - self.translation;
        let result = self.matrix.transpose() * v;
        [result.x, result.y, result.z]
    }

    /// Compose two transforms: self followed by other.
    pub fn then(&self, other: &Transform) -> Transform {
        Transform {
            matrix: other.matrix * self.matrix,
            translation: other.matrix * self.translation + other.translation,
        }
    }

    /// Rotate a direction into the parent frame, ignoring the translation.
    pub fn rotate(&self, direction: &[f64; 3]) -> [f64; 3] {
        let result = self.matrix * Vector3::new(direction[0], direction[1], direction[2]);
        [result.x, result.y, result.z]
    }

    /// Rotate a parent-frame direction back into the local frame.
    pub fn rotate_inverse(&self, direction: &[f64; 3]) -> [f64; 3] {
        let result = self.matrix.transpose() * Vector3::new(direction[0], direction[1], direction[2]);
        [result.x, result.y, result.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::DEG;

    #[test]
    fn test_identity_transform() {
        let t = Transform::default();
        let p = [1.0, 2.0, 3.0];
        let result = t.apply(&p);
        assert!((result[0] - 1.0).abs() < 1e-12);
        assert!((result[1] - 2.0).abs() < 1e-12);
        assert!((result[2] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_then_translate() {
        let t = Transform::placement([0.0, 0.0, 90.0 * DEG], [0.0, 0.0, 5.0]);
        let result = t.apply(&[1.0, 0.0, 0.0]);
        assert!(result[0].abs() < 1e-12);
        assert!((result[1] - 1.0).abs() < 1e-12);
        assert!((result[2] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_directions_ignore_translation() {
        let t = Transform::placement([0.0, 0.0, 90.0 * DEG], [100.0, -20.0, 5.0]);
        let turned = t.rotate(&[1.0, 0.0, 0.0]);
        assert!(turned[0].abs() < 1e-12);
        assert!((turned[1] - 1.0).abs() < 1e-12);
        assert!(turned[2].abs() < 1e-12);

        let back = t.rotate_inverse(&turned);
        assert!((back[0] - 1.0).abs() < 1e-12);
        assert!(back[1].abs() < 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform::placement([10.0 * DEG, -35.0 * DEG, 120.0 * DEG], [3.0, -4.0, 7.5]);
        let p = [12.0, -0.5, 3.25];
        let back = t.apply_inverse(&t.apply(&p));
        for i in 0..3 {
            assert!((back[i] - p[i]).abs() < 1e-12);
        }
    }
}
