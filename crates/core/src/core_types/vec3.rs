//! Vector type aliases for 3D positions, velocities and surface normals.

use nalgebra::{Matrix2, Vector2, Vector3};

/// 3D vector type for positions, velocities, forces and normals.
///
/// Alias for `nalgebra::Vector3<f64>`. Particle coordinates are kept in double precision
/// because positions are accumulated over thousands of steps on DEMs that span kilometres.
pub type Vec3 = Vector3<f64>;

/// 2D vector in a local tangent-plane basis
pub type Vec2 = Vector2<f64>;

/// 2x2 matrix in a local tangent-plane basis (SPH moment matrices)
pub type Mat2 = Matrix2<f64>;
