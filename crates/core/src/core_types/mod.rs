//! Core types and utilities

pub mod vec3;
pub mod vector_ops;

pub use vec3::{Mat2, Vec2, Vec3};
pub use vector_ops::{cross, dot, norm, norm2, normalize};
