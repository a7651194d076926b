//! Raster and geometry primitives
//!
//! DEM, raster containers, interpolation, surface normals, polygon rasterisation and path
//! profiles. Everything here is computed once per run and read-only afterwards.

pub mod dem;
pub mod interpolation;
pub mod normals;
pub mod path;
pub mod polygon;
pub mod raster;

pub use dem::Dem;
pub use interpolation::{cell_weights, interpolate, project_on_raster, resample, resize_data, CellWeights, InterpMethod};
pub use normals::{get_area_mesh, get_normal_mesh, NormalMethod};
pub use path::{check_profile, path_to_domain, prepare_line, PathDomain, Profile};
pub use polygon::{point_in_polygon, polygon_to_raster, prepare_area, LineSet, Polyline};
pub use raster::{Raster, RasterHeader};
