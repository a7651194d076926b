//! Surface normals and true cell areas of a DEM
//!
//! Normals are computed at the raster vertices (the cell centres of the elevation grid).
//!
//! - [`NormalMethod::Cell`]: cross product of the two diagonals of every grid cell, then
//!   averaged back to the surrounding vertices.
//! - [`NormalMethod::Four`], [`NormalMethod::Six`], [`NormalMethod::Eight`]: sum of the
//!   (area-weighted) normals of the triangles of a fan around each vertex. Triangles that
//!   would need a neighbour outside the raster are dropped, which turns the interior
//!   central differences into signed one-sided differences on edges and corners.
//!
//! The returned normals are not normalised; callers normalise on use. For a plane
//! `z = p x + q y` every method returns a vector parallel to `(-p, -q, 1)`.

use super::raster::Raster;
use crate::core_types::Vec3;
use crate::error::AvaError;
use serde::{Deserialize, Serialize};

/// Discretisation used for DEM normals (`methodMeshNormal`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NormalMethod {
    /// Diagonal cross product per cell (1)
    Cell,
    /// Four-triangle fan (4)
    Four,
    /// Six-triangle fan following one diagonal direction (6)
    Six,
    /// Eight-triangle fan (8)
    Eight,
}

impl TryFrom<u8> for NormalMethod {
    type Error = AvaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Cell),
            4 => Ok(Self::Four),
            6 => Ok(Self::Six),
            8 => Ok(Self::Eight),
            other => Err(AvaError::config(
                "methodMeshNormal",
                format!("expected one of 1, 4, 6, 8, got {other}"),
            )),
        }
    }
}

impl From<NormalMethod> for u8 {
    fn from(method: NormalMethod) -> Self {
        match method {
            NormalMethod::Cell => 1,
            NormalMethod::Four => 4,
            NormalMethod::Six => 6,
            NormalMethod::Eight => 8,
        }
    }
}

impl NormalMethod {
    /// Neighbour offsets `(dcol, drow)` of the triangle fan, counter-clockwise
    fn fan(self) -> &'static [(i64, i64)] {
        const FOUR: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];
        const SIX: [(i64, i64); 6] = [(1, 0), (1, 1), (0, 1), (-1, 0), (-1, -1), (0, -1)];
        const EIGHT: [(i64, i64); 8] = [
            (1, 0),
            (1, 1),
            (0, 1),
            (-1, 1),
            (-1, 0),
            (-1, -1),
            (0, -1),
            (1, -1),
        ];
        match self {
            Self::Cell => &[],
            Self::Four => &FOUR,
            Self::Six => &SIX,
            Self::Eight => &EIGHT,
        }
    }
}

/// Unnormalised normals `(Nx, Ny, Nz)` at every vertex of `z`
pub fn get_normal_mesh(z: &Raster, method: NormalMethod) -> (Raster, Raster, Raster) {
    let normals = match method {
        NormalMethod::Cell => cell_normals(z),
        fan_method => fan_normals(z, fan_method.fan()),
    };

    let header = z.header;
    let mut nx = Raster::zeros(header);
    let mut ny = Raster::zeros(header);
    let mut nz = Raster::zeros(header);
    for (i, n) in normals.iter().enumerate() {
        nx.data[i] = n.x;
        ny.data[i] = n.y;
        nz.data[i] = n.z;
    }
    (nx, ny, nz)
}

fn fan_normals(z: &Raster, fan: &[(i64, i64)]) -> Vec<Vec3> {
    let h = z.header;
    let cs = h.cellsize;
    let ncols = h.ncols as i64;
    let nrows = h.nrows as i64;
    let mut out = Vec::with_capacity(h.len());

    for row in 0..nrows {
        for col in 0..ncols {
            let z0 = z.data[(row * ncols + col) as usize];
            let edge = |k: usize| -> Option<Vec3> {
                let (dc, dr) = fan[k % fan.len()];
                let (c, r) = (col + dc, row + dr);
                if c < 0 || r < 0 || c >= ncols || r >= nrows {
                    return None;
                }
                let zn = z.data[(r * ncols + c) as usize];
                Some(Vec3::new(dc as f64 * cs, dr as f64 * cs, zn - z0))
            };

            let mut sum = Vec3::zeros();
            for k in 0..fan.len() {
                if let (Some(a), Some(b)) = (edge(k), edge(k + 1)) {
                    sum += a.cross(&b);
                }
            }
            out.push(sum);
        }
    }
    out
}

fn cell_normals(z: &Raster) -> Vec<Vec3> {
    let h = z.header;
    let cs = h.cellsize;
    let (ncols, nrows) = (h.ncols, h.nrows);

    // One normal per grid cell from the cross product of its diagonals
    let mut per_cell = Vec::with_capacity((ncols - 1) * (nrows - 1));
    for row in 0..nrows - 1 {
        for col in 0..ncols - 1 {
            let z00 = z.get(col, row);
            let z10 = z.get(col + 1, row);
            let z01 = z.get(col, row + 1);
            let z11 = z.get(col + 1, row + 1);
            let d1 = Vec3::new(cs, cs, z11 - z00);
            let d2 = Vec3::new(-cs, cs, z01 - z10);
            per_cell.push(d1.cross(&d2));
        }
    }

    // Average the adjacent cell normals back onto the vertices
    let mut out = Vec::with_capacity(h.len());
    for row in 0..nrows {
        for col in 0..ncols {
            let mut sum = Vec3::zeros();
            let mut count = 0.0;
            for cr in row.saturating_sub(1)..=row.min(nrows - 2) {
                for cc in col.saturating_sub(1)..=col.min(ncols - 2) {
                    sum += per_cell[cr * (ncols - 1) + cc];
                    count += 1.0;
                }
            }
            out.push(sum / count);
        }
    }
    out
}

/// True surface area of every cell: `cellsize^2 / nz_unit`
pub fn get_area_mesh(nx: &Raster, ny: &Raster, nz: &Raster, cellsize: f64) -> Raster {
    let mut area = Raster::zeros(nz.header);
    for i in 0..area.data.len() {
        let n = Vec3::new(nx.data[i], ny.data[i], nz.data[i]);
        let nz_unit = n.z / n.norm();
        area.data[i] = cellsize * cellsize / nz_unit;
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::raster::RasterHeader;
    use approx::assert_relative_eq;

    const METHODS: [NormalMethod; 4] = [
        NormalMethod::Cell,
        NormalMethod::Four,
        NormalMethod::Six,
        NormalMethod::Eight,
    ];

    fn unit(nx: &Raster, ny: &Raster, nz: &Raster, i: usize) -> Vec3 {
        Vec3::new(nx.data[i], ny.data[i], nz.data[i]).normalize()
    }

    #[test]
    fn test_plane_normals_are_exact_everywhere() {
        let header = RasterHeader::new(7, 6, 5.0, 0.0, 0.0);
        let (p, q) = (0.3, -0.5);
        let z = Raster::from_fn(header, |x, y| p * x + q * y);
        let expected = Vec3::new(-p, -q, 1.0).normalize();
        for method in METHODS {
            let (nx, ny, nz) = get_normal_mesh(&z, method);
            for i in 0..header.len() {
                let n = unit(&nx, &ny, &nz, i);
                assert_relative_eq!(n, expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_normalised_normals_have_unit_length() {
        let header = RasterHeader::new(12, 10, 2.0, 0.0, 0.0);
        let z = Raster::from_fn(header, |x, y| (x * 0.3).sin() * 4.0 + (y * 0.2).cos() * 3.0);
        for method in METHODS {
            let (nx, ny, nz) = get_normal_mesh(&z, method);
            for row in 1..header.nrows - 1 {
                for col in 1..header.ncols - 1 {
                    let n = unit(&nx, &ny, &nz, header.index(col, row));
                    assert!((n.norm() - 1.0).abs() < 1e-10);
                    assert!(n.z > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_area_of_inclined_plane() {
        let header = RasterHeader::new(5, 5, 10.0, 0.0, 0.0);
        let slope = 30.0_f64.to_radians();
        let z = Raster::from_fn(header, |x, _| -x * slope.tan());
        let (nx, ny, nz) = get_normal_mesh(&z, NormalMethod::Four);
        let area = get_area_mesh(&nx, &ny, &nz, 10.0);
        for &a in &area.data {
            assert_relative_eq!(a, 100.0 / slope.cos(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_nodata_propagates() {
        let header = RasterHeader::new(5, 5, 1.0, 0.0, 0.0);
        let mut z = Raster::zeros(header);
        z.set(2, 2, f64::NAN);
        let (_, _, nz) = get_normal_mesh(&z, NormalMethod::Four);
        assert!(nz.get(2, 2).is_nan());
        assert!(nz.get(1, 2).is_nan());
        assert!(nz.get(0, 0).is_finite());
    }

    #[test]
    fn test_method_codes() {
        assert_eq!(NormalMethod::try_from(6).unwrap(), NormalMethod::Six);
        assert!(NormalMethod::try_from(3).is_err());
        assert_eq!(u8::from(NormalMethod::Cell), 1);
    }
}
