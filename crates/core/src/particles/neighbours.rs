//! Uniform-grid neighbour index
//!
//! The grid covers the DEM with cells of the SPH kernel radius `R`. Each rebuild assigns
//! every particle to a cell and counting-sorts the particle indices by cell id
//! (`indX + ncols * indY`), so the particles of cell `c` are
//! `part_in_cell[ind_part_in_cell[c]..ind_part_in_cell[c + 1]]`.
//!
//! The 3x3 block of cells around a particle holds every particle within `R` in the maximum
//! norm. [`NeighbourGrid::neighbours_of`] additionally drops candidates further than
//! `sqrt(2) R`; the SPH sums iterate the raw block since the kernel vanishes beyond `R`.

use super::Particles;
use crate::grid::raster::RasterHeader;

/// Cell-sorted particle index, rebuilt every step
#[derive(Debug, Clone)]
pub struct NeighbourGrid {
    header: RasterHeader,
    ind_part_in_cell: Vec<usize>,
    part_in_cell: Vec<usize>,
}

impl NeighbourGrid {
    /// Empty index over the grid described by `header`
    pub fn new(header: RasterHeader) -> Self {
        Self {
            header,
            ind_part_in_cell: vec![0; header.len() + 1],
            part_in_cell: Vec::new(),
        }
    }

    /// Grid header (cell size is the kernel radius)
    pub fn header(&self) -> &RasterHeader {
        &self.header
    }

    /// Cell `(indX, indY)` containing `(x, y)`, clamped to the grid
    #[inline]
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let h = &self.header;
        let ix = ((x - h.xllcenter) / h.cellsize).floor().max(0.0) as usize;
        let iy = ((y - h.yllcenter) / h.cellsize).floor().max(0.0) as usize;
        (ix.min(h.ncols - 1), iy.min(h.nrows - 1))
    }

    /// Reassign every particle to its cell and rebuild the sorted index.
    ///
    /// Writes `ind_x`, `ind_y` and `ind_cell` of `particles`.
    pub fn rebuild(&mut self, particles: &mut Particles) {
        let ncells = self.header.len();
        let ncols = self.header.ncols;
        for i in 0..particles.n {
            let (ix, iy) = self.cell_of(particles.x[i], particles.y[i]);
            particles.ind_x[i] = ix;
            particles.ind_y[i] = iy;
            particles.ind_cell[i] = ix + ncols * iy;
        }

        // Counting sort: counts, exclusive prefix sum, scatter
        self.ind_part_in_cell.clear();
        self.ind_part_in_cell.resize(ncells + 1, 0);
        for &c in &particles.ind_cell {
            self.ind_part_in_cell[c + 1] += 1;
        }
        for c in 0..ncells {
            self.ind_part_in_cell[c + 1] += self.ind_part_in_cell[c];
        }
        let mut cursor = self.ind_part_in_cell.clone();
        self.part_in_cell.clear();
        self.part_in_cell.resize(particles.n, 0);
        for (i, &c) in particles.ind_cell.iter().enumerate() {
            self.part_in_cell[cursor[c]] = i;
            cursor[c] += 1;
        }
    }

    /// Particle indices of cell `cell`
    #[inline]
    pub fn particles_in_cell(&self, cell: usize) -> &[usize] {
        &self.part_in_cell[self.ind_part_in_cell[cell]..self.ind_part_in_cell[cell + 1]]
    }

    /// Cumulative counts (length `ncells + 1`)
    pub fn ind_part_in_cell(&self) -> &[usize] {
        &self.ind_part_in_cell
    }

    /// Particle indices sorted by cell
    pub fn part_in_cell(&self) -> &[usize] {
        &self.part_in_cell
    }

    /// Call `f` for every particle in the 3x3 block around cell `(ix, iy)`
    #[inline]
    pub fn for_each_neighbour<F>(&self, ix: usize, iy: usize, mut f: F)
    where
        F: FnMut(usize),
    {
        let ncols = self.header.ncols;
        let rows = iy.saturating_sub(1)..=(iy + 1).min(self.header.nrows - 1);
        for r in rows {
            let first = r * ncols + ix.saturating_sub(1);
            let last = r * ncols + (ix + 1).min(ncols - 1);
            // Cells of one row are contiguous in the sorted array
            let slice = &self.part_in_cell[self.ind_part_in_cell[first]..self.ind_part_in_cell[last + 1]];
            for &q in slice {
                f(q);
            }
        }
    }

    /// Neighbours of particle `p` within `sqrt(2) R`, including `p` itself
    pub fn neighbours_of(&self, particles: &Particles, p: usize) -> Vec<usize> {
        let r2 = 2.0 * self.header.cellsize * self.header.cellsize;
        let (xp, yp) = (particles.x[p], particles.y[p]);
        let mut out = Vec::with_capacity(32);
        self.for_each_neighbour(particles.ind_x[p], particles.ind_y[p], |q| {
            let d2 = (particles.x[q] - xp).powi(2) + (particles.y[q] - yp).powi(2);
            if d2 <= r2 {
                out.push(q);
            }
        });
        out
    }
}
