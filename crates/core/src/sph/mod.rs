//! SPH operators on the DEM surface
//!
//! Flow depth and its gradient are estimated from neighbouring particles. Offsets between
//! particles are projected onto the tangent plane of the DEM at the evaluation particle,
//! so kernels and gradients are planar even on steep terrain. Results are expressed back
//! in world coordinates.

pub mod depth;
pub mod gradient;
pub mod kernel;

pub use depth::flow_depth;
pub use gradient::{depth_gradient, SphGradient};
pub use kernel::{KernelShape, SphKernel};

use crate::core_types::vector_ops::normalize_or_keep;
use crate::core_types::Vec3;
use crate::grid::dem::Dem;
use crate::grid::interpolation::InterpMethod;
use crate::particles::{NeighbourGrid, Particles};

/// Orthonormal frame `(e1, e2, n)` of the surface at a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    /// First tangent direction (projection of +x)
    pub e1: Vec3,
    /// Second tangent direction, `n x e1`
    pub e2: Vec3,
    /// Unit surface normal
    pub n: Vec3,
}

impl TangentFrame {
    /// Frame for unit normal `n`
    pub fn from_normal(n: Vec3) -> Self {
        let ex = Vec3::new(1.0, 0.0, 0.0);
        let mut e1 = ex - n * n.dot(&ex);
        if e1.norm() < 1e-8 {
            let ey = Vec3::new(0.0, 1.0, 0.0);
            e1 = ey - n * n.dot(&ey);
        }
        let e1 = normalize_or_keep(e1);
        let e2 = n.cross(&e1);
        Self { e1, e2, n }
    }

    /// In-plane coordinates of `d`
    #[inline]
    pub fn project(&self, d: Vec3) -> (f64, f64) {
        (d.dot(&self.e1), d.dot(&self.e2))
    }

    /// World vector of in-plane components `(g1, g2)`
    #[inline]
    pub fn lift(&self, g1: f64, g2: f64) -> Vec3 {
        self.e1 * g1 + self.e2 * g2
    }
}

/// Borrowed state needed by the SPH sums of one step
#[derive(Clone, Copy)]
pub struct SphContext<'a> {
    /// Particle population
    pub particles: &'a Particles,
    /// Neighbour index, rebuilt for the current positions
    pub grid: &'a NeighbourGrid,
    /// Terrain providing normals
    pub dem: &'a Dem,
    /// Smoothing kernel
    pub kernel: SphKernel,
    /// Snow density
    pub rho: f64,
}

impl SphContext<'_> {
    /// Tangent frame at particle `p`; flat frame if the normal cannot be sampled
    pub fn frame(&self, p: usize) -> TangentFrame {
        let n = self
            .dem
            .normal_at(self.particles.x[p], self.particles.y[p], InterpMethod::Bilinear)
            .unwrap_or_else(|| Vec3::new(0.0, 0.0, 1.0));
        TangentFrame::from_normal(n)
    }

    /// Call `f(q, d1, d2, r)` for every particle `q` inside the kernel support of `p`.
    ///
    /// `(d1, d2)` are the in-plane components of `x_p - x_q` and `r` their length. `p`
    /// itself is included with `r = 0`.
    #[inline]
    pub fn for_each_in_support<F>(&self, p: usize, frame: &TangentFrame, mut f: F)
    where
        F: FnMut(usize, f64, f64, f64),
    {
        let parts = self.particles;
        let radius = self.kernel.radius();
        let xp = parts.position(p);
        self.grid.for_each_neighbour(parts.ind_x[p], parts.ind_y[p], |q| {
            let (d1, d2) = frame.project(xp - parts.position(q));
            let r = d1.hypot(d2);
            if r < radius {
                f(q, d1, d2, r);
            }
        });
    }
}
