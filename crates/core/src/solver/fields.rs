//! Grid fields assembled from the particles
//!
//! Particle mass and momentum are deposited onto the DEM grid with the same stencil used
//! to sample the grid at particle positions, so deposition is the transpose of
//! interpolation. From the deposits:
//!
//! ```text
//! FD = M / (rho A_cell)       flow depth
//! FV = |P| / M                flow velocity
//! P  = rho FV^2               pressure
//! ```
//!
//! Peak rasters (`ppr`, `pfd`, `pfv`, `pta`) only ever increase.

use crate::config::{InterpOption, ResType};
use crate::error::AvaResult;
use crate::grid::dem::Dem;
use crate::grid::interpolation::{cell_weights, interpolate, CellWeights, InterpMethod};
use crate::grid::raster::Raster;
use crate::particles::Particles;

/// Current and peak flow fields on the DEM grid
#[derive(Debug, Clone)]
pub struct FlowFields {
    /// Deposited mass per cell (kg)
    pub mass: Raster,
    /// Flow depth (m)
    pub fd: Raster,
    /// Flow velocity magnitude (m/s)
    pub fv: Raster,
    /// Pressure (Pa)
    pub p: Raster,
    /// Peak pressure (Pa)
    pub ppr: Raster,
    /// Peak flow depth (m)
    pub pfd: Raster,
    /// Peak flow velocity (m/s)
    pub pfv: Raster,
    /// Peak travel angle (degrees)
    pub pta: Raster,
    mom_x: Raster,
    mom_y: Raster,
    mom_z: Raster,
}

impl FlowFields {
    /// Zero fields on the grid of `dem`
    pub fn new(dem: &Dem) -> Self {
        let zeros = Raster::zeros(*dem.header());
        Self {
            mass: zeros.clone(),
            fd: zeros.clone(),
            fv: zeros.clone(),
            p: zeros.clone(),
            ppr: zeros.clone(),
            pfd: zeros.clone(),
            pfv: zeros.clone(),
            pta: zeros.clone(),
            mom_x: zeros.clone(),
            mom_y: zeros.clone(),
            mom_z: zeros,
        }
    }

    /// Field for a result type (`FT`/`FV` are the current depth and velocity)
    pub fn get(&self, res_type: ResType) -> &Raster {
        match res_type {
            ResType::Ppr => &self.ppr,
            ResType::Pfd => &self.pfd,
            ResType::Pfv => &self.pfv,
            ResType::Pta => &self.pta,
            ResType::Ft => &self.fd,
            ResType::Fv => &self.fv,
        }
    }

    /// Re-assemble the current fields from `particles` and update the peaks
    ///
    /// # Arguments
    ///
    /// * `particles` - Current population
    /// * `dem` - Grid and true cell areas
    /// * `option` - Deposition stencil
    /// * `rho` - Flow density
    pub fn update(&mut self, particles: &Particles, dem: &Dem, option: InterpOption, rho: f64) -> AvaResult<()> {
        let header = *dem.header();
        for r in [&mut self.mass, &mut self.mom_x, &mut self.mom_y, &mut self.mom_z] {
            r.fill(0.0);
        }
        let mut travel_angle = Raster::zeros(header);

        for i in 0..particles.n {
            let Some(stencil) = deposit_stencil(dem, particles.x[i], particles.y[i], option) else {
                continue;
            };
            let idx = stencil.indices(header.ncols);
            let m = particles.m[i];
            let angle = particles.travel_angle(i);
            for k in 0..4 {
                let w = stencil.weights[k];
                if w == 0.0 {
                    continue;
                }
                let c = idx[k];
                self.mass.data[c] += w * m;
                self.mom_x.data[c] += w * m * particles.ux[i];
                self.mom_y.data[c] += w * m * particles.uy[i];
                self.mom_z.data[c] += w * m * particles.uz[i];
                travel_angle.data[c] = travel_angle.data[c].max(angle);
            }
        }

        let area = dem.area();
        for c in 0..header.len() {
            let m = self.mass.data[c];
            if m > 0.0 && area.data[c].is_finite() {
                let momentum =
                    (self.mom_x.data[c].powi(2) + self.mom_y.data[c].powi(2) + self.mom_z.data[c].powi(2)).sqrt();
                let fv = momentum / m;
                self.fd.data[c] = m / (rho * area.data[c]);
                self.fv.data[c] = fv;
                self.p.data[c] = rho * fv * fv;
            } else {
                self.fd.data[c] = 0.0;
                self.fv.data[c] = 0.0;
                self.p.data[c] = 0.0;
            }
        }

        self.pfd.max_assign(&self.fd)?;
        self.pfv.max_assign(&self.fv)?;
        self.ppr.max_assign(&self.p)?;
        self.pta.max_assign(&travel_angle)?;
        Ok(())
    }

    /// Flow depth sampled at `(x, y)`
    pub fn depth_at(&self, x: f64, y: f64) -> Option<f64> {
        interpolate(&self.fd, x, y, InterpMethod::Bilinear)
    }
}

/// Deposition stencil for `option`
pub fn deposit_stencil(dem: &Dem, x: f64, y: f64, option: InterpOption) -> Option<CellWeights> {
    let header = dem.header();
    match option {
        InterpOption::Nearest => cell_weights(header, x, y, InterpMethod::Nearest),
        InterpOption::Bilinear => cell_weights(header, x, y, InterpMethod::Bilinear),
        InterpOption::EqualWeights => cell_weights(header, x, y, InterpMethod::Bilinear).map(|mut w| {
            w.weights = [0.25; 4];
            w
        }),
    }
}
