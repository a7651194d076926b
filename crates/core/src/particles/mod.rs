//! Particle population
//!
//! [`Particles`] stores the flowing mass as a structure of arrays. Every per-particle
//! vector has length `n`, and `m_tot` is kept equal to the sum of `m` by every operation
//! that adds or removes mass. [`Particles::check`] verifies both invariants.
//!
//! Positions are DEM coordinates (origin shifted to the lower-left cell centre).

pub mod neighbours;

pub use neighbours::NeighbourGrid;

use crate::core_types::Vec3;
use crate::error::{AvaError, AvaResult};
use crate::grid::dem::Dem;
use crate::grid::interpolation::{cell_weights, InterpMethod};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// State of one particle, used when seeding
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticleInit {
    /// Position x
    pub x: f64,
    /// Position y
    pub y: f64,
    /// Position z
    pub z: f64,
    /// Mass (kg)
    pub m: f64,
    /// Represented area (m²)
    pub a: f64,
    /// Flow depth (m)
    pub h: f64,
}

/// Structure-of-arrays particle population
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Particles {
    /// Position x
    pub x: Vec<f64>,
    /// Position y
    pub y: Vec<f64>,
    /// Position z
    pub z: Vec<f64>,
    /// Velocity x
    pub ux: Vec<f64>,
    /// Velocity y
    pub uy: Vec<f64>,
    /// Velocity z
    pub uz: Vec<f64>,
    /// Mass (kg)
    pub m: Vec<f64>,
    /// Travelled path length (m)
    pub s: Vec<f64>,
    /// Flow depth (m)
    pub h: Vec<f64>,
    /// Represented area (m²)
    pub a: Vec<f64>,
    /// Elevation at release
    pub z0: Vec<f64>,
    /// Accumulated entrained mass (kg)
    pub m_ent: Vec<f64>,
    /// Neighbour-grid column
    pub ind_x: Vec<usize>,
    /// Neighbour-grid row
    pub ind_y: Vec<usize>,
    /// Neighbour-grid linear cell id
    pub ind_cell: Vec<usize>,
    /// Stable particle identifier
    pub id: Vec<u64>,
    /// Identifier of the particle this one was split from (own id otherwise)
    pub parent_id: Vec<u64>,
    /// Number of particles
    pub n: usize,
    /// Total mass (kg)
    pub m_tot: f64,
    /// Simulation time (s)
    pub t: f64,
    /// Next identifier to hand out
    pub next_id: u64,
}

fn retain_by<T: Copy>(v: &mut Vec<T>, keep: &[bool]) {
    let mut k = 0;
    v.retain(|_| {
        let keep_it = keep[k];
        k += 1;
        keep_it
    });
}

impl Particles {
    /// Empty population at time `t`
    pub fn new(t: f64) -> Self {
        Self {
            t,
            ..Self::default()
        }
    }

    /// Build a population from seeded particles at rest
    pub fn from_inits(inits: &[ParticleInit], t: f64) -> Self {
        let mut particles = Self::new(t);
        for init in inits {
            particles.push(init);
        }
        particles
    }

    /// Append one particle at rest
    pub fn push(&mut self, init: &ParticleInit) {
        self.x.push(init.x);
        self.y.push(init.y);
        self.z.push(init.z);
        self.ux.push(0.0);
        self.uy.push(0.0);
        self.uz.push(0.0);
        self.m.push(init.m);
        self.s.push(0.0);
        self.h.push(init.h);
        self.a.push(init.a);
        self.z0.push(init.z);
        self.m_ent.push(0.0);
        self.ind_x.push(0);
        self.ind_y.push(0);
        self.ind_cell.push(0);
        self.id.push(self.next_id);
        self.parent_id.push(self.next_id);
        self.next_id += 1;
        self.n += 1;
        self.m_tot += init.m;
    }

    fn float_arrays_mut(&mut self) -> [&mut Vec<f64>; 12] {
        [
            &mut self.x,
            &mut self.y,
            &mut self.z,
            &mut self.ux,
            &mut self.uy,
            &mut self.uz,
            &mut self.m,
            &mut self.s,
            &mut self.h,
            &mut self.a,
            &mut self.z0,
            &mut self.m_ent,
        ]
    }

    fn index_arrays_mut(&mut self) -> [&mut Vec<usize>; 3] {
        [&mut self.ind_x, &mut self.ind_y, &mut self.ind_cell]
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.n
    }

    /// Whether the population is empty
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Position of particle `i`
    #[inline]
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::new(self.x[i], self.y[i], self.z[i])
    }

    /// Velocity of particle `i`
    #[inline]
    pub fn velocity(&self, i: usize) -> Vec3 {
        Vec3::new(self.ux[i], self.uy[i], self.uz[i])
    }

    /// Set the velocity of particle `i`
    #[inline]
    pub fn set_velocity(&mut self, i: usize, v: Vec3) {
        self.ux[i] = v.x;
        self.uy[i] = v.y;
        self.uz[i] = v.z;
    }

    /// Velocity magnitude of particle `i`
    #[inline]
    pub fn velocity_magnitude(&self, i: usize) -> f64 {
        self.velocity(i).norm()
    }

    /// Travel angle `atan((z0 - z) / s)` of particle `i` in degrees (0 before it moves)
    pub fn travel_angle(&self, i: usize) -> f64 {
        if self.s[i] > 0.0 {
            ((self.z0[i] - self.z[i]) / self.s[i]).atan().to_degrees()
        } else {
            0.0
        }
    }

    /// Total kinetic energy `sum(m |u|^2 / 2)`
    pub fn kinetic_energy(&self) -> f64 {
        (0..self.n)
            .map(|i| 0.5 * self.m[i] * self.velocity(i).norm_squared())
            .sum()
    }

    /// Recompute `m_tot` from the masses
    pub fn update_mass_total(&mut self) {
        self.m_tot = self.m.iter().sum();
    }

    /// Verify array lengths and the mass total
    pub fn check(&self) -> AvaResult<()> {
        let lengths = [
            ("x", self.x.len()),
            ("y", self.y.len()),
            ("z", self.z.len()),
            ("ux", self.ux.len()),
            ("uy", self.uy.len()),
            ("uz", self.uz.len()),
            ("m", self.m.len()),
            ("s", self.s.len()),
            ("h", self.h.len()),
            ("a", self.a.len()),
            ("z0", self.z0.len()),
            ("mEnt", self.m_ent.len()),
            ("indX", self.ind_x.len()),
            ("indY", self.ind_y.len()),
            ("indCell", self.ind_cell.len()),
            ("id", self.id.len()),
            ("parentId", self.parent_id.len()),
        ];
        for (name, len) in lengths {
            if len != self.n {
                return Err(AvaError::shape(format!("particle array {name}"), self.n, len));
            }
        }
        let sum: f64 = self.m.iter().sum();
        if (sum - self.m_tot).abs() > 1e-9 * self.m_tot.abs().max(1.0) {
            return Err(AvaError::config(
                "mTot",
                format!("total mass {} differs from sum of masses {sum}", self.m_tot),
            ));
        }
        Ok(())
    }

    /// Keep the particles where `keep` is true.
    ///
    /// Returns the number of removed particles.
    pub fn remove_part(&mut self, keep: &[bool]) -> usize {
        debug_assert_eq!(keep.len(), self.n);
        let n_remove = keep.iter().filter(|&&k| !k).count();
        if n_remove == 0 {
            return 0;
        }
        for v in self.float_arrays_mut() {
            retain_by(v, keep);
        }
        for v in self.index_arrays_mut() {
            retain_by(v, keep);
        }
        retain_by(&mut self.id, keep);
        retain_by(&mut self.parent_id, keep);
        self.n -= n_remove;
        self.update_mass_total();
        n_remove
    }

    /// Remove particles that left, or are about to leave, the valid DEM area.
    ///
    /// Two passes: one on the current positions and one on the positions predicted after
    /// a step of `dt` with the current velocity. A position is invalid when its normalised
    /// coordinate satisfies `L <= 1.5` or `L >= n - 1.5`, or when any cell of its bilinear
    /// stencil is no-data.
    pub fn remove_out_of_dem(&mut self, dem: &Dem, dt: f64) -> usize {
        let header = *dem.header();
        let valid = |x: f64, y: f64| -> bool {
            let lx = (x - header.xllcenter) / header.cellsize;
            let ly = (y - header.yllcenter) / header.cellsize;
            let in_band = lx > 1.5
                && lx < header.ncols as f64 - 1.5
                && ly > 1.5
                && ly < header.nrows as f64 - 1.5;
            if !in_band {
                return false;
            }
            cell_weights(&header, x, y, InterpMethod::Bilinear).is_some_and(|w| {
                w.indices(header.ncols)
                    .iter()
                    .all(|&idx| !dem.is_outside(idx))
            })
        };

        let keep: Vec<bool> = (0..self.n).map(|i| valid(self.x[i], self.y[i])).collect();
        let mut removed = self.remove_part(&keep);

        let keep: Vec<bool> = (0..self.n)
            .map(|i| valid(self.x[i] + dt * self.ux[i], self.y[i] + dt * self.uy[i]))
            .collect();
        removed += self.remove_part(&keep);

        if removed > 0 {
            warn!("Removed {} particle(s) leaving the DEM, {} left", removed, self.n);
        }
        removed
    }

    /// Remove particles with flow depth below `hmin`
    pub fn remove_small_part(&mut self, hmin: f64) -> usize {
        let keep: Vec<bool> = self.h.iter().map(|&h| h >= hmin).collect();
        let removed = self.remove_part(&keep);
        if removed > 0 {
            debug!("Removed {} particle(s) thinner than {} m", removed, hmin);
        }
        removed
    }

    /// Split particles heavier than `1.5 * mass_per_part`.
    ///
    /// A particle of mass `m` becomes `k = floor(m / mass_per_part)` particles of mass
    /// `m / k` at the same position and velocity. Returns the number of new particles.
    pub fn split_part(&mut self, mass_per_part: f64) -> usize {
        let n_before = self.n;
        let mut added = 0;
        let mut n_split = 0;
        for i in 0..n_before {
            if self.m[i] <= 1.5 * mass_per_part {
                continue;
            }
            n_split += 1;
            let k = (self.m[i] / mass_per_part).floor();
            let children = k as usize - 1;
            let m_child = self.m[i] / k;
            let a_child = self.a[i] / k;
            self.m[i] = m_child;
            self.a[i] = a_child;
            self.m_ent[i] /= k;
            for _ in 0..children {
                self.clone_particle(i);
                added += 1;
            }
        }
        if added > 0 {
            self.update_mass_total();
            debug!("Split {} heavy particle(s) into {} new ones", n_split, added);
        }
        added
    }

    fn clone_particle(&mut self, i: usize) {
        for v in self.float_arrays_mut() {
            let value = v[i];
            v.push(value);
        }
        for v in self.index_arrays_mut() {
            let value = v[i];
            v.push(value);
        }
        let parent = self.id[i];
        self.id.push(self.next_id);
        self.parent_id.push(parent);
        self.next_id += 1;
        self.n += 1;
    }

    /// Append all particles of `other`, keeping this population's time.
    ///
    /// Identifiers of the incoming particles are reassigned to stay unique.
    pub fn merge(&mut self, other: Particles) {
        let offset = self.next_id;
        self.x.extend(other.x);
        self.y.extend(other.y);
        self.z.extend(other.z);
        self.ux.extend(other.ux);
        self.uy.extend(other.uy);
        self.uz.extend(other.uz);
        self.m.extend(other.m);
        self.s.extend(other.s);
        self.h.extend(other.h);
        self.a.extend(other.a);
        self.z0.extend(other.z0);
        self.m_ent.extend(other.m_ent);
        self.ind_x.extend(other.ind_x);
        self.ind_y.extend(other.ind_y);
        self.ind_cell.extend(other.ind_cell);
        self.id.extend(other.id.iter().map(|id| id + offset));
        self.parent_id.extend(other.parent_id.iter().map(|id| id + offset));
        self.next_id += other.next_id;
        self.n += other.n;
        self.update_mass_total();
    }

    /// Whether any particle state is non-finite
    pub fn has_non_finite(&self) -> bool {
        !self.m_tot.is_finite()
            || [&self.x, &self.y, &self.z, &self.ux, &self.uy, &self.uz]
                .iter()
                .any(|v| v.iter().any(|c| !c.is_finite()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn population(masses: &[f64]) -> Particles {
        let inits: Vec<ParticleInit> = masses
            .iter()
            .enumerate()
            .map(|(i, &m)| ParticleInit {
                x: 10.0 + i as f64,
                y: 10.0,
                z: 0.0,
                m,
                a: 1.0,
                h: 1.0,
            })
            .collect();
        Particles::from_inits(&inits, 0.0)
    }

    #[test]
    fn test_remove_part_keeps_invariants() {
        let mut p = population(&[1.0, 2.0, 3.0, 4.0]);
        let removed = p.remove_part(&[true, false, true, false]);
        assert_eq!(removed, 2);
        assert_eq!(p.n, 2);
        assert_eq!(p.m, vec![1.0, 3.0]);
        assert_eq!(p.id, vec![0, 2]);
        assert_relative_eq!(p.m_tot, 4.0);
        p.check().unwrap();
    }

    #[test]
    fn test_split_part() {
        let mut p = population(&[1.0, 3.4, 1.6]);
        let added = p.split_part(1.0);
        // 3.4 -> 3 particles, 1.6 -> 1 particle, 1.0 untouched
        assert_eq!(added, 2);
        assert_eq!(p.n, 5);
        assert_relative_eq!(p.m[1], 3.4 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(p.m[3], 3.4 / 3.0, epsilon = 1e-12);
        assert_eq!(p.parent_id[3], p.id[1]);
        assert_eq!(p.x[3], p.x[1]);
        assert_relative_eq!(p.m_tot, 6.0, epsilon = 1e-12);
        p.check().unwrap();
    }

    #[test]
    fn test_merge_concatenates_and_reassigns_ids() {
        let mut a = population(&[1.0, 1.0]);
        a.t = 5.0;
        let b = population(&[2.0]);
        a.merge(b);
        assert_eq!(a.n, 3);
        assert_eq!(a.t, 5.0);
        assert_eq!(a.id, vec![0, 1, 2]);
        assert_relative_eq!(a.m_tot, 4.0);
        a.check().unwrap();
    }

    #[test]
    fn test_remove_small_part() {
        let mut p = population(&[1.0, 1.0, 1.0]);
        p.h = vec![0.5, 0.01, 0.2];
        assert_eq!(p.remove_small_part(0.1), 1);
        assert_eq!(p.h, vec![0.5, 0.2]);
        p.check().unwrap();
    }

    #[test]
    fn test_remove_out_of_dem_uses_margin_and_velocity() {
        let dem = Dem::flat(20, 20, 1.0, 0.0, 1.0).unwrap();
        let mut p = population(&[1.0, 1.0, 1.0, 1.0]);
        p.x = vec![1.5, 10.0, 10.0, 18.5];
        p.y = vec![10.0, 10.0, 10.0, 10.0];
        // Second particle moves out within one step
        p.ux[1] = 100.0;
        let removed = p.remove_out_of_dem(&dem, 0.1);
        assert_eq!(removed, 3);
        assert_eq!(p.x, vec![10.0]);
    }

    #[test]
    fn test_check_detects_shape_mismatch() {
        let mut p = population(&[1.0, 1.0]);
        p.h.pop();
        assert!(matches!(p.check(), Err(AvaError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_kinetic_energy_and_travel_angle() {
        let mut p = population(&[2.0]);
        p.set_velocity(0, Vec3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(p.kinetic_energy(), 25.0);
        p.z0[0] = 10.0;
        p.s[0] = 10.0;
        assert_relative_eq!(p.travel_angle(0), 45.0, epsilon = 1e-12);
    }
}
