//! Mass-balance time series

use serde::{Deserialize, Serialize};

/// One line of the mass log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassEntry {
    /// Time at the end of the step (s)
    pub time: f64,
    /// Total flowing mass (kg)
    pub current: f64,
    /// Mass entrained during the step (kg)
    pub entrained: f64,
}

/// Mass log of one simulation, one entry per step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MassBalance {
    /// Released mass at `t = 0` (kg)
    pub release_mass: f64,
    /// One entry per completed step
    pub entries: Vec<MassEntry>,
}

impl MassBalance {
    /// Empty log for a release of `release_mass`
    pub fn new(release_mass: f64) -> Self {
        Self {
            release_mass,
            entries: Vec::new(),
        }
    }

    /// Append the state after a step
    pub fn push(&mut self, time: f64, current: f64, entrained: f64) {
        self.entries.push(MassEntry {
            time,
            current,
            entrained,
        });
    }

    /// Total entrained mass (kg)
    pub fn entrained_mass(&self) -> f64 {
        self.entries.iter().map(|e| e.entrained).sum()
    }

    /// Mass at the last step, or the release mass before any step
    pub fn final_mass(&self) -> f64 {
        self.entries.last().map_or(self.release_mass, |e| e.current)
    }

    /// Duration covered by the log (s)
    pub fn final_time(&self) -> f64 {
        self.entries.last().map_or(0.0, |e| e.time)
    }

    /// `final / release`
    pub fn growth_index(&self) -> f64 {
        if self.release_mass > 0.0 {
            self.final_mass() / self.release_mass
        } else {
            f64::NAN
        }
    }

    /// `(final - release) / duration` (kg/s)
    pub fn growth_gradient(&self) -> f64 {
        let t = self.final_time();
        if t > 0.0 {
            (self.final_mass() - self.release_mass) / t
        } else {
            0.0
        }
    }

    /// Mass at `time`, linearly interpolated between entries
    pub fn mass_at(&self, time: f64) -> f64 {
        let mut prev = (0.0, self.release_mass);
        for e in &self.entries {
            if e.time >= time {
                let (t0, m0) = prev;
                if e.time <= t0 {
                    return e.current;
                }
                return m0 + (e.current - m0) * (time - t0) / (e.time - t0);
            }
            prev = (e.time, e.current);
        }
        prev.1
    }

    /// Relative difference of the final mass of `self` to `reference`, both evaluated at
    /// the shorter of the two final times
    pub fn relative_difference(&self, reference: &MassBalance) -> f64 {
        let t = self.final_time().min(reference.final_time());
        let m_ref = reference.mass_at(t);
        if m_ref == 0.0 {
            return f64::NAN;
        }
        (self.mass_at(t) - m_ref) / m_ref
    }
}
