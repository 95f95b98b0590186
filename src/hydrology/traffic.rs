//! Traffic frequency feedback.
//!
//! Every move step adds the particle's volume to `track`. Periodically the
//! accumulated traffic is folded into `frequency` through a logistic
//! transform, so the feedback signal stays in [0, 1) however much water
//! passes, and `track` is cleared for the next cycle.

use glam::IVec2;
use rayon::prelude::*;

use crate::tilemap::Tilemap;

/// Largest f32 below 1.0.
const FREQUENCY_CEILING: f32 = 1.0 - f32::EPSILON / 2.0;

/// Per-cell water traffic: raw accumulator plus smoothed feedback signal.
#[derive(Clone, Debug)]
pub struct Traffic {
    track: Tilemap<f32>,
    frequency: Tilemap<f32>,
}

impl Traffic {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            track: Tilemap::new_with(width, height, 0.0),
            frequency: Tilemap::new_with(width, height, 0.0),
        }
    }

    /// Add a visit weighted by the visiting volume. Ignored outside the grid.
    pub fn record(&mut self, cell: IVec2, volume: f64) {
        if let Some(t) = self.track.at_mut(cell) {
            *t += volume as f32;
        }
    }

    /// Smoothed traffic at a cell; zero outside the grid.
    pub fn frequency(&self, cell: IVec2) -> f64 {
        self.frequency.at(cell).copied().unwrap_or(0.0) as f64
    }

    pub fn track(&self, cell: IVec2) -> f64 {
        self.track.at(cell).copied().unwrap_or(0.0) as f64
    }

    /// Zero the accumulator. The frequency field is kept.
    pub fn reset(&mut self) {
        self.track.fill(0.0);
    }

    /// Blend the logistic transform of `track` into `frequency` with rate
    /// `rate` and steepness `steepness`.
    pub fn update(&mut self, rate: f32, steepness: f32) {
        self.frequency
            .as_mut_slice()
            .par_iter_mut()
            .zip(self.track.as_slice().par_iter())
            .for_each(|(f, &t)| {
                let k = steepness as f64 * t as f64;
                let saturation = if k.is_finite() { k / (1.0 + k) } else { 1.0 };
                let blended = (1.0 - rate as f64) * *f as f64 + rate as f64 * saturation;
                // f32 rounding would otherwise let a saturated cell reach 1.0.
                *f = (blended as f32).min(FREQUENCY_CEILING);
            });
    }

    pub fn frequency_map(&self) -> &Tilemap<f32> {
        &self.frequency
    }

    pub fn track_map(&self) -> &Tilemap<f32> {
        &self.track
    }
}
