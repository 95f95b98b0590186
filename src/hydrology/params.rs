//! Hydrology simulation parameters and configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound on the flood and cascade recursion budgets.
pub const MAX_SPILL: i32 = 32;

/// Simulation intensity preset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HydroPreset {
    /// Few particles, shallow recursion - quick previews
    Fast,
    /// Balanced
    #[default]
    Normal,
    /// Many particles per cycle, deeper flooding
    Detailed,
    /// Strong traffic feedback - pronounced channel incision
    Incised,
}

impl HydroPreset {
    pub fn all() -> &'static [Self] {
        &[Self::Fast, Self::Normal, Self::Detailed, Self::Incised]
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Fast => "Quick preview",
            Self::Normal => "Balanced erosion and flooding",
            Self::Detailed => "Many particles, deeper flooding",
            Self::Incised => "Strong channel feedback",
        }
    }
}

impl std::fmt::Display for HydroPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Normal => write!(f, "normal"),
            Self::Detailed => write!(f, "detailed"),
            Self::Incised => write!(f, "incised"),
        }
    }
}

impl std::str::FromStr for HydroPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|p| p.to_string() == s.to_ascii_lowercase())
            .ok_or_else(|| format!("unknown preset '{s}'"))
    }
}

/// Global hydrology parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydroParams {
    // =========================================================================
    // Spatial calibration
    // =========================================================================

    /// Spatial scale of the map. Height differences are multiplied by
    /// `scale / calibration` before driving erosion or cascading.
    pub scale: f64,

    /// Calibration divisor paired with `scale` (default: 80)
    pub calibration: f64,

    // =========================================================================
    // Water particle
    // =========================================================================

    /// Volume of a freshly spawned particle
    pub initial_volume: f64,

    /// Particle is finished once its volume falls below this
    pub min_volume: f64,

    /// Evaporation rate before the first move
    pub initial_evaporation: f64,

    /// Evaporation rate each move resets to
    pub base_evaporation: f64,

    /// How strongly traffic frequency suppresses evaporation (0.0-1.0)
    pub evaporation_damping: f64,

    /// Lateral force below which a particle is stuck
    pub motion_epsilon: f64,

    /// Converts particle volume into water layer thickness when flooding
    pub volume_factor: f64,

    /// Flood/cascade recursion budget of a freshly spawned particle
    pub spill: i32,

    /// Sediment removal is reissued until the remainder is below this
    pub removal_epsilon: f64,

    // =========================================================================
    // Redistribution
    // =========================================================================

    /// Cascade spill budget used by the global sweep
    pub sweep_spill: i32,

    // =========================================================================
    // Traffic feedback
    // =========================================================================

    /// Smoothing rate of the frequency field (lambda)
    pub frequency_rate: f32,

    /// Steepness of the logistic traffic transform (K)
    pub frequency_steepness: f32,
}

impl Default for HydroParams {
    fn default() -> Self {
        Self {
            scale: 80.0,
            calibration: 80.0,

            initial_volume: 1.0,
            min_volume: 0.01,
            initial_evaporation: 0.001,
            base_evaporation: 0.01,
            evaporation_damping: 0.2,
            motion_epsilon: 1e-5,
            volume_factor: 0.015,
            spill: 3,
            removal_epsilon: 1e-8,

            sweep_spill: 3,

            frequency_rate: 0.01,
            frequency_steepness: 50.0,
        }
    }
}

impl HydroParams {
    /// Quick configuration for tests and previews
    pub fn fast() -> Self {
        Self {
            spill: 2,
            sweep_spill: 1,
            ..Default::default()
        }
    }

    /// Deeper flooding, slower to run
    pub fn high_quality() -> Self {
        Self {
            spill: 5,
            sweep_spill: 4,
            ..Default::default()
        }
    }

    /// Multiplier applied to raw height differences
    pub fn height_factor(&self) -> f64 {
        self.scale / self.calibration
    }

    /// Create parameters from a preset
    pub fn from_preset(preset: HydroPreset) -> Self {
        match preset {
            HydroPreset::Fast => Self::fast(),
            HydroPreset::Normal => Self::default(),
            HydroPreset::Detailed => Self::high_quality(),
            HydroPreset::Incised => Self {
                frequency_rate: 0.05,
                frequency_steepness: 15.0,
                evaporation_damping: 0.5,
                ..Default::default()
            },
        }
    }

    /// Particles per cycle suggested for a map of `cells` columns
    pub fn particles_for(preset: HydroPreset, cells: usize) -> usize {
        match preset {
            HydroPreset::Fast => (cells / 64).max(1),
            HydroPreset::Normal | HydroPreset::Incised => (cells / 16).max(1),
            HydroPreset::Detailed => (cells / 4).max(1),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Reject values that would stall or blow up the simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_open = |v: f64| v > 0.0 && v < 1.0;
        let spill_ok = |s: i32| (0..=MAX_SPILL).contains(&s);
        let checks: [(&'static str, f64, bool); 10] = [
            ("calibration", self.calibration, self.calibration != 0.0),
            ("min_volume", self.min_volume, self.min_volume > 0.0),
            ("base_evaporation", self.base_evaporation, unit_open(self.base_evaporation)),
            (
                "initial_evaporation",
                self.initial_evaporation,
                (0.0..1.0).contains(&self.initial_evaporation),
            ),
            (
                "evaporation_damping",
                self.evaporation_damping,
                (0.0..=1.0).contains(&self.evaporation_damping),
            ),
            ("volume_factor", self.volume_factor, self.volume_factor > 0.0),
            ("spill", self.spill as f64, spill_ok(self.spill)),
            ("sweep_spill", self.sweep_spill as f64, spill_ok(self.sweep_spill)),
            (
                "frequency_rate",
                self.frequency_rate as f64,
                (0.0..=1.0).contains(&self.frequency_rate),
            ),
            (
                "frequency_steepness",
                self.frequency_steepness as f64,
                self.frequency_steepness.is_finite() && self.frequency_steepness >= 0.0,
            ),
        ];
        for (name, value, ok) in checks {
            if !ok {
                return Err(ConfigError::InvalidParam { name, value });
            }
        }
        Ok(())
    }
}
