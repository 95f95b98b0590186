//! Soil types and their physical parameters.
//!
//! Every layer in the terrain volume is made of one soil type. Soils differ in
//! how easily they dissolve into passing water, how much water they can hold,
//! and how they break down under sustained flow: a soil whose erosion rate is
//! exceeded by the local traffic frequency turns into its `erodes` type, so
//! heavily used channels progressively expose different strata.
//!
//! One soil is distinguished as open water. It is the only type the water
//! cascade redistributes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Soil type identifier: an index into a [`SoilTable`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoilType(pub u16);

impl SoilType {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Physical parameters of one soil type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SoilParams {
    /// Momentum factor of water flowing over this soil (0.0-1.0).
    /// Zero means water cannot move across it at all.
    pub friction: f64,
    /// Scales the equilibrium sediment concentration water picks up.
    pub solubility: f64,
    /// Fraction of a layer's volume that can hold water.
    pub porosity: f64,
    /// Rate at which carried sediment approaches equilibrium.
    pub equilibrium_rate: f64,
    /// Traffic frequency this soil withstands before breaking down.
    pub erosion_rate: f64,
    /// Soil this type becomes once its erosion rate is exceeded.
    pub erodes: SoilType,
    /// Soil carried away as sediment when this soil is eroded.
    pub transports: SoilType,
    /// Largest stable height difference to a neighbor before slumping.
    pub max_diff: f64,
    /// Fraction of the excess height difference that slumps per relaxation.
    pub settling: f64,
}

/// On-disk form of a soil, referring to other soils by name.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct SoilEntry {
    name: String,
    friction: f64,
    solubility: f64,
    porosity: f64,
    equilibrium_rate: f64,
    erosion_rate: f64,
    erodes: String,
    transports: String,
    #[serde(default)]
    max_diff: f64,
    #[serde(default)]
    settling: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SoilFile {
    water: String,
    soils: Vec<SoilEntry>,
}

/// Read-only lookup from soil type to parameters.
#[derive(Clone, Debug)]
pub struct SoilTable {
    names: Vec<String>,
    params: Vec<SoilParams>,
    water: SoilType,
}

impl SoilTable {
    /// Parse a table from JSON text.
    ///
    /// ```json
    /// { "water": "Air",
    ///   "soils": [ { "name": "Air", "friction": 0.4, "solubility": 0.0, "porosity": 1.0,
    ///                "equilibrium_rate": 0.0, "erosion_rate": 1.0,
    ///                "erodes": "Air", "transports": "Silt" } ] }
    /// ```
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: SoilFile = serde_json::from_str(text)?;
        Self::from_entries(file)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    fn from_entries(file: SoilFile) -> Result<Self, ConfigError> {
        if file.soils.is_empty() {
            return Err(ConfigError::EmptyTable);
        }

        let mut ids: HashMap<String, SoilType> = HashMap::new();
        for (i, entry) in file.soils.iter().enumerate() {
            if ids.insert(entry.name.clone(), SoilType(i as u16)).is_some() {
                return Err(ConfigError::DuplicateSoil(entry.name.clone()));
            }
        }

        let resolve = |name: &str, by: &str| {
            ids.get(name).copied().ok_or_else(|| ConfigError::UnknownSoil {
                referenced: name.to_string(),
                by: by.to_string(),
            })
        };

        let mut params = Vec::with_capacity(file.soils.len());
        for entry in &file.soils {
            for (field, value) in [
                ("friction", entry.friction),
                ("porosity", entry.porosity),
                ("equilibrium_rate", entry.equilibrium_rate),
            ] {
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::InvalidParam { name: field, value });
                }
            }
            params.push(SoilParams {
                friction: entry.friction,
                solubility: entry.solubility,
                porosity: entry.porosity,
                equilibrium_rate: entry.equilibrium_rate,
                erosion_rate: entry.erosion_rate,
                erodes: resolve(&entry.erodes, &entry.name)?,
                transports: resolve(&entry.transports, &entry.name)?,
                max_diff: entry.max_diff,
                settling: entry.settling,
            });
        }

        let water = ids
            .get(&file.water)
            .copied()
            .ok_or_else(|| ConfigError::MissingWater(file.water.clone()))?;

        Ok(Self {
            names: file.soils.into_iter().map(|e| e.name).collect(),
            params,
            water,
        })
    }

    /// Serialize back to the JSON form accepted by [`SoilTable::from_json`].
    pub fn to_json(&self) -> Result<String, ConfigError> {
        let soils = self
            .params
            .iter()
            .zip(&self.names)
            .map(|(p, name)| SoilEntry {
                name: name.clone(),
                friction: p.friction,
                solubility: p.solubility,
                porosity: p.porosity,
                equilibrium_rate: p.equilibrium_rate,
                erosion_rate: p.erosion_rate,
                erodes: self.name(p.erodes).to_string(),
                transports: self.name(p.transports).to_string(),
                max_diff: p.max_diff,
                settling: p.settling,
            })
            .collect();
        let file = SoilFile { water: self.name(self.water).to_string(), soils };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Parameters of `soil`. Ids outside the table resolve to open water,
    /// which every table contains.
    pub fn get(&self, soil: SoilType) -> &SoilParams {
        match self.params.get(soil.index()) {
            Some(params) => params,
            None => &self.params[self.water.index()],
        }
    }

    /// The open-water soil type.
    pub fn water(&self) -> SoilType {
        self.water
    }

    pub fn is_water(&self, soil: SoilType) -> bool {
        soil == self.water
    }

    pub fn id(&self, name: &str) -> Option<SoilType> {
        self.names.iter().position(|n| n == name).map(|i| SoilType(i as u16))
    }

    pub fn name(&self, soil: SoilType) -> &str {
        self.names.get(soil.index()).map_or("unknown", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoilType, &SoilParams)> {
        self.params.iter().enumerate().map(|(i, p)| (SoilType(i as u16), p))
    }
}

/// Soil row for the built-in table: name, friction, solubility, porosity,
/// equilibrium rate, erosion rate, erodes, transports, max diff, settling.
type DefaultRow = (&'static str, f64, f64, f64, f64, f64, u16, u16, f64, f64);

const DEFAULT_SOILS: [DefaultRow; 6] = [
    ("Air", 0.40, 0.0, 1.00, 0.00, 1.0, 0, 5, 0.0, 0.0),
    ("Rock", 0.80, 0.3, 0.05, 0.02, 0.9, 2, 2, 2.0, 0.0),
    ("Gravel", 0.70, 0.6, 0.20, 0.08, 0.7, 3, 2, 1.0, 0.5),
    ("Sand", 0.60, 0.9, 0.35, 0.15, 0.5, 5, 3, 0.6, 0.8),
    ("Soil", 0.60, 1.0, 0.45, 0.20, 0.4, 5, 5, 0.8, 0.6),
    ("Silt", 0.50, 1.0, 0.40, 0.30, 0.2, 5, 5, 0.4, 0.9),
];

impl Default for SoilTable {
    /// Built-in table: Air (open water), Rock, Gravel, Sand, Soil, Silt.
    fn default() -> Self {
        let names = DEFAULT_SOILS.iter().map(|row| row.0.to_string()).collect();
        let params = DEFAULT_SOILS
            .iter()
            .map(|row| SoilParams {
                friction: row.1,
                solubility: row.2,
                porosity: row.3,
                equilibrium_rate: row.4,
                erosion_rate: row.5,
                erodes: SoilType(row.6),
                transports: SoilType(row.7),
                max_diff: row.8,
                settling: row.9,
            })
            .collect();
        Self { names, params, water: SoilType(0) }
    }
}
