//! Layered terrain erosion library
//!
//! Particle hydraulic erosion over a stratified terrain volume, with water
//! seepage, pond cascades and traffic feedback.

pub mod error;
pub mod export;
pub mod heightmap;
pub mod hydrology;
pub mod layermap;
pub mod soil;
pub mod tilemap;

pub use error::ConfigError;
pub use hydrology::{HydroParams, HydroStats, HydroWorld, WaterParticle};
pub use layermap::{Layer, LayerMap, Material, Terrain};
pub use soil::{SoilParams, SoilTable, SoilType};
