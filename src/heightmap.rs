//! Seeded layered terrain.
//!
//! A Perlin fBm surface sets the bedrock relief. Loose strata are laid over
//! it, each with its own noise field, and thin out toward high ground so
//! valleys start with deeper sediment than ridges.

use glam::IVec2;
use noise::{NoiseFn, Perlin, Seedable};

use crate::layermap::{Layer, LayerMap};
use crate::soil::{SoilTable, SoilType};
use crate::tilemap::Tilemap;

/// One loose stratum laid over the bedrock.
#[derive(Clone, Debug, PartialEq)]
pub struct Stratum {
    pub soil: SoilType,
    /// Mean thickness
    pub thickness: f64,
    /// Relative thickness variation from noise (0.0-1.0)
    pub variation: f64,
}

/// Parameters for layered terrain generation
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainParams {
    pub bedrock: SoilType,
    /// Bedrock thickness at the lowest point
    pub base: f64,
    /// Bedrock height added at the highest point
    pub relief: f64,
    /// Feature size in cells
    pub feature_size: f64,
    pub octaves: u32,
    pub persistence: f64,
    pub lacunarity: f64,
    /// Strata from the bedrock up
    pub strata: Vec<Stratum>,
}

impl TerrainParams {
    /// Gravel, sand and soil over rock, keeping whichever of those the table
    /// defines. Bedrock falls back to the first solid soil.
    pub fn for_table(soils: &SoilTable) -> Self {
        let water = soils.water();
        let first_solid = soils
            .iter()
            .map(|(soil, _)| soil)
            .find(|&soil| soil != water)
            .unwrap_or(water);
        let bedrock = soils.id("Rock").unwrap_or(first_solid);

        let strata = [("Gravel", 1.0, 0.6), ("Sand", 1.5, 0.8), ("Soil", 0.8, 0.5)]
            .into_iter()
            .filter_map(|(name, thickness, variation)| {
                soils.id(name).map(|soil| Stratum { soil, thickness, variation })
            })
            .collect();

        Self {
            bedrock,
            base: 5.0,
            relief: 30.0,
            feature_size: 64.0,
            octaves: 6,
            persistence: 0.5,
            lacunarity: 2.0,
            strata,
        }
    }
}

/// Normalized (0.0-1.0) fBm relief.
pub fn generate_relief(
    width: usize,
    height: usize,
    params: &TerrainParams,
    seed: u64,
) -> Tilemap<f32> {
    let noise = Perlin::new(1).set_seed(seed as u32);
    let mut relief = Tilemap::new_with(width, height, 0.0f32);
    let frequency = 1.0 / params.feature_size.max(1.0);

    for (x, y, h) in relief.iter_mut() {
        let nx = x as f64 * frequency;
        let ny = y as f64 * frequency;
        *h = fbm(&noise, nx, ny, params.octaves, params.persistence, params.lacunarity) as f32;
    }

    normalize_heightmap(&relief)
}

/// Build a layered terrain volume: bedrock shaped by the relief, then each
/// stratum with its own noise.
pub fn generate_layered(
    width: usize,
    height: usize,
    soils: &SoilTable,
    params: &TerrainParams,
    seed: u64,
) -> LayerMap {
    let relief = generate_relief(width, height, params, seed);
    let mut map = LayerMap::for_table(width, height, soils);
    let strata_noise: Vec<Perlin> = (0..params.strata.len())
        .map(|i| Perlin::new(1).set_seed(seed.wrapping_add(i as u64 + 1) as u32))
        .collect();
    let frequency = 2.0 / params.feature_size.max(1.0);

    for y in 0..height {
        for x in 0..width {
            let h = *relief.get(x, y) as f64;
            let mut column = vec![Layer::new(params.bedrock, params.base + params.relief * h, 0.0)];

            for (stratum, noise) in params.strata.iter().zip(&strata_noise) {
                let n = noise.get([x as f64 * frequency, y as f64 * frequency]);
                // Loose material collects low.
                let shelter = 1.0 - 0.6 * h;
                let thickness = stratum.thickness * (1.0 + stratum.variation * n) * shelter;
                if thickness > 0.01 {
                    column.push(Layer::new(stratum.soil, thickness, 0.0));
                }
            }

            map.set_column(IVec2::new(x as i32, y as i32), column);
        }
    }

    map
}

/// Fractional Brownian Motion - multi-octave noise
fn fbm(noise: &Perlin, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves.max(1) {
        total += amplitude * noise.get([x * frequency, y * frequency]);
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    total / max_value
}

/// Normalize heightmap values to 0.0-1.0 range.
pub fn normalize_heightmap(heightmap: &Tilemap<f32>) -> Tilemap<f32> {
    let mut min_val = f32::MAX;
    let mut max_val = f32::MIN;

    for (_, _, &val) in heightmap.iter() {
        min_val = min_val.min(val);
        max_val = max_val.max(val);
    }

    let range = max_val - min_val;
    let mut normalized = Tilemap::new_with(heightmap.width, heightmap.height, 0.0);
    if range < 0.0001 {
        return normalized;
    }

    for (x, y, &val) in heightmap.iter() {
        normalized.set(x, y, (val - min_val) / range);
    }
    normalized
}
