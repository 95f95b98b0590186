//! Water particle lifecycle.
//!
//! A particle is spawned on the surface, then alternates between
//! [`Particle::advect`] and [`Particle::react`]: it follows the surface normal
//! downhill, dissolving or dropping material depending on how far its
//! sediment load is from the local equilibrium, and loses volume to
//! evaporation. When it can no longer move it floods: it leaves its sediment
//! and remaining water at the cell, and the new water is seeped and cascaded
//! to its neighbors.

use std::f64::consts::SQRT_2;

use glam::{DVec2, IVec2};
use rand::Rng;

use crate::hydrology::cascade::cascade;
use crate::hydrology::particle::{relax, Motion, Particle};
use crate::hydrology::seep::seep;
use crate::hydrology::utils::{cell_of, remove_through_layers};
use crate::hydrology::HydroWorld;
use crate::layermap::{Material, Terrain};
use crate::soil::{SoilParams, SoilType};

/// A unit of surface water carrying dissolved sediment.
#[derive(Clone, Debug)]
pub struct WaterParticle {
    pub pos: DVec2,
    pub speed: DVec2,
    pub volume: f64,
    /// Fraction of `volume` that is carried material, kept in [0, 1].
    pub sediment: f64,
    /// Remaining flood/cascade recursion budget.
    pub spill: i32,
    evaporation: f64,
    cell: IVec2,
    surface: SoilType,
    /// Parameters of the surface under the last move, friction already damped.
    param: SoilParams,
    contains: SoilType,
}

impl WaterParticle {
    /// Spawn on a uniformly chosen cell.
    pub fn spawn<T: Terrain, R: Rng>(world: &HydroWorld<T>, rng: &mut R) -> Self {
        let dim = world.terrain.dimensions();
        let x = rng.gen_range(0..dim.x.max(1));
        let y = rng.gen_range(0..dim.y.max(1));
        Self::at(world, DVec2::new(x as f64, y as f64))
    }

    pub fn at<T: Terrain>(world: &HydroWorld<T>, pos: DVec2) -> Self {
        let cell = cell_of(pos);
        let surface = world.terrain.surface(cell);
        let param = *world.soils.get(surface);
        Self {
            pos,
            speed: DVec2::ZERO,
            volume: world.params.initial_volume,
            sediment: 0.0,
            spill: world.params.spill,
            evaporation: world.params.initial_evaporation,
            cell,
            surface,
            param,
            contains: param.transports,
        }
    }

    /// Soil type currently carried as sediment.
    pub fn contains(&self) -> SoilType {
        self.contains
    }

    pub fn is_alive(&self) -> bool {
        self.volume > 0.0
    }

    /// Run the particle to completion: move and interact until either stops,
    /// then flood.
    pub fn descend<T: Terrain>(&mut self, world: &mut HydroWorld<T>) {
        while self.advect(world).is_moved() && self.react(world) {}
        while self.flood(world) {}
    }

    /// Leave the particle's sediment and water at its cell, then let the
    /// water seep and cascade. Always returns `false`.
    pub fn flood<T: Terrain>(&mut self, world: &mut HydroWorld<T>) -> bool {
        if self.volume < world.params.min_volume {
            return false;
        }
        let budget = self.spill;
        self.spill -= 1;
        if budget <= 0 {
            return false;
        }

        self.cell = cell_of(self.pos);
        if !world.terrain.in_bounds(self.cell) {
            return false;
        }

        let deposit = self.sediment * world.soils.get(self.contains).equilibrium_rate;
        world.terrain.add(self.cell, Material::new(deposit, self.contains));
        world.stats.total_deposited += deposit.max(0.0);
        relax(world, self.pos);

        let water = world.soils.water();
        let amount = self.volume * world.params.volume_factor;
        world.terrain.add(self.cell, Material::new(amount, water));
        self.sediment = 0.0;
        self.volume = 0.0;

        seep(world, self.cell);
        cascade(world, self.cell, self.spill);
        world.terrain.mark_changed(self.cell);
        world.stats.floods += 1;
        false
    }
}

impl Particle for WaterParticle {
    fn advect<T: Terrain>(&mut self, world: &mut HydroWorld<T>) -> Motion {
        if !self.is_alive() {
            return Motion::Stalled;
        }

        self.cell = cell_of(self.pos);
        let normal = world.terrain.normal(self.cell);
        self.surface = world.terrain.surface(self.cell);
        self.param = *world.soils.get(self.surface);
        self.evaporation = world.params.base_evaporation;

        world.traffic.record(self.cell, self.volume);
        world.stats.steps += 1;

        // Busy channels are slicker and lose less water.
        let f = world.traffic.frequency(self.cell);
        self.param.friction *= 1.0 - f;
        self.evaporation *= (1.0 - world.params.evaporation_damping * f).max(0.0);

        let lateral = DVec2::new(normal.x, normal.z);
        if (lateral * self.param.friction).length() < world.params.motion_epsilon {
            return Motion::Stalled;
        }

        let Some(direction) = lateral.lerp(self.speed, self.param.friction).try_normalize() else {
            return Motion::Stalled;
        };
        self.speed = SQRT_2 * direction;
        self.pos += self.speed;

        let limit = (world.terrain.dimensions() - IVec2::ONE).as_dvec2();
        if self.pos.x < 0.0 || self.pos.y < 0.0 || self.pos.x >= limit.x || self.pos.y >= limit.y {
            self.volume = 0.0;
            world.stats.out_of_bounds += 1;
            return Motion::OutOfBounds;
        }
        Motion::Moved
    }

    fn react<T: Terrain>(&mut self, world: &mut HydroWorld<T>) -> bool {
        if !self.is_alive() {
            return false;
        }
        let factor = world.params.height_factor();

        let drop = world.terrain.height(self.cell) - world.terrain.height_at(self.pos);
        let c_eq = (self.param.solubility * drop * factor).clamp(0.0, 1.0);

        let carried = *world.soils.get(self.contains);
        if carried.erosion_rate < world.traffic.frequency(self.cell) {
            self.contains = carried.erodes;
        }

        let cdiff = c_eq - self.sediment;
        if cdiff > 0.0 {
            self.sediment += self.param.equilibrium_rate * cdiff;
            self.contains = self.param.transports;
            let amount = self.param.equilibrium_rate * cdiff * self.volume;
            let epsilon = world.params.removal_epsilon;
            let removed = remove_through_layers(&mut world.terrain, self.cell, amount, epsilon);
            world.stats.total_eroded += removed;
            world.terrain.mark_changed(self.cell);
        } else if cdiff < 0.0 {
            let rate = world.soils.get(self.contains).equilibrium_rate;
            self.sediment += rate * cdiff;
            let amount = -rate * cdiff * self.volume;
            world.terrain.add(self.cell, Material::new(amount, self.contains));
            world.stats.total_deposited += amount;
            world.terrain.mark_changed(self.cell);
        }

        relax(world, self.pos);

        self.sediment = (self.sediment / (1.0 - self.evaporation)).clamp(0.0, 1.0);
        let lost = self.volume * self.evaporation;
        self.volume -= lost;
        world.stats.evaporated += lost;

        self.volume > world.params.min_volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::HydroParams;
    use crate::layermap::LayerMap;
    use crate::soil::SoilTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world_with(
        width: usize,
        height: usize,
        f: impl Fn(i32, i32) -> f64,
    ) -> HydroWorld<LayerMap> {
        let soils = SoilTable::default();
        let rock = soils.id("Rock").unwrap();
        let mut map = LayerMap::for_table(width, height, &soils);
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                map.push_layer(IVec2::new(x, y), rock, f(x, y));
            }
        }
        HydroWorld::new(map, soils, HydroParams::default())
    }

    #[test]
    fn test_flat_cell_stalls_in_place() {
        let mut w = world_with(6, 6, |_, _| 4.0);
        let start = DVec2::new(2.0, 3.0);
        let mut p = WaterParticle::at(&w, start);

        assert_eq!(p.advect(&mut w), Motion::Stalled);
        assert_eq!(p.pos, start);
        assert!(p.is_alive());
        assert!(w.traffic.track(IVec2::new(2, 3)) > 0.0);
    }

    #[test]
    fn test_leaving_grid_is_terminal() {
        let mut w = world_with(4, 4, |x, _| 10.0 - x as f64);
        let mut p = WaterParticle::at(&w, DVec2::new(2.0, 1.0));

        assert_eq!(p.advect(&mut w), Motion::OutOfBounds);
        assert_eq!(p.volume, 0.0);
        assert_eq!(w.stats.out_of_bounds, 1);

        let before = w.terrain.clone();
        assert!(!p.react(&mut w));
        assert!(!p.flood(&mut w));
        assert_eq!(p.advect(&mut w), Motion::Stalled);
        for y in 0..4 {
            for x in 0..4 {
                let c = IVec2::new(x, y);
                assert_eq!(w.terrain.layers(c), before.layers(c));
            }
        }
    }

    #[test]
    fn test_first_step_follows_slope() {
        let mut w = world_with(8, 8, |x, _| 10.0 - 0.5 * x as f64);
        let mut p = WaterParticle::at(&w, DVec2::new(2.0, 3.0));

        assert_eq!(p.advect(&mut w), Motion::Moved);
        assert!((p.speed.length() - SQRT_2).abs() < 1e-12);
        assert!((p.pos - DVec2::new(2.0 + SQRT_2, 3.0)).length() < 1e-12);
    }

    #[test]
    fn test_busy_channel_still_loses_volume() {
        let mut w = world_with(8, 8, |x, _| 10.0 - 0.5 * x as f64);
        w.params.evaporation_damping = 1.0;
        let cell = IVec2::new(2, 3);
        // Saturation 199 / (1 + 199) gives frequency 0.995.
        w.traffic.record(cell, 1.0);
        w.traffic.update(1.0, 199.0);
        w.traffic.reset();
        assert!(w.traffic.frequency(cell) > 0.99);

        let mut p = WaterParticle::at(&w, cell.as_dvec2());
        let volume = p.volume;
        assert!(p.advect(&mut w).is_moved());
        p.react(&mut w);

        assert!(p.volume < volume);
        assert!(w.stats.evaporated > 0.0);
        assert!((0.0..=1.0).contains(&p.sediment));
    }

    #[test]
    fn test_unknown_surface_soil_uses_water_params() {
        let mut w = world_with(6, 6, |x, _| 6.0 - 0.5 * x as f64);
        let cell = IVec2::new(2, 2);
        w.terrain.push_layer(cell, SoilType(999), 0.5);

        let mut p = WaterParticle::at(&w, cell.as_dvec2());
        p.advect(&mut w);
        p.react(&mut w);
        assert!(p.volume >= 0.0);
    }

    #[test]
    fn test_erosion_matches_sediment_gain() {
        let mut w = world_with(8, 8, |x, _| 10.0 - 0.5 * x as f64);
        let mut p = WaterParticle::at(&w, DVec2::new(2.0, 3.0));
        let cell = IVec2::new(2, 3);
        let before = w.terrain.height(cell);

        assert!(p.advect(&mut w).is_moved());
        let volume = p.volume;
        assert!(p.react(&mut w));

        // Sediment was divided by (1 - evaporation) after the exchange.
        let evaporation = w.params.base_evaporation;
        let removed = before - w.terrain.height(cell);
        assert!(removed > 0.0);
        assert!((removed - p.sediment * (1.0 - evaporation) * volume).abs() < 1e-12);
        assert!((w.stats.total_eroded - removed).abs() < 1e-12);
        assert!((p.volume - volume * (1.0 - evaporation)).abs() < 1e-12);
        assert_eq!(p.contains(), w.soils.id("Gravel").unwrap());
    }

    #[test]
    fn test_deposit_on_flat_ground() {
        let mut w = world_with(6, 6, |_, _| 3.0);
        let cell = IVec2::new(2, 2);
        let mut p = WaterParticle::at(&w, DVec2::new(2.0, 2.0));
        p.sediment = 0.5;
        // Advect stalls on flat ground, so react uses the spawn cell.
        p.advect(&mut w);
        let volume = p.volume;
        let rate = w.soils.get(p.contains()).equilibrium_rate;

        assert!(p.react(&mut w));
        let deposited = w.terrain.height(cell) - 3.0;
        assert!((deposited - rate * 0.5 * volume).abs() < 1e-12);
        assert_eq!(w.terrain.surface(cell), p.contains());
    }

    #[test]
    fn test_sediment_stays_in_unit_range() {
        let mut w = world_with(16, 16, |x, y| ((x * 7 + y * 3) % 5) as f64 * 3.0 + 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let mut p = WaterParticle::spawn(&w, &mut rng);
            p.sediment = rng.gen_range(0.0..1.0);
            for _ in 0..40 {
                if !p.advect(&mut w).is_moved() || !p.react(&mut w) {
                    break;
                }
                assert!((0.0..=1.0).contains(&p.sediment));
                assert!(p.volume >= 0.0);
            }
        }
    }

    #[test]
    fn test_flood_leaves_water() {
        let mut w = world_with(5, 5, |_, _| 2.0);
        let mut p = WaterParticle::at(&w, DVec2::new(2.0, 2.0));
        p.volume = 1.0;
        let spill = p.spill;

        assert!(!p.flood(&mut w));
        assert_eq!(p.spill, spill - 1);
        assert_eq!(p.volume, 0.0);
        assert_eq!(w.stats.floods, 1);
        // The thin pond soaks straight into the rock below.
        let stored = w.terrain.stored_water(IVec2::new(2, 2), &w.soils);
        assert!((stored - w.params.volume_factor).abs() < 1e-12);
        assert_eq!(w.terrain.water_depth(IVec2::new(2, 2)), 0.0);
    }

    #[test]
    fn test_flood_respects_budget() {
        let mut w = world_with(3, 3, |_, _| 2.0);
        let mut p = WaterParticle::at(&w, DVec2::new(1.0, 1.0));
        p.spill = 0;

        assert!(!p.flood(&mut w));
        assert_eq!(w.terrain.total_of(w.soils.water()), 0.0);
        assert_eq!(w.stats.floods, 0);
    }

    #[test]
    fn test_descend_conserves_nothing_negative() {
        let mut w = world_with(12, 12, |x, y| 20.0 - (x + y) as f64 * 0.7);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for _ in 0..20 {
            let mut p = WaterParticle::spawn(&w, &mut rng);
            p.descend(&mut w);
            assert!(p.volume >= 0.0);
        }
        for y in 0..12 {
            for x in 0..12 {
                for layer in w.terrain.layers(IVec2::new(x, y)) {
                    assert!(layer.size >= 0.0);
                    assert!((0.0..=1.0).contains(&layer.saturation));
                }
            }
        }
    }
}
