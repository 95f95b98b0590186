//! Open-water cascade between neighboring columns.
//!
//! Water standing on a column flows toward lower neighbors, at most half the
//! head difference per edge so the two sides meet instead of swapping. When a
//! column's whole pond drains over one edge, the water is turned back into a
//! particle aimed at the lower neighbor, which lets ponded ground start
//! directed flow again.

use std::f64::consts::SQRT_2;

use glam::IVec2;

use crate::hydrology::utils::neighbors_by_height;
use crate::hydrology::water::WaterParticle;
use crate::hydrology::HydroWorld;
use crate::layermap::{Material, Terrain};
use crate::soil::SoilType;

/// Water table of a column as (floor, depth). The floor is where the water
/// rests: the pond's floor when open water is on top, otherwise the solid
/// surface with zero depth. An empty column rests on the grid base at
/// elevation 0 and gives (0, 0).
pub fn water_table<T: Terrain>(terrain: &T, water: SoilType, cell: IVec2) -> (f64, f64) {
    match terrain.top(cell) {
        Some(top) if top.soil == water => (top.floor, top.size),
        Some(top) => (top.ceiling(), 0.0),
        None => (0.0, 0.0),
    }
}

/// Remove the whole pond of `tpos` and return it as a particle at `tpos`
/// heading for `bpos`, carrying the remaining `spill` budget. The particle
/// has not moved yet.
pub fn drain_into_particle<T: Terrain>(
    world: &mut HydroWorld<T>,
    tpos: IVec2,
    bpos: IVec2,
    transfer: f64,
    spill: i32,
) -> WaterParticle {
    world.terrain.remove(tpos, transfer);
    world.terrain.mark_changed(tpos);

    let mut particle = WaterParticle::at(world, tpos.as_dvec2());
    particle.speed = SQRT_2 * (bpos - tpos).as_dvec2().normalize();
    particle.spill = spill;
    particle.volume = transfer / world.params.volume_factor;
    world.stats.cascade_spawns += 1;
    log::trace!(
        "cascade drained ({}, {}) toward ({}, {}): {:.4} water, spill {}",
        tpos.x,
        tpos.y,
        bpos.x,
        bpos.y,
        transfer,
        spill
    );
    particle
}

/// Level open water between `cell` and its neighbors, highest neighbor first.
///
/// `spill` bounds how far the redistribution may recurse, both directly and
/// through particles spawned by a full transfer.
pub fn cascade<T: Terrain>(world: &mut HydroWorld<T>, cell: IVec2, mut spill: i32) {
    if !world.terrain.in_bounds(cell) {
        return;
    }
    world.cascade_depth += 1;
    world.stats.max_cascade_depth = world.stats.max_cascade_depth.max(world.cascade_depth);

    let water = world.soils.water();
    let factor = world.params.height_factor();

    for (npos, _) in neighbors_by_height(&world.terrain, cell) {
        let (floor_a, water_a) = water_table(&world.terrain, water, cell);
        let (floor_b, water_b) = water_table(&world.terrain, water, npos);

        let diff = (floor_a + water_a - floor_b - water_b) * factor;
        if diff == 0.0 {
            continue;
        }
        let (tpos, bpos, available) = if diff > 0.0 {
            (cell, npos, water_a)
        } else {
            (npos, cell, water_b)
        };

        if !matches!(world.terrain.top(tpos), Some(top) if top.soil == water) {
            continue;
        }

        let transfer = available.min(diff.abs() / 2.0);
        if transfer <= 0.0 {
            continue;
        }

        if transfer >= available {
            drain_into_particle(world, tpos, bpos, transfer, spill).descend(world);
        } else {
            world.terrain.remove(tpos, transfer);
            world.terrain.add(bpos, Material::new(transfer, water));
            if let Some(top) = world.terrain.top_mut(bpos) {
                top.saturation = 1.0;
            }
            world.terrain.mark_changed(tpos);
            world.terrain.mark_changed(bpos);
            world.stats.partial_transfers += 1;

            if spill > 0 {
                spill -= 1;
                cascade(world, npos, spill);
            }
        }
    }

    world.cascade_depth -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::particle::{Motion, Particle};
    use crate::hydrology::HydroParams;
    use glam::DVec2;
    use crate::layermap::LayerMap;
    use crate::soil::SoilTable;

    fn world(width: usize, height: usize) -> HydroWorld<LayerMap> {
        let soils = SoilTable::default();
        let map = LayerMap::for_table(width, height, &soils);
        HydroWorld::new(map, soils, HydroParams::default())
    }

    fn total_water(w: &HydroWorld<LayerMap>) -> f64 {
        w.terrain.total_of(w.soils.water())
    }

    #[test]
    fn test_half_difference_transfer() {
        let mut w = world(2, 1);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        let a = IVec2::new(0, 0);
        let b = IVec2::new(1, 0);
        w.terrain.push_layer(a, rock, 5.0);
        w.terrain.push_layer(a, water, 5.0);
        w.terrain.push_layer(b, rock, 4.0);

        cascade(&mut w, a, 3);

        assert!((w.terrain.water_depth(a) - 2.0).abs() < 1e-12);
        assert!((w.terrain.water_depth(b) - 3.0).abs() < 1e-12);
        assert_eq!(w.terrain.surface(a), water);
        assert_eq!(w.terrain.top(b).unwrap().saturation, 1.0);
        assert_eq!(w.stats.partial_transfers, 1);
        assert_eq!(w.stats.cascade_spawns, 0);
        assert!((total_water(&w) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_level_water_is_left_alone() {
        let mut w = world(3, 3);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        for y in 0..3 {
            for x in 0..3 {
                w.terrain.push_layer(IVec2::new(x, y), rock, 2.0);
                w.terrain.push_layer(IVec2::new(x, y), water, 1.0);
            }
        }

        cascade(&mut w, IVec2::new(1, 1), 3);

        assert_eq!(w.stats.partial_transfers, 0);
        assert!(w.terrain.take_changed().is_empty());
    }

    #[test]
    fn test_dry_high_side_does_not_flow() {
        let mut w = world(2, 1);
        let rock = w.soils.id("Rock").unwrap();
        w.terrain.push_layer(IVec2::new(0, 0), rock, 9.0);
        w.terrain.push_layer(IVec2::new(1, 0), rock, 1.0);

        cascade(&mut w, IVec2::new(0, 0), 3);

        assert_eq!(w.terrain.height(IVec2::new(0, 0)), 9.0);
        assert_eq!(w.terrain.height(IVec2::new(1, 0)), 1.0);
    }

    #[test]
    fn test_full_drain_spawns_particle() {
        let mut w = world(5, 5);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        for y in 0..5 {
            for x in 0..5 {
                w.terrain.push_layer(IVec2::new(x, y), rock, 1.0);
            }
        }
        let c = IVec2::new(2, 2);
        w.terrain.push_layer(c, rock, 9.0);
        w.terrain.push_layer(c, water, 0.5);

        cascade(&mut w, c, 2);

        // The spawned particle floods in place and its pond drains again.
        assert!(w.stats.cascade_spawns >= 1);
        assert_eq!(w.terrain.water_depth(c), 0.0);
        assert!(w.terrain.height(c) >= 10.0);
    }

    #[test]
    fn test_drained_pond_becomes_aimed_particle() {
        let mut w = world(6, 6);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        for y in 0..6 {
            for x in 0..6 {
                w.terrain.push_layer(IVec2::new(x, y), rock, 10.0 - x as f64);
            }
        }
        let tpos = IVec2::new(1, 2);
        let bpos = IVec2::new(2, 3);
        w.terrain.push_layer(tpos, water, 0.3);
        w.terrain.take_changed();

        let mut p = drain_into_particle(&mut w, tpos, bpos, 0.3, 2);

        assert_eq!(w.terrain.water_depth(tpos), 0.0);
        assert_eq!(w.terrain.surface(tpos), rock);
        assert_eq!(w.terrain.take_changed(), vec![tpos]);
        assert_eq!(w.stats.cascade_spawns, 1);
        assert_eq!(p.pos, tpos.as_dvec2());
        assert_eq!(p.spill, 2);
        assert!((p.volume - 0.3 / w.params.volume_factor).abs() < 1e-12);
        assert!((p.speed - DVec2::new(1.0, 1.0)).length() < 1e-12);
        assert_eq!(p.contains(), w.soils.get(rock).transports);

        // The slope pulls along +x, the inherited speed bends the step toward +y.
        assert_eq!(p.advect(&mut w), Motion::Moved);
        assert!(p.pos.x > 1.0);
        assert!(p.pos.y > 2.0);
        assert!((p.speed.length() - SQRT_2).abs() < 1e-12);
    }

    #[test]
    fn test_straight_drain_speed() {
        let mut w = world(3, 1);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        w.terrain.push_layer(IVec2::new(0, 0), rock, 3.0);
        w.terrain.push_layer(IVec2::new(0, 0), water, 0.1);

        let p = drain_into_particle(&mut w, IVec2::new(0, 0), IVec2::new(1, 0), 0.1, 0);

        assert!((p.speed - DVec2::new(SQRT_2, 0.0)).length() < 1e-12);
        assert_eq!(p.spill, 0);
        assert!((w.terrain.total_of(water)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_column_rests_on_base() {
        let w = world(2, 1);
        assert_eq!(water_table(&w.terrain, w.soils.water(), IVec2::new(0, 0)), (0.0, 0.0));
        assert_eq!(w.terrain.height(IVec2::new(0, 0)), 0.0);
    }

    #[test]
    fn test_recursion_depth_bounded_by_spill() {
        let mut w = world(9, 9);
        let rock = w.soils.id("Rock").unwrap();
        let water = w.soils.water();
        for y in 0..9 {
            for x in 0..9 {
                let c = IVec2::new(x, y);
                w.terrain.push_layer(c, rock, 1.0 + ((x * 5 + y * 3) % 4) as f64);
                w.terrain.push_layer(c, water, 2.0 + ((x + 2 * y) % 3) as f64);
            }
        }

        for spill in 0..4 {
            w.stats.max_cascade_depth = 0;
            cascade(&mut w, IVec2::new(4, 4), spill);
            assert!(w.stats.max_cascade_depth <= spill as u32 + 1);
            assert_eq!(w.cascade_depth, 0);
        }

        for y in 0..9 {
            for x in 0..9 {
                let (floor, depth) = water_table(&w.terrain, water, IVec2::new(x, y));
                assert!(depth >= 0.0);
                assert!(floor + depth >= 0.0);
            }
        }
    }
}
