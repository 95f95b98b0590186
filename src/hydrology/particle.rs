//! Particle capability trait and thermal relaxation.
//!
//! A particle knows how to take one advection step across the grid and how to
//! react with the terrain where it lands. Water is the only variant here.
//! Thermal relaxation is the loose-material counterpart of the water
//! cascade: after a particle digs or drops material, steep neighbor
//! differences slump back toward each soil's stable slope.

use glam::{DVec2, IVec2};

use crate::hydrology::utils::{cell_of, neighbors_by_height, remove_through_layers};
use crate::hydrology::HydroWorld;
use crate::layermap::{Material, Terrain};

/// Outcome of one advection step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Motion {
    /// The particle moved to a new in-bounds position.
    Moved,
    /// No driving force; position unchanged.
    Stalled,
    /// The step left the grid. Terminal: the particle's volume is gone.
    OutOfBounds,
}

impl Motion {
    pub fn is_moved(self) -> bool {
        self == Motion::Moved
    }
}

pub trait Particle {
    /// Take one step downhill.
    fn advect<T: Terrain>(&mut self, world: &mut HydroWorld<T>) -> Motion;

    /// Exchange material with the terrain at the current cell. Returns
    /// `false` once the particle can no longer continue.
    fn react<T: Terrain>(&mut self, world: &mut HydroWorld<T>) -> bool;
}

/// Relax loose material around the cell containing `pos`.
///
/// Each neighbor pair, highest neighbor first, slumps when the scaled height
/// difference exceeds `max_diff` of the higher side's top soil. The moved
/// amount is `settling * excess / 2`, capped by that top layer. Open water is
/// never moved here.
pub fn relax<T: Terrain>(world: &mut HydroWorld<T>, pos: DVec2) {
    let cell = cell_of(pos);
    if !world.terrain.in_bounds(cell) {
        return;
    }
    let factor = world.params.height_factor();
    let epsilon = world.params.removal_epsilon;

    for (npos, _) in neighbors_by_height(&world.terrain, cell) {
        let diff = (world.terrain.height(cell) - world.terrain.height(npos)) * factor;
        if diff == 0.0 {
            continue;
        }
        let (tpos, bpos): (IVec2, IVec2) = if diff > 0.0 { (cell, npos) } else { (npos, cell) };

        let Some(top) = world.terrain.top(tpos).copied() else {
            continue;
        };
        if world.soils.is_water(top.soil) {
            continue;
        }
        let soil = world.soils.get(top.soil);
        let excess = diff.abs() - soil.max_diff;
        if excess <= 0.0 {
            continue;
        }

        let transfer = (soil.settling * excess / 2.0).min(top.size);
        if transfer <= 0.0 {
            continue;
        }

        // Only the top layer slumps; remove_through_layers stops once it is gone.
        let moved = remove_through_layers(&mut world.terrain, tpos, transfer, epsilon);
        world.terrain.add(bpos, Material::new(moved, top.soil));
        world.terrain.mark_changed(tpos);
        world.terrain.mark_changed(bpos);
        world.stats.slumped += moved;
    }
}
