//! Infiltration of water through a column's layers, and the global
//! seep-and-cascade sweep.

use glam::IVec2;

use crate::hydrology::cascade::cascade;
use crate::hydrology::HydroWorld;
use crate::layermap::Terrain;

/// Move water down a column, one adjacent pair of layers at a time from the
/// top. Each pair moves as much as the upper layer holds and the lower layer
/// has room for. Open water on top drains out of the column's surface
/// instead of losing saturation.
pub fn seep<T: Terrain>(world: &mut HydroWorld<T>, cell: IVec2) {
    let count = world.terrain.layers(cell).len();
    if count < 2 {
        return;
    }

    let mut moved = 0.0;
    for upper in (1..count).rev() {
        let lower = upper - 1;
        let layers = world.terrain.layers(cell);
        let (Some(&up), Some(&down)) = (layers.get(upper), layers.get(lower)) else {
            continue;
        };

        let up_porosity = world.soils.get(up.soil).porosity;
        let down_porosity = world.soils.get(down.soil).porosity;
        let occupied = up.size * up.saturation * up_porosity;
        let capacity = down.size * (1.0 - down.saturation) * down_porosity;
        let transfer = occupied.min(capacity);
        if transfer <= 0.0 {
            continue;
        }

        if world.soils.is_water(up.soil) {
            // Only the top layer can be open water, so this never reaches below it.
            world.terrain.remove(cell, transfer);
        } else if let Some(layer) = world.terrain.layer_mut(cell, upper) {
            let drained = layer.saturation - transfer / (up.size * up_porosity);
            layer.saturation = drained.clamp(0.0, 1.0);
        }
        if let Some(layer) = world.terrain.layer_mut(cell, lower) {
            let filled = layer.saturation + transfer / (down.size * down_porosity);
            layer.saturation = filled.clamp(0.0, 1.0);
        }
        moved += transfer;
    }

    if moved > 0.0 {
        world.stats.seeped += moved;
        world.terrain.mark_changed(cell);
    }
}

/// Seep then cascade every cell, column by column.
pub fn sweep<T: Terrain>(world: &mut HydroWorld<T>) {
    let dim = world.terrain.dimensions();
    let spill = world.params.sweep_spill;
    for x in 0..dim.x {
        for y in 0..dim.y {
            let cell = IVec2::new(x, y);
            seep(world, cell);
            cascade(world, cell, spill);
        }
    }
    world.stats.sweeps += 1;
    log::debug!(
        "sweep {} done: {:.4} seeped, {} partial transfers so far",
        world.stats.sweeps,
        world.stats.seeped,
        world.stats.partial_transfers
    );
}
