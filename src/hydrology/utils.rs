//! Grid helpers shared by the particle, cascade and seepage code.

use glam::{DVec2, IVec2};

use crate::layermap::Terrain;
use crate::tilemap::NEIGHBORS_8;

/// Integer cell of a continuous position (nearest column).
#[inline]
pub fn cell_of(pos: DVec2) -> IVec2 {
    pos.round().as_ivec2()
}

/// In-bounds 8-connected neighbors with their surface heights, highest
/// first. Material moves downhill, so the highest neighbor is handled first.
pub fn neighbors_by_height<T: Terrain>(terrain: &T, cell: IVec2) -> Vec<(IVec2, f64)> {
    let mut neighbors: Vec<(IVec2, f64)> = NEIGHBORS_8
        .iter()
        .map(|&offset| cell + offset)
        .filter(|&n| terrain.in_bounds(n))
        .map(|n| (n, terrain.height(n)))
        .collect();
    neighbors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    neighbors
}

/// Remove `amount` from a column, reissuing the unconsumed remainder against
/// the next layer down until it drops to `epsilon` or the column runs out.
/// Returns the amount actually removed.
pub fn remove_through_layers<T: Terrain>(
    terrain: &mut T,
    cell: IVec2,
    amount: f64,
    epsilon: f64,
) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let mut remainder = terrain.remove(cell, amount);
    while remainder.abs() > epsilon {
        let next = terrain.remove(cell, remainder);
        if next >= remainder {
            break;
        }
        remainder = next;
    }
    amount - remainder.max(0.0)
}
