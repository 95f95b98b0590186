//! Layered terrain volume.
//!
//! The terrain is a grid of columns. Each column is a stack of [`Layer`]s from
//! floor to surface, and each layer records its soil type, thickness, floor
//! elevation and water saturation. The hydrology code only talks to the
//! volume through the [`Terrain`] trait; [`LayerMap`] is the in-memory
//! implementation used by the driver and the tests.
//!
//! Layers are addressed by index into their column. Any `add`/`remove` may
//! insert or drop layers, so indices must be re-fetched after a mutation.

use glam::{DVec2, DVec3, IVec2};

use crate::soil::{SoilTable, SoilType};
use crate::tilemap::Tilemap;

/// One stratum of a column.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layer {
    pub soil: SoilType,
    /// Thickness of the layer.
    pub size: f64,
    /// Elevation of the bottom of the layer.
    pub floor: f64,
    /// Fraction of the pore space filled with water (0.0-1.0).
    pub saturation: f64,
}

impl Layer {
    pub fn new(soil: SoilType, size: f64, floor: f64) -> Self {
        Self { soil, size, floor, saturation: 0.0 }
    }

    /// Elevation of the top of the layer.
    pub fn ceiling(&self) -> f64 {
        self.floor + self.size
    }
}

/// An amount of one soil type, as handed to [`Terrain::add`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub amount: f64,
    pub soil: SoilType,
}

impl Material {
    pub fn new(amount: f64, soil: SoilType) -> Self {
        Self { amount, soil }
    }
}

/// Interface the hydrology code needs from a terrain volume.
///
/// Normals are y-up: `x` and `z` hold the lateral components along the grid's
/// x and y axes and point downhill.
pub trait Terrain {
    /// Grid size as (columns, rows).
    fn dimensions(&self) -> IVec2;

    /// Surface height of a column. Cells outside the grid are clamped to the edge.
    fn height(&self, cell: IVec2) -> f64;

    fn normal(&self, cell: IVec2) -> DVec3;

    /// Soil type at the top of a column.
    fn surface(&self, cell: IVec2) -> SoilType;

    /// Layers of a column, floor first. Empty outside the grid.
    fn layers(&self, cell: IVec2) -> &[Layer];

    fn layer_mut(&mut self, cell: IVec2, index: usize) -> Option<&mut Layer>;

    /// Remove `amount` from the top of a column. Only the top layer is
    /// consumed; whatever it could not supply is returned so the caller can
    /// reissue the request against the next layer.
    fn remove(&mut self, cell: IVec2, amount: f64) -> f64;

    fn add(&mut self, cell: IVec2, material: Material);

    /// Record that a column changed, for downstream consumers such as mesh
    /// rebuilding.
    fn mark_changed(&mut self, cell: IVec2);

    fn in_bounds(&self, cell: IVec2) -> bool {
        let dim = self.dimensions();
        cell.x >= 0 && cell.y >= 0 && cell.x < dim.x && cell.y < dim.y
    }

    fn top(&self, cell: IVec2) -> Option<&Layer> {
        self.layers(cell).last()
    }

    fn top_mut(&mut self, cell: IVec2) -> Option<&mut Layer> {
        let index = self.layers(cell).len().checked_sub(1)?;
        self.layer_mut(cell, index)
    }

    /// Surface height at a continuous position, bilinearly interpolated
    /// between the four surrounding columns.
    fn height_at(&self, pos: DVec2) -> f64 {
        let dim = self.dimensions();
        let x = pos.x.clamp(0.0, (dim.x - 1).max(0) as f64);
        let y = pos.y.clamp(0.0, (dim.y - 1).max(0) as f64);

        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let x1 = (x0 + 1).min(dim.x - 1);
        let y1 = (y0 + 1).min(dim.y - 1);

        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let h00 = self.height(IVec2::new(x0, y0));
        let h10 = self.height(IVec2::new(x1, y0));
        let h01 = self.height(IVec2::new(x0, y1));
        let h11 = self.height(IVec2::new(x1, y1));

        let h0 = h00 * (1.0 - fx) + h10 * fx;
        let h1 = h01 * (1.0 - fx) + h11 * fx;
        h0 * (1.0 - fy) + h1 * fy
    }
}

/// In-memory layered terrain.
#[derive(Clone, Debug)]
pub struct LayerMap {
    columns: Tilemap<Vec<Layer>>,
    /// The open-water soil type.
    water: SoilType,
    /// Surface type reported for an empty column.
    base: SoilType,
    /// Vertical exaggeration applied when computing normals.
    pub scale: f64,
    changed: Tilemap<bool>,
    dirty: Vec<IVec2>,
}

impl LayerMap {
    pub fn new(width: usize, height: usize, water: SoilType, base: SoilType) -> Self {
        Self {
            columns: Tilemap::new_with(width, height, Vec::new()),
            water,
            base,
            scale: 1.0,
            changed: Tilemap::new_with(width, height, false),
            dirty: Vec::new(),
        }
    }

    /// Empty map whose water and base soils come from a table. The base is
    /// the first non-water soil.
    pub fn for_table(width: usize, height: usize, soils: &SoilTable) -> Self {
        let water = soils.water();
        let base = soils
            .iter()
            .map(|(soil, _)| soil)
            .find(|&soil| soil != water)
            .unwrap_or(water);
        Self::new(width, height, water, base)
    }

    fn clamp(&self, cell: IVec2) -> IVec2 {
        cell.clamp(
            IVec2::ZERO,
            IVec2::new(self.columns.width as i32 - 1, self.columns.height as i32 - 1),
        )
    }

    /// Append a layer on top of a column without merging.
    pub fn push_layer(&mut self, cell: IVec2, soil: SoilType, size: f64) {
        let water = self.water;
        if let Some(column) = self.columns.at_mut(cell) {
            let floor = column.last().map_or(0.0, Layer::ceiling);
            let mut layer = Layer::new(soil, size, floor);
            if soil == water {
                layer.saturation = 1.0;
            }
            column.push(layer);
        }
    }

    /// Replace a column, recomputing floors so the stack is contiguous.
    pub fn set_column(&mut self, cell: IVec2, mut layers: Vec<Layer>) {
        restack(&mut layers, 0);
        if let Some(column) = self.columns.at_mut(cell) {
            *column = layers;
        }
    }

    /// Thickness of open water standing on a column.
    pub fn water_depth(&self, cell: IVec2) -> f64 {
        match self.top(cell) {
            Some(top) if top.soil == self.water => top.size,
            _ => 0.0,
        }
    }

    /// Total thickness of one soil type across the whole map.
    pub fn total_of(&self, soil: SoilType) -> f64 {
        self.columns
            .iter()
            .flat_map(|(_, _, column)| column.iter())
            .filter(|layer| layer.soil == soil)
            .map(|layer| layer.size)
            .sum()
    }

    /// Total thickness of all layers across the map.
    pub fn total_volume(&self) -> f64 {
        self.columns
            .iter()
            .flat_map(|(_, _, column)| column.iter())
            .map(|layer| layer.size)
            .sum()
    }

    /// Water held by a column: pore water of every layer plus standing water.
    pub fn stored_water(&self, cell: IVec2, soils: &SoilTable) -> f64 {
        self.layers(cell)
            .iter()
            .map(|layer| layer.size * layer.saturation * soils.get(layer.soil).porosity)
            .sum()
    }

    /// Tilemap of surface heights, for export.
    pub fn surface_heights(&self) -> Tilemap<f32> {
        let mut map = Tilemap::new_with(self.columns.width, self.columns.height, 0.0f32);
        for (x, y, h) in map.iter_mut() {
            *h = self.height(IVec2::new(x as i32, y as i32)) as f32;
        }
        map
    }

    /// Tilemap of standing water depth, for export.
    pub fn water_depths(&self) -> Tilemap<f32> {
        let mut map = Tilemap::new_with(self.columns.width, self.columns.height, 0.0f32);
        for (x, y, d) in map.iter_mut() {
            *d = self.water_depth(IVec2::new(x as i32, y as i32)) as f32;
        }
        map
    }

    /// Drain the list of columns marked changed since the last call.
    pub fn take_changed(&mut self) -> Vec<IVec2> {
        for cell in &self.dirty {
            self.changed.set(cell.x as usize, cell.y as usize, false);
        }
        std::mem::take(&mut self.dirty)
    }

    pub fn is_changed(&self, cell: IVec2) -> bool {
        self.changed.at(cell).copied().unwrap_or(false)
    }
}

impl Terrain for LayerMap {
    fn dimensions(&self) -> IVec2 {
        IVec2::new(self.columns.width as i32, self.columns.height as i32)
    }

    fn height(&self, cell: IVec2) -> f64 {
        let cell = self.clamp(cell);
        self.layers(cell).last().map_or(0.0, Layer::ceiling)
    }

    fn normal(&self, cell: IVec2) -> DVec3 {
        let cell = self.clamp(cell);
        let left = self.clamp(cell - IVec2::X);
        let right = self.clamp(cell + IVec2::X);
        let down = self.clamp(cell - IVec2::Y);
        let up = self.clamp(cell + IVec2::Y);

        // One-sided at the edges, central inside.
        let span_x = (right.x - left.x).max(1) as f64;
        let span_y = (up.y - down.y).max(1) as f64;
        let dhdx = (self.height(right) - self.height(left)) / span_x;
        let dhdy = (self.height(up) - self.height(down)) / span_y;

        DVec3::new(-self.scale * dhdx, 1.0, -self.scale * dhdy).normalize()
    }

    fn surface(&self, cell: IVec2) -> SoilType {
        self.top(self.clamp(cell)).map_or(self.base, |layer| layer.soil)
    }

    fn layers(&self, cell: IVec2) -> &[Layer] {
        self.columns.at(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    fn layer_mut(&mut self, cell: IVec2, index: usize) -> Option<&mut Layer> {
        self.columns.at_mut(cell)?.get_mut(index)
    }

    fn remove(&mut self, cell: IVec2, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let Some(column) = self.columns.at_mut(cell) else {
            return amount;
        };
        let Some(top) = column.last_mut() else {
            return amount;
        };

        if top.size > amount {
            top.size -= amount;
            0.0
        } else {
            let remainder = amount - top.size;
            column.pop();
            remainder
        }
    }

    fn add(&mut self, cell: IVec2, material: Material) {
        if material.amount <= 0.0 {
            return;
        }
        let water = self.water;
        let Some(column) = self.columns.at_mut(cell) else {
            return;
        };

        if material.soil == water {
            match column.last_mut() {
                Some(top) if top.soil == water => top.size += material.amount,
                top => {
                    let floor = top.map_or(0.0, |layer| layer.ceiling());
                    let mut layer = Layer::new(water, material.amount, floor);
                    layer.saturation = 1.0;
                    column.push(layer);
                }
            }
            return;
        }

        // Solid material settles beneath any standing water.
        let mut k = column.len();
        while k > 0 && column[k - 1].soil == water {
            k -= 1;
        }

        if k > 0 && column[k - 1].soil == material.soil {
            column[k - 1].size += material.amount;
            restack(column, k);
        } else {
            let floor = if k > 0 { column[k - 1].ceiling() } else { 0.0 };
            column.insert(k, Layer::new(material.soil, material.amount, floor));
            restack(column, k + 1);
        }
    }

    fn mark_changed(&mut self, cell: IVec2) {
        if let Some(flag) = self.changed.at_mut(cell) {
            if !*flag {
                *flag = true;
                self.dirty.push(cell);
            }
        }
    }
}

/// Recompute floors from index `from` upward so each layer starts where the
/// one below ends.
fn restack(column: &mut [Layer], from: usize) {
    for i in from.max(1)..column.len() {
        column[i].floor = column[i - 1].ceiling();
    }
}
