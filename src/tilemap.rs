use glam::IVec2;

/// Offsets of the 8-connected neighborhood, row by row.
pub const NEIGHBORS_8: [IVec2; 8] = [
    IVec2::new(-1, -1),
    IVec2::new(-1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
    IVec2::new(1, -1),
    IVec2::new(1, 0),
    IVec2::new(1, 1),
];

/// A bounded 2D grid stored row-major. Cells outside the grid do not exist;
/// there is no wrapping on either axis.
#[derive(Clone, Debug)]
pub struct Tilemap<T> {
    pub width: usize,
    pub height: usize,
    data: Vec<T>,
}

impl<T: Clone> Tilemap<T> {
    pub fn new_with(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Fill the entire map with a value.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }
}

impl<T> Tilemap<T> {
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(
            x < self.width && y < self.height,
            "({x}, {y}) outside {}x{}",
            self.width,
            self.height
        );
        y * self.width + x
    }

    pub fn get(&self, x: usize, y: usize) -> &T {
        &self.data[self.index(x, y)]
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut T {
        let idx = self.index(x, y);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, y: usize, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    /// Whether an integer cell lies inside the grid.
    pub fn contains(&self, cell: IVec2) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as usize) < self.width
            && (cell.y as usize) < self.height
    }

    /// Cell lookup by signed coordinate. `None` outside the grid.
    pub fn at(&self, cell: IVec2) -> Option<&T> {
        self.contains(cell).then(|| self.get(cell.x as usize, cell.y as usize))
    }

    pub fn at_mut(&mut self, cell: IVec2) -> Option<&mut T> {
        if self.contains(cell) {
            Some(self.get_mut(cell.x as usize, cell.y as usize))
        } else {
            None
        }
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width;
        self.data.iter().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    /// Iterate mutably over all cells with their coordinates.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let width = self.width;
        self.data.iter_mut().enumerate().map(move |(idx, val)| (idx % width, idx / width, val))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl Tilemap<f32> {
    /// Sum of every cell, accumulated in f64.
    pub fn total(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_has_three_neighbors() {
        let map = Tilemap::new_with(4, 4, 0u8);
        let count = |cell: IVec2| NEIGHBORS_8.iter().filter(|&&o| map.contains(cell + o)).count();
        assert_eq!(count(IVec2::new(0, 0)), 3);
        assert_eq!(count(IVec2::new(3, 0)), 3);
        assert_eq!(count(IVec2::new(1, 1)), 8);
        assert_eq!(count(IVec2::new(0, 2)), 5);
    }

    #[test]
    fn test_no_wrapping() {
        let map = Tilemap::new_with(4, 2, 1.0f32);
        assert!(map.at(IVec2::new(-1, 0)).is_none());
        assert!(map.at(IVec2::new(4, 0)).is_none());
        assert!(map.at(IVec2::new(0, 2)).is_none());
        assert_eq!(map.at(IVec2::new(3, 1)), Some(&1.0));
    }

    #[test]
    fn test_iter_coordinates_row_major() {
        let mut map = Tilemap::new_with(3, 2, 0usize);
        for (x, y, v) in map.iter_mut() {
            *v = y * 10 + x;
        }
        assert_eq!(*map.get(2, 1), 12);
        assert_eq!(map.iter().nth(4).map(|(x, y, _)| (x, y)), Some((1, 1)));
    }

    #[test]
    fn test_total() {
        let map = Tilemap::new_with(2, 2, 0.5f32);
        assert!((map.total() - 2.0).abs() < 1e-9);
    }
}
