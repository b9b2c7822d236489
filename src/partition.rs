//! Uniform grid over body bounds.
//!
//! The broad phase does not consult the grid; the world only rebuilds it
//! while the partition debug overlay is on.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

// ComplexField provides floor() for f32 in no_std via libm
#[allow(unused_imports)]
use nalgebra::ComplexField;

use crate::body_set::BodyId;
use crate::collision::Aabb2;
use crate::math::Vec2;

/// Bodies spanning more cells than this along either axis go to the
/// oversized list instead of the grid.
pub const MAX_CELLS_PER_AXIS: i32 = 64;

pub type Cell = (i32, i32);

#[derive(Debug, Clone)]
pub struct UniformGrid {
    cell_size: f32,
    cells: BTreeMap<Cell, Vec<BodyId>>,
    oversized: Vec<BodyId>,
}

impl UniformGrid {
    /// Non-positive or non-finite sizes fall back to 1.0.
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            1.0
        };
        Self {
            cell_size,
            cells: BTreeMap::new(),
            oversized: Vec::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
    }

    pub fn rebuild(&mut self, entries: impl IntoIterator<Item = (BodyId, Aabb2)>) {
        self.clear();
        for (id, bounds) in entries {
            self.insert(id, &bounds);
        }
    }

    pub fn insert(&mut self, id: BodyId, bounds: &Aabb2) {
        let Some((min, max)) = self.cell_range(bounds) else {
            log::warn!("body {:?} too large for partition grid", id);
            self.oversized.push(id);
            return;
        };
        for x in min.0..=max.0 {
            for y in min.1..=max.1 {
                self.cells.entry((x, y)).or_default().push(id);
            }
        }
    }

    /// Bodies whose cells touch `bounds`, sorted and without duplicates.
    /// Oversized bodies are always included.
    pub fn query(&self, bounds: &Aabb2) -> Vec<BodyId> {
        let mut found: Vec<BodyId> = self.oversized.clone();
        match self.cell_range(bounds) {
            Some((min, max)) => {
                for x in min.0..=max.0 {
                    for y in min.1..=max.1 {
                        if let Some(ids) = self.cells.get(&(x, y)) {
                            found.extend_from_slice(ids);
                        }
                    }
                }
            }
            None => {
                for ids in self.cells.values() {
                    found.extend_from_slice(ids);
                }
            }
        }
        found.sort_unstable();
        found.dedup();
        found
    }

    /// Occupied cells and their bodies.
    pub fn cells(&self) -> impl Iterator<Item = (&Cell, &Vec<BodyId>)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_bounds(&self, cell: &Cell) -> Aabb2 {
        let min = Vec2::new(cell.0 as f32, cell.1 as f32) * self.cell_size;
        Aabb2::new(min, min + Vec2::new(self.cell_size, self.cell_size))
    }

    fn cell_of(&self, point: &Vec2) -> Cell {
        (
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    fn cell_range(&self, bounds: &Aabb2) -> Option<(Cell, Cell)> {
        let min = self.cell_of(&bounds.min);
        let max = self.cell_of(&bounds.max);
        let span_x = max.0.saturating_sub(min.0);
        let span_y = max.1.saturating_sub(min.1);
        if span_x >= MAX_CELLS_PER_AXIS || span_y >= MAX_CELLS_PER_AXIS {
            return None;
        }
        Some((min, max))
    }
}
