//! Uniform-grid spatial hash of tile entities.

use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy_mapstream_assets::MapId;

pub const DEFAULT_CELL_SIZE: f32 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub map_id: MapId,
    /// World-space bounds in pixels
    pub bounds: Rect,
    pub elevation: u8,
}

impl SpatialEntry {
    /// Half-open containment, so a point on a shared edge hits one tile.
    fn contains(&self, point: Vec2) -> bool {
        point.x >= self.bounds.min.x
            && point.x < self.bounds.max.x
            && point.y >= self.bounds.min.y
            && point.y < self.bounds.max.y
    }
}

/// Tile entities bucketed by world cell.
///
/// Maps are added with [`insert_map`](Self::insert_map) as they are applied
/// and removed with [`remove_map`](Self::remove_map) on unload; the rest of
/// the index is left untouched.
#[derive(Resource, Debug)]
pub struct SpatialIndex {
    cell_size: f32,
    cells: HashMap<CellCoord, Vec<SpatialEntry>>,
    /// Cells each map has entries in
    map_cells: HashMap<MapId, Vec<CellCoord>>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    /// Non-positive cell sizes fall back to [`DEFAULT_CELL_SIZE`].
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size > 0.0 {
            cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::default(),
            map_cells: HashMap::default(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline]
    pub fn world_to_cell(&self, point: Vec2) -> CellCoord {
        CellCoord {
            x: (point.x / self.cell_size).floor() as i32,
            y: (point.y / self.cell_size).floor() as i32,
        }
    }

    /// Add the tiles of one map. Entries spanning a cell border go into every
    /// cell they overlap.
    pub fn insert_map(
        &mut self,
        map_id: &MapId,
        entries: impl IntoIterator<Item = (Entity, Rect, u8)>,
    ) -> usize {
        let mut inserted = 0;
        let mut touched = Vec::new();

        for (entity, bounds, elevation) in entries {
            let min = self.world_to_cell(bounds.min);
            // Max edge is exclusive
            let max = self.world_to_cell(bounds.max - Vec2::splat(f32::EPSILON * self.cell_size));

            for y in min.y..=max.y.max(min.y) {
                for x in min.x..=max.x.max(min.x) {
                    let cell = CellCoord { x, y };
                    self.cells.entry(cell).or_default().push(SpatialEntry {
                        entity,
                        map_id: map_id.clone(),
                        bounds,
                        elevation,
                    });
                    touched.push(cell);
                }
            }
            inserted += 1;
        }

        touched.sort_unstable_by_key(|cell| (cell.x, cell.y));
        touched.dedup();
        let cells = self.map_cells.entry(map_id.clone()).or_default();
        cells.extend(touched);
        cells.sort_unstable_by_key(|cell| (cell.x, cell.y));
        cells.dedup();

        inserted
    }

    /// Remove every entry of a map, returning how many cell entries went away.
    pub fn remove_map(&mut self, map_id: &MapId) -> usize {
        let Some(cells) = self.map_cells.remove(map_id) else {
            return 0;
        };

        let mut removed = 0;
        for cell in cells {
            let Some(entries) = self.cells.get_mut(&cell) else {
                continue;
            };
            let before = entries.len();
            entries.retain(|entry| &entry.map_id != map_id);
            removed += before - entries.len();
            if entries.is_empty() {
                self.cells.remove(&cell);
            }
        }
        removed
    }

    pub fn entities_in_cell(&self, cell: CellCoord) -> impl Iterator<Item = &SpatialEntry> {
        self.cells.get(&cell).into_iter().flatten()
    }

    /// Entries whose bounds contain `point`, lowest elevation first.
    pub fn entities_at(&self, point: Vec2) -> Vec<&SpatialEntry> {
        let mut hits: Vec<&SpatialEntry> = self
            .entities_in_cell(self.world_to_cell(point))
            .filter(|entry| entry.contains(point))
            .collect();
        hits.sort_by_key(|entry| entry.elevation);
        hits
    }

    pub fn contains_map(&self, map_id: &MapId) -> bool {
        self.map_cells.contains_key(map_id)
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
