//! Tile entity components and the tile animation system.
//!
//! Every non-empty cell of a prepared map becomes one entity carrying
//! [`TilePosition`], [`TileSprite`] and [`Elevation`]. The remaining components
//! are only attached where the tile has the data.

use std::sync::Arc;

use bevy::prelude::*;

/// Grid and world position of a tile.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct TilePosition {
    /// Grid coordinates in tiles
    pub grid: UVec2,
    /// Top-left corner in world pixels, before any layer offset
    pub world: Vec2,
}

/// What to draw for a tile.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct TileSprite {
    pub tileset_id: Arc<str>,
    pub gid: u32,
    /// Pixel rectangle on the tileset image
    pub source_rect: URect,
    pub flip_h: bool,
    pub flip_v: bool,
    pub flip_d: bool,
}

/// Render order and collision level, `0..=15`.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Elevation(pub u8);

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct LayerPixelOffset(pub Vec2);

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct TerrainType(pub String);

/// Script reference declared on the tile.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct TileScript(pub String);

/// Animation timing of an animated tile.
///
/// Contains the frame sequence and current playback state.
#[derive(Component, Debug, Clone)]
pub struct TileAnimation {
    /// Source rectangle of each frame
    pub frames: Vec<URect>,
    pub durations_ms: Vec<u32>,
    /// Sum of all frame durations
    pub cycle_ms: u32,
    /// Current frame index (`0..frames.len()`)
    pub current_frame: usize,
    /// Time elapsed in the current frame (milliseconds)
    pub elapsed_ms: f32,
}

impl TileAnimation {
    /// Frames without a duration (and durations without a frame) are dropped.
    pub fn new(mut frames: Vec<URect>, mut durations_ms: Vec<u32>) -> Self {
        let len = frames.len().min(durations_ms.len());
        frames.truncate(len);
        durations_ms.truncate(len);
        let cycle_ms = durations_ms.iter().sum();
        Self {
            frames,
            durations_ms,
            cycle_ms,
            current_frame: 0,
            elapsed_ms: 0.0,
        }
    }

    pub fn current_rect(&self) -> Option<URect> {
        self.frames.get(self.current_frame).copied()
    }

    /// Advance by `delta_ms`, returning whether the frame changed.
    pub fn advance(&mut self, delta_ms: f32) -> bool {
        let frame_count = self.frames.len().min(self.durations_ms.len());
        // Only the walked frames count, whatever `cycle_ms` says
        let cycle_ms: u32 = self.durations_ms[..frame_count].iter().sum();
        if frame_count == 0 || cycle_ms == 0 {
            return false;
        }

        // Skip whole cycles so long hitches don't spin
        self.elapsed_ms = (self.elapsed_ms + delta_ms) % cycle_ms as f32;
        let start = self.current_frame;
        loop {
            let duration = self.durations_ms[self.current_frame] as f32;
            if self.elapsed_ms < duration {
                break;
            }
            self.elapsed_ms -= duration;
            self.current_frame = (self.current_frame + 1) % frame_count;
        }
        self.current_frame != start
    }
}

/// Advances every [`TileAnimation`] and swaps the sprite's source rectangle.
pub fn update_tile_animations(
    time: Res<Time>,
    mut animated_tiles: Query<(&mut TileAnimation, &mut TileSprite)>,
) {
    let delta_ms = time.delta_secs() * 1000.0;

    for (mut animation, mut sprite) in &mut animated_tiles {
        if !animation.advance(delta_ms) {
            continue;
        }
        if let Some(rect) = animation.current_rect() {
            sprite.source_rect = rect;
        }
    }
}
