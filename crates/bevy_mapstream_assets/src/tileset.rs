use std::path::PathBuf;

use bevy::{platform::collections::HashMap, prelude::*};
use tiled::Properties;

/// A tileset loaded for a specific map.
///
/// Unlike a raw `tiled::Tileset`, this carries the map-specific `first_gid`
/// boundary so global ids from the map's layers can be resolved against it.
#[derive(Debug, Clone)]
pub struct LoadedTileset {
    /// Stable identifier (the tileset name from the editor)
    pub id: String,

    /// First global tile id owned by this tileset in the map
    pub first_gid: u32,

    /// Tile size in pixels
    pub tile_width: u32,
    pub tile_height: u32,

    /// Spacing between tiles in the atlas (pixels)
    pub spacing: u32,

    /// Margin around the tileset in the atlas (pixels)
    pub margin: u32,

    /// Number of tile columns in the atlas (0 for image collections)
    pub columns: u32,

    /// Number of tiles in the tileset
    pub tile_count: u32,

    /// The atlas image, `None` for image collection tilesets
    pub image: Option<TilesetImage>,

    /// Per-tile metadata keyed by local tile id (0-based, NOT a gid)
    pub tiles: HashMap<u32, TileMetadata>,

    /// Custom properties set on the tileset
    pub properties: Properties,
}

impl LoadedTileset {
    /// Last global id owned by this tileset (inclusive).
    pub fn last_gid(&self) -> u32 {
        self.first_gid + self.tile_count.saturating_sub(1)
    }

    /// Grid dimensions (columns, rows) of the atlas.
    ///
    /// Image collections have no grid and report `UVec2::ZERO`.
    pub fn grid_size(&self) -> UVec2 {
        if self.columns > 0 {
            let rows = self.tile_count.div_ceil(self.columns);
            UVec2::new(self.columns, rows)
        } else {
            UVec2::ZERO
        }
    }

    /// Metadata declared for a local tile id.
    pub fn tile(&self, local_id: u32) -> Option<&TileMetadata> {
        self.tiles.get(&local_id)
    }
}

/// Atlas image reference.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetImage {
    /// Image path, already resolved relative to the tileset file
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Data declared on a single tile of a tileset.
#[derive(Debug, Clone, Default)]
pub struct TileMetadata {
    pub properties: Properties,
    /// Animation frames, if the tile is animated
    pub animation: Option<Vec<AnimationFrame>>,
}

/// A single frame of a tile animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    /// Local tile id displayed during this frame
    pub tile_id: u32,
    /// How long to display this frame (milliseconds)
    pub duration_ms: u32,
}
