//! Prepared map data.
//!
//! Everything the applier needs to materialize a map, computed off the main
//! thread. A [`PreparedMapData`] is never mutated after construction; it is
//! shared as `Arc<PreparedMapData>` and replaced wholesale in the cache.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;
use bevy_mapstream_assets::MapId;
use tiled::Properties;

/// Immutable snapshot produced by one preparation.
#[derive(Debug, Clone)]
pub struct PreparedMapData {
    pub map_id: MapId,
    pub display_name: Option<String>,

    /// World position of the map's top-left corner, in pixels
    pub world_offset: Vec2,

    /// Map size in tiles
    pub width: u32,
    pub height: u32,

    /// Tile size in pixels
    pub tile_width: u32,
    pub tile_height: u32,

    /// Layer-major, then row-major (y outer, x inner). Empty cells are never present.
    pub tiles: Vec<PreparedTile>,

    /// Sorted ascending by `first_gid`
    pub tilesets: Vec<PreparedTileset>,

    pub border: Option<PreparedBorder>,
    pub animated_tiles: Vec<PreparedAnimatedTile>,

    /// At most one per direction
    pub connections: Vec<PreparedConnection>,

    pub image_layers: Vec<PreparedImageLayer>,
    pub objects: Vec<PreparedObject>,

    pub region: Option<String>,
    pub music: Option<String>,
    pub show_map_name: bool,

    /// Map-level custom properties
    pub properties: Properties,
}

impl PreparedMapData {
    /// Map size in pixels.
    pub fn pixel_size(&self) -> Vec2 {
        Vec2::new(
            (self.width * self.tile_width) as f32,
            (self.height * self.tile_height) as f32,
        )
    }

    pub fn connection(&self, direction: Direction) -> Option<&PreparedConnection> {
        self.connections
            .iter()
            .find(|connection| connection.direction == direction)
    }

    pub fn tileset(&self, id: &str) -> Option<&PreparedTileset> {
        self.tilesets.iter().find(|tileset| &*tileset.id == id)
    }
}

/// One non-empty cell of one tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTile {
    /// Grid coordinates in tiles
    pub position: UVec2,
    pub map_id: MapId,
    pub tileset_id: Arc<str>,

    /// Global id with the flip bits masked off
    pub gid: u32,

    /// Id within the owning tileset
    pub local_id: u32,

    /// Index of the source tile layer among the map's tile layers
    pub layer_index: u32,

    /// Pixel rectangle on the tileset image
    pub source_rect: URect,

    pub flip_h: bool,
    pub flip_v: bool,
    pub flip_d: bool,

    /// Always within `0..=15`
    pub elevation: u8,

    pub terrain_type: Option<String>,
    pub script: Option<String>,

    /// Pixel offset of the source layer, when it has one
    pub layer_offset: Option<Vec2>,
}

/// Tileset geometry needed to draw and resolve tiles.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTileset {
    pub id: Arc<str>,
    pub first_gid: u32,
    /// Inclusive
    pub last_gid: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub spacing: u32,
    pub margin: u32,
    pub image: Option<PathBuf>,
    pub image_width: u32,
    pub image_height: u32,
}

impl PreparedTileset {
    pub fn contains_gid(&self, gid: u32) -> bool {
        (self.first_gid..=self.last_gid).contains(&gid)
    }

    /// Whether the tileset describes a usable atlas.
    pub fn has_valid_geometry(&self) -> bool {
        self.first_gid > 0
            && self.last_gid >= self.first_gid
            && self.tile_width > 0
            && self.tile_height > 0
            && self.columns > 0
            && self.image.is_some()
            && self.image_width >= self.tile_width
            && self.image_height >= self.tile_height
    }
}

/// Border tiles drawn around the map edge: two 2×2 grids indexed `[row][column]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBorder {
    pub bottom: [[u32; 2]; 2],
    pub top: [[u32; 2]; 2],
    pub tileset_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedAnimatedTile {
    /// Global id of the tile that carries the animation
    pub gid: u32,
    pub tileset_id: Arc<str>,
    pub frames: Vec<URect>,
    pub durations_ms: Vec<u32>,
    /// Sum of all frame durations
    pub cycle_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Lowercase name as used in map properties (`connection_north`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Link to the map adjacent on one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedConnection {
    pub direction: Direction,
    pub target: MapId,
    /// Shift along the shared edge, in tiles
    pub offset: i32,
}

#[derive(Debug, Clone)]
pub struct PreparedImageLayer {
    pub id: u32,
    pub name: String,
    /// Image path resolved against the map file
    pub image: Option<PathBuf>,
    pub offset: Vec2,
    pub properties: Properties,
}

/// What a placed object represents, from its editor type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Warp,
    Trigger,
    NpcSpawn,
    Sign,
    Other(String),
}

impl ObjectKind {
    /// Classify an object type string.
    ///
    /// Matching is case-insensitive and ignores an `_event` suffix, so both
    /// `warp` and `warp_event` are warps.
    pub fn from_type(user_type: &str) -> Self {
        let lower = user_type.trim().to_ascii_lowercase();
        let base = lower.strip_suffix("_event").unwrap_or(&lower);
        match base {
            "warp" => ObjectKind::Warp,
            "trigger" | "coord" => ObjectKind::Trigger,
            "npc" | "npc_spawn" | "object" => ObjectKind::NpcSpawn,
            "sign" | "bg" => ObjectKind::Sign,
            _ => ObjectKind::Other(user_type.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedObject {
    pub id: u32,
    pub name: String,
    pub kind: ObjectKind,
    /// Name of the object group the object was placed in
    pub group: String,
    /// Pixels, relative to the map origin
    pub position: Vec2,
    pub size: Vec2,
    /// Declared elevation, clamped to `0..=15`
    pub elevation: Option<u8>,
    pub properties: Properties,
}
