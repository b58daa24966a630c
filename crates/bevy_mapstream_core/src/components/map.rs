//! Map root and tileset metadata components.

use std::sync::Arc;

use bevy::prelude::*;
use bevy_mapstream_assets::MapId;

/// Root component of a materialized map.
///
/// # Example
///
/// ```rust,no_run
/// # use bevy::prelude::*;
/// # use bevy_mapstream_core::prelude::MapInfo;
/// fn list_maps(maps: Query<&MapInfo>) {
///     for map in &maps {
///         println!("{} ({}x{}) at {}", map.name, map.width, map.height, map.world_offset);
///     }
/// }
/// ```
#[derive(Component, Debug, Clone)]
pub struct MapInfo {
    pub map_id: MapId,
    /// Display name, or the map id when the map has none
    pub name: String,
    /// Map size in tiles
    pub width: u32,
    pub height: u32,
    /// Tile size in pixels
    pub tile_width: u32,
    pub tile_height: u32,
    /// World position of the top-left corner, in pixels (y grows downward)
    pub world_offset: Vec2,
}

/// Points from a tile or tileset entity to its map root.
#[derive(Component, Clone, Copy, Debug, PartialEq, Eq)]
pub struct MapMember(pub Entity);

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(pub String);

/// Region map section the map belongs to.
#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct RegionSection(pub String);

#[derive(Component, Debug, Clone, PartialEq, Eq)]
pub struct BackgroundMusic(pub String);

/// Marker: show the map name popup when the player enters.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ShowMapNameOnEntry;

macro_rules! connection_component {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Component, Debug, Clone, PartialEq, Eq)]
        pub struct $name {
            pub target: MapId,
            /// Shift along the shared edge, in tiles
            pub offset: i32,
        }
    };
}

connection_component!(
    /// Map adjacent to the north edge.
    NorthConnection
);
connection_component!(
    /// Map adjacent to the south edge.
    SouthConnection
);
connection_component!(
    /// Map adjacent to the east edge.
    EastConnection
);
connection_component!(
    /// Map adjacent to the west edge.
    WestConnection
);

/// Border tiles repeated outside the map, as two 2×2 gid grids.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct MapBorder {
    pub bottom: [[u32; 2]; 2],
    pub top: [[u32; 2]; 2],
    pub tileset_id: Option<String>,
}

/// Metadata entity describing one tileset of a map.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct TilesetInfo {
    pub tileset_id: Arc<str>,
    pub first_gid: u32,
    /// Inclusive
    pub last_gid: u32,
    pub tile_size: UVec2,
    pub columns: u32,
    pub image_size: UVec2,
}
