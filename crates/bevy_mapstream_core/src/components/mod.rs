//! Components attached to materialized maps.

pub mod map;
pub mod tile;

// Re-export commonly used components
pub use map::{
    BackgroundMusic, DisplayName, EastConnection, MapBorder, MapInfo, MapMember, NorthConnection,
    RegionSection, ShowMapNameOnEntry, SouthConnection, TilesetInfo, WestConnection,
};
pub use tile::{
    Elevation, LayerPixelOffset, TerrainType, TileAnimation, TilePosition, TileScript, TileSprite,
    update_tile_animations,
};
