//! Layer elevation table.
//!
//! Elevations order rendering and group collision. A layer's base elevation
//! comes from its name, then from its position among the tile layers.

pub const GROUND: u8 = 0;
pub const OBJECTS: u8 = 3;
pub const BRIDGE: u8 = 4;
pub const OVERHEAD: u8 = 9;

/// Highest storable elevation.
pub const MAX_ELEVATION: u8 = 15;

// Checked in order, first match wins.
const NAME_TABLE: &[(&str, u8)] = &[
    ("ground", GROUND),
    ("water", GROUND),
    ("overhead", OVERHEAD),
    ("roof", OVERHEAD),
    ("bridge", BRIDGE),
    ("objects", OBJECTS),
];

/// Base elevation of a tile layer.
///
/// `tile_layer_index` is the layer's position among the map's tile layers
/// (image and object layers are not counted).
pub fn layer_elevation(name: &str, tile_layer_index: usize) -> u8 {
    let name = name.to_ascii_lowercase();
    if let Some((_, elevation)) = NAME_TABLE
        .iter()
        .find(|(needle, _)| name.contains(needle))
    {
        return *elevation;
    }

    match tile_layer_index {
        0 => GROUND,
        1 => OBJECTS,
        _ => OVERHEAD,
    }
}

/// Clamp a declared elevation into `0..=15`.
pub fn clamp_elevation(value: i64) -> u8 {
    value.clamp(0, MAX_ELEVATION as i64) as u8
}
