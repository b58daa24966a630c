//! Tile precomputation.
//!
//! Decodes raw layer cells into [`PreparedTile`]s: flip flags, owning tileset,
//! atlas source rectangle, per-tile properties and elevation.

use std::sync::Arc;

use bevy::{platform::collections::HashSet, prelude::*};
use bevy_mapstream_assets::gid::{EMPTY_GID, FLIP_D, FLIP_H, FLIP_V, GID_MASK};
use bevy_mapstream_assets::{LoadedTileset, TileDocument};

use super::elevation::{clamp_elevation, layer_elevation};
use crate::prepared::PreparedTile;
use crate::properties::{non_empty_string, property};

/// A raw cell value split into its global id and flip flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedGid {
    pub gid: u32,
    pub flip_h: bool,
    pub flip_v: bool,
    pub flip_d: bool,
}

#[inline]
pub fn decode_gid(raw: u32) -> DecodedGid {
    DecodedGid {
        gid: raw & GID_MASK,
        flip_h: raw & FLIP_H != 0,
        flip_v: raw & FLIP_V != 0,
        flip_d: raw & FLIP_D != 0,
    }
}

/// Find the tileset owning `gid`.
///
/// `first_gids` must be sorted ascending. Returns the index of the largest
/// boundary `<= gid`, or `None` for the empty gid and gids below every
/// boundary.
#[inline]
pub fn resolve_tileset(first_gids: &[u32], gid: u32) -> Option<usize> {
    if gid == EMPTY_GID {
        return None;
    }
    first_gids
        .partition_point(|&first_gid| first_gid <= gid)
        .checked_sub(1)
}

/// Atlas columns, derived from the image width when the tileset doesn't say.
pub fn atlas_columns(tileset: &LoadedTileset) -> u32 {
    if tileset.columns > 0 {
        return tileset.columns;
    }

    let Some(image) = &tileset.image else {
        return 1;
    };
    let stride = tileset.tile_width + tileset.spacing;
    if stride == 0 {
        return 1;
    }
    let usable = (image.width + tileset.spacing).saturating_sub(2 * tileset.margin);
    (usable / stride).max(1)
}

/// Pixel rectangle of a local tile id on the tileset image.
pub fn source_rect(tileset: &LoadedTileset, local_id: u32) -> URect {
    let columns = atlas_columns(tileset);
    let column = local_id % columns;
    let row = local_id / columns;

    let x = tileset.margin + column * (tileset.tile_width + tileset.spacing);
    let y = tileset.margin + row * (tileset.tile_height + tileset.spacing);

    URect::new(x, y, x + tileset.tile_width, y + tileset.tile_height)
}

pub(crate) struct PreparedTiles {
    pub tiles: Vec<PreparedTile>,
    /// Every gid placed on the map, flip bits masked off
    pub used_gids: HashSet<u32>,
}

/// Decode every tile layer of `document`.
///
/// `tilesets` must be sorted by `first_gid`; `tileset_ids` holds the shared id
/// of each tileset at the same index.
pub(crate) fn prepare_tiles(
    document: &TileDocument,
    tilesets: &[LoadedTileset],
    tileset_ids: &[Arc<str>],
) -> PreparedTiles {
    let first_gids: Vec<u32> = tilesets.iter().map(|tileset| tileset.first_gid).collect();

    let mut tiles = Vec::new();
    let mut used_gids = HashSet::default();

    for (layer_index, layer) in document.tile_layers().enumerate() {
        let base_elevation = property::<i64>(&layer.properties, "elevation")
            .map(clamp_elevation)
            .unwrap_or_else(|| layer_elevation(&layer.name, layer_index));
        let layer_offset = (layer.offset != Vec2::ZERO).then_some(layer.offset);

        tiles.reserve(
            layer
                .data
                .iter()
                .filter(|&&raw| raw & GID_MASK != EMPTY_GID)
                .count(),
        );

        // Row-major: y outer, x inner
        for y in 0..layer.height {
            for x in 0..layer.width {
                let Some(raw) = layer.raw_gid(x, y) else {
                    continue;
                };
                let decoded = decode_gid(raw);
                if decoded.gid == EMPTY_GID {
                    continue;
                }

                let Some(index) = resolve_tileset(&first_gids, decoded.gid) else {
                    warn!(
                        "Tile at ({}, {}) in layer '{}' has gid {} below every tileset",
                        x, y, layer.name, decoded.gid
                    );
                    continue;
                };
                let tileset = &tilesets[index];
                let local_id = decoded.gid - tileset.first_gid;
                if local_id >= tileset.tile_count {
                    warn!(
                        "Tile at ({}, {}) in layer '{}' has gid {} past the end of tileset '{}'",
                        x, y, layer.name, decoded.gid, tileset.id
                    );
                    continue;
                }

                let metadata = tileset.tile(local_id);
                let elevation = metadata
                    .and_then(|tile| property::<i64>(&tile.properties, "elevation"))
                    .map(clamp_elevation)
                    .unwrap_or(base_elevation);

                tiles.push(PreparedTile {
                    position: UVec2::new(x, y),
                    map_id: document.map_id.clone(),
                    tileset_id: tileset_ids[index].clone(),
                    gid: decoded.gid,
                    local_id,
                    layer_index: layer_index as u32,
                    source_rect: source_rect(tileset, local_id),
                    flip_h: decoded.flip_h,
                    flip_v: decoded.flip_v,
                    flip_d: decoded.flip_d,
                    elevation,
                    terrain_type: metadata
                        .and_then(|tile| non_empty_string(&tile.properties, "terrain_type")),
                    script: metadata.and_then(|tile| non_empty_string(&tile.properties, "script")),
                    layer_offset,
                });
                used_gids.insert(decoded.gid);
            }
        }
    }

    PreparedTiles { tiles, used_gids }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use bevy::platform::collections::HashMap;
    use bevy_mapstream_assets::gid;
    use bevy_mapstream_assets::{
        DocumentLayer, MapId, TileLayerDocument, TileMetadata, TilesetImage,
    };
    use tiled::{Properties, PropertyValue};

    use super::*;
    use crate::prepare::elevation::{GROUND, OBJECTS};

    pub(crate) fn tileset(id: &str, first_gid: u32, tile_count: u32) -> LoadedTileset {
        LoadedTileset {
            id: id.to_string(),
            first_gid,
            tile_width: 16,
            tile_height: 16,
            spacing: 0,
            margin: 0,
            columns: 4,
            tile_count,
            image: Some(TilesetImage {
                path: PathBuf::from(format!("{id}.png")),
                width: 64,
                height: 16 * tile_count.div_ceil(4),
            }),
            tiles: HashMap::default(),
            properties: Properties::new(),
        }
    }

    fn document(layers: Vec<(&str, Vec<u32>)>, width: u32, height: u32) -> TileDocument {
        TileDocument {
            map_id: MapId::from("test"),
            path: PathBuf::from("maps/test.tmx"),
            width,
            height,
            tile_width: 16,
            tile_height: 16,
            tilesets: Vec::new(),
            layers: layers
                .into_iter()
                .enumerate()
                .map(|(i, (name, data))| {
                    DocumentLayer::Tiles(TileLayerDocument {
                        id: i as u32,
                        name: name.to_string(),
                        width,
                        height,
                        data,
                        offset: Vec2::ZERO,
                        properties: Properties::new(),
                    })
                })
                .collect(),
            properties: Properties::new(),
        }
    }

    fn ids(tilesets: &[LoadedTileset]) -> Vec<Arc<str>> {
        tilesets.iter().map(|t| Arc::from(t.id.as_str())).collect()
    }

    #[test]
    fn test_flip_round_trip() {
        let raw = gid::encode(42, true, false, true);
        assert_eq!(
            decode_gid(raw),
            DecodedGid {
                gid: 42,
                flip_h: true,
                flip_v: false,
                flip_d: true,
            }
        );
    }

    #[test]
    fn test_binary_search_boundaries() {
        let first_gids = [1, 50, 120];
        assert_eq!(resolve_tileset(&first_gids, 119), Some(1));
        assert_eq!(resolve_tileset(&first_gids, 120), Some(2));
        assert_eq!(resolve_tileset(&first_gids, 1), Some(0));
        assert_eq!(resolve_tileset(&first_gids, 49), Some(0));
        assert_eq!(resolve_tileset(&first_gids, 0), None);
        assert_eq!(resolve_tileset(&[5, 10], 3), None);
    }

    #[test]
    fn test_source_rect_with_margin_and_spacing() {
        let mut set = tileset("town", 1, 16);
        set.margin = 1;
        set.spacing = 2;

        // local 5 -> column 1, row 1
        assert_eq!(source_rect(&set, 5), URect::new(19, 19, 35, 35));
        assert_eq!(source_rect(&set, 0), URect::new(1, 1, 17, 17));
    }

    #[test]
    fn test_columns_derived_from_image_width() {
        let mut set = tileset("town", 1, 16);
        set.columns = 0;
        assert_eq!(atlas_columns(&set), 4);
        assert_eq!(source_rect(&set, 4), URect::new(0, 16, 16, 32));
    }

    #[test]
    fn test_empty_cells_skipped_and_order_is_layer_then_row_major() {
        let tilesets = vec![tileset("town", 1, 16)];
        let doc = document(vec![("Ground", vec![1, 0, 3, 4]), ("Objects", vec![0, 2, 0, 0])], 2, 2);

        let prepared = prepare_tiles(&doc, &tilesets, &ids(&tilesets));

        let order: Vec<(u32, UVec2)> = prepared
            .tiles
            .iter()
            .map(|tile| (tile.layer_index, tile.position))
            .collect();
        assert_eq!(
            order,
            vec![
                (0, UVec2::new(0, 0)),
                (0, UVec2::new(0, 1)),
                (0, UVec2::new(1, 1)),
                (1, UVec2::new(1, 0)),
            ]
        );
        assert!(prepared.tiles.iter().all(|tile| tile.gid != 0));
        assert_eq!(prepared.tiles[0].elevation, GROUND);
        assert_eq!(prepared.tiles[3].elevation, OBJECTS);
        assert_eq!(prepared.used_gids.len(), 4);
    }

    #[test]
    fn test_tile_properties_and_elevation_clamp() {
        let mut set = tileset("town", 1, 16);
        let mut properties = Properties::new();
        properties.insert("elevation".into(), PropertyValue::IntValue(255));
        properties.insert("terrain_type".into(), PropertyValue::StringValue("grass".into()));
        properties.insert("script".into(), PropertyValue::StringValue("sign.lua".into()));
        set.tiles.insert(
            2,
            TileMetadata {
                properties,
                animation: None,
            },
        );
        let tilesets = vec![set];
        let doc = document(vec![("Ground", vec![3])], 1, 1);

        let prepared = prepare_tiles(&doc, &tilesets, &ids(&tilesets));
        let tile = &prepared.tiles[0];

        assert_eq!(tile.elevation, 15);
        assert_eq!(tile.terrain_type.as_deref(), Some("grass"));
        assert_eq!(tile.script.as_deref(), Some("sign.lua"));
    }

    #[test]
    fn test_tiles_resolve_across_tilesets() {
        let tilesets = vec![tileset("a", 1, 49), tileset("b", 50, 70), tileset("c", 120, 8)];
        let raw = gid::encode(119, false, true, false);
        let doc = document(vec![("Ground", vec![raw, 120])], 2, 1);

        let prepared = prepare_tiles(&doc, &tilesets, &ids(&tilesets));

        assert_eq!(&*prepared.tiles[0].tileset_id, "b");
        assert_eq!(prepared.tiles[0].local_id, 69);
        assert!(prepared.tiles[0].flip_v);
        assert_eq!(&*prepared.tiles[1].tileset_id, "c");
        assert_eq!(prepared.tiles[1].local_id, 0);
    }
}
