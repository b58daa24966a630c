use std::path::{Path, PathBuf};

use bevy::prelude::*;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::document::{
    DocumentLayer, DocumentObject, ImageLayerDocument, MapId, ObjectGroupDocument, TileDocument,
    TileLayerDocument, TilesetRef,
};
use crate::gid;
use crate::providers::{SourceError, TileDocumentProvider};

/// Document provider for Tiled maps (.tmx files).
///
/// Maps are looked up as `<root>/<map_id>.tmx`. Group layers are flattened and
/// every tile is re-encoded into its raw gid form (first gid + local id, flip
/// flags in the high bits), so downstream preparation sees the same data the
/// file stores.
#[derive(Debug, Clone)]
pub struct TmxDocumentProvider {
    root: PathBuf,
    extension: String,
}

impl TmxDocumentProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "tmx".to_string(),
        }
    }

    /// Use a different file extension for map lookups.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Filesystem path of a map's document.
    pub fn map_path(&self, map_id: &MapId) -> PathBuf {
        self.root.join(format!("{}.{}", map_id, self.extension))
    }
}

impl TileDocumentProvider for TmxDocumentProvider {
    fn load<'a>(&'a self, map_id: &'a MapId) -> BoxFuture<'a, Result<TileDocument, SourceError>> {
        async move {
            let path = self.map_path(map_id);
            if !path.is_file() {
                return Err(SourceError::NotFound(map_id.clone()));
            }

            let mut loader = tiled::Loader::new();
            let map = loader.load_tmx_map(&path)?;

            Ok(document_from_map(map_id.clone(), path, &map))
        }
        .boxed()
    }
}

/// Convert a parsed `tiled::Map` into a [`TileDocument`].
pub fn document_from_map(map_id: MapId, path: PathBuf, map: &tiled::Map) -> TileDocument {
    let map_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    // Key by tileset_index (iteration order matches tiled's tileset_index())
    let mut tilesets = Vec::with_capacity(map.tilesets().len());
    let mut first_gids = Vec::with_capacity(map.tilesets().len());
    let mut current_gid = 1u32; // GIDs start at 1

    for tileset in map.tilesets() {
        // The tiled loader hands back sources joined onto the map directory
        let source = tileset
            .source
            .strip_prefix(&map_dir)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| tileset.source.clone());

        tilesets.push(TilesetRef {
            first_gid: current_gid,
            source,
        });
        first_gids.push(current_gid);

        // Next tileset's first_gid = current + tile count
        current_gid += tileset.tilecount;
    }

    let mut layers = Vec::new();
    collect_layers(map.layers(), &first_gids, Vec2::ZERO, &mut layers);

    TileDocument {
        map_id,
        path,
        width: map.width,
        height: map.height,
        tile_width: map.tile_width,
        tile_height: map.tile_height,
        tilesets,
        layers,
        properties: map.properties.clone(),
    }
}

/// Recursively flatten layers, accumulating group offsets.
fn collect_layers<'map>(
    layers: impl Iterator<Item = tiled::Layer<'map>>,
    first_gids: &[u32],
    parent_offset: Vec2,
    out: &mut Vec<DocumentLayer>,
) {
    for layer in layers {
        let offset = parent_offset + Vec2::new(layer.offset_x, layer.offset_y);

        match layer.layer_type() {
            tiled::LayerType::Tiles(tile_layer) => {
                let Some(tiles) = tile_layer_document(&layer, &tile_layer, first_gids, offset)
                else {
                    warn!("Skipping infinite tile layer '{}'", layer.name);
                    continue;
                };
                out.push(DocumentLayer::Tiles(tiles));
            }
            tiled::LayerType::Image(image_layer) => {
                out.push(DocumentLayer::Image(ImageLayerDocument {
                    id: layer.id(),
                    name: layer.name.clone(),
                    image: image_layer.image.as_ref().map(|image| image.source.clone()),
                    offset,
                    properties: layer.properties.clone(),
                }));
            }
            tiled::LayerType::Objects(object_layer) => {
                let objects = object_layer
                    .objects()
                    .map(|object| {
                        let (width, height) = match &object.shape {
                            tiled::ObjectShape::Rect { width, height }
                            | tiled::ObjectShape::Ellipse { width, height } => (*width, *height),
                            _ => (0.0, 0.0),
                        };
                        DocumentObject {
                            id: object.id(),
                            name: object.name.clone(),
                            user_type: object.user_type.clone(),
                            x: object.x + offset.x,
                            y: object.y + offset.y,
                            width,
                            height,
                            properties: object.properties.clone(),
                        }
                    })
                    .collect();

                out.push(DocumentLayer::Objects(ObjectGroupDocument {
                    id: layer.id(),
                    name: layer.name.clone(),
                    objects,
                    properties: layer.properties.clone(),
                }));
            }
            tiled::LayerType::Group(group) => {
                collect_layers(group.layers(), first_gids, offset, out);
            }
        }
    }
}

fn tile_layer_document(
    layer: &tiled::Layer,
    tile_layer: &tiled::TileLayer,
    first_gids: &[u32],
    offset: Vec2,
) -> Option<TileLayerDocument> {
    let width = tile_layer.width()?;
    let height = tile_layer.height()?;

    let mut data = vec![gid::EMPTY_GID; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let Some(tile) = tile_layer.get_tile(x as i32, y as i32) else {
                continue;
            };
            let Some(first_gid) = first_gids.get(tile.tileset_index()) else {
                warn!(
                    "Tile at ({}, {}) in layer '{}' references tileset index {} which doesn't exist",
                    x,
                    y,
                    layer.name,
                    tile.tileset_index()
                );
                continue;
            };
            data[(y * width + x) as usize] =
                gid::encode(first_gid + tile.id(), tile.flip_h, tile.flip_v, tile.flip_d);
        }
    }

    Some(TileLayerDocument {
        id: layer.id(),
        name: layer.name.clone(),
        width,
        height,
        data,
        offset,
        properties: layer.properties.clone(),
    })
}
