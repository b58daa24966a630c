use std::path::Path;

use bevy::platform::collections::HashMap;
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::cancel::CancellationToken;
use crate::document::TileDocument;
use crate::loaders::resolve_relative_path;
use crate::providers::{SourceError, TilesetLoader};
use crate::tileset::{AnimationFrame, LoadedTileset, TileMetadata, TilesetImage};

/// Tileset loader for external Tiled tilesets (.tsx files).
///
/// Only texture atlas and image collection tilesets stored in their own `.tsx`
/// file are supported; tilesets embedded in a map fail with
/// [`SourceError::InvalidTileset`].
#[derive(Debug, Clone, Default)]
pub struct TsxTilesetLoader;

impl TilesetLoader for TsxTilesetLoader {
    fn load_tilesets<'a>(
        &'a self,
        document: &'a TileDocument,
        map_path: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<LoadedTileset>, SourceError>> {
        async move {
            let mut loader = tiled::Loader::new();
            let mut loaded = Vec::with_capacity(document.tilesets.len());

            for tileset_ref in &document.tilesets {
                if cancel.is_cancelled() {
                    return Err(SourceError::Cancelled);
                }

                let path = resolve_relative_path(map_path, &tileset_ref.source)?;
                if path.extension().and_then(|ext| ext.to_str()) != Some("tsx") {
                    return Err(SourceError::InvalidTileset {
                        name: path.display().to_string(),
                        reason: "embedded tilesets are not supported".to_string(),
                    });
                }

                let tileset = loader.load_tsx_tileset(&path)?;
                loaded.push(loaded_tileset(tileset_ref.first_gid, &path, &tileset));
            }

            Ok(loaded)
        }
        .boxed()
    }
}

/// Convert a parsed `tiled::Tileset` into a [`LoadedTileset`] for one map.
pub fn loaded_tileset(first_gid: u32, path: &Path, tileset: &tiled::Tileset) -> LoadedTileset {
    let id = if tileset.name.is_empty() {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("tileset")
            .to_string()
    } else {
        tileset.name.clone()
    };

    // The tiled loader already resolves image sources against the tileset file
    let image = tileset.image.as_ref().map(|image| TilesetImage {
        path: image.source.clone(),
        width: image.width.max(0) as u32,
        height: image.height.max(0) as u32,
    });

    let tiles: HashMap<u32, TileMetadata> = tileset
        .tiles()
        .map(|(tile_id, tile)| {
            let animation = tile.animation.as_ref().map(|frames| {
                frames
                    .iter()
                    .map(|frame| AnimationFrame {
                        tile_id: frame.tile_id,
                        duration_ms: frame.duration,
                    })
                    .collect()
            });
            (
                tile_id,
                TileMetadata {
                    properties: tile.properties.clone(),
                    animation,
                },
            )
        })
        .collect();

    LoadedTileset {
        id,
        first_gid,
        tile_width: tileset.tile_width,
        tile_height: tileset.tile_height,
        spacing: tileset.spacing,
        margin: tileset.margin,
        columns: tileset.columns,
        tile_count: tileset.tilecount,
        image,
        tiles,
        properties: tileset.properties.clone(),
    }
}
