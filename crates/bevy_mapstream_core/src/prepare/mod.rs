//! Background map preparation.
//!
//! [`prepare_map`] turns a map id into a [`PreparedMapData`]: it loads the
//! document and its tilesets through [`MapSources`], then precomputes tiles,
//! animations, objects, connections and metadata. It runs on the async compute
//! pool and never touches the ECS world.

pub mod connections;
pub mod elevation;
pub mod objects;
pub mod tiles;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bevy::prelude::*;
use bevy_mapstream_assets::{
    CancellationToken, InMemoryDefinitions, MapDefinitionLookup, MapId, TileDocumentProvider,
    TilesetLoader, TmxDocumentProvider, TsxTilesetLoader,
};

use crate::error::PrepareError;
use crate::prepared::{Direction, PreparedMapData, PreparedTileset};
use connections::resolve_connections;
use objects::{
    map_metadata, prepare_animated_tiles, prepare_border, prepare_image_layers, prepare_objects,
};
use tiles::{PreparedTiles, atlas_columns, prepare_tiles};

/// The external collaborators a preparation reads from.
#[derive(Clone)]
pub struct MapSources {
    pub documents: Arc<dyn TileDocumentProvider>,
    pub tilesets: Arc<dyn TilesetLoader>,
    pub definitions: Arc<dyn MapDefinitionLookup>,
    /// Fail with [`PrepareError::NotFound`] when a map has no definition
    pub require_definitions: bool,
}

impl MapSources {
    pub fn new(
        documents: impl TileDocumentProvider + 'static,
        tilesets: impl TilesetLoader + 'static,
        definitions: impl MapDefinitionLookup + 'static,
    ) -> Self {
        Self {
            documents: Arc::new(documents),
            tilesets: Arc::new(tilesets),
            definitions: Arc::new(definitions),
            require_definitions: false,
        }
    }

    /// TMX maps under `root` with external TSX tilesets.
    pub fn tiled(root: impl Into<PathBuf>, definitions: InMemoryDefinitions) -> Self {
        Self::new(TmxDocumentProvider::new(root), TsxTilesetLoader, definitions)
    }

    pub fn with_required_definitions(mut self, required: bool) -> Self {
        self.require_definitions = required;
        self
    }
}

/// Where a prepared map's top-left corner goes, in pixels (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// A fixed world position.
    At(Vec2),
    /// Flush against one side of an already placed map.
    ///
    /// Resolved once the new map's size is known, so north and west
    /// neighbors line up regardless of their dimensions.
    Adjacent {
        /// Side of the placed map the new map lies on
        direction: Direction,
        /// Top-left corner of the placed map
        origin: Vec2,
        /// Pixel size of the placed map
        size: Vec2,
        /// Shift along the shared edge, in pixels
        offset: f32,
    },
}

impl Placement {
    /// World offset for a map of `map_size` pixels.
    pub fn resolve(self, map_size: Vec2) -> Vec2 {
        match self {
            Placement::At(offset) => offset,
            Placement::Adjacent {
                direction,
                origin,
                size,
                offset,
            } => match direction {
                Direction::North => Vec2::new(origin.x + offset, origin.y - map_size.y),
                Direction::South => Vec2::new(origin.x + offset, origin.y + size.y),
                Direction::East => Vec2::new(origin.x + size.x, origin.y + offset),
                Direction::West => Vec2::new(origin.x - map_size.x, origin.y + offset),
            },
        }
    }
}

impl From<Vec2> for Placement {
    fn from(offset: Vec2) -> Self {
        Placement::At(offset)
    }
}

fn ensure_not_cancelled(map_id: &MapId, cancel: &CancellationToken) -> Result<(), PrepareError> {
    if cancel.is_cancelled() {
        return Err(PrepareError::Cancelled(map_id.clone()));
    }
    Ok(())
}

/// Load and precompute everything needed to materialize `map_id`.
pub async fn prepare_map(
    sources: &MapSources,
    map_id: &MapId,
    placement: Placement,
    cancel: &CancellationToken,
) -> Result<PreparedMapData, PrepareError> {
    let start = Instant::now();
    ensure_not_cancelled(map_id, cancel)?;

    let definition = sources.definitions.get_map(map_id);
    if definition.is_none() && sources.require_definitions {
        return Err(PrepareError::NotFound(map_id.clone()));
    }

    let document = sources
        .documents
        .load(map_id)
        .await
        .map_err(|e| PrepareError::from_source(map_id, e))?;
    ensure_not_cancelled(map_id, cancel)?;

    let mut tilesets = sources
        .tilesets
        .load_tilesets(&document, &document.path, cancel)
        .await
        .map_err(|e| PrepareError::from_source(map_id, e))?;
    ensure_not_cancelled(map_id, cancel)?;

    // Binary search over first gids needs them ascending
    tilesets.sort_by_key(|tileset| tileset.first_gid);
    let tileset_ids: Vec<Arc<str>> = tilesets
        .iter()
        .map(|tileset| Arc::from(tileset.id.as_str()))
        .collect();

    let PreparedTiles { tiles, used_gids } = prepare_tiles(&document, &tilesets, &tileset_ids);

    let prepared_tilesets: Vec<PreparedTileset> = tilesets
        .iter()
        .zip(&tileset_ids)
        .map(|(tileset, id)| PreparedTileset {
            id: id.clone(),
            first_gid: tileset.first_gid,
            last_gid: tileset.last_gid(),
            tile_width: tileset.tile_width,
            tile_height: tileset.tile_height,
            columns: atlas_columns(tileset),
            spacing: tileset.spacing,
            margin: tileset.margin,
            image: tileset.image.as_ref().map(|image| image.path.clone()),
            image_width: tileset.image.as_ref().map_or(0, |image| image.width),
            image_height: tileset.image.as_ref().map_or(0, |image| image.height),
        })
        .collect();

    let animated_tiles = prepare_animated_tiles(&tilesets, &tileset_ids, &used_gids);
    let connections = resolve_connections(&document.properties, definition.as_ref());
    let border = prepare_border(&document.properties, definition.as_ref(), &prepared_tilesets);
    let metadata = map_metadata(&document.properties, definition.as_ref());

    let pixel_size = Vec2::new(
        (document.width * document.tile_width) as f32,
        (document.height * document.tile_height) as f32,
    );

    let prepared = PreparedMapData {
        map_id: map_id.clone(),
        display_name: metadata.display_name,
        world_offset: placement.resolve(pixel_size),
        width: document.width,
        height: document.height,
        tile_width: document.tile_width,
        tile_height: document.tile_height,
        tiles,
        tilesets: prepared_tilesets,
        border,
        animated_tiles,
        connections,
        image_layers: prepare_image_layers(&document),
        objects: prepare_objects(&document),
        region: metadata.region,
        music: metadata.music,
        show_map_name: metadata.show_map_name,
        properties: document.properties,
    };

    info!(
        "Prepared map '{}': {} tiles, {} tilesets, {} connections in {} ms",
        map_id,
        prepared.tiles.len(),
        prepared.tilesets.len(),
        prepared.connections.len(),
        start.elapsed().as_millis()
    );

    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_placement() {
        let placement = Placement::from(Vec2::new(10.0, 20.0));
        assert_eq!(placement.resolve(Vec2::new(99.0, 99.0)), Vec2::new(10.0, 20.0));
    }

    #[test]
    fn test_adjacent_placement_uses_new_map_size_for_north_and_west() {
        let adjacent = |direction| Placement::Adjacent {
            direction,
            origin: Vec2::new(100.0, 100.0),
            size: Vec2::new(320.0, 160.0),
            offset: 48.0,
        };
        let new_size = Vec2::new(64.0, 32.0);

        assert_eq!(
            adjacent(Direction::North).resolve(new_size),
            Vec2::new(148.0, 68.0)
        );
        assert_eq!(
            adjacent(Direction::South).resolve(new_size),
            Vec2::new(148.0, 260.0)
        );
        assert_eq!(
            adjacent(Direction::East).resolve(new_size),
            Vec2::new(420.0, 148.0)
        );
        assert_eq!(
            adjacent(Direction::West).resolve(new_size),
            Vec2::new(36.0, 148.0)
        );
    }
}
