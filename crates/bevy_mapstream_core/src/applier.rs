//! Materialization of prepared maps into the ECS world.
//!
//! [`MapEntityApplier::apply`] turns one [`PreparedMapData`] into:
//!
//! - a root entity with [`MapInfo`] and the optional metadata components
//! - one [`TilesetInfo`] entity per usable tileset
//! - one entity per tile, created in a single batch
//!
//! and registers the new entities with [`SpatialIndex`] and [`MapLifecycle`].
//! It must run on the thread that owns the world, which is what an exclusive
//! system or [`apply_prepared_map`] gives you.

use std::sync::Arc;

use bevy::platform::collections::{HashMap, HashSet};
use bevy::prelude::*;
use bevy_mapstream_assets::{MapId, TextureProvider};

use crate::components::{
    BackgroundMusic, DisplayName, EastConnection, Elevation, LayerPixelOffset, MapBorder, MapInfo,
    MapMember, NorthConnection, RegionSection, ShowMapNameOnEntry, SouthConnection, TerrainType,
    TileAnimation, TilePosition, TileScript, TileSprite, TilesetInfo, WestConnection,
};
use crate::error::ApplyError;
use crate::lifecycle::{MapLifecycle, UnloadedMap};
use crate::prepared::{Direction, PreparedMapData, PreparedTile, PreparedTileset};
use crate::spatial::SpatialIndex;

/// Entities created for one applied map.
#[derive(Debug, Clone)]
pub struct MapRootHandle {
    pub map_id: MapId,
    pub root: Entity,
    /// In the order of [`PreparedMapData::tiles`], minus skipped tilesets
    pub tile_entities: Vec<Entity>,
    pub tileset_entities: Vec<Entity>,
    /// Tilesets whose texture could not be resolved; their tiles were not created
    pub skipped_tilesets: Vec<String>,
}

/// Creates and tears down the entities of prepared maps.
///
/// Holds the texture store so tilesets can be loaded synchronously when they
/// were not uploaded ahead of time.
#[derive(Resource)]
pub struct MapEntityApplier {
    textures: Box<dyn TextureProvider>,
}

impl MapEntityApplier {
    pub fn new(textures: impl TextureProvider + 'static) -> Self {
        Self {
            textures: Box::new(textures),
        }
    }

    pub fn textures(&self) -> &dyn TextureProvider {
        self.textures.as_ref()
    }

    /// Materialize `prepared` into `world`.
    ///
    /// The map is validated before anything is spawned, so an error leaves the
    /// world as it was. A tileset whose texture cannot be resolved is logged
    /// and skipped along with its tiles.
    pub fn apply(
        &mut self,
        world: &mut World,
        prepared: &PreparedMapData,
    ) -> Result<MapRootHandle, ApplyError> {
        world.init_resource::<SpatialIndex>();
        world.init_resource::<MapLifecycle>();

        if world.resource::<MapLifecycle>().is_live(&prepared.map_id) {
            return Err(ApplyError::AlreadyApplied(prepared.map_id.clone()));
        }
        validate_tiles(prepared)?;

        // (a) textures
        let mut resolved_textures = Vec::new();
        let mut skipped_tilesets = Vec::new();
        for tileset in &prepared.tilesets {
            match self.resolve_texture(tileset) {
                Ok(()) => resolved_textures.push(tileset.id.to_string()),
                Err(reason) => {
                    warn!(
                        "Skipping tileset '{}' of map '{}': {}",
                        tileset.id, prepared.map_id, reason
                    );
                    skipped_tilesets.push(tileset.id.to_string());
                }
            }
        }

        // (b) root
        let root = spawn_root(world, prepared);

        // (c) tileset metadata
        let mut tileset_entities = Vec::with_capacity(prepared.tilesets.len());
        for tileset in &prepared.tilesets {
            if !tileset.has_valid_geometry() {
                warn!(
                    "Tileset '{}' of map '{}' has invalid geometry ({}x{} tiles, {} columns, {}x{} image); not creating its info entity",
                    tileset.id,
                    prepared.map_id,
                    tileset.tile_width,
                    tileset.tile_height,
                    tileset.columns,
                    tileset.image_width,
                    tileset.image_height
                );
                continue;
            }
            let entity = world.spawn((tileset_info(tileset), MapMember(root))).id();
            tileset_entities.push(entity);
        }

        // (d) tiles
        let skipped: HashSet<&str> = skipped_tilesets.iter().map(String::as_str).collect();
        let tiles: Vec<&PreparedTile> = prepared
            .tiles
            .iter()
            .filter(|tile| !skipped.contains(tile.tileset_id.as_ref()))
            .collect();
        drop(skipped);
        let tile_entities = spawn_tiles(world, prepared, root, &tiles);

        // (e) animations
        let animations: HashMap<u32, _> = prepared
            .animated_tiles
            .iter()
            .map(|animated| (animated.gid, animated))
            .collect();
        let mut animated_count = 0;
        if !animations.is_empty() {
            for (&entity, tile) in tile_entities.iter().zip(&tiles) {
                let Some(animated) = animations.get(&tile.gid) else {
                    continue;
                };
                world.entity_mut(entity).insert(TileAnimation::new(
                    animated.frames.clone(),
                    animated.durations_ms.clone(),
                ));
                animated_count += 1;
            }
        }

        // (f) spatial index and ownership
        let tile_size = Vec2::new(prepared.tile_width as f32, prepared.tile_height as f32);
        world.resource_mut::<SpatialIndex>().insert_map(
            &prepared.map_id,
            tile_entities.iter().zip(&tiles).map(|(&entity, tile)| {
                let min = tile_world_position(prepared, tile) + tile.layer_offset.unwrap_or_default();
                (entity, Rect::from_corners(min, min + tile_size), tile.elevation)
            }),
        );

        let owned: Vec<Entity> = tileset_entities
            .iter()
            .chain(&tile_entities)
            .copied()
            .collect();
        world.resource_mut::<MapLifecycle>().track(
            prepared.map_id.clone(),
            root,
            owned,
            resolved_textures,
        );

        info!(
            "Applied map '{}': {} tiles ({} animated), {} tilesets, {} skipped",
            prepared.map_id,
            tile_entities.len(),
            animated_count,
            tileset_entities.len(),
            skipped_tilesets.len()
        );

        Ok(MapRootHandle {
            map_id: prepared.map_id.clone(),
            root,
            tile_entities,
            tileset_entities,
            skipped_tilesets,
        })
    }

    /// Despawn every entity of a live map and release textures no other live
    /// map uses. Returns `None` when the map is not live.
    pub fn unload(&mut self, world: &mut World, map_id: &MapId) -> Option<UnloadedMap> {
        let unloaded = world.get_resource_mut::<MapLifecycle>()?.untrack(map_id)?;

        let ownership = &unloaded.ownership;
        for &entity in ownership.entities.iter().chain([&ownership.root]) {
            if let Ok(entity_mut) = world.get_entity_mut(entity) {
                entity_mut.despawn();
            }
        }

        if let Some(mut spatial) = world.get_resource_mut::<SpatialIndex>() {
            spatial.remove_map(map_id);
        }
        for texture in &unloaded.released_textures {
            self.textures.release_texture(texture);
        }

        debug!(
            "Unloaded map '{}': {} entities, released {} textures",
            map_id,
            ownership.entities.len() + 1,
            unloaded.released_textures.len()
        );
        Some(unloaded)
    }

    fn resolve_texture(&mut self, tileset: &PreparedTileset) -> Result<(), String> {
        if self.textures.has_texture(&tileset.id) {
            return Ok(());
        }
        let Some(image) = &tileset.image else {
            return Err("tileset has no image".to_string());
        };
        debug!(
            "Texture '{}' not uploaded yet; loading {} synchronously",
            tileset.id,
            image.display()
        );
        self.textures
            .load_texture(&tileset.id, image)
            .map_err(|e| e.to_string())
    }
}

/// Apply `prepared` using the [`MapEntityApplier`] resource.
pub fn apply_prepared_map(
    world: &mut World,
    prepared: &PreparedMapData,
) -> Result<MapRootHandle, ApplyError> {
    if !world.contains_resource::<MapEntityApplier>() {
        return Err(ApplyError::MissingApplier);
    }
    world.resource_scope(|world, mut applier: Mut<MapEntityApplier>| {
        applier.apply(world, prepared)
    })
}

/// Unload `map_id` using the [`MapEntityApplier`] resource.
pub fn unload_map(world: &mut World, map_id: &MapId) -> Option<UnloadedMap> {
    if !world.contains_resource::<MapEntityApplier>() {
        return None;
    }
    world.resource_scope(|world, mut applier: Mut<MapEntityApplier>| {
        applier.unload(world, map_id)
    })
}

fn validate_tiles(prepared: &PreparedMapData) -> Result<(), ApplyError> {
    let known: HashSet<&str> = prepared
        .tilesets
        .iter()
        .map(|tileset| tileset.id.as_ref())
        .collect();

    for tile in &prepared.tiles {
        let UVec2 { x, y } = tile.position;
        if x >= prepared.width || y >= prepared.height {
            return Err(ApplyError::TileOutOfBounds {
                map_id: prepared.map_id.clone(),
                x,
                y,
                width: prepared.width,
                height: prepared.height,
            });
        }
        if !known.contains(tile.tileset_id.as_ref()) {
            return Err(ApplyError::UnknownTileset {
                map_id: prepared.map_id.clone(),
                tileset_id: tile.tileset_id.to_string(),
                x,
                y,
            });
        }
    }
    Ok(())
}

fn spawn_root(world: &mut World, prepared: &PreparedMapData) -> Entity {
    let mut root = world.spawn(MapInfo {
        map_id: prepared.map_id.clone(),
        name: prepared
            .display_name
            .clone()
            .unwrap_or_else(|| prepared.map_id.to_string()),
        width: prepared.width,
        height: prepared.height,
        tile_width: prepared.tile_width,
        tile_height: prepared.tile_height,
        world_offset: prepared.world_offset,
    });

    if let Some(name) = &prepared.display_name {
        root.insert(DisplayName(name.clone()));
    }
    if let Some(region) = &prepared.region {
        root.insert(RegionSection(region.clone()));
    }
    if let Some(music) = &prepared.music {
        root.insert(BackgroundMusic(music.clone()));
    }
    if prepared.show_map_name {
        root.insert(ShowMapNameOnEntry);
    }

    for connection in &prepared.connections {
        let target = connection.target.clone();
        let offset = connection.offset;
        match connection.direction {
            Direction::North => root.insert(NorthConnection { target, offset }),
            Direction::South => root.insert(SouthConnection { target, offset }),
            Direction::East => root.insert(EastConnection { target, offset }),
            Direction::West => root.insert(WestConnection { target, offset }),
        };
    }

    if let Some(border) = &prepared.border {
        root.insert(MapBorder {
            bottom: border.bottom,
            top: border.top,
            tileset_id: border.tileset_id.clone(),
        });
    }

    root.id()
}

fn tileset_info(tileset: &PreparedTileset) -> TilesetInfo {
    TilesetInfo {
        tileset_id: Arc::clone(&tileset.id),
        first_gid: tileset.first_gid,
        last_gid: tileset.last_gid,
        tile_size: UVec2::new(tileset.tile_width, tileset.tile_height),
        columns: tileset.columns,
        image_size: UVec2::new(tileset.image_width, tileset.image_height),
    }
}

fn tile_world_position(prepared: &PreparedMapData, tile: &PreparedTile) -> Vec2 {
    prepared.world_offset
        + Vec2::new(
            (tile.position.x * prepared.tile_width) as f32,
            (tile.position.y * prepared.tile_height) as f32,
        )
}

/// Spawn all tiles in one batch, then attach per-tile components.
fn spawn_tiles(
    world: &mut World,
    prepared: &PreparedMapData,
    root: Entity,
    tiles: &[&PreparedTile],
) -> Vec<Entity> {
    let mut bundles = Vec::with_capacity(tiles.len());
    for tile in tiles {
        bundles.push((
            TilePosition {
                grid: tile.position,
                world: tile_world_position(prepared, tile),
            },
            TileSprite {
                tileset_id: Arc::clone(&tile.tileset_id),
                gid: tile.gid,
                source_rect: tile.source_rect,
                flip_h: tile.flip_h,
                flip_v: tile.flip_v,
                flip_d: tile.flip_d,
            },
            MapMember(root),
        ));
    }
    let entities: Vec<Entity> = world.spawn_batch(bundles).collect();

    for (&entity, tile) in entities.iter().zip(tiles) {
        let mut entity_mut = world.entity_mut(entity);
        entity_mut.insert(Elevation(tile.elevation));
        if let Some(offset) = tile.layer_offset {
            entity_mut.insert(LayerPixelOffset(offset));
        }
        if let Some(terrain) = &tile.terrain_type {
            entity_mut.insert(TerrainType(terrain.clone()));
        }
        if let Some(script) = &tile.script {
            entity_mut.insert(TileScript(script.clone()));
        }
    }

    entities
}
