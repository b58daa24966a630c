//! Ownership of live maps: which entities and textures each applied map holds.

use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy_mapstream_assets::MapId;

/// Everything one applied map owns.
#[derive(Debug, Clone)]
pub struct MapOwnership {
    pub root: Entity,
    /// Tile and tileset entities, not including the root
    pub entities: Vec<Entity>,
    pub textures: Vec<String>,
}

/// What an unloaded map gave back.
#[derive(Debug, Clone)]
pub struct UnloadedMap {
    pub map_id: MapId,
    pub ownership: MapOwnership,
    /// Textures no other live map references anymore
    pub released_textures: Vec<String>,
}

/// Tracks live maps and reference-counts their textures.
///
/// Two maps sharing a tileset share its texture; the texture is only released
/// once the last of them is unloaded.
#[derive(Resource, Debug, Default)]
pub struct MapLifecycle {
    maps: HashMap<MapId, MapOwnership>,
    texture_refs: HashMap<String, usize>,
}

impl MapLifecycle {
    /// Start tracking a map. Tracking a map that is already live replaces its
    /// record and moves its texture references to the new one.
    pub fn track(
        &mut self,
        map_id: MapId,
        root: Entity,
        entities: Vec<Entity>,
        textures: Vec<String>,
    ) {
        if let Some(previous) = self.maps.remove(&map_id) {
            self.release(&previous.textures);
        }

        for texture in &textures {
            *self.texture_refs.entry(texture.clone()).or_default() += 1;
        }
        self.maps.insert(
            map_id,
            MapOwnership {
                root,
                entities,
                textures,
            },
        );
    }

    /// Stop tracking a map, returning what it owned.
    pub fn untrack(&mut self, map_id: &MapId) -> Option<UnloadedMap> {
        let ownership = self.maps.remove(map_id)?;
        let released_textures = self.release(&ownership.textures);
        Some(UnloadedMap {
            map_id: map_id.clone(),
            ownership,
            released_textures,
        })
    }

    pub fn is_live(&self, map_id: &MapId) -> bool {
        self.maps.contains_key(map_id)
    }

    pub fn get(&self, map_id: &MapId) -> Option<&MapOwnership> {
        self.maps.get(map_id)
    }

    pub fn entities(&self, map_id: &MapId) -> Option<&[Entity]> {
        self.maps
            .get(map_id)
            .map(|ownership| ownership.entities.as_slice())
    }

    pub fn root(&self, map_id: &MapId) -> Option<Entity> {
        self.maps.get(map_id).map(|ownership| ownership.root)
    }

    pub fn live_maps(&self) -> impl Iterator<Item = &MapId> {
        self.maps.keys()
    }

    pub fn live_count(&self) -> usize {
        self.maps.len()
    }

    pub fn texture_refs(&self, texture: &str) -> usize {
        self.texture_refs.get(texture).copied().unwrap_or(0)
    }

    fn release(&mut self, textures: &[String]) -> Vec<String> {
        let mut released = Vec::new();
        for texture in textures {
            let Some(count) = self.texture_refs.get_mut(texture) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.texture_refs.remove(texture);
                released.push(texture.clone());
            }
        }
        released
    }
}
