//! Static map metadata.
//!
//! Map definitions hold data that is known ahead of loading any map document:
//! display names, region sections, music, and the static connection and border
//! fallbacks used when a document does not declare them itself.

use std::collections::BTreeMap;
use std::path::Path;

use bevy::platform::collections::HashMap;
use serde::Deserialize;

use crate::document::MapId;
use crate::providers::{MapDefinitionLookup, SourceError};

/// Static metadata for one map.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapDefinition {
    pub display_name: Option<String>,
    pub region: Option<String>,
    pub music: Option<String>,
    pub show_map_name: bool,
    /// Tileset used to draw the border gids
    pub border_tileset: Option<String>,
    pub border: Option<BorderDefinition>,
    pub connections: StaticConnections,
}

/// Border gids as two 2×2 grids, row-major (`[top_left, top_right, bottom_left, bottom_right]`).
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BorderDefinition {
    pub bottom: [u32; 4],
    pub top: [u32; 4],
}

/// Connection fallbacks, one optional entry per cardinal direction.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StaticConnections {
    pub north: Option<ConnectionDefinition>,
    pub south: Option<ConnectionDefinition>,
    pub east: Option<ConnectionDefinition>,
    pub west: Option<ConnectionDefinition>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ConnectionDefinition {
    pub map: MapId,
    #[serde(default)]
    pub offset: i32,
}

/// [`MapDefinitionLookup`] backed by a hash map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDefinitions {
    maps: HashMap<MapId, MapDefinition>,
}

impl InMemoryDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the definition of a map.
    pub fn insert(&mut self, map_id: impl Into<MapId>, definition: MapDefinition) -> &mut Self {
        self.maps.insert(map_id.into(), definition);
        self
    }

    /// Parse definitions from a JSON object keyed by map id.
    ///
    /// ```
    /// # use bevy_mapstream_assets::definition::InMemoryDefinitions;
    /// # use bevy_mapstream_assets::providers::MapDefinitionLookup;
    /// let defs = InMemoryDefinitions::from_json_str(r#"{
    ///     "town_a": { "display_name": "Town A", "connections": { "north": { "map": "route_1" } } }
    /// }"#).unwrap();
    /// assert!(defs.get_map(&"town_a".into()).is_some());
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, SourceError> {
        let parsed: BTreeMap<MapId, MapDefinition> = serde_json::from_str(json)?;
        Ok(Self {
            maps: parsed.into_iter().collect(),
        })
    }

    /// Read and parse a JSON definitions file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl MapDefinitionLookup for InMemoryDefinitions {
    fn get_map(&self, map_id: &MapId) -> Option<MapDefinition> {
        self.maps.get(map_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definitions() {
        let defs = InMemoryDefinitions::from_json_str(
            r#"{
                "town_a": {
                    "display_name": "Town A",
                    "region": "hoenn",
                    "show_map_name": true,
                    "border": { "bottom": [1, 2, 3, 4], "top": [5, 6, 7, 8] },
                    "connections": {
                        "north": { "map": "route_1", "offset": -2 },
                        "east": { "map": "route_2" }
                    }
                }
            }"#,
        )
        .unwrap();

        let town = defs.get_map(&MapId::new("town_a")).unwrap();
        assert_eq!(town.display_name.as_deref(), Some("Town A"));
        assert!(town.show_map_name);
        assert_eq!(town.border.unwrap().top, [5, 6, 7, 8]);

        let north = town.connections.north.unwrap();
        assert_eq!(north.map, MapId::new("route_1"));
        assert_eq!(north.offset, -2);
        assert_eq!(town.connections.east.unwrap().offset, 0);
        assert!(town.connections.south.is_none());
    }

    #[test]
    fn test_insert_replaces_parsed_definition() {
        let mut defs = InMemoryDefinitions::from_json_str(
            r#"{ "town_a": { "display_name": "Town A" }, "route_1": {} }"#,
        )
        .unwrap();
        assert_eq!(defs.len(), 2);

        defs.insert(
            "town_a",
            MapDefinition {
                music: Some("town.ogg".into()),
                ..Default::default()
            },
        );

        let town = defs.get_map(&MapId::new("town_a")).unwrap();
        assert_eq!(town.display_name, None);
        assert_eq!(town.music.as_deref(), Some("town.ogg"));
        assert_eq!(defs.get_map(&MapId::new("route_1")), Some(MapDefinition::default()));
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_unknown_map_is_none() {
        let defs = InMemoryDefinitions::new();
        assert!(defs.get_map(&MapId::new("nowhere")).is_none());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = InMemoryDefinitions::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, SourceError::Definitions(_)));
    }
}
