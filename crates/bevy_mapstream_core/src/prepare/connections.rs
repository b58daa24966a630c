//! Connection resolution.
//!
//! A map declares its neighbors with one `connection_<direction>` property per
//! side. The value may be a class (`{map, offset}`), a JSON object string, a
//! bare map id with the offset in `connection_<direction>_offset`, or already
//! flattened into `connection_<direction>.map` / `connection_<direction>.offset`.
//! Sides the document leaves out fall back to the static map definition.

use bevy::prelude::*;
use bevy_mapstream_assets::{MapDefinition, MapId};
use serde::Deserialize;
use tiled::{Properties, PropertyValue};

use crate::prepared::{Direction, PreparedConnection};
use crate::properties::{non_empty_string, property};

#[derive(Deserialize)]
struct JsonConnection {
    map: String,
    #[serde(default)]
    offset: i32,
}

/// Resolve at most one connection per direction, in [`Direction::ALL`] order.
pub fn resolve_connections(
    properties: &Properties,
    definition: Option<&MapDefinition>,
) -> Vec<PreparedConnection> {
    Direction::ALL
        .into_iter()
        .filter_map(|direction| {
            connection_from_properties(properties, direction)
                .or_else(|| definition.and_then(|def| connection_from_definition(def, direction)))
        })
        .collect()
}

/// Read the connection for one side from map properties.
pub fn connection_from_properties(
    properties: &Properties,
    direction: Direction,
) -> Option<PreparedConnection> {
    let key = format!("connection_{}", direction.as_str());

    let (target, offset) = match properties.get(&key) {
        Some(PropertyValue::ClassValue {
            properties: fields, ..
        }) => (
            non_empty_string(fields, "map")?,
            property::<i32>(fields, "offset").unwrap_or(0),
        ),
        Some(PropertyValue::StringValue(value)) if value.trim_start().starts_with('{') => {
            match serde_json::from_str::<JsonConnection>(value) {
                Ok(parsed) => (parsed.map, parsed.offset),
                Err(e) => {
                    warn!("Ignoring malformed '{}' property: {}", key, e);
                    return None;
                }
            }
        }
        Some(PropertyValue::StringValue(value)) => (
            value.trim().to_string(),
            property::<i32>(properties, &format!("{key}_offset")).unwrap_or(0),
        ),
        _ => (
            non_empty_string(properties, &format!("{key}.map"))?,
            property::<i32>(properties, &format!("{key}.offset")).unwrap_or(0),
        ),
    };

    if target.trim().is_empty() {
        return None;
    }

    Some(PreparedConnection {
        direction,
        target: MapId::from(target.trim()),
        offset,
    })
}

fn connection_from_definition(
    definition: &MapDefinition,
    direction: Direction,
) -> Option<PreparedConnection> {
    let connections = &definition.connections;
    let connection = match direction {
        Direction::North => connections.north.as_ref(),
        Direction::South => connections.south.as_ref(),
        Direction::East => connections.east.as_ref(),
        Direction::West => connections.west.as_ref(),
    }?;

    Some(PreparedConnection {
        direction,
        target: connection.map.clone(),
        offset: connection.offset,
    })
}
