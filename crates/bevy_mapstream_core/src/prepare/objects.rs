//! Everything besides tiles and connections: image layers, objects, border,
//! tile animations and map metadata.

use std::sync::Arc;

use bevy::{platform::collections::HashSet, prelude::*};
use bevy_mapstream_assets::gid::GID_MASK;
use bevy_mapstream_assets::{
    DocumentLayer, LoadedTileset, MapDefinition, TileDocument, resolve_relative_path,
};
use tiled::{Properties, PropertyValue};

use super::elevation::clamp_elevation;
use super::tiles::source_rect;
use crate::prepared::{
    ObjectKind, PreparedAnimatedTile, PreparedBorder, PreparedImageLayer, PreparedObject,
    PreparedTileset,
};
use crate::properties::{non_empty_string, property};

pub(crate) fn prepare_image_layers(document: &TileDocument) -> Vec<PreparedImageLayer> {
    document
        .layers
        .iter()
        .filter_map(|layer| match layer {
            DocumentLayer::Image(image_layer) => Some(image_layer),
            _ => None,
        })
        .map(|layer| PreparedImageLayer {
            id: layer.id,
            name: layer.name.clone(),
            image: layer.image.as_ref().and_then(|image| {
                resolve_relative_path(&document.path, image)
                    .inspect_err(|e| warn!("Image layer '{}': {}", layer.name, e))
                    .ok()
            }),
            offset: layer.offset,
            properties: layer.properties.clone(),
        })
        .collect()
}

pub(crate) fn prepare_objects(document: &TileDocument) -> Vec<PreparedObject> {
    let mut objects = Vec::new();

    for layer in &document.layers {
        let DocumentLayer::Objects(group) = layer else {
            continue;
        };

        objects.extend(group.objects.iter().map(|object| {
            let kind = ObjectKind::from_type(&object.user_type);
            PreparedObject {
                id: object.id,
                name: object.name.clone(),
                elevation: object_elevation(&kind, &object.properties),
                kind,
                group: group.name.clone(),
                position: Vec2::new(object.x, object.y),
                size: Vec2::new(object.width, object.height),
                properties: object.properties.clone(),
            }
        }));
    }

    objects
}

/// Top-level `elevation`, else the `elevation` field of the object's only
/// class property (triggers, signs and hidden items nest it there). A warp's
/// nested elevation belongs to its destination and is ignored.
fn object_elevation(kind: &ObjectKind, properties: &Properties) -> Option<u8> {
    if let Some(elevation) = property::<i64>(properties, "elevation") {
        return Some(clamp_elevation(elevation));
    }
    if *kind == ObjectKind::Warp {
        return None;
    }

    let mut classes = properties.values().filter_map(|value| match value {
        PropertyValue::ClassValue { properties, .. } => Some(properties),
        _ => None,
    });
    match (classes.next(), classes.next()) {
        (Some(fields), None) => property::<i64>(fields, "elevation").map(clamp_elevation),
        _ => None,
    }
}

const BORDER_CORNERS: [&str; 4] = ["top_left", "top_right", "bottom_left", "bottom_right"];

/// Border gids from the `border` class property, falling back to the definition.
pub(crate) fn prepare_border(
    properties: &Properties,
    definition: Option<&MapDefinition>,
    tilesets: &[PreparedTileset],
) -> Option<PreparedBorder> {
    let (bottom, top) = match properties.get("border") {
        Some(PropertyValue::ClassValue {
            properties: fields, ..
        }) => {
            let corner = |name: &str| property::<u32>(fields, name).unwrap_or(0);
            let bottom = BORDER_CORNERS.map(corner);
            let top = BORDER_CORNERS.map(|name| corner(&format!("{name}_top")));
            (bottom, top)
        }
        _ => {
            let border = definition?.border?;
            (border.bottom, border.top)
        }
    };

    let tileset_id = definition
        .and_then(|def| def.border_tileset.clone())
        .or_else(|| non_empty_string(properties, "border_tileset"))
        .or_else(|| {
            let gid = bottom.iter().chain(&top).map(|raw| raw & GID_MASK).find(|&gid| gid != 0)?;
            tilesets
                .iter()
                .find(|tileset| tileset.contains_gid(gid))
                .map(|tileset| tileset.id.to_string())
        });

    Some(PreparedBorder {
        bottom: [[bottom[0], bottom[1]], [bottom[2], bottom[3]]],
        top: [[top[0], top[1]], [top[2], top[3]]],
        tileset_id,
    })
}

/// Animations of tiles that actually appear on the map, sorted by gid.
pub(crate) fn prepare_animated_tiles(
    tilesets: &[LoadedTileset],
    tileset_ids: &[Arc<str>],
    used_gids: &HashSet<u32>,
) -> Vec<PreparedAnimatedTile> {
    let mut animated = Vec::new();

    for (tileset, tileset_id) in tilesets.iter().zip(tileset_ids) {
        for (local_id, metadata) in &tileset.tiles {
            let Some(frames) = metadata.animation.as_ref().filter(|frames| !frames.is_empty())
            else {
                continue;
            };
            let gid = tileset.first_gid + local_id;
            if !used_gids.contains(&gid) {
                continue;
            }

            let durations_ms: Vec<u32> = frames.iter().map(|frame| frame.duration_ms).collect();
            animated.push(PreparedAnimatedTile {
                gid,
                tileset_id: tileset_id.clone(),
                frames: frames
                    .iter()
                    .map(|frame| source_rect(tileset, frame.tile_id))
                    .collect(),
                cycle_ms: durations_ms.iter().sum(),
                durations_ms,
            });
        }
    }

    animated.sort_by_key(|tile| tile.gid);
    animated
}

#[derive(Debug, Default, PartialEq)]
pub(crate) struct MapMetadata {
    pub display_name: Option<String>,
    pub region: Option<String>,
    pub music: Option<String>,
    pub show_map_name: bool,
}

/// Map metadata from document properties, then the definition.
pub(crate) fn map_metadata(
    properties: &Properties,
    definition: Option<&MapDefinition>,
) -> MapMetadata {
    let first_string = |names: &[&str]| {
        names
            .iter()
            .find_map(|name| non_empty_string(properties, name))
    };

    MapMetadata {
        display_name: first_string(&["display_name", "displayName"])
            .or_else(|| definition.and_then(|def| def.display_name.clone())),
        region: first_string(&["region", "region_map_section"])
            .or_else(|| definition.and_then(|def| def.region.clone())),
        music: first_string(&["music"]).or_else(|| definition.and_then(|def| def.music.clone())),
        show_map_name: property::<bool>(properties, "show_map_name")
            .or_else(|| definition.map(|def| def.show_map_name))
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bevy_mapstream_assets::{
        AnimationFrame, BorderDefinition, DocumentObject, ImageLayerDocument, MapId,
        ObjectGroupDocument, TileMetadata,
    };

    use super::*;
    use crate::prepare::tiles::tests::tileset;

    fn prepared_tileset(id: &str, first_gid: u32, last_gid: u32) -> PreparedTileset {
        PreparedTileset {
            id: Arc::from(id),
            first_gid,
            last_gid,
            tile_width: 16,
            tile_height: 16,
            columns: 4,
            spacing: 0,
            margin: 0,
            image: Some(PathBuf::from(format!("{id}.png"))),
            image_width: 64,
            image_height: 64,
        }
    }

    #[test]
    fn test_border_from_class_property() {
        let mut fields = Properties::new();
        for (i, corner) in BORDER_CORNERS.iter().enumerate() {
            fields.insert(corner.to_string(), PropertyValue::IntValue(20 + i as i32));
            fields.insert(format!("{corner}_top"), PropertyValue::IntValue(0));
        }
        let mut properties = Properties::new();
        properties.insert(
            "border".into(),
            PropertyValue::ClassValue {
                property_type: "Border".into(),
                properties: fields,
            },
        );
        let tilesets = [prepared_tileset("a", 1, 16), prepared_tileset("b", 17, 32)];

        let border = prepare_border(&properties, None, &tilesets).unwrap();

        assert_eq!(border.bottom, [[20, 21], [22, 23]]);
        assert_eq!(border.top, [[0, 0], [0, 0]]);
        assert_eq!(border.tileset_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_border_from_definition() {
        let definition = MapDefinition {
            border_tileset: Some("general".into()),
            border: Some(BorderDefinition {
                bottom: [1, 2, 3, 4],
                top: [5, 6, 7, 8],
            }),
            ..Default::default()
        };

        let border = prepare_border(&Properties::new(), Some(&definition), &[]).unwrap();
        assert_eq!(border.top, [[5, 6], [7, 8]]);
        assert_eq!(border.tileset_id.as_deref(), Some("general"));

        assert!(prepare_border(&Properties::new(), None, &[]).is_none());
    }

    #[test]
    fn test_only_used_animations_are_kept() {
        let mut set = tileset("town", 1, 16);
        for local_id in [3, 9] {
            set.tiles.insert(
                local_id,
                TileMetadata {
                    properties: Properties::new(),
                    animation: Some(vec![
                        AnimationFrame {
                            tile_id: local_id,
                            duration_ms: 200,
                        },
                        AnimationFrame {
                            tile_id: 7,
                            duration_ms: 300,
                        },
                    ]),
                },
            );
        }
        let ids = vec![Arc::from("town")];
        let used: HashSet<u32> = [4].into_iter().collect();

        let animated = prepare_animated_tiles(&[set], &ids, &used);

        assert_eq!(animated.len(), 1);
        assert_eq!(animated[0].gid, 4);
        assert_eq!(animated[0].cycle_ms, 500);
        assert_eq!(animated[0].frames[1], URect::new(48, 16, 64, 32));
    }

    #[test]
    fn test_metadata_prefers_document_properties() {
        let mut properties = Properties::new();
        properties.insert(
            "displayName".into(),
            PropertyValue::StringValue("Littleroot Town".into()),
        );
        properties.insert("show_map_name".into(), PropertyValue::BoolValue(true));
        let definition = MapDefinition {
            display_name: Some("Ignored".into()),
            region: Some("hoenn".into()),
            music: Some("town.ogg".into()),
            ..Default::default()
        };

        let metadata = map_metadata(&properties, Some(&definition));

        assert_eq!(
            metadata,
            MapMetadata {
                display_name: Some("Littleroot Town".into()),
                region: Some("hoenn".into()),
                music: Some("town.ogg".into()),
                show_map_name: true,
            }
        );
        assert_eq!(map_metadata(&Properties::new(), None), MapMetadata::default());
    }

    #[test]
    fn test_objects_and_image_layers() {
        let mut object_properties = Properties::new();
        object_properties.insert("elevation".into(), PropertyValue::IntValue(40));
        let document = TileDocument {
            map_id: MapId::from("town"),
            path: PathBuf::from("maps/town.tmx"),
            width: 1,
            height: 1,
            tile_width: 16,
            tile_height: 16,
            tilesets: Vec::new(),
            layers: vec![
                DocumentLayer::Image(ImageLayerDocument {
                    id: 1,
                    name: "Sky".into(),
                    image: Some(PathBuf::from("../images/sky.png")),
                    offset: Vec2::new(0.0, -8.0),
                    properties: Properties::new(),
                }),
                DocumentLayer::Objects(ObjectGroupDocument {
                    id: 2,
                    name: "Events".into(),
                    objects: vec![DocumentObject {
                        id: 7,
                        name: "door".into(),
                        user_type: "warp_event".into(),
                        x: 32.0,
                        y: 16.0,
                        width: 16.0,
                        height: 16.0,
                        properties: object_properties,
                    }],
                    properties: Properties::new(),
                }),
            ],
            properties: Properties::new(),
        };

        let images = prepare_image_layers(&document);
        assert_eq!(images[0].image, Some(PathBuf::from("images/sky.png")));

        let objects = prepare_objects(&document);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].kind, ObjectKind::Warp);
        assert_eq!(objects[0].group, "Events");
        assert_eq!(objects[0].elevation, Some(15));
        assert_eq!(objects[0].position, Vec2::new(32.0, 16.0));
    }

    fn event(id: u32, user_type: &str, properties: Properties) -> DocumentObject {
        DocumentObject {
            id,
            name: String::new(),
            user_type: user_type.into(),
            x: 0.0,
            y: 0.0,
            width: 16.0,
            height: 16.0,
            properties,
        }
    }

    fn class_property(name: &str, property_type: &str, fields: Properties) -> Properties {
        let mut properties = Properties::new();
        properties.insert(
            name.into(),
            PropertyValue::ClassValue {
                property_type: property_type.into(),
                properties: fields,
            },
        );
        properties
    }

    #[test]
    fn test_elevation_nested_in_event_class() {
        let mut trigger = Properties::new();
        trigger.insert("elevation".into(), PropertyValue::IntValue(3));
        trigger.insert(
            "triggerScript".into(),
            PropertyValue::StringValue("scripts/route101/trigger_0.lua".into()),
        );
        let mut warp = Properties::new();
        warp.insert("elevation".into(), PropertyValue::IntValue(4));
        warp.insert("destMap".into(), PropertyValue::StringValue("house".into()));

        let document = TileDocument {
            map_id: MapId::from("route101"),
            path: PathBuf::from("maps/route101.tmx"),
            width: 1,
            height: 1,
            tile_width: 16,
            tile_height: 16,
            tilesets: Vec::new(),
            layers: vec![DocumentLayer::Objects(ObjectGroupDocument {
                id: 1,
                name: "Events".into(),
                objects: vec![
                    event(1, "trigger_event", class_property("trigger", "Trigger", trigger)),
                    event(2, "warp_event", class_property("warp", "Warp", warp)),
                ],
                properties: Properties::new(),
            })],
            properties: Properties::new(),
        };

        let objects = prepare_objects(&document);

        assert_eq!(objects[0].kind, ObjectKind::Trigger);
        assert_eq!(objects[0].elevation, Some(3));
        assert_eq!(objects[1].kind, ObjectKind::Warp);
        assert_eq!(objects[1].elevation, None);
    }
}
