use std::path::PathBuf;

use bevy_mapstream_assets::gid::FLIP_H;
use bevy_mapstream_assets::prelude::*;
use bevy_mapstream_assets::{DocumentLayer, TilesetRef};
use futures::executor::block_on;
use tiled::PropertyValue;

fn fixtures() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_town() -> TileDocument {
    let provider = TmxDocumentProvider::new(fixtures());
    block_on(provider.load(&MapId::from("town"))).expect("town.tmx should load")
}

#[test]
fn test_tmx_document_shape() {
    let document = load_town();

    assert_eq!(document.map_id, MapId::from("town"));
    assert_eq!((document.width, document.height), (3, 2));
    assert_eq!((document.tile_width, document.tile_height), (16, 16));
    assert_eq!(
        document.tilesets,
        vec![TilesetRef {
            first_gid: 1,
            source: PathBuf::from("town.tsx"),
        }]
    );

    // Group layer is flattened: Ground, Overhead, Events
    let names: Vec<&str> = document
        .layers
        .iter()
        .map(|layer| match layer {
            DocumentLayer::Tiles(tiles) => tiles.name.as_str(),
            DocumentLayer::Image(image) => image.name.as_str(),
            DocumentLayer::Objects(group) => group.name.as_str(),
        })
        .collect();
    assert_eq!(names, vec!["Ground", "Overhead", "Events"]);
}

#[test]
fn test_tmx_raw_gids_keep_flip_flags() {
    let document = load_town();
    let ground = document.tile_layers().next().unwrap();

    assert_eq!(ground.raw_gid(0, 0), Some(1));
    assert_eq!(ground.raw_gid(1, 0), Some(2));
    assert_eq!(ground.raw_gid(2, 0), Some(0));
    assert_eq!(ground.raw_gid(0, 1), Some(3 | FLIP_H));
    assert_eq!(ground.raw_gid(3, 0), None);

    let overhead = document.tile_layers().nth(1).unwrap();
    assert_eq!(overhead.offset.y, -4.0);
    assert_eq!(overhead.raw_gid(1, 1), Some(5));
}

#[test]
fn test_tmx_objects_and_properties() {
    let document = load_town();

    assert_eq!(
        document.properties.get("display_name"),
        Some(&PropertyValue::StringValue("Town".to_string()))
    );
    assert!(matches!(
        document.properties.get("connection_north"),
        Some(PropertyValue::ClassValue { .. })
    ));

    let events = document
        .layers
        .iter()
        .find_map(|layer| match layer {
            DocumentLayer::Objects(group) => Some(group),
            _ => None,
        })
        .unwrap();
    let door = &events.objects[0];
    assert_eq!(door.name, "door");
    assert_eq!((door.x, door.y), (32.0, 16.0));
    assert_eq!((door.width, door.height), (16.0, 16.0));
    assert!(door.properties.contains_key("dest_map"));
}

#[test]
fn test_missing_map_is_not_found() {
    let provider = TmxDocumentProvider::new(fixtures());
    let err = block_on(provider.load(&MapId::from("nowhere"))).unwrap_err();
    assert!(matches!(err, SourceError::NotFound(id) if id.as_str() == "nowhere"));
}

#[test]
fn test_tsx_tileset_loading() {
    let document = load_town();
    let cancel = CancellationToken::new();

    let tilesets = block_on(TsxTilesetLoader.load_tilesets(&document, &document.path, &cancel))
        .expect("town.tsx should load");
    assert_eq!(tilesets.len(), 1);

    let town = &tilesets[0];
    assert_eq!(town.id, "town");
    assert_eq!(town.first_gid, 1);
    assert_eq!(town.last_gid(), 16);
    assert_eq!(town.columns, 4);

    let image = town.image.as_ref().unwrap();
    assert!(image.path.ends_with("town.png"));
    assert_eq!((image.width, image.height), (64, 64));

    assert!(town.tile(1).unwrap().properties.contains_key("terrain_type"));
    let frames = town.tile(3).unwrap().animation.as_ref().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!((frames[1].tile_id, frames[1].duration_ms), (7, 300));
}

#[test]
fn test_tsx_loading_stops_when_cancelled() {
    let document = load_town();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = block_on(TsxTilesetLoader.load_tilesets(&document, &document.path, &cancel))
        .unwrap_err();
    assert!(matches!(err, SourceError::Cancelled));
}
