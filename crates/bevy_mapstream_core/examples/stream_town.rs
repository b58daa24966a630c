//! Headless walkthrough of the streaming pipeline.
//!
//! Prepares the `town` fixture map from disk, materializes it into a `World`,
//! prefetches its neighbors and prints what was created.

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use bevy_mapstream_assets::prelude::*;
use bevy_mapstream_core::prelude::*;
use futures::executor::block_on;

/// Pretends every texture uploads instantly.
#[derive(Default)]
struct Uploads(Vec<String>);

impl TextureProvider for Uploads {
    fn has_texture(&self, id: &str) -> bool {
        self.0.iter().any(|uploaded| uploaded == id)
    }

    fn load_texture(&mut self, id: &str, path: &Path) -> Result<(), TextureError> {
        info!("Uploading '{}' from {}", id, path.display());
        self.0.push(id.to_string());
        Ok(())
    }
}

fn main() {
    let maps =
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../bevy_mapstream_assets/tests/fixtures");

    let mut app = App::new();
    app.add_plugins(bevy::log::LogPlugin::default());
    app.add_plugins(
        MapStreamPlugin::new(MapStreamConfig::default())
            .with_sources(MapSources::tiled(maps, InMemoryDefinitions::new())),
    );
    app.insert_resource(MapEntityApplier::new(Uploads::default()));

    let world = app.world_mut();
    let preparer = world.resource::<MapPreparer>().clone();
    let prepared = match block_on(preparer.prepare("town", Vec2::ZERO, &CancellationToken::new())) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("Could not prepare town: {}", e);
            return;
        }
    };

    let handle = match apply_prepared_map(world, &prepared) {
        Ok(handle) => handle,
        Err(e) => {
            error!("Could not apply town: {}", e);
            return;
        }
    };
    info!(
        "'{}' is live with {} tiles",
        handle.map_id,
        handle.tile_entities.len()
    );

    // route_1 has no document in the fixtures, so this reports a failure
    for handle in preparer.prefetch_neighbors(&prepared) {
        let map_id = handle.map_id().clone();
        match block_on(handle.outcome()) {
            PrefetchOutcome::Failed(e) => warn!("Neighbor '{}' unavailable: {}", map_id, e),
            outcome => info!("Neighbor '{}': {:?}", map_id, outcome),
        }
    }

    let mut tiles = world.query::<(&TilePosition, &Elevation)>();
    for (position, elevation) in tiles.iter(world) {
        info!("tile {} at elevation {}", position.grid, elevation.0);
    }
}
