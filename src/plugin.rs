//! Unified plugin for `bevy_mapstream`.

use std::path::PathBuf;

use bevy::prelude::*;

use bevy_mapstream_assets::InMemoryDefinitions;
use bevy_mapstream_core::prepare::MapSources;
use bevy_mapstream_core::{MapStreamConfig, MapStreamPlugin};

/// Adds [`MapStreamPlugin`] with TMX/TSX sources read from disk.
///
/// # Example
///
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_mapstream::prelude::*;
///
/// App::new()
///     .add_plugins(MinimalPlugins)
///     .add_plugins(
///         BevyMapstreamPlugin::default()
///             .with_maps("assets/maps")
///             .with_core(MapStreamConfig {
///                 cache_capacity: 4,
///                 ..default()
///             }),
///     )
///     .run();
/// ```
#[derive(Default, Clone)]
pub struct BevyMapstreamPlugin {
    /// Core configuration
    pub core: MapStreamConfig,

    /// Directory holding `<map_id>.tmx` files. Without it no `MapPreparer` is created.
    pub maps_root: Option<PathBuf>,

    /// JSON file of static map definitions
    pub definitions: Option<PathBuf>,
}

impl BevyMapstreamPlugin {
    /// Create with custom core configuration
    pub fn with_core(mut self, config: MapStreamConfig) -> Self {
        self.core = config;
        self
    }

    pub fn with_maps(mut self, root: impl Into<PathBuf>) -> Self {
        self.maps_root = Some(root.into());
        self
    }

    pub fn with_definitions(mut self, path: impl Into<PathBuf>) -> Self {
        self.definitions = Some(path.into());
        self
    }

    fn definitions(&self) -> InMemoryDefinitions {
        let Some(path) = &self.definitions else {
            return InMemoryDefinitions::new();
        };
        match InMemoryDefinitions::from_path(path) {
            Ok(definitions) => {
                info!(
                    "Loaded {} map definitions from {}",
                    definitions.len(),
                    path.display()
                );
                definitions
            }
            Err(e) => {
                error!(
                    "Failed to load map definitions from {}: {}",
                    path.display(),
                    e
                );
                InMemoryDefinitions::new()
            }
        }
    }
}

impl Plugin for BevyMapstreamPlugin {
    fn build(&self, app: &mut App) {
        let mut plugin = MapStreamPlugin::new(self.core.clone());
        if let Some(root) = &self.maps_root {
            plugin = plugin.with_sources(MapSources::tiled(root.clone(), self.definitions()));
        }
        app.add_plugins(plugin);

        info!("BevyMapstreamPlugin initialized");
    }
}
