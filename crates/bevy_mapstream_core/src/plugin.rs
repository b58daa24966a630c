//! Plugin for `bevy_mapstream_core`.

use std::path::Path;
use std::sync::Mutex;

use bevy::prelude::*;
use serde::Deserialize;

use crate::components::update_tile_animations;
use crate::lifecycle::MapLifecycle;
use crate::prepare::MapSources;
use crate::preparer::MapPreparer;
use crate::spatial::{DEFAULT_CELL_SIZE, SpatialIndex};

/// Configuration for [`MapStreamPlugin`].
///
/// Deserializable so games can keep it next to their other settings:
///
/// ```rust
/// use bevy_mapstream_core::MapStreamConfig;
///
/// let config: MapStreamConfig = serde_json::from_str(r#"{ "cache_capacity": 4 }"#).unwrap();
/// assert_eq!(config.cache_capacity, 4);
/// assert_eq!(config.spatial_cell_size, 128.0);
/// ```
#[derive(Resource, Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapStreamConfig {
    /// Maximum number of prepared maps kept in memory
    pub cache_capacity: usize,
    /// Side length of a spatial index cell, in pixels
    pub spatial_cell_size: f32,
    /// Treat maps without a static definition as missing
    pub require_definitions: bool,
}

impl Default for MapStreamConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 8,
            spatial_cell_size: DEFAULT_CELL_SIZE,
            require_definitions: false,
        }
    }
}

impl MapStreamConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&json)?)
    }
}

/// Plugin for map streaming.
///
/// Inserts [`MapStreamConfig`], [`SpatialIndex`] and [`MapLifecycle`], and adds
/// the systems that animate tiles and report failed prefetches. When built
/// [`with_sources`](Self::with_sources) it also creates the [`MapPreparer`]
/// resource; otherwise insert one yourself.
///
/// # Example
///
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_mapstream_assets::InMemoryDefinitions;
/// use bevy_mapstream_core::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(
///         MapStreamPlugin::new(MapStreamConfig::default())
///             .with_sources(MapSources::tiled("assets/maps", InMemoryDefinitions::new())),
///     )
///     .run();
/// ```
#[derive(Default)]
pub struct MapStreamPlugin {
    config: MapStreamConfig,
    // Taken once in `build`
    sources: Mutex<Option<MapSources>>,
}

impl MapStreamPlugin {
    pub fn new(config: MapStreamConfig) -> Self {
        Self {
            config,
            sources: Mutex::new(None),
        }
    }

    /// Create the [`MapPreparer`] resource from `sources` when the plugin is built.
    pub fn with_sources(self, sources: MapSources) -> Self {
        Self {
            config: self.config,
            sources: Mutex::new(Some(sources)),
        }
    }
}

impl Plugin for MapStreamPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone());
        app.insert_resource(SpatialIndex::new(self.config.spatial_cell_size));
        app.init_resource::<MapLifecycle>();

        let sources = self
            .sources
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sources) = sources {
            let required = sources.require_definitions || self.config.require_definitions;
            let sources = sources.with_required_definitions(required);
            match MapPreparer::new(sources, self.config.cache_capacity) {
                Ok(preparer) => {
                    app.insert_resource(preparer);
                }
                Err(e) => error!("Map streaming disabled: {}", e),
            }
        }

        app.add_systems(
            Update,
            (
                report_prefetch_failures.run_if(resource_exists::<MapPreparer>),
                update_tile_animations.run_if(resource_exists::<Time>),
            ),
        );
    }
}

/// Drains the prefetch failure channel once per frame.
///
/// Failures were already logged when they happened; games that want to react
/// to them should call [`MapPreparer::drain_prefetch_failures`] themselves and
/// skip this system.
pub fn report_prefetch_failures(preparer: Res<MapPreparer>) {
    let failures = preparer.drain_prefetch_failures();
    if !failures.is_empty() {
        debug!("{} prefetches failed since the last frame", failures.len());
    }
}
