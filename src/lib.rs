//! # bevy_mapstream
//!
//! Streaming tile maps for Bevy.
//!
//! This is a meta-crate that combines the `bevy_mapstream_*` sub-crates behind a
//! single plugin and prelude.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_mapstream::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins(MinimalPlugins)
//!         .add_plugins(
//!             BevyMapstreamPlugin::default()
//!                 .with_maps("assets/maps")
//!                 .with_definitions("assets/maps/definitions.json"),
//!         )
//!         .run();
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`assets`]: Map ids, documents, tilesets and the provider traits, with
//!   `tiled`-backed TMX/TSX providers
//! - [`core`]: Background preparation, the prepared-map cache and ECS
//!   materialization
//!
//! ## Using Individual Crates
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_mapstream_assets::InMemoryDefinitions;
//! use bevy_mapstream_core::prelude::*;
//!
//! App::new()
//!     .add_plugins(MinimalPlugins)
//!     .add_plugins(
//!         MapStreamPlugin::new(MapStreamConfig::default())
//!             .with_sources(MapSources::tiled("assets/maps", InMemoryDefinitions::new())),
//!     )
//!     .run();
//! ```

pub mod plugin;

// Re-export sub-crates for advanced usage
pub use bevy_mapstream_assets as assets;
pub use bevy_mapstream_core as core;

/// Unified prelude for `bevy_mapstream`.
pub mod prelude {
    pub use crate::assets::prelude::*;
    pub use crate::core::prelude::*;

    pub use crate::plugin::BevyMapstreamPlugin;
}
