//! # `bevy_mapstream_core`
//!
//! Map streaming for `bevy_mapstream`: prepares maps in the background, keeps
//! the results in an LRU cache and materializes them into the ECS world on the
//! main thread.
//!
//! **This crate does NOT parse map files or render anything.** Documents,
//! tilesets and textures come in through the provider traits of
//! `bevy_mapstream_assets`; rendering plugs in by querying the components.
//!
//! ## Pipeline
//!
//! 1. [`MapPreparer`](preparer::MapPreparer) receives a request for a map id. A
//!    cached result is returned directly; otherwise the request joins the
//!    preparation already in flight for that map, or starts one.
//! 2. The preparation (see [`prepare`]) runs on the `AsyncComputeTaskPool`: it
//!    loads the document and tilesets, decodes every tile, assigns elevations
//!    and resolves connections into a [`PreparedMapData`](prepared::PreparedMapData).
//! 3. [`MapEntityApplier`](applier::MapEntityApplier) spawns the entities for
//!    a prepared map and registers them with [`SpatialIndex`](spatial::SpatialIndex)
//!    and [`MapLifecycle`](lifecycle::MapLifecycle).
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bevy::prelude::*;
//! use bevy_mapstream_assets::prelude::*;
//! use bevy_mapstream_core::prelude::*;
//! use futures::executor::block_on;
//!
//! fn enter_map(world: &mut World) {
//!     let preparer = world.resource::<MapPreparer>().clone();
//!     let token = CancellationToken::new();
//!     match block_on(preparer.prepare("littleroot_town", Vec2::ZERO, &token)) {
//!         Ok(prepared) => {
//!             if let Err(e) = apply_prepared_map(world, &prepared) {
//!                 error!("Staying on the current map: {}", e);
//!                 return;
//!             }
//!             preparer.prefetch_neighbors(&prepared);
//!         }
//!         Err(e) => error!("Staying on the current map: {}", e),
//!     }
//! }
//! ```

pub mod applier;
pub mod cache;
pub mod components;
pub mod error;
pub mod lifecycle;
pub mod plugin;
pub mod prepare;
pub mod prepared;
pub mod preparer;
pub mod properties;
pub mod spatial;

#[cfg(test)]
mod testing;

pub mod prelude {
    //! Common imports for `bevy_mapstream_core` users.

    pub use crate::applier::{MapEntityApplier, MapRootHandle, apply_prepared_map, unload_map};
    pub use crate::cache::LruCache;
    pub use crate::components::*;
    pub use crate::error::{ApplyError, CacheError, PrepareError};
    pub use crate::lifecycle::{MapLifecycle, UnloadedMap};
    pub use crate::plugin::{MapStreamConfig, MapStreamPlugin};
    pub use crate::prepare::{MapSources, Placement};
    pub use crate::prepared::{
        Direction, ObjectKind, PreparedAnimatedTile, PreparedBorder, PreparedConnection,
        PreparedImageLayer, PreparedMapData, PreparedObject, PreparedTile, PreparedTileset,
    };
    pub use crate::preparer::{
        CacheStats, MapPreparer, PrefetchFailure, PrefetchHandle, PrefetchOutcome,
    };
    pub use crate::spatial::SpatialIndex;
}

// Re-export plugin types at crate root for convenience
pub use plugin::{MapStreamConfig, MapStreamPlugin};
