//! # `bevy_mapstream_assets`
//!
//! Source layer for `bevy_mapstream`. Defines the raw data a map is built from and the
//! provider traits the streaming layer reads it through.
//!
//! **This crate does NOT prepare or spawn anything** - it only describes and loads sources.
//!
//! ## What this crate provides
//!
//! 1. **Raw documents**: [`TileDocument`] with gid-encoded tile layers, image layers and objects
//! 2. **Tilesets**: [`LoadedTileset`] geometry, per-tile metadata and animations
//! 3. **Map definitions**: [`MapDefinition`] static metadata (name, music, border, connections)
//! 4. **Provider traits**: [`TileDocumentProvider`], [`TilesetLoader`], [`MapDefinitionLookup`],
//!    [`TextureProvider`]
//! 5. **Tiled implementations**: [`TmxDocumentProvider`] and [`TsxTilesetLoader`] backed by the
//!    `tiled` crate
//! 6. **Cancellation**: [`CancellationToken`] shared by every async stage
//!
//! ## Example
//!
//! ```rust,no_run
//! use bevy_mapstream_assets::prelude::*;
//! use futures::executor::block_on;
//!
//! let provider = TmxDocumentProvider::new("assets/maps");
//! let document = block_on(provider.load(&MapId::from("littleroot_town"))).unwrap();
//! println!("{} layers", document.layers.len());
//! ```

pub mod cancel;
pub mod definition;
pub mod document;
pub mod gid;
pub mod loaders;
pub mod providers;
pub mod tileset;

pub use cancel::CancellationToken;
pub use definition::{
    BorderDefinition, ConnectionDefinition, InMemoryDefinitions, MapDefinition, StaticConnections,
};
pub use document::{
    DocumentLayer, DocumentObject, ImageLayerDocument, MapId, ObjectGroupDocument, TileDocument,
    TileLayerDocument, TilesetRef,
};
pub use loaders::{resolve_relative_path, tmx::TmxDocumentProvider, tsx::TsxTilesetLoader};
pub use providers::{
    MapDefinitionLookup, SourceError, TextureError, TextureProvider, TileDocumentProvider,
    TilesetLoader,
};
pub use tileset::{AnimationFrame, LoadedTileset, TileMetadata, TilesetImage};

pub mod prelude {
    //! Common imports for `bevy_mapstream_assets` users.

    pub use crate::cancel::CancellationToken;
    pub use crate::definition::{InMemoryDefinitions, MapDefinition};
    pub use crate::document::{DocumentLayer, MapId, TileDocument};
    pub use crate::loaders::{tmx::TmxDocumentProvider, tsx::TsxTilesetLoader};
    pub use crate::providers::{
        MapDefinitionLookup, SourceError, TextureError, TextureProvider, TileDocumentProvider,
        TilesetLoader,
    };
    pub use crate::tileset::LoadedTileset;
}
