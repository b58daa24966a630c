//! Interfaces to the systems map preparation depends on.
//!
//! Document parsing, tileset loading, static map metadata and texture upload all
//! live outside the preparation pipeline. These traits are the seams where a game
//! plugs its own implementations in; the `tiled`-backed ones in
//! [`loaders`](crate::loaders) cover the common TMX/TSX case.
//!
//! Async methods return a boxed future so the traits stay object safe and can be
//! shared across the background task pool as `Arc<dyn ...>`.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::definition::MapDefinition;
use crate::document::{MapId, TileDocument};
use crate::tileset::LoadedTileset;

/// Failure reported by a document provider or tileset loader.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("No document found for map '{0}'")]
    NotFound(MapId),

    #[error("Failed to parse tile document: {0}")]
    Tiled(#[from] tiled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid tileset '{name}': {reason}")]
    InvalidTileset { name: String, reason: String },

    #[error("Failed to parse map definitions: {0}")]
    Definitions(#[from] serde_json::Error),

    #[error("Loading was cancelled")]
    Cancelled,
}

/// Failure reported by a [`TextureProvider`].
#[derive(Debug, Error)]
pub enum TextureError {
    #[error("Texture '{id}' could not be read from {path}: {source}")]
    Io {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Texture '{id}' could not be decoded: {reason}")]
    Decode { id: String, reason: String },
}

/// Loads and parses the tile-map document of a map.
pub trait TileDocumentProvider: Send + Sync {
    /// Load the document for `map_id`.
    ///
    /// Fails with [`SourceError::NotFound`] when the map has no document.
    fn load<'a>(&'a self, map_id: &'a MapId) -> BoxFuture<'a, Result<TileDocument, SourceError>>;
}

/// Resolves and loads the tilesets referenced by a document.
pub trait TilesetLoader: Send + Sync {
    /// Load every tileset referenced by `document`.
    ///
    /// `map_path` is the path tileset sources are relative to. Implementations
    /// should stop early with [`SourceError::Cancelled`] once `cancel` fires.
    fn load_tilesets<'a>(
        &'a self,
        document: &'a TileDocument,
        map_path: &'a Path,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<LoadedTileset>, SourceError>>;
}

/// Static map metadata keyed by map id.
pub trait MapDefinitionLookup: Send + Sync {
    fn get_map(&self, map_id: &MapId) -> Option<MapDefinition>;
}

/// Texture storage used while materializing maps.
///
/// Textures are normally uploaded ahead of time; `load_texture` is the blocking
/// fallback used when that has not happened yet.
pub trait TextureProvider: Send + Sync {
    fn has_texture(&self, id: &str) -> bool;

    /// Synchronously load a texture from disk.
    fn load_texture(&mut self, id: &str, path: &Path) -> Result<(), TextureError>;

    /// Drop a texture no live map references anymore.
    fn release_texture(&mut self, _id: &str) {}
}
