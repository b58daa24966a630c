//! Parsed tile-map documents.
//!
//! A [`TileDocument`] is the provider-neutral shape of a map file: layers of raw
//! global tile ids, tileset references with their first-gid boundaries, object
//! groups and named properties. Providers such as
//! [`TmxDocumentProvider`](crate::loaders::tmx::TmxDocumentProvider) produce it;
//! `bevy_mapstream_core` consumes it during background preparation.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use bevy::prelude::*;
use serde::Deserialize;
use tiled::Properties;

/// Identifier of a map, e.g. `"littleroot_town"`.
///
/// Cheap to clone: every prepared tile carries the id of its owning map.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(from = "String")]
pub struct MapId(Arc<str>);

impl MapId {
    /// Create a map id from anything string-like.
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MapId({:?})", &*self.0)
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MapId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MapId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

impl From<&MapId> for MapId {
    fn from(value: &MapId) -> Self {
        value.clone()
    }
}

impl AsRef<str> for MapId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A parsed tile-map document.
#[derive(Debug, Clone)]
pub struct TileDocument {
    /// The map this document describes
    pub map_id: MapId,

    /// Path of the source file; tileset sources are resolved relative to it
    pub path: PathBuf,

    /// Map size in tiles
    pub width: u32,
    pub height: u32,

    /// Tile size in pixels
    pub tile_width: u32,
    pub tile_height: u32,

    /// Tilesets referenced by the map, in document order
    pub tilesets: Vec<TilesetRef>,

    /// Content layers in document order (group layers already flattened)
    pub layers: Vec<DocumentLayer>,

    /// Map-level custom properties
    pub properties: Properties,
}

impl TileDocument {
    /// Iterate the tile layers only.
    pub fn tile_layers(&self) -> impl Iterator<Item = &TileLayerDocument> {
        self.layers.iter().filter_map(|layer| match layer {
            DocumentLayer::Tiles(tiles) => Some(tiles),
            _ => None,
        })
    }
}

/// Reference from a map to a tileset file.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetRef {
    /// First global tile id owned by the tileset
    pub first_gid: u32,
    /// Tileset source, relative to the map file
    pub source: PathBuf,
}

/// One content layer of a document.
#[derive(Debug, Clone)]
pub enum DocumentLayer {
    Tiles(TileLayerDocument),
    Image(ImageLayerDocument),
    Objects(ObjectGroupDocument),
}

/// A grid of raw global tile ids.
///
/// `data` is row-major (`index = y * width + x`). Each value keeps the flip
/// flags in its top three bits; `0` marks an empty cell.
#[derive(Debug, Clone)]
pub struct TileLayerDocument {
    pub id: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
    /// Layer pixel offset
    pub offset: Vec2,
    pub properties: Properties,
}

impl TileLayerDocument {
    /// Raw value at a cell, `None` when out of bounds.
    pub fn raw_gid(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }
}

#[derive(Debug, Clone)]
pub struct ImageLayerDocument {
    pub id: u32,
    pub name: String,
    /// Image source, relative to the map file
    pub image: Option<PathBuf>,
    pub offset: Vec2,
    pub properties: Properties,
}

#[derive(Debug, Clone)]
pub struct ObjectGroupDocument {
    pub id: u32,
    pub name: String,
    pub objects: Vec<DocumentObject>,
    pub properties: Properties,
}

/// A placed object (warp, trigger, NPC spawn marker, ...).
#[derive(Debug, Clone)]
pub struct DocumentObject {
    pub id: u32,
    pub name: String,
    /// The object's class/type string from the editor
    pub user_type: String,
    /// Position in pixels, relative to the map origin
    pub x: f32,
    pub y: f32,
    /// Zero for point objects
    pub width: f32,
    pub height: f32,
    pub properties: Properties,
}
