//! In-memory providers for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy_mapstream_assets::{
    CancellationToken, DocumentLayer, InMemoryDefinitions, LoadedTileset, MapId, SourceError,
    TextureError, TextureProvider, TileDocument, TileDocumentProvider, TileLayerDocument,
    TilesetLoader, TilesetRef,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use tiled::Properties;

use crate::prepare::MapSources;
use crate::prepare::tiles::tests::tileset;

#[derive(Clone, Default)]
pub(crate) struct LoadCounter(Arc<AtomicUsize>);

impl LoadCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Documents served from memory, optionally held until a gate opens.
#[derive(Default)]
pub(crate) struct FakeDocuments {
    documents: HashMap<MapId, TileDocument>,
    gate: Option<CancellationToken>,
    loads: LoadCounter,
    failures_left: Arc<AtomicUsize>,
}

impl FakeDocuments {
    pub fn with(mut self, document: TileDocument) -> Self {
        self.documents.insert(document.map_id.clone(), document);
        self
    }

    /// Hold every load until [`gate`](Self::gate) is cancelled.
    pub fn gated(mut self) -> Self {
        self.gate = Some(CancellationToken::new());
        self
    }

    pub fn gate(&self) -> CancellationToken {
        self.gate.clone().expect("documents are not gated")
    }

    /// Fail the first `count` loads with an I/O-style error.
    pub fn failing_first(self, count: usize) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn load_counter(&self) -> LoadCounter {
        self.loads.clone()
    }
}

impl TileDocumentProvider for FakeDocuments {
    fn load<'a>(&'a self, map_id: &'a MapId) -> BoxFuture<'a, Result<TileDocument, SourceError>> {
        async move {
            self.loads.0.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.cancelled().await;
            }

            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if failing {
                return Err(SourceError::InvalidPath("injected failure".into()));
            }

            self.documents
                .get(map_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(map_id.clone()))
        }
        .boxed()
    }
}

/// Every document uses the same 16-tile "test" tileset.
pub(crate) struct FakeTilesets;

impl TilesetLoader for FakeTilesets {
    fn load_tilesets<'a>(
        &'a self,
        document: &'a TileDocument,
        _map_path: &'a Path,
        _cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<LoadedTileset>, SourceError>> {
        async move {
            Ok(document
                .tilesets
                .iter()
                .map(|reference| {
                    let id = reference
                        .source
                        .file_stem()
                        .and_then(|stem| stem.to_str())
                        .unwrap_or("test");
                    tileset(id, reference.first_gid, 16)
                })
                .collect())
        }
        .boxed()
    }
}

pub(crate) fn sources_with(documents: FakeDocuments) -> MapSources {
    MapSources::new(documents, FakeTilesets, InMemoryDefinitions::new())
}

/// `size`×`size` single "Ground" layer filled with gid 1 of the "test" tileset.
pub(crate) fn square_document(id: &str, size: u32) -> TileDocument {
    TileDocument {
        map_id: MapId::from(id),
        path: PathBuf::from(format!("maps/{id}.tmx")),
        width: size,
        height: size,
        tile_width: 16,
        tile_height: 16,
        tilesets: vec![TilesetRef {
            first_gid: 1,
            source: PathBuf::from("test.tsx"),
        }],
        layers: vec![DocumentLayer::Tiles(TileLayerDocument {
            id: 1,
            name: "Ground".into(),
            width: size,
            height: size,
            data: vec![1; (size * size) as usize],
            offset: Vec2::ZERO,
            properties: Properties::new(),
        })],
        properties: Properties::new(),
    }
}

/// Texture store that tracks loaded ids and can refuse specific ones.
#[derive(Default)]
pub(crate) struct FakeTextures {
    pub loaded: Vec<String>,
    pub broken: Vec<String>,
}

impl TextureProvider for FakeTextures {
    fn has_texture(&self, id: &str) -> bool {
        self.loaded.iter().any(|loaded| loaded == id)
    }

    fn load_texture(&mut self, id: &str, _path: &Path) -> Result<(), TextureError> {
        if self.broken.iter().any(|broken| broken == id) {
            return Err(TextureError::Decode {
                id: id.to_string(),
                reason: "corrupt image".into(),
            });
        }
        self.loaded.push(id.to_string());
        Ok(())
    }

    fn release_texture(&mut self, id: &str) {
        self.loaded.retain(|loaded| loaded != id);
    }
}
