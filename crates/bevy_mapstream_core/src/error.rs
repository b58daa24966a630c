//! Error types for cache construction, map preparation and materialization.

use std::sync::Arc;

use bevy_mapstream_assets::{MapId, SourceError};
use thiserror::Error;

/// Invalid cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("Cache capacity must be at least 1")]
    ZeroCapacity,
}

/// Failure of a map preparation.
///
/// Every caller awaiting the same preparation receives a clone of the same
/// error, so non-clonable sources are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum PrepareError {
    #[error("Map '{0}' has no document")]
    NotFound(MapId),

    #[error("Failed to load map '{map_id}': {source}")]
    Load {
        map_id: MapId,
        #[source]
        source: Arc<SourceError>,
    },

    #[error("Preparation of map '{0}' was cancelled")]
    Cancelled(MapId),

    /// The background task went away without producing a result.
    #[error("Preparation of map '{0}' ended without a result")]
    Abandoned(MapId),
}

impl PrepareError {
    pub(crate) fn from_source(map_id: &MapId, error: SourceError) -> Self {
        match error {
            SourceError::NotFound(_) => Self::NotFound(map_id.clone()),
            SourceError::Cancelled => Self::Cancelled(map_id.clone()),
            other => Self::Load {
                map_id: map_id.clone(),
                source: Arc::new(other),
            },
        }
    }

    /// The map the failed preparation was for.
    pub fn map_id(&self) -> &MapId {
        match self {
            Self::NotFound(map_id)
            | Self::Cancelled(map_id)
            | Self::Abandoned(map_id)
            | Self::Load { map_id, .. } => map_id,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Failure of [`MapEntityApplier::apply`](crate::applier::MapEntityApplier::apply).
///
/// Texture failures are not errors: the affected tileset is skipped and
/// reported in [`MapRootHandle::skipped_tilesets`](crate::applier::MapRootHandle::skipped_tilesets).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApplyError {
    #[error("Map '{0}' is already applied; unload it first")]
    AlreadyApplied(MapId),

    #[error("Tile at ({x}, {y}) in map '{map_id}' references unknown tileset '{tileset_id}'")]
    UnknownTileset {
        map_id: MapId,
        tileset_id: String,
        x: u32,
        y: u32,
    },

    #[error("Tile at ({x}, {y}) lies outside the {width}x{height} map '{map_id}'")]
    TileOutOfBounds {
        map_id: MapId,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },

    #[error("No MapEntityApplier resource in the world")]
    MissingApplier,
}
