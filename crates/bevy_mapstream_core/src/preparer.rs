//! Background preparation with request deduplication and an LRU cache.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};

use bevy::platform::collections::HashMap;
use bevy::prelude::*;
use bevy::tasks::{AsyncComputeTaskPool, TaskPool};
use bevy_mapstream_assets::{CancellationToken, MapId};
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, BoxFuture, Either, Shared};

use crate::cache::LruCache;
use crate::error::{CacheError, PrepareError};
use crate::prepare::{MapSources, Placement, prepare_map};
use crate::prepared::{Direction, PreparedMapData};

pub type PrepareResult = Result<Arc<PreparedMapData>, PrepareError>;

type SharedPreparation = Shared<BoxFuture<'static, PrepareResult>>;

/// Undrained prefetch failures kept before newer ones are dropped.
pub const MAX_PENDING_FAILURES: usize = 64;

/// Entry point for obtaining prepared map data.
///
/// Preparations run on the [`AsyncComputeTaskPool`]. At most one preparation
/// per map id is in flight at any time: concurrent requests for the same map
/// await the same task and receive the same `Arc` (or the same error).
/// Results are kept in an [`LruCache`]; failures are never cached.
///
/// Cloning is cheap and every clone shares the same cache and bookkeeping.
///
/// # Example
///
/// ```rust,no_run
/// # use bevy::prelude::*;
/// # use bevy_mapstream_assets::prelude::*;
/// # use bevy_mapstream_core::prelude::*;
/// # use futures::executor::block_on;
/// let sources = MapSources::tiled("assets/maps", InMemoryDefinitions::new());
/// let preparer = MapPreparer::new(sources, 8).unwrap();
///
/// // Warm the cache for a neighbor, then wait for the current map
/// preparer.prepare_in_background("route_101", Vec2::new(0.0, -320.0));
/// let town = block_on(preparer.prepare("littleroot_town", Vec2::ZERO, &CancellationToken::new()));
/// ```
#[derive(Resource, Clone)]
pub struct MapPreparer {
    inner: Arc<PreparerInner>,
}

struct PreparerInner {
    sources: MapSources,
    cache: LruCache<MapId, Arc<PreparedMapData>>,
    in_flight: Mutex<HashMap<MapId, InFlight>>,
    next_generation: AtomicU64,
    failures: SyncSender<PrefetchFailure>,
    failure_log: Mutex<Receiver<PrefetchFailure>>,
}

struct InFlight {
    generation: u64,
    shared: SharedPreparation,
}

enum Joined {
    Cached(Arc<PreparedMapData>),
    InFlight(SharedPreparation),
}

/// Entry counts of the prepared-map cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub capacity: usize,
}

/// A failed background preparation.
#[derive(Debug, Clone)]
pub struct PrefetchFailure {
    pub map_id: MapId,
    pub error: PrepareError,
}

/// How a background preparation ended.
#[derive(Debug, Clone)]
pub enum PrefetchOutcome {
    /// The map was already cached; nothing was scheduled
    AlreadyCached,
    Prepared,
    Failed(PrepareError),
}

/// Handle to a detached background preparation.
///
/// Dropping the handle does not cancel anything. Awaiting
/// [`outcome`](Self::outcome) never fails; errors are reported as
/// [`PrefetchOutcome::Failed`] and also land in the preparer's failure channel.
#[derive(Debug)]
pub struct PrefetchHandle {
    map_id: MapId,
    outcome: oneshot::Receiver<PrefetchOutcome>,
}

impl PrefetchHandle {
    fn ready(map_id: MapId, outcome: PrefetchOutcome) -> Self {
        let (sender, receiver) = oneshot::channel();
        let _ = sender.send(outcome);
        Self {
            map_id,
            outcome: receiver,
        }
    }

    pub fn map_id(&self) -> &MapId {
        &self.map_id
    }

    pub fn outcome(self) -> impl Future<Output = PrefetchOutcome> + Send + 'static {
        let map_id = self.map_id;
        self.outcome.map(move |received| {
            received.unwrap_or_else(|_| PrefetchOutcome::Failed(PrepareError::Abandoned(map_id)))
        })
    }
}

/// Removes the in-flight entry when the preparation task ends, even by panic.
struct InFlightGuard {
    inner: Arc<PreparerInner>,
    map_id: MapId,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.inner.in_flight();
        if in_flight
            .get(&self.map_id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            in_flight.remove(&self.map_id);
        }
    }
}

impl PreparerInner {
    fn in_flight(&self) -> MutexGuard<'_, HashMap<MapId, InFlight>> {
        self.in_flight.lock().unwrap_or_else(|poisoned| {
            error!("MapPreparer in-flight table lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl MapPreparer {
    /// Create a preparer caching at most `capacity` maps.
    pub fn new(sources: MapSources, capacity: usize) -> Result<Self, CacheError> {
        let (failures, failure_log) = mpsc::sync_channel(MAX_PENDING_FAILURES);
        Ok(Self {
            inner: Arc::new(PreparerInner {
                sources,
                cache: LruCache::new(capacity)?,
                in_flight: Mutex::new(HashMap::default()),
                next_generation: AtomicU64::new(0),
                failures,
                failure_log: Mutex::new(failure_log),
            }),
        })
    }

    /// Prepare `map_id`, or return it from the cache.
    ///
    /// A cached map is returned as-is, with the world offset it was first
    /// prepared at. `cancel` only abandons this caller's wait, unless this call
    /// is the one that started the preparation: then it also stops the task,
    /// and every caller sharing it gets [`PrepareError::Cancelled`].
    pub async fn prepare(
        &self,
        map_id: impl Into<MapId>,
        world_offset: Vec2,
        cancel: &CancellationToken,
    ) -> PrepareResult {
        self.prepare_placed(map_id.into(), Placement::At(world_offset), cancel)
            .await
    }

    /// [`prepare`](Self::prepare) with a placement resolved after loading.
    pub async fn prepare_placed(
        &self,
        map_id: MapId,
        placement: Placement,
        cancel: &CancellationToken,
    ) -> PrepareResult {
        if let Some(prepared) = self.inner.cache.get(&map_id) {
            debug!("Prepared map cache hit for '{}'", map_id);
            return Ok(prepared);
        }
        if cancel.is_cancelled() {
            return Err(PrepareError::Cancelled(map_id));
        }

        let shared = match self.join_or_start(&map_id, placement, cancel) {
            Joined::Cached(prepared) => return Ok(prepared),
            Joined::InFlight(shared) => shared,
        };

        match future::select(shared, Box::pin(cancel.cancelled())).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => {
                debug!("Caller stopped waiting for map '{}'", map_id);
                Err(PrepareError::Cancelled(map_id))
            }
        }
    }

    /// Non-blocking cache lookup. Never starts a preparation.
    pub fn try_get_prepared(&self, map_id: &MapId) -> Option<Arc<PreparedMapData>> {
        self.inner.cache.get(map_id)
    }

    pub fn is_prepared(&self, map_id: &MapId) -> bool {
        self.inner.cache.contains_key(map_id)
    }

    /// Whether a preparation for `map_id` is currently running.
    pub fn is_preparing(&self, map_id: &MapId) -> bool {
        self.inner.in_flight().contains_key(map_id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight().len()
    }

    /// Best-effort prefetch.
    ///
    /// Does nothing when the map is cached and joins a running preparation
    /// instead of starting another. Failures are logged and pushed to the
    /// failure channel (see [`drain_prefetch_failures`](Self::drain_prefetch_failures)).
    pub fn prepare_in_background(
        &self,
        map_id: impl Into<MapId>,
        world_offset: Vec2,
    ) -> PrefetchHandle {
        self.prefetch(map_id.into(), Placement::At(world_offset))
    }

    /// Prefetch every map connected to `map`, placed flush against its edges.
    pub fn prefetch_neighbors(&self, map: &PreparedMapData) -> Vec<PrefetchHandle> {
        map.connections
            .iter()
            .map(|connection| {
                let step = match connection.direction {
                    Direction::North | Direction::South => map.tile_width,
                    Direction::East | Direction::West => map.tile_height,
                };
                let placement = Placement::Adjacent {
                    direction: connection.direction,
                    origin: map.world_offset,
                    size: map.pixel_size(),
                    offset: connection.offset as f32 * step as f32,
                };
                self.prefetch(connection.target.clone(), placement)
            })
            .collect()
    }

    /// Take every prefetch failure reported since the last call.
    ///
    /// Nothing else drains the channel unless [`MapStreamPlugin`](crate::plugin::MapStreamPlugin)
    /// runs its `report_prefetch_failures` system. A preparer used on its own
    /// must be drained by its owner; once [`MAX_PENDING_FAILURES`] are waiting,
    /// newer failures are only logged.
    pub fn drain_prefetch_failures(&self) -> Vec<PrefetchFailure> {
        let log = self
            .inner
            .failure_log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        log.try_iter().collect()
    }

    /// Drop a cached map. A running preparation is not cancelled and will
    /// cache its result when done.
    pub fn clear_prepared(&self, map_id: &MapId) -> bool {
        self.inner.cache.remove(map_id).is_some()
    }

    /// Drop every cached map. Running preparations are not cancelled.
    pub fn clear_all(&self) {
        self.inner.cache.clear();
    }

    pub fn cache_statistics(&self) -> CacheStats {
        CacheStats {
            count: self.inner.cache.len(),
            capacity: self.inner.cache.capacity(),
        }
    }

    fn prefetch(&self, map_id: MapId, placement: Placement) -> PrefetchHandle {
        if self.inner.cache.contains_key(&map_id) {
            debug!("Prefetch of '{}' skipped, already cached", map_id);
            return PrefetchHandle::ready(map_id, PrefetchOutcome::AlreadyCached);
        }

        let cancel = CancellationToken::new();
        let shared = match self.join_or_start(&map_id, placement, &cancel) {
            Joined::Cached(_) => {
                return PrefetchHandle::ready(map_id, PrefetchOutcome::AlreadyCached);
            }
            Joined::InFlight(shared) => shared,
        };

        let (sender, receiver) = oneshot::channel();
        let failures = self.inner.failures.clone();
        let watched = map_id.clone();

        AsyncComputeTaskPool::get_or_init(TaskPool::default)
            .spawn(async move {
                let outcome = match shared.await {
                    Ok(_) => PrefetchOutcome::Prepared,
                    Err(error) => {
                        warn!("Background preparation of map '{}' failed: {}", watched, error);
                        let failure = PrefetchFailure {
                            map_id: watched,
                            error: error.clone(),
                        };
                        if let Err(TrySendError::Full(failure)) = failures.try_send(failure) {
                            debug!(
                                "Prefetch failure backlog full, dropping failure for '{}'",
                                failure.map_id
                            );
                        }
                        PrefetchOutcome::Failed(error)
                    }
                };
                let _ = sender.send(outcome);
            })
            .detach();

        PrefetchHandle {
            map_id,
            outcome: receiver,
        }
    }

    /// Double-checked lookup: return the cached map, join the running
    /// preparation, or start a new one.
    fn join_or_start(
        &self,
        map_id: &MapId,
        placement: Placement,
        cancel: &CancellationToken,
    ) -> Joined {
        let mut in_flight = self.inner.in_flight();

        if let Some(prepared) = self.inner.cache.get(map_id) {
            return Joined::Cached(prepared);
        }
        if let Some(entry) = in_flight.get(map_id) {
            debug!("Joining in-flight preparation of '{}'", map_id);
            return Joined::InFlight(entry.shared.clone());
        }

        debug!("Prepared map cache miss for '{}'", map_id);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let shared = self.spawn_preparation(map_id.clone(), placement, cancel.clone(), generation);
        in_flight.insert(
            map_id.clone(),
            InFlight {
                generation,
                shared: shared.clone(),
            },
        );
        Joined::InFlight(shared)
    }

    fn spawn_preparation(
        &self,
        map_id: MapId,
        placement: Placement,
        cancel: CancellationToken,
        generation: u64,
    ) -> SharedPreparation {
        let (sender, receiver) = oneshot::channel::<PrepareResult>();
        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
            map_id: map_id.clone(),
            generation,
        };

        AsyncComputeTaskPool::get_or_init(TaskPool::default)
            .spawn(async move {
                let inner = Arc::clone(&guard.inner);
                let map_id = guard.map_id.clone();
                info!("Preparing map '{}'", map_id);

                let work = prepare_map(&inner.sources, &map_id, placement, &cancel);
                let result = match future::select(Box::pin(work), Box::pin(cancel.cancelled()))
                    .await
                {
                    Either::Left((result, _)) => result.map(Arc::new),
                    Either::Right(((), _)) => Err(PrepareError::Cancelled(map_id.clone())),
                };

                if let Ok(prepared) = &result {
                    if let Some(evicted) = inner.cache.set(map_id.clone(), Arc::clone(prepared)) {
                        debug!("Evicted prepared map '{}' to make room for '{}'", evicted, map_id);
                    }
                }

                // Cache first, then bookkeeping, so a new request never sees neither
                drop(guard);
                let _ = sender.send(result);
            })
            .detach();

        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(PrepareError::Abandoned(map_id)))
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for MapPreparer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapPreparer")
            .field("cache", &self.cache_statistics())
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}
