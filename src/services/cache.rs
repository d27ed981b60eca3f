//! Read-through, write-invalidate cache over an [`AppRepository`].
//!
//! Holds two optional snapshots (plain apps, apps with tokens) behind a
//! single `RwLock`. Readers clone an `Arc` under the read lock, so a
//! snapshot swap is atomic: a search sees either the old list or the
//! new one, never a mix.
//!
//! Loads are serialised per snapshot kind by a load mutex, so a burst of
//! concurrent misses results in one storage read. A generation counter
//! guards against publishing a snapshot that was loaded before an
//! invalidation landed.

use crate::error::DbResult;
use crate::repository::{AppRepository, Snapshot};
use crate::types::{ApplicationRecord, IndexedEntry};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

#[derive(Default)]
struct CacheState {
    apps: Option<Snapshot<ApplicationRecord>>,
    entries: Option<Snapshot<IndexedEntry>>,
    /// Bumped on every invalidation.
    generation: u64,
}

/// Counters for cache behaviour, all monotonically increasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Storage reads actually issued.
    pub loads: u64,
    pub invalidations: u64,
}

/// Caching decorator around another repository.
///
/// Thread-safe (Send + Sync): snapshots live in a `RwLock`, load
/// serialisation uses one `Mutex` per snapshot kind, counters are atomics.
pub struct CachingRepository {
    inner: Arc<dyn AppRepository>,
    state: RwLock<CacheState>,
    apps_load: Mutex<()>,
    entries_load: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    invalidations: AtomicU64,
}

/// Selects one of the two snapshot slots.
trait Slot: Sized {
    fn get(state: &CacheState) -> Option<Snapshot<Self>>;
    fn set(state: &mut CacheState, snapshot: Snapshot<Self>);
}

impl Slot for ApplicationRecord {
    fn get(state: &CacheState) -> Option<Snapshot<Self>> {
        state.apps.clone()
    }

    fn set(state: &mut CacheState, snapshot: Snapshot<Self>) {
        state.apps = Some(snapshot);
    }
}

impl Slot for IndexedEntry {
    fn get(state: &CacheState) -> Option<Snapshot<Self>> {
        state.entries.clone()
    }

    fn set(state: &mut CacheState, snapshot: Snapshot<Self>) {
        state.entries = Some(snapshot);
    }
}

impl CachingRepository {
    /// Wraps `inner`. Nothing is loaded until the first read.
    pub fn new(inner: Arc<dyn AppRepository>) -> Self {
        Self {
            inner,
            state: RwLock::new(CacheState::default()),
            apps_load: Mutex::new(()),
            entries_load: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Drops both snapshots; the next read goes to storage.
    pub fn invalidate(&self) {
        self.clear("manual");
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Whether each snapshot is currently populated: (apps, entries).
    #[must_use]
    pub fn is_warm(&self) -> (bool, bool) {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        (state.apps.is_some(), state.entries.is_some())
    }

    fn clear(&self, reason: &str) {
        // Lock poisoning recovery: the state is always left consistent
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.apps = None;
        state.entries = None;
        state.generation = state.generation.wrapping_add(1);
        drop(state);

        self.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("App cache invalidated ({reason})");
    }

    fn cached<T: Slot>(&self) -> Option<Snapshot<T>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        T::get(&state)
    }

    fn read_through<T: Slot>(
        &self,
        load_lock: &Mutex<()>,
        load: impl FnOnce(&dyn AppRepository) -> DbResult<Snapshot<T>>,
    ) -> DbResult<Snapshot<T>> {
        // Fast path
        if let Some(snapshot) = self.cached::<T>() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(snapshot);
        }

        // Slow path: one loader at a time per slot
        let _loading = load_lock.lock().unwrap_or_else(|e| e.into_inner());

        let generation = {
            let state = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(snapshot) = T::get(&state) {
                // Another caller published while we waited
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(snapshot);
            }
            state.generation
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        self.loads.fetch_add(1, Ordering::Relaxed);
        let loaded = load(self.inner.as_ref())?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.generation != generation {
            // Invalidated mid-load: serve what we read, but do not cache it
            return Ok(loaded);
        }
        match T::get(&state) {
            // First writer wins
            Some(existing) => Ok(existing),
            None => {
                T::set(&mut state, Arc::clone(&loaded));
                tracing::debug!("App cache populated with {} rows", loaded.len());
                Ok(loaded)
            }
        }
    }
}

impl AppRepository for CachingRepository {
    fn get_all(&self) -> DbResult<Snapshot<ApplicationRecord>> {
        self.read_through(&self.apps_load, |inner| inner.get_all())
    }

    fn get_all_with_tokens(&self) -> DbResult<Snapshot<IndexedEntry>> {
        self.read_through(&self.entries_load, |inner| inner.get_all_with_tokens())
    }

    fn upsert_batch(&self, entries: &[IndexedEntry]) -> DbResult<usize> {
        // A failed write leaves the current snapshots in place
        let written = self.inner.upsert_batch(entries)?;
        self.clear("upsert");
        Ok(written)
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<CachingRepository>();
};
