//! The guild record store.
//!
//! # Locking
//!
//! Every community record sits behind its own mutex.  A short-held index lock
//! maps community ids to those mutexes; it is only taken for the lookup, never
//! while a mutator runs.  Mutations for one community are therefore totally
//! ordered, while unrelated communities never wait on each other.
//!
//! The prefix cache is written only while the owning record's mutex is held,
//! so for any community the cached prefix always equals the committed
//! record's prefix once the mutation returns.
//!
//! Mutators are plain closures.  They cannot `.await`, which keeps network
//! calls out of the critical section.  A mutator must not call back into the
//! store for the same community; the record mutex is not reentrant.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use guildkit_core::{GuildId, UserId};

use super::record::GuildRecord;
use super::snapshot::GlobalConfig;

/// Critical sections longer than this are logged at `warn`.
const SLOW_SECTION: Duration = Duration::from_millis(50);

/// `None` until the first successful mutation commits a record.
type Slot = Arc<Mutex<Option<GuildRecord>>>;

/// Timing counters for store critical sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of critical sections entered.
    pub sections: u64,
    /// Total time spent inside critical sections.
    pub total: Duration,
    /// Longest single critical section.
    pub slowest: Duration,
}

#[derive(Debug, Default)]
struct Timings {
    sections: AtomicU64,
    total_nanos: AtomicU64,
    slowest_nanos: AtomicU64,
}

/// Holds one [`GuildRecord`] per community plus the derived prefix cache.
#[derive(Debug)]
pub struct GuildStore {
    default_prefix: String,
    credentials: String,
    operator_id: Option<UserId>,
    slots: RwLock<IndexMap<GuildId, Slot>>,
    prefix_cache: RwLock<HashMap<GuildId, String>>,
    timings: Timings,
}

impl GuildStore {
    /// Creates an empty store.
    pub fn new(default_prefix: impl Into<String>) -> Self {
        Self::from_snapshot(GlobalConfig::default(), default_prefix)
    }

    /// Builds a store from a persisted snapshot and rebuilds the prefix cache.
    ///
    /// Records without a prefix get the default prefix.  If the snapshot
    /// lists a community twice, the first record wins.
    pub fn from_snapshot(snapshot: GlobalConfig, default_prefix: impl Into<String>) -> Self {
        let default_prefix = default_prefix.into();
        let mut slots = IndexMap::with_capacity(snapshot.guilds.len());
        let mut prefix_cache = HashMap::with_capacity(snapshot.guilds.len());

        for mut record in snapshot.guilds {
            if slots.contains_key(&record.id) {
                warn!(guild = %record.id, "Duplicate guild record in snapshot, keeping the first");
                continue;
            }
            if record.prefix.is_empty() {
                record.prefix.clone_from(&default_prefix);
            }
            prefix_cache.insert(record.id, record.prefix.clone());
            slots.insert(record.id, Arc::new(Mutex::new(Some(record))));
        }

        Self {
            default_prefix,
            credentials: snapshot.credentials,
            operator_id: snapshot.operator_id,
            slots: RwLock::new(slots),
            prefix_cache: RwLock::new(prefix_cache),
            timings: Timings::default(),
        }
    }

    /// Sets the operator when the snapshot did not name one.
    pub fn with_operator_fallback(mut self, operator: Option<UserId>) -> Self {
        if self.operator_id.is_none() {
            self.operator_id = operator;
        }
        self
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    pub fn credentials(&self) -> &str {
        &self.credentials
    }

    pub fn operator_id(&self) -> Option<UserId> {
        self.operator_id
    }

    /// Returns `true` if `user` is the configured operator.
    pub fn is_operator(&self, user: UserId) -> bool {
        self.operator_id == Some(user)
    }

    // ─── Transactional access ────────────────────────────────────────────────

    /// Runs `mutator` against the record for `id`, creating a default record
    /// first if none exists.
    ///
    /// `label` names the operation in diagnostics.
    pub fn with_guild<R>(&self, id: GuildId, label: &str, mutator: impl FnOnce(&mut GuildRecord) -> R) -> R {
        match self.try_with_guild(id, label, |record| Ok::<R, Infallible>(mutator(record))) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`with_guild`](Self::with_guild), but the mutator may reject its
    /// own changes.
    ///
    /// The mutator works on a copy.  `Ok` commits the copy (persisting a
    /// freshly synthesised default record); `Err` discards it and leaves the
    /// store exactly as it was.
    pub fn try_with_guild<R, E>(
        &self,
        id: GuildId,
        label: &str,
        mutator: impl FnOnce(&mut GuildRecord) -> Result<R, E>,
    ) -> Result<R, E> {
        let slot = self.slot(id);
        let started = Instant::now();

        let result = {
            let mut committed = slot.lock();
            let mut working = committed
                .clone()
                .unwrap_or_else(|| GuildRecord::new(id, self.default_prefix.as_str()));

            let result = mutator(&mut working);
            if result.is_ok() {
                if working.id != id {
                    warn!(guild = %id, changed_to = %working.id, label, "Mutator changed the record id, restoring it");
                    working.id = id;
                }
                if working.prefix.is_empty() {
                    working.prefix.clone_from(&self.default_prefix);
                }
                self.prefix_cache.write().insert(id, working.prefix.clone());
                *committed = Some(working);
            }
            result
        };
        if result.is_err() {
            self.prune_empty(id, &slot);
        }

        self.report(id, label, started.elapsed());
        result
    }

    /// Runs `reader` against the record for `id` without creating one.
    ///
    /// Shares the record's critical section with mutators.
    pub fn read_guild<R>(&self, id: GuildId, label: &str, reader: impl FnOnce(Option<&GuildRecord>) -> R) -> R {
        let slot = self.slots.read().get(&id).cloned();
        let started = Instant::now();

        let result = match slot {
            Some(slot) => reader(slot.lock().as_ref()),
            None => reader(None),
        };

        self.report(id, label, started.elapsed());
        result
    }

    // ─── Derived lookups ─────────────────────────────────────────────────────

    /// Cached prefix for `id`.  `None` means the cache has no entry, which is
    /// a consistency fault for a community that has a record.
    pub fn cached_prefix(&self, id: GuildId) -> Option<String> {
        self.prefix_cache.read().get(&id).cloned()
    }

    /// Returns `true` if a committed record exists for `id`.
    pub fn contains(&self, id: GuildId) -> bool {
        self.read_guild(id, "contains", |record| record.is_some())
    }

    /// Number of committed records.
    pub fn len(&self) -> usize {
        self.committed_slots()
            .iter()
            .filter(|slot| slot.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the current state into a persistable snapshot.
    pub fn snapshot(&self) -> GlobalConfig {
        let guilds = self
            .committed_slots()
            .iter()
            .filter_map(|slot| slot.lock().clone())
            .collect();

        GlobalConfig {
            credentials: self.credentials.clone(),
            operator_id: self.operator_id,
            guilds,
        }
    }

    /// Critical-section timing counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            sections: self.timings.sections.load(Ordering::Relaxed),
            total: Duration::from_nanos(self.timings.total_nanos.load(Ordering::Relaxed)),
            slowest: Duration::from_nanos(self.timings.slowest_nanos.load(Ordering::Relaxed)),
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────────

    /// Finds or inserts the slot for `id`.  Concurrent callers for an unseen
    /// community all receive the same slot.
    fn slot(&self, id: GuildId) -> Slot {
        if let Some(slot) = self.slots.read().get(&id) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write();
        Arc::clone(
            slots
                .entry(id)
                .or_insert_with(|| Arc::new(Mutex::new(None))),
        )
    }

    /// Drops the index entry for `id` if it never committed a record and no
    /// other caller holds it.  Clones are only taken under the index lock, so
    /// the count cannot grow while the write lock is held.
    fn prune_empty(&self, id: GuildId, slot: &Slot) {
        let mut slots = self.slots.write();
        let unshared = slots.get(&id).is_some_and(|indexed| Arc::ptr_eq(indexed, slot))
            && Arc::strong_count(slot) == 2;
        if unshared && slot.lock().is_none() {
            slots.shift_remove(&id);
        }
    }

    fn committed_slots(&self) -> Vec<Slot> {
        self.slots.read().values().cloned().collect()
    }

    fn report(&self, id: GuildId, label: &str, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.timings.sections.fetch_add(1, Ordering::Relaxed);
        self.timings.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.timings.slowest_nanos.fetch_max(nanos, Ordering::Relaxed);

        if elapsed >= SLOW_SECTION {
            warn!(
                guild = %id,
                label,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow guild record critical section"
            );
        } else {
            trace!(
                guild = %id,
                label,
                elapsed_us = elapsed.as_micros() as u64,
                "Guild record critical section"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn forget_cached_prefix(&self, id: GuildId) {
        self.prefix_cache.write().remove(&id);
    }

    #[cfg(test)]
    fn indexed(&self) -> usize {
        self.slots.read().len()
    }
}
