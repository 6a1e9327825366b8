//! TTL cache over aggregation results.
//!
//! Each key is in one of three states: fresh (stored less than the TTL ago),
//! building (an in-flight build that later callers join), or absent. The
//! last successful result per key is also kept past its TTL so callers can
//! fall back to it when a rebuild fails. Those fallbacks expire after the
//! stale TTL, and at most `max_entries` are kept, oldest evicted first. Both
//! limits are enforced whenever a result is stored.
//!
//! An in-flight build is held as a [`Shared`] future. The cache only keeps a
//! [`WeakShared`] handle to it, so the build lives exactly as long as some
//! caller is awaiting it: if every caller gives up, the build is dropped and
//! the next request for the key starts a new one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use la_crime_analytics::AnalyticsError;
use la_crime_analytics::clock::Clock;
use la_crime_analytics_models::AggregationResult;

use crate::key::AggregationKey;

/// Outcome of a build, shared with every caller collapsed on it.
pub type BuildResult = Result<Arc<AggregationResult>, AnalyticsError>;

type BuildFuture = BoxFuture<'static, BuildResult>;

/// How long a result stays available as a stale fallback by default.
pub const DEFAULT_STALE_TTL: Duration = Duration::from_secs(24 * 3_600);

/// Default cap on results kept for stale fallback.
pub const DEFAULT_MAX_ENTRIES: usize = 128;

struct Entry {
    result: Arc<AggregationResult>,
    stored_at: DateTime<Utc>,
}

struct InFlight {
    id: u64,
    generation: u64,
    build: WeakShared<BuildFuture>,
}

struct Limits {
    ttl: TimeDelta,
    stale_ttl: TimeDelta,
    max_entries: usize,
}

#[derive(Default)]
struct State {
    fresh: HashMap<AggregationKey, Entry>,
    last_good: HashMap<AggregationKey, Entry>,
    in_flight: HashMap<AggregationKey, InFlight>,
    /// Bumped by [`AggregationCache::invalidate`]; builds started under an
    /// older generation never store their result.
    generation: u64,
    next_id: u64,
}

impl State {
    fn fresh(&mut self, key: &AggregationKey, now: DateTime<Utc>, ttl: TimeDelta) -> Option<Arc<AggregationResult>> {
        let entry = self.fresh.get(key)?;
        if now - entry.stored_at < ttl {
            return Some(Arc::clone(&entry.result));
        }
        log::debug!("Cache entry {key} expired");
        self.fresh.remove(key);
        None
    }

    /// Drops expired entries, dead builds, and the oldest fallbacks beyond
    /// the cap.
    fn prune(&mut self, now: DateTime<Utc>, limits: &Limits) {
        self.fresh.retain(|_, entry| now - entry.stored_at < limits.ttl);
        self.last_good
            .retain(|_, entry| now - entry.stored_at < limits.stale_ttl);
        self.in_flight
            .retain(|_, in_flight| in_flight.build.upgrade().is_some());

        while self.last_good.len() > limits.max_entries {
            let Some(oldest) = self
                .last_good
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            log::debug!("Evicting {oldest}");
            self.last_good.remove(&oldest);
            self.fresh.remove(&oldest);
        }
    }

    fn join(&self, key: &AggregationKey) -> Option<(Shared<BuildFuture>, u64)> {
        let in_flight = self.in_flight.get(key)?;
        in_flight.build.upgrade().map(|build| (build, in_flight.id))
    }

    fn start<Fut>(&mut self, key: AggregationKey, build: Fut) -> (Shared<BuildFuture>, u64)
    where
        Fut: Future<Output = Result<AggregationResult, AnalyticsError>> + Send + 'static,
    {
        self.next_id += 1;
        let id = self.next_id;
        let shared = build.map(|outcome| outcome.map(Arc::new)).boxed().shared();
        if let Some(weak) = shared.downgrade() {
            self.in_flight.insert(
                key,
                InFlight {
                    id,
                    generation: self.generation,
                    build: weak,
                },
            );
        }
        (shared, id)
    }
}

enum Lookup {
    Hit(Arc<AggregationResult>),
    Wait(Shared<BuildFuture>, u64),
}

/// Process-wide aggregation cache.
pub struct AggregationCache {
    limits: Limits,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl AggregationCache {
    /// Creates an empty cache whose entries live for `ttl`, with the default
    /// stale retention.
    #[must_use]
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let ttl = to_delta(ttl);
        Self {
            limits: Limits {
                ttl,
                stale_ttl: to_delta(DEFAULT_STALE_TTL).max(ttl),
                max_entries: DEFAULT_MAX_ENTRIES,
            },
            clock,
            state: Mutex::new(State::default()),
        }
    }

    /// Keeps stale fallbacks for `stale_ttl` after they were stored (or the
    /// TTL, if longer), and at most `max_entries` of them.
    #[must_use]
    pub fn with_retention(mut self, stale_ttl: Duration, max_entries: usize) -> Self {
        self.limits.stale_ttl = to_delta(stale_ttl).max(self.limits.ttl);
        self.limits.max_entries = max_entries;
        self
    }

    /// How long entries stay fresh.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.limits.ttl
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the fresh entry for `key` without building.
    #[must_use]
    pub fn get(&self, key: &AggregationKey) -> Option<Arc<AggregationResult>> {
        let now = self.clock.now();
        self.lock().fresh(key, now, self.limits.ttl)
    }

    /// Returns the fresh entry for `key`, or builds it.
    ///
    /// Concurrent callers that miss on the same key share a single build;
    /// `build` is only invoked by the caller that starts it. A failed build
    /// stores nothing.
    ///
    /// # Errors
    ///
    /// Returns the build's error, to every caller that joined it.
    pub async fn get_or_build<F, Fut>(&self, key: AggregationKey, build: F) -> BuildResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AggregationResult, AnalyticsError>> + Send + 'static,
    {
        let (shared, id) = match self.lookup(&key, build) {
            Lookup::Hit(result) => return Ok(result),
            Lookup::Wait(shared, id) => (shared, id),
        };
        let outcome = shared.await;
        self.complete(&key, id, &outcome);
        outcome
    }

    /// Builds `key` unconditionally and stores the result.
    ///
    /// Later [`Self::get_or_build`] callers join this build rather than any
    /// older one still running.
    ///
    /// # Errors
    ///
    /// Returns the build's error. The previous entry, if any, is kept.
    pub async fn force_refresh<Fut>(&self, key: AggregationKey, build: Fut) -> BuildResult
    where
        Fut: Future<Output = Result<AggregationResult, AnalyticsError>> + Send + 'static,
    {
        let (shared, id) = self.lock().start(key.clone(), build);
        log::info!("Forcing rebuild of {key}");
        let outcome = shared.await;
        self.complete(&key, id, &outcome);
        outcome
    }

    fn lookup<F, Fut>(&self, key: &AggregationKey, build: F) -> Lookup
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AggregationResult, AnalyticsError>> + Send + 'static,
    {
        let now = self.clock.now();
        let mut state = self.lock();
        if let Some(result) = state.fresh(key, now, self.limits.ttl) {
            log::debug!("Cache hit for {key}");
            return Lookup::Hit(result);
        }
        if let Some((shared, id)) = state.join(key) {
            log::debug!("Joining in-flight build for {key}");
            return Lookup::Wait(shared, id);
        }
        log::debug!("Cache miss for {key}");
        let (shared, id) = state.start(key.clone(), build());
        Lookup::Wait(shared, id)
    }

    /// Records the outcome of build `id`. Only the first waiter to finish
    /// does anything; the rest find the slot already released.
    fn complete(&self, key: &AggregationKey, id: u64, outcome: &BuildResult) {
        let now = self.clock.now();
        let mut state = self.lock();
        let current = state
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.id == id);
        if !current {
            return;
        }
        let Some(in_flight) = state.in_flight.remove(key) else {
            return;
        };

        match outcome {
            Ok(result) if in_flight.generation == state.generation => {
                let entry = || Entry {
                    result: Arc::clone(result),
                    stored_at: now,
                };
                state.fresh.insert(key.clone(), entry());
                state.last_good.insert(key.clone(), entry());
                state.prune(now, &self.limits);
                log::debug!("Stored {key}");
            }
            Ok(_) => log::debug!("Discarding {key}: cache was invalidated during the build"),
            Err(e) => log::warn!("Build for {key} failed, nothing cached: {e}"),
        }
    }

    /// The most recent successful result for `key`, even if past its TTL,
    /// as long as it is within the stale TTL.
    #[must_use]
    pub fn last_good(&self, key: &AggregationKey) -> Option<Arc<AggregationResult>> {
        let now = self.clock.now();
        self.lock()
            .last_good
            .get(key)
            .filter(|entry| now - entry.stored_at < self.limits.stale_ttl)
            .map(|entry| Arc::clone(&entry.result))
    }

    /// Number of results held for stale fallback, including ones not yet
    /// pruned.
    #[must_use]
    pub fn retained_len(&self) -> usize {
        self.lock().last_good.len()
    }

    /// Drops every entry, including stale fallbacks. Builds already running
    /// finish for their callers but are not stored.
    pub fn invalidate(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.fresh.clear();
        state.last_good.clear();
        state.in_flight.clear();
        log::info!("Aggregation cache invalidated");
    }

    /// Drops everything held for one key.
    pub fn invalidate_key(&self, key: &AggregationKey) {
        let mut state = self.lock();
        state.fresh.remove(key);
        state.last_good.remove(key);
        state.in_flight.remove(key);
    }

    /// Whether `key` has a fresh entry.
    #[must_use]
    pub fn contains(&self, key: &AggregationKey) -> bool {
        self.get(key).is_some()
    }

    /// Number of fresh entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .fresh
            .values()
            .filter(|entry| now - entry.stored_at < self.limits.ttl)
            .count()
    }

    /// Whether there are no fresh entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use la_crime_analytics::clock::ManualClock;
    use la_crime_analytics_models::{AggregationParams, RunMetadata};
    use la_crime_source_models::{DateWindow, MAX_WINDOW_DAYS};

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn window() -> DateWindow {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        DateWindow::new(day, day, MAX_WINDOW_DAYS).unwrap()
    }

    fn key() -> AggregationKey {
        AggregationKey::new(window(), &AggregationParams::default())
    }

    fn key_for_day(ordinal: u32) -> AggregationKey {
        let day = NaiveDate::from_yo_opt(2023, ordinal).unwrap();
        let window = DateWindow::new(day, day, MAX_WINDOW_DAYS).unwrap();
        AggregationKey::new(window, &AggregationParams::default())
    }

    fn empty_result() -> AggregationResult {
        AggregationResult {
            neighborhoods: vec![],
            metadata: RunMetadata {
                window: window(),
                preceding_window: window().preceding(),
                total_incidents: 0,
                unmapped_category: 0,
                unmatched_neighborhood: 0,
                trend_degraded: false,
                truncated: false,
                notices: vec![],
                generated_at: now(),
            },
        }
    }

    fn cache(clock: &Arc<ManualClock>) -> AggregationCache {
        AggregationCache::new(Duration::from_secs(60), clock.clone())
    }

    #[tokio::test]
    async fn hit_does_not_invoke_the_builder() {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = cache(&clock);

        let stored = cache
            .get_or_build(key(), || async { Ok(empty_result()) })
            .await
            .unwrap();
        let hit = cache
            .get_or_build(key(), || -> futures::future::Ready<_> {
                panic!("builder must not run on a hit")
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&stored, &hit));
    }

    #[tokio::test]
    async fn ttl_boundary_is_exclusive() {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = cache(&clock);
        cache
            .get_or_build(key(), || async { Ok(empty_result()) })
            .await
            .unwrap();

        clock.advance(TimeDelta::seconds(59));
        assert!(cache.get(&key()).is_some());
        clock.advance(TimeDelta::seconds(1));
        assert!(cache.get(&key()).is_none());
        assert!(cache.last_good(&key()).is_some());
    }

    #[tokio::test]
    async fn errors_are_not_stored() {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = cache(&clock);

        let err = cache
            .get_or_build(key(), || async { Err(AnalyticsError::NoNeighborhoods) })
            .await
            .unwrap_err();

        assert_eq!(err, AnalyticsError::NoNeighborhoods);
        assert!(cache.is_empty());
        assert!(cache.last_good(&key()).is_none());
    }

    #[tokio::test]
    async fn expired_results_are_pruned_when_another_is_stored() {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = cache(&clock).with_retention(Duration::from_secs(600), DEFAULT_MAX_ENTRIES);
        for day in 1..=50 {
            cache
                .get_or_build(key_for_day(day), || async { Ok(empty_result()) })
                .await
                .unwrap();
        }
        assert_eq!(cache.retained_len(), 50);

        clock.advance(TimeDelta::days(365));
        assert!(cache.last_good(&key_for_day(1)).is_none());
        cache
            .get_or_build(key(), || async { Ok(empty_result()) })
            .await
            .unwrap();

        assert_eq!(cache.retained_len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn oldest_results_are_evicted_past_the_cap() {
        let clock = Arc::new(ManualClock::new(now()));
        let cache = cache(&clock).with_retention(DEFAULT_STALE_TTL, 3);
        for day in 1..=5 {
            cache
                .get_or_build(key_for_day(day), || async { Ok(empty_result()) })
                .await
                .unwrap();
            clock.advance(TimeDelta::seconds(1));
        }

        assert_eq!(cache.retained_len(), 3);
        assert!(cache.last_good(&key_for_day(1)).is_none());
        assert!(cache.get(&key_for_day(2)).is_none());
        assert!(cache.get(&key_for_day(5)).is_some());
    }
}
