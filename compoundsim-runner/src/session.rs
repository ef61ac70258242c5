//! Recomputation sessions.
//!
//! A [`Session`] turns each parameter change into one atomic recomputation of
//! metrics, projection and Monte Carlo outcome. Every request takes a new
//! generation number and cancels whatever computation is still running for
//! an older one; a computation that finishes after a newer generation began
//! is discarded, never merged. Finished snapshots are memoized by parameter
//! fingerprint, so asking again for the same parameters is free.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use compoundsim_core::{
    fresh_seed, project_with_metrics, simulate_with_cancel, Metrics, MonteCarloOutcome,
    ParamsFingerprint, Projection, ProjectionSummary, SimulationError, SimulationParameters,
};

use crate::cache::{SnapshotCache, DEFAULT_CAPACITY};

/// Current schema version for persisted snapshots.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("generation {generation} superseded by generation {latest}")]
    Superseded { generation: u64, latest: u64 },
}

/// Everything computed for one parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Session generation that produced this snapshot. Not persisted.
    #[serde(skip)]
    pub generation: u64,
    pub fingerprint: ParamsFingerprint,
    pub params: SimulationParameters,
    pub metrics: Metrics,
    pub projection: Projection,
    pub monte_carlo: MonteCarloOutcome,
}

impl Snapshot {
    /// Computes metrics, projection and simulation for `params`.
    ///
    /// Metrics feed both the projection (stochastic mode) and the simulator's
    /// trade plan, so the three always agree on the trading inputs.
    pub fn compute(
        params: &SimulationParameters,
        generation: u64,
        cancel: Option<&AtomicBool>,
    ) -> Result<Self, SimulationError> {
        params.validate()?;
        let metrics = Metrics::compute(&params.trading, params.initial_amount);
        let projection = project_with_metrics(params, &metrics);
        let monte_carlo = simulate_with_cancel(params, cancel)?;

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            generation,
            fingerprint: params.fingerprint(),
            params: params.clone(),
            metrics,
            projection,
            monte_carlo,
        })
    }

    pub fn summary(&self) -> Option<ProjectionSummary> {
        self.projection.summary(self.params.initial_amount)
    }
}

/// A started computation: its generation and the flag that cancels it.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    cancel: Arc<AtomicBool>,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Owns change detection and memoization for a sequence of parameter sets.
#[derive(Debug)]
pub struct Session {
    generation: AtomicU64,
    last_rerun_seed: AtomicU64,
    in_flight: Mutex<Option<Arc<AtomicBool>>>,
    cache: Mutex<SnapshotCache>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Session keeping at most `capacity` snapshots.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            generation: AtomicU64::new(0),
            last_rerun_seed: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            cache: Mutex::new(SnapshotCache::new(capacity)),
        }
    }

    /// Recompute for `params`, superseding any computation in flight.
    pub fn recompute(&self, params: &SimulationParameters) -> Result<Arc<Snapshot>, SessionError> {
        let ticket = self.begin();
        self.complete(ticket, params)
    }

    /// Recompute with a freshly drawn seed. Seeds drawn by one session are
    /// strictly increasing, so back-to-back re-runs never share a seed.
    pub fn rerun(&self, params: &SimulationParameters) -> Result<Arc<Snapshot>, SessionError> {
        let seed = self.next_rerun_seed(params.monte_carlo.seed);
        debug!(seed, "rerun with fresh seed");
        self.recompute(&params.with_seed(seed))
    }

    fn next_rerun_seed(&self, current: u64) -> u64 {
        let clock = fresh_seed();
        let mut seed = clock;
        // Retried on contention; `seed` holds the value finally stored.
        let _ = self
            .last_rerun_seed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                seed = clock.max(last.wrapping_add(1));
                if seed == current {
                    seed = seed.wrapping_add(1);
                }
                Some(seed)
            });
        seed
    }

    /// Start a new generation and cancel the previous one.
    pub fn begin(&self) -> Ticket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        if let Some(previous) = lock(&self.in_flight).replace(Arc::clone(&cancel)) {
            previous.store(true, Ordering::SeqCst);
        }
        Ticket { generation, cancel }
    }

    /// Run the computation for a ticket from [`Session::begin`].
    pub fn complete(
        &self,
        ticket: Ticket,
        params: &SimulationParameters,
    ) -> Result<Arc<Snapshot>, SessionError> {
        let result = self.compute_for(&ticket, params);
        self.release(&ticket);
        result
    }

    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn cached(&self, fingerprint: &ParamsFingerprint) -> Option<Arc<Snapshot>> {
        lock(&self.cache).get(fingerprint)
    }

    pub fn cache_len(&self) -> usize {
        lock(&self.cache).len()
    }

    pub fn clear_cache(&self) {
        lock(&self.cache).clear();
    }

    fn compute_for(
        &self,
        ticket: &Ticket,
        params: &SimulationParameters,
    ) -> Result<Arc<Snapshot>, SessionError> {
        params.validate().map_err(SimulationError::from)?;
        if ticket.generation != self.latest_generation() {
            return Err(self.superseded(ticket));
        }
        let fingerprint = params.fingerprint();

        if let Some(hit) = self.cached(&fingerprint) {
            debug!(
                generation = ticket.generation,
                fingerprint = fingerprint.short(),
                "snapshot cache hit"
            );
            return Ok(hit);
        }

        info!(
            generation = ticket.generation,
            fingerprint = fingerprint.short(),
            runs = params.monte_carlo.runs,
            horizon_months = params.horizon_months,
            "recomputing"
        );

        let snapshot = match Snapshot::compute(params, ticket.generation, Some(&ticket.cancel)) {
            Ok(snapshot) => snapshot,
            Err(SimulationError::Cancelled) => return Err(self.superseded(ticket)),
            Err(e) => return Err(e.into()),
        };
        if ticket.generation != self.latest_generation() {
            return Err(self.superseded(ticket));
        }

        if snapshot.metrics.profit_factor.is_degenerate() {
            warn!(value = ?snapshot.metrics.profit_factor, "profit factor is degenerate");
        }
        if snapshot.metrics.risk_of_ruin_heuristic.is_degenerate() {
            warn!(value = ?snapshot.metrics.risk_of_ruin_heuristic, "risk of ruin is degenerate");
        }

        let snapshot = Arc::new(snapshot);
        if let Some(evicted) = lock(&self.cache).put(Arc::clone(&snapshot)) {
            debug!(fingerprint = evicted.short(), "evicted snapshot");
        }
        info!(
            generation = ticket.generation,
            median = snapshot.monte_carlo.statistics.median,
            ruin_rate_percent = snapshot.monte_carlo.statistics.ruin_rate_percent,
            "snapshot ready"
        );
        Ok(snapshot)
    }

    fn superseded(&self, ticket: &Ticket) -> SessionError {
        let latest = self.latest_generation();
        warn!(generation = ticket.generation, latest, "discarding superseded computation");
        SessionError::Superseded {
            generation: ticket.generation,
            latest,
        }
    }

    /// Drop the in-flight slot if it still belongs to `ticket`.
    fn release(&self, ticket: &Ticket) {
        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|flag| Arc::ptr_eq(flag, &ticket.cancel)) {
            *slot = None;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
