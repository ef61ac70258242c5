//! Deterministic random sources for the Monte Carlo simulator.
//!
//! The default source derives a sub-seed per run from the master seed via
//! BLAKE3, so every run owns an independent `StdRng` and the outcome is the
//! same regardless of how runs are scheduled across threads.
//!
//! The legacy source reproduces the sine-based generator of earlier releases:
//! one counter, advanced once per trade, shared by all runs in order. It is
//! statistically weak and forces sequential runs; use it only to compare
//! against previously stored results.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Selects the generator used by the Monte Carlo simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomSource {
    /// Per-run `StdRng` seeded from a BLAKE3 sub-seed. Runs execute in parallel.
    #[default]
    Hashed,
    /// Shared `frac(sin(n) * 10000)` counter. Runs execute sequentially.
    LegacySine,
}

/// A stream of uniform draws in `[0, 1)`. One draw per simulated trade.
pub trait TradeRng {
    fn next_unit(&mut self) -> f64;
}

impl TradeRng for StdRng {
    fn next_unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Master seed expanded into per-run sub-seeds.
#[derive(Debug, Clone)]
pub struct RngHierarchy {
    master_seed: u64,
}

impl RngHierarchy {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Sub-seed for one run. Independent of the order runs are derived in.
    pub fn sub_seed(&self, run_index: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"compoundsim/monte-carlo");
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(&(run_index as u64).to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, run_index: usize) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(run_index))
    }
}

/// The sine-based generator: `x = sin(counter) * 10000`, draw `x - floor(x)`.
#[derive(Debug, Clone)]
pub struct LegacySineRng {
    // Integer so that every draw advances it, even past 2^53.
    counter: u64,
}

impl LegacySineRng {
    pub fn new(seed: u64) -> Self {
        Self { counter: seed }
    }
}

impl TradeRng for LegacySineRng {
    fn next_unit(&mut self) -> f64 {
        let x = (self.counter as f64).sin() * 10_000.0;
        self.counter = self.counter.wrapping_add(1);
        x - x.floor()
    }
}

/// A new seed from the wall clock in milliseconds, for re-runs that must
/// differ from the previous outcome set.
pub fn fresh_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
