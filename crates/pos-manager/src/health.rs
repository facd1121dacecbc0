//! Health cache with first-connect staleness rules.
//!
//! `health()` always reads the live connection predicate and stores the
//! result. `status()` serves that stored record, except around startup:
//! before the first background connect tick nothing trustworthy has been
//! cached, and the record cached before that tick describes a device that
//! was never connected. [`FirstConnectGate`] tracks those two moments so the
//! first status read after the first tick is computed fresh.

use parking_lot::RwLock;
use pos_core::HealthRecord;
use std::sync::atomic::{AtomicU8, Ordering};

const FIRST_CONNECT: u8 = 0;
const CHECK_HEALTH: u8 = 1;
const HEALTH_UPDATED: u8 = 2;

/// Phase of the first-connect gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    /// No background connect tick has run yet.
    FirstConnect,
    /// The first tick ran; the next status read must be fresh.
    CheckHealth,
    /// The fresh read happened; status reads serve the cache from now on.
    HealthUpdated,
}

/// Three-phase flag advanced exactly twice over the process lifetime.
///
/// Transitions are compare-and-swap, so concurrent callers can never move
/// the gate backwards or skip a phase.
#[derive(Debug, Default)]
pub struct FirstConnectGate {
    phase: AtomicU8,
}

impl FirstConnectGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GatePhase {
        match self.phase.load(Ordering::SeqCst) {
            FIRST_CONNECT => GatePhase::FirstConnect,
            CHECK_HEALTH => GatePhase::CheckHealth,
            _ => GatePhase::HealthUpdated,
        }
    }

    /// Record a background connect tick. Only the first one advances the gate.
    pub fn on_connect_tick(&self) -> bool {
        self.advance(FIRST_CONNECT, CHECK_HEALTH)
    }

    /// Decide whether a status read must bypass the cache.
    ///
    /// Always true before the first tick. True exactly once after it, for
    /// the caller that wins the transition.
    pub fn needs_fresh_read(&self) -> bool {
        match self.phase() {
            GatePhase::FirstConnect => true,
            GatePhase::CheckHealth => self.advance(CHECK_HEALTH, HEALTH_UPDATED),
            GatePhase::HealthUpdated => false,
        }
    }

    fn advance(&self, from: u8, to: u8) -> bool {
        self.phase
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Last health records computed for one manager.
#[derive(Debug, Default)]
pub struct HealthTracker {
    gate: FirstConnectGate,
    cached: RwLock<Option<Vec<HealthRecord>>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gate(&self) -> &FirstConnectGate {
        &self.gate
    }

    /// Store freshly computed records and hand them back.
    pub fn record(&self, records: Vec<HealthRecord>) -> Vec<HealthRecord> {
        *self.cached.write() = Some(records.clone());
        records
    }

    pub fn cached(&self) -> Option<Vec<HealthRecord>> {
        self.cached.read().clone()
    }

    /// Serve the cache, or run `fresh` when the gate or an empty cache demands it.
    pub fn status(&self, fresh: impl FnOnce() -> Vec<HealthRecord>) -> Vec<HealthRecord> {
        if self.gate.needs_fresh_read() {
            return self.record(fresh());
        }
        match self.cached() {
            Some(records) => records,
            None => self.record(fresh()),
        }
    }
}
