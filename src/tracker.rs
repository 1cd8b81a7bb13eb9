//! Tracker state and the controller that owns it.
//!
//! All mutation goes through [`Tracker`] so the total/history invariant
//! holds after every operation and every change is persisted immediately.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::store::LocalStore;

/// Round a currency amount to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Progress state: a running total and the contributions that produced it.
///
/// `total` is derived from `history`; the fields are private so it can never
/// drift. This is also the wire shape of the remote progress document
/// (`{"total": number, "history": [number, ...]}`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackerState {
    total: f64,
    history: Vec<f64>,
}

impl TrackerState {
    /// Rebuild state from a list of contributions, re-deriving the total.
    pub fn from_history(history: Vec<f64>) -> Self {
        let history: Vec<f64> = history.into_iter().map(round2).collect();
        let total = round2(history.iter().sum());
        Self { total, history }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn history(&self) -> &[f64] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Re-derive `total` from `history`. Used after deserializing state that
    /// may have been written by an older client where the two could drift.
    pub fn normalize(&mut self) {
        *self = Self::from_history(std::mem::take(&mut self.history));
    }

    fn add(&mut self, amount: f64) -> Result<f64> {
        if !amount.is_finite() || amount <= 0.0 {
            anyhow::bail!("contribution must be a positive amount, got {amount}");
        }
        let amount = round2(amount);
        self.history.push(amount);
        self.total = round2(self.total + amount);
        Ok(amount)
    }

    fn undo(&mut self) -> Option<f64> {
        let amount = self.history.pop()?;
        self.total = round2(self.total - amount);
        Some(amount)
    }
}

/// Owns the tracker state and its persistence.
pub struct Tracker {
    state: TrackerState,
    store: LocalStore,
}

impl Tracker {
    /// Load state from the local store (empty state if none was saved yet).
    pub fn load(store: LocalStore) -> Result<Self> {
        let mut state = store.load_state()?;
        state.normalize();
        Ok(Self { state, store })
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Record a contribution and persist. Returns the rounded amount.
    pub fn add(&mut self, amount: f64) -> Result<f64> {
        let amount = self.state.add(amount)?;
        self.store.save_state(&self.state)?;
        Ok(amount)
    }

    /// Remove the most recent contribution and persist. A no-op (no write)
    /// when the history is empty.
    pub fn undo(&mut self) -> Result<Option<f64>> {
        match self.state.undo() {
            Some(amount) => {
                self.store.save_state(&self.state)?;
                Ok(Some(amount))
            }
            None => Ok(None),
        }
    }

    /// Clear all progress and persist. The caller is responsible for
    /// confirming with the user first.
    pub fn reset(&mut self) -> Result<()> {
        self.state = TrackerState::default();
        self.store.save_state(&self.state)
    }

    /// Overwrite local state wholesale (a successful pull) and persist.
    pub fn replace(&mut self, state: TrackerState) -> Result<()> {
        self.state = state;
        self.store.save_state(&self.state)
    }
}
