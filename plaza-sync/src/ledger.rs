//! Rollback ledger: one trusted snapshot per cache key.
//!
//! The first mutation to speculate on a key captures the snapshot; later
//! mutations on the same key join the slot and append their prediction.
//! The slot closes when the last holder settles.

use std::collections::HashMap;

use plaza_cache::{CacheKey, Version};
use plaza_core::MutationId;

use crate::request::Prediction;

struct PendingPrediction<V> {
    mutation: MutationId,
    prediction: Prediction<V>,
}

struct LedgerSlot<V> {
    snapshot: V,
    pending: Vec<PendingPrediction<V>>,
    last_written: Option<Version>,
    superseded: bool,
}

/// How to restore a key after a failed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackPlan<V> {
    /// First-writer snapshot with the remaining predictions replayed.
    pub restored: V,
    /// Number of still-pending predictions replayed on top of the snapshot.
    pub replayed: usize,
    /// A sibling mutation on the key already succeeded.
    pub superseded: bool,
    /// Version of the coordinator's last write to the key.
    pub last_written: Option<Version>,
}

pub struct RollbackLedger<V> {
    slots: HashMap<CacheKey, LedgerSlot<V>>,
}

impl<V: Clone> RollbackLedger<V> {
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Register `mutation` as a holder of `key`. The snapshot is captured
    /// only when no slot is open. Returns true when this call captured it.
    pub fn capture(&mut self, key: &CacheKey, current: &V, mutation: MutationId, prediction: Prediction<V>) -> bool {
        let pending = PendingPrediction { mutation, prediction };
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.pending.push(pending);
                false
            }
            None => {
                self.slots.insert(
                    key.clone(),
                    LedgerSlot {
                        snapshot: current.clone(),
                        pending: vec![pending],
                        last_written: None,
                        superseded: false,
                    },
                );
                true
            }
        }
    }

    /// Remember the version of a coordinator write while the slot is open.
    pub fn record_write(&mut self, key: &CacheKey, version: Version) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.last_written = Some(version);
        }
    }

    pub fn last_written(&self, key: &CacheKey) -> Option<Version> {
        self.slots.get(key).and_then(|slot| slot.last_written)
    }

    /// Release a successful holder. Returns true when the slot closed.
    pub fn release_success(&mut self, key: &CacheKey, mutation: MutationId) -> bool {
        let Some(slot) = self.slots.get_mut(key) else {
            return false;
        };
        slot.pending.retain(|p| p.mutation != mutation);
        if slot.pending.is_empty() {
            self.slots.remove(key);
            true
        } else {
            slot.superseded = true;
            false
        }
    }

    /// Release a failed holder and compute what the key should go back to.
    pub fn release_failure(&mut self, key: &CacheKey, mutation: MutationId) -> Option<RollbackPlan<V>> {
        let slot = self.slots.get_mut(key)?;
        slot.pending.retain(|p| p.mutation != mutation);

        let mut restored = slot.snapshot.clone();
        for pending in &slot.pending {
            restored = (pending.prediction)(&restored);
        }
        let plan = RollbackPlan {
            restored,
            replayed: slot.pending.len(),
            superseded: slot.superseded,
            last_written: slot.last_written,
        };
        if slot.pending.is_empty() {
            self.slots.remove(key);
        }
        Some(plan)
    }

    pub fn holders(&self, key: &CacheKey) -> usize {
        self.slots.get(key).map_or(0, |slot| slot.pending.len())
    }

    pub fn is_open(&self, key: &CacheKey) -> bool {
        self.slots.contains_key(key)
    }

    pub fn open_slots(&self) -> usize {
        self.slots.len()
    }
}

impl<V: Clone> Default for RollbackLedger<V> {
    fn default() -> Self {
        Self::new()
    }
}
