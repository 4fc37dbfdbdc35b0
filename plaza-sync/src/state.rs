//! Mutation lifecycle.

use std::fmt;

use plaza_cache::CacheKey;
use plaza_core::{MutationError, MutationId, Timestamp};

/// Lifecycle of one optimistic mutation.
///
/// ```text
/// Created -> Speculating -> SettledSuccess -> Reconciled
///                        \-> SettledFailure -> Reconciled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    Created,
    Speculating,
    SettledSuccess,
    SettledFailure,
    Reconciled,
}

impl MutationState {
    pub fn can_transition_to(self, next: MutationState) -> bool {
        use MutationState::*;
        matches!(
            (self, next),
            (Created, Speculating)
                | (Speculating, SettledSuccess)
                | (Speculating, SettledFailure)
                | (SettledSuccess, Reconciled)
                | (SettledFailure, Reconciled)
        )
    }

    pub fn transition(self, next: MutationState) -> Result<MutationState, MutationError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(MutationError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, Self::SettledSuccess | Self::SettledFailure | Self::Reconciled)
    }
}

impl fmt::Display for MutationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Speculating => "Speculating",
            Self::SettledSuccess => "SettledSuccess",
            Self::SettledFailure => "SettledFailure",
            Self::Reconciled => "Reconciled",
        };
        f.write_str(name)
    }
}

/// Bookkeeping for one in-flight mutation.
///
/// Rollback snapshots and predictions live in the coordinator's ledger, keyed
/// by cache key, so overlapping mutations share a single snapshot per key.
#[derive(Debug, Clone)]
pub struct PendingMutation {
    id: MutationId,
    label: String,
    state: MutationState,
    affected_keys: Vec<CacheKey>,
    speculative_keys: Vec<CacheKey>,
    created_at: Timestamp,
}

impl PendingMutation {
    pub fn new(label: impl Into<String>, affected_keys: Vec<CacheKey>) -> Self {
        Self {
            id: MutationId::new(),
            label: label.into(),
            state: MutationState::Created,
            affected_keys,
            speculative_keys: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> MutationId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> MutationState {
        self.state
    }

    /// Every key the mutation touches: predicted keys plus extra invalidations.
    pub fn affected_keys(&self) -> &[CacheKey] {
        &self.affected_keys
    }

    /// Keys that received a speculative write.
    pub fn speculative_keys(&self) -> &[CacheKey] {
        &self.speculative_keys
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn advance(&mut self, next: MutationState) -> Result<(), MutationError> {
        self.state = self.state.transition(next)?;
        Ok(())
    }

    pub(crate) fn record_speculative_write(&mut self, key: CacheKey) {
        self.speculative_keys.push(key);
    }
}
