//! Optimistic mutation coordination.
//!
//! [`OptimisticCoordinator`] wraps a remote mutation. Before the call is
//! issued it writes the predicted value into the read cache, so readers see
//! the change immediately. Once the call settles it either reconciles
//! (placeholder ids swapped for server ids, affected keys invalidated) or
//! rolls back to the snapshot taken before the first unresolved mutation on
//! each key.
//!
//! Settlement is an explicit continuation: [`OptimisticCoordinator::begin`]
//! returns an [`InFlight`] whose [`InFlight::settle`] performs the call.

pub mod coordinator;
pub mod ledger;
pub mod reconcile;
pub mod request;
pub mod state;

pub use coordinator::{CoordinatorStats, InFlight, MutationOutcome, OptimisticCoordinator};
pub use reconcile::Reconcile;
pub use request::{ErrorHook, MutationInput, MutationRequest, Prediction, SuccessHook};
pub use state::{MutationState, PendingMutation};
