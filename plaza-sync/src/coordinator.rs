//! The optimistic cache coordinator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use plaza_cache::{CacheKey, CacheStore, EntryOrigin};
use plaza_core::{
    data_record_id, MutationError, MutationId, PlazaError, PlazaResult, RecordId, RemoteError, Transport,
};
use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use crate::ledger::RollbackLedger;
use crate::reconcile::Reconcile;
use crate::request::{ErrorHook, MutationInput, MutationRequest, SuccessHook};
use crate::state::{MutationState, PendingMutation};

/// Result of a successful mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome {
    pub id: MutationId,
    pub label: String,
    /// Raw success body.
    pub body: Value,
    /// Server id that replaced the placeholder, when one was registered.
    pub server_id: Option<RecordId>,
    /// Records rewritten from the placeholder to the server id.
    pub reconciled_records: usize,
    /// Keys and prefixes invalidated after success.
    pub invalidated: Vec<CacheKey>,
}

/// Coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub keys_rolled_back: u64,
    pub rollbacks_skipped: u64,
    /// Mutations dropped before `settle` was called.
    pub abandoned: u64,
}

#[derive(Default)]
struct Counters {
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    keys_rolled_back: AtomicU64,
    rollbacks_skipped: AtomicU64,
    abandoned: AtomicU64,
    settling: AtomicU64,
    idle: Notify,
}

/// Held by every mutation between `begin` and the end of its settlement.
struct SettlingGuard {
    counters: Arc<Counters>,
}

impl SettlingGuard {
    fn new(counters: &Arc<Counters>) -> Self {
        counters.settling.fetch_add(1, Ordering::AcqRel);
        Self {
            counters: Arc::clone(counters),
        }
    }
}

impl Drop for SettlingGuard {
    fn drop(&mut self) {
        if self.counters.settling.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.counters.idle.notify_waiters();
        }
    }
}

/// Applies predicted changes to the read cache ahead of the server and
/// reconciles once the server answers.
///
/// # Guarantees
///
/// - Between [`begin`](Self::begin) and settlement, readers of a predicted
///   key see the speculative value.
/// - After a failure, readers see the value from before the first
///   unresolved mutation on the key, with any still-pending predictions
///   replayed on top.
/// - After a success, every affected key is invalidated so the cache
///   converges on server truth.
/// - A background refetch started before `begin` never overwrites the
///   speculative value.
///
/// Remote failures are never retried or swallowed: the cache is restored and
/// the error is returned.
///
/// Settlement runs on its own task, so a caller that stops polling
/// [`dispatch`](Self::dispatch) or [`InFlight::settle`] (a `select!`, a
/// timeout) does not leave speculative values behind. Dropping an
/// [`InFlight`] without settling it rolls its writes back.
pub struct OptimisticCoordinator<V, S, T> {
    store: Arc<S>,
    transport: Arc<T>,
    ledger: Arc<Mutex<RollbackLedger<V>>>,
    counters: Arc<Counters>,
}

impl<V, S, T> Clone for OptimisticCoordinator<V, S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            ledger: Arc::clone(&self.ledger),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<V, S, T> OptimisticCoordinator<V, S, T>
where
    V: Reconcile + Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
    T: Transport + 'static,
{
    pub fn new(store: Arc<S>, transport: Arc<T>) -> Self {
        Self {
            store,
            transport,
            ledger: Arc::new(Mutex::new(RollbackLedger::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.counters;
        CoordinatorStats {
            dispatched: c.dispatched.load(Ordering::Relaxed),
            succeeded: c.succeeded.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            keys_rolled_back: c.keys_rolled_back.load(Ordering::Relaxed),
            rollbacks_skipped: c.rollbacks_skipped.load(Ordering::Relaxed),
            abandoned: c.abandoned.load(Ordering::Relaxed),
        }
    }

    /// Wait until every begun mutation has settled or been rolled back,
    /// including ones whose callers went away.
    pub async fn await_settled(&self) {
        loop {
            let idle = self.counters.idle.notified();
            if self.counters.settling.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Keys currently holding a rollback snapshot.
    pub async fn open_slots(&self) -> usize {
        self.ledger.lock().await.open_slots()
    }

    /// Speculate, call the server and reconcile in one go.
    pub async fn dispatch(&self, request: MutationRequest<V>) -> PlazaResult<MutationOutcome> {
        self.begin(request).await?.settle().await
    }

    /// Cancel refetches on the affected keys, capture rollback snapshots and
    /// write the predicted values. Returns before any remote call is made.
    ///
    /// Keys absent from the cache are not predicted; they are still
    /// invalidated on success.
    pub async fn begin(&self, request: MutationRequest<V>) -> PlazaResult<InFlight<V, S, T>> {
        let affected = request.affected_keys();
        if affected.is_empty() && request.invalidate_prefixes.is_empty() {
            return Err(MutationError::EmptyRequest {
                label: request.label,
            }
            .into());
        }

        let MutationRequest {
            label,
            input,
            predictions,
            invalidate_prefixes,
            placeholder,
            expects_data,
            on_success,
            on_error,
            ..
        } = request;
        let mut pending = PendingMutation::new(label, affected);

        for key in pending.affected_keys() {
            self.store.cancel_pending_refetch(key).await;
        }

        {
            let mut ledger = self.ledger.lock().await;
            pending.advance(MutationState::Speculating)?;
            for (key, prediction) in predictions {
                let Some(entry) = self.store.get(&key).await else {
                    tracing::debug!(mutation = %pending.id(), key = %key, "Key not cached, skipping prediction");
                    continue;
                };
                let predicted = prediction(&entry.value);
                let captured = ledger.capture(&key, &entry.value, pending.id(), prediction);
                let version = self.store.set(&key, predicted, EntryOrigin::Speculative).await;
                ledger.record_write(&key, version);
                tracing::debug!(
                    mutation = %pending.id(),
                    key = %key,
                    version = %version,
                    captured_snapshot = captured,
                    "Speculative write"
                );
                pending.record_speculative_write(key);
            }
        }

        self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            mutation = %pending.id(),
            label = pending.label(),
            endpoint = %input.endpoint,
            keys = pending.speculative_keys().len(),
            "Mutation dispatched"
        );

        Ok(InFlight {
            coordinator: self.clone(),
            pending,
            call: Some(RemoteCall {
                input,
                invalidate_prefixes,
                placeholder,
                expects_data,
                on_success,
                on_error,
                _settling: SettlingGuard::new(&self.counters),
            }),
        })
    }

    async fn run(&self, mut pending: PendingMutation, call: RemoteCall) -> PlazaResult<MutationOutcome> {
        let RemoteCall {
            input,
            invalidate_prefixes,
            placeholder,
            expects_data,
            on_success,
            on_error,
            _settling,
        } = call;

        let response = self
            .transport
            .call(&input.endpoint, &input.payload)
            .await
            .map_err(PlazaError::from)
            .and_then(|body| check_body(pending.label(), body, placeholder, expects_data));

        match response {
            Ok((body, server_id)) => {
                pending.advance(MutationState::SettledSuccess)?;
                let outcome = self
                    .reconcile(&pending, body, placeholder, server_id, &invalidate_prefixes)
                    .await;
                pending.advance(MutationState::Reconciled)?;
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    mutation = %pending.id(),
                    label = pending.label(),
                    server_id = ?outcome.server_id,
                    "Mutation succeeded"
                );
                if let Some(hook) = on_success {
                    hook(&outcome);
                }
                Ok(outcome)
            }
            Err(err) => {
                pending.advance(MutationState::SettledFailure)?;
                let refresh = server_may_have_applied(&err);
                self.rollback(&pending, refresh).await;
                pending.advance(MutationState::Reconciled)?;
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    mutation = %pending.id(),
                    label = pending.label(),
                    error = %err,
                    refresh,
                    "Mutation failed, cache restored"
                );
                if let Some(hook) = on_error {
                    hook(&err);
                }
                Err(err)
            }
        }
    }

    /// Undo a mutation that was dropped before its remote call was made.
    async fn abandon(&self, mut pending: PendingMutation) {
        let settled = pending
            .advance(MutationState::SettledFailure)
            .and_then(|()| pending.advance(MutationState::Reconciled));
        if let Err(err) = settled {
            tracing::error!(mutation = %pending.id(), error = %err, "Abandoned mutation in unexpected state");
        }
        self.rollback(&pending, false).await;
        self.counters.abandoned.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            mutation = %pending.id(),
            label = pending.label(),
            "Mutation dropped before settling, cache restored"
        );
    }

    async fn reconcile(
        &self,
        pending: &PendingMutation,
        body: Value,
        placeholder: Option<RecordId>,
        server_id: Option<RecordId>,
        prefixes: &[CacheKey],
    ) -> MutationOutcome {
        let mut reconciled_records = 0;
        {
            let mut ledger = self.ledger.lock().await;
            for key in pending.speculative_keys() {
                if let (Some(from), Some(to)) = (placeholder, server_id) {
                    if let Some(entry) = self.store.get(key).await {
                        let mut value = entry.value;
                        let rewritten = value.replace_record_id(from, to);
                        if rewritten > 0 {
                            let version = self.store.set(key, value, EntryOrigin::Reconciled).await;
                            ledger.record_write(key, version);
                            reconciled_records += rewritten;
                        }
                    }
                }
                ledger.release_success(key, pending.id());
            }
        }

        let mut invalidated = Vec::new();
        for key in pending.affected_keys() {
            self.store.invalidate(key).await;
            invalidated.push(key.clone());
        }
        for prefix in prefixes {
            let matched = self.store.invalidate_prefix(prefix).await;
            tracing::debug!(mutation = %pending.id(), prefix = %prefix, matched, "Prefix invalidated");
            invalidated.push(prefix.clone());
        }

        MutationOutcome {
            id: pending.id(),
            label: pending.label().to_string(),
            body,
            server_id,
            reconciled_records,
            invalidated,
        }
    }

    /// Restore every speculative key. With `refresh`, every affected key is
    /// invalidated afterwards because the server may hold the change.
    async fn rollback(&self, pending: &PendingMutation, refresh_all: bool) {
        let mut refresh = Vec::new();
        {
            let mut ledger = self.ledger.lock().await;
            for key in pending.speculative_keys() {
                let Some(plan) = ledger.release_failure(key, pending.id()) else {
                    continue;
                };
                let current = self.store.get(key).await.map(|entry| entry.version);
                if current.is_none() || current != plan.last_written {
                    // Written by someone else during the pending window: that
                    // value is server truth and stays.
                    self.counters.rollbacks_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        mutation = %pending.id(),
                        key = %key,
                        "Entry overwritten during pending window, skipping rollback"
                    );
                    refresh.push(key.clone());
                    continue;
                }

                let version = self.store.set(key, plan.restored, EntryOrigin::Rollback).await;
                ledger.record_write(key, version);
                self.counters.keys_rolled_back.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    mutation = %pending.id(),
                    key = %key,
                    replayed = plan.replayed,
                    superseded = plan.superseded,
                    "Rolled back"
                );
                if plan.superseded {
                    refresh.push(key.clone());
                }
            }
        }

        if refresh_all {
            for key in pending.affected_keys() {
                if !refresh.contains(key) {
                    refresh.push(key.clone());
                }
            }
        }
        for key in &refresh {
            self.store.invalidate(key).await;
        }
    }
}

/// A mutation whose speculative writes are in the cache and whose remote
/// call has not been made yet.
///
/// Dropping it without calling [`settle`](Self::settle) rolls the writes
/// back on the current tokio runtime.
#[must_use = "the remote call is only made by `settle`; dropping rolls back"]
pub struct InFlight<V, S, T>
where
    V: Reconcile + Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
    T: Transport + 'static,
{
    coordinator: OptimisticCoordinator<V, S, T>,
    pending: PendingMutation,
    call: Option<RemoteCall>,
}

struct RemoteCall {
    input: MutationInput,
    invalidate_prefixes: Vec<CacheKey>,
    placeholder: Option<RecordId>,
    expects_data: bool,
    on_success: Option<SuccessHook>,
    on_error: Option<ErrorHook>,
    _settling: SettlingGuard,
}

impl<V, S, T> InFlight<V, S, T>
where
    V: Reconcile + Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
    T: Transport + 'static,
{
    pub fn id(&self) -> MutationId {
        self.pending.id()
    }

    pub fn pending(&self) -> &PendingMutation {
        &self.pending
    }

    /// Issue the remote call and reconcile (success) or roll back (failure).
    ///
    /// The work runs on a spawned task and completes even if this future is
    /// dropped. A panic inside a settlement hook is propagated to the caller.
    pub async fn settle(mut self) -> PlazaResult<MutationOutcome> {
        let label = self.pending.label().to_string();
        let Some(call) = self.call.take() else {
            return Err(MutationError::Abandoned { label }.into());
        };
        let coordinator = self.coordinator.clone();
        let pending = self.pending.clone();

        let task = tokio::spawn(async move { coordinator.run(pending, call).await });
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(MutationError::Abandoned { label }.into()),
        }
    }
}

impl<V, S, T> Drop for InFlight<V, S, T>
where
    V: Reconcile + Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
    T: Transport + 'static,
{
    fn drop(&mut self) {
        let Some(call) = self.call.take() else {
            return;
        };
        let coordinator = self.coordinator.clone();
        let pending = self.pending.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _settling = call;
                    coordinator.abandon(pending).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    mutation = %pending.id(),
                    label = pending.label(),
                    "Mutation dropped outside a runtime, speculative writes stay in the cache"
                );
            }
        }
    }
}

/// A malformed success or a missing server id means the server answered 2xx
/// and may already hold the change.
fn server_may_have_applied(err: &PlazaError) -> bool {
    matches!(
        err,
        PlazaError::Remote(RemoteError::Malformed { .. }) | PlazaError::Mutation(MutationError::MissingServerId { .. })
    )
}

fn check_body(
    label: &str,
    body: Value,
    placeholder: Option<RecordId>,
    expects_data: bool,
) -> PlazaResult<(Value, Option<RecordId>)> {
    if expects_data && body.get("data").map_or(true, Value::is_null) {
        return Err(RemoteError::malformed(format!("{label}: success response has no data")).into());
    }
    let server_id = match placeholder {
        Some(_) => Some(data_record_id(&body).ok_or_else(|| MutationError::MissingServerId {
            label: label.to_string(),
        })?),
        None => None,
    };
    Ok((body, server_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_body_requires_data_when_expected() {
        let err = check_body("x", json!({ "message": "ok" }), None, true).unwrap_err();
        assert!(matches!(err, PlazaError::Remote(RemoteError::Malformed { .. })));
        assert!(check_body("x", Value::Null, None, false).is_ok());
    }

    #[test]
    fn test_check_body_extracts_server_id() {
        let (_, id) = check_body("x", json!({ "data": { "id": 101 } }), Some(RecordId::new(-1)), true).unwrap();
        assert_eq!(id, Some(RecordId::new(101)));
    }

    #[test]
    fn test_committed_failures_are_refreshed() {
        assert!(server_may_have_applied(&RemoteError::malformed("no data").into()));
        assert!(server_may_have_applied(
            &MutationError::MissingServerId { label: "x".into() }.into()
        ));
        assert!(!server_may_have_applied(&RemoteError::network("down").into()));
    }

    #[test]
    fn test_check_body_missing_server_id() {
        let err = check_body("create_comment", json!({ "data": { "content": "hi" } }), Some(RecordId::new(-1)), true)
            .unwrap_err();
        assert_eq!(
            err,
            PlazaError::Mutation(MutationError::MissingServerId {
                label: "create_comment".to_string()
            })
        );
    }
}
