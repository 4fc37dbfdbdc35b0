//! Mutation requests.

use std::fmt;
use std::sync::Arc;

use plaza_cache::CacheKey;
use plaza_core::{Endpoint, Payload, PlazaError, RecordId};

use crate::coordinator::MutationOutcome;

/// Pure function from the current snapshot to the predicted one.
pub type Prediction<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;

/// Side effect run after a successful settlement.
pub type SuccessHook = Box<dyn FnOnce(&MutationOutcome) + Send>;

/// Side effect run after a failed settlement, once the cache is restored.
pub type ErrorHook = Box<dyn FnOnce(&PlazaError) + Send>;

/// The remote half of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationInput {
    pub endpoint: Endpoint,
    pub payload: Payload,
}

/// Everything the coordinator needs to run one optimistic mutation.
///
/// ```ignore
/// let request = MutationRequest::new("toggle_comment_reaction", Endpoint::post(path), Payload::Empty)
///     .predict(keys::comments_for_post(post_id), move |snapshot| toggle(snapshot, comment_id))
///     .invalidate(keys::feeds());
/// ```
pub struct MutationRequest<V> {
    pub(crate) label: String,
    pub(crate) input: MutationInput,
    pub(crate) predictions: Vec<(CacheKey, Prediction<V>)>,
    pub(crate) invalidate: Vec<CacheKey>,
    pub(crate) invalidate_prefixes: Vec<CacheKey>,
    pub(crate) placeholder: Option<RecordId>,
    pub(crate) expects_data: bool,
    pub(crate) on_success: Option<SuccessHook>,
    pub(crate) on_error: Option<ErrorHook>,
}

impl<V> MutationRequest<V> {
    pub fn new(label: impl Into<String>, endpoint: Endpoint, payload: Payload) -> Self {
        Self {
            label: label.into(),
            input: MutationInput { endpoint, payload },
            predictions: Vec::new(),
            invalidate: Vec::new(),
            invalidate_prefixes: Vec::new(),
            placeholder: None,
            expects_data: false,
            on_success: None,
            on_error: None,
        }
    }

    /// Apply `prediction` to the value cached at `key` before the call.
    pub fn predict<F>(mut self, key: CacheKey, prediction: F) -> Self
    where
        F: Fn(&V) -> V + Send + Sync + 'static,
    {
        self.predictions.push((key, Arc::new(prediction)));
        self
    }

    /// Also invalidate `key` on success.
    pub fn invalidate(mut self, key: CacheKey) -> Self {
        if !self.invalidate.contains(&key) {
            self.invalidate.push(key);
        }
        self
    }

    /// Also invalidate every key under `prefix` on success.
    pub fn invalidate_prefix(mut self, prefix: CacheKey) -> Self {
        self.invalidate_prefixes.push(prefix);
        self
    }

    /// The placeholder id the prediction inserted. The server's `data.id`
    /// replaces it on success; a success without one is an error.
    pub fn placeholder(mut self, id: RecordId) -> Self {
        self.placeholder = Some(id);
        self.expects_data = true;
        self
    }

    /// Treat a success body without `data` as malformed.
    pub fn expect_data(mut self) -> Self {
        self.expects_data = true;
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&MutationOutcome) + Send + 'static,
    {
        self.on_success = Some(Box::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(&PlazaError) + Send + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn input(&self) -> &MutationInput {
        &self.input
    }

    pub fn placeholder_id(&self) -> Option<RecordId> {
        self.placeholder
    }

    pub fn predicted_keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.predictions.iter().map(|(key, _)| key)
    }

    pub fn invalidated_prefixes(&self) -> &[CacheKey] {
        &self.invalidate_prefixes
    }

    /// Predicted keys followed by extra invalidations, without duplicates.
    pub fn affected_keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = Vec::new();
        for key in self.predicted_keys().chain(self.invalidate.iter()) {
            if !keys.contains(key) {
                keys.push(key.clone());
            }
        }
        keys
    }

    /// Run the prediction registered for `key` against `value`.
    pub fn predict_value(&self, key: &CacheKey, value: &V) -> Option<V> {
        self.predictions
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, prediction)| prediction(value))
    }
}

impl<V> fmt::Debug for MutationRequest<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRequest")
            .field("label", &self.label)
            .field("input", &self.input)
            .field("predicted_keys", &self.predicted_keys().collect::<Vec<_>>())
            .field("invalidate", &self.invalidate)
            .field("invalidate_prefixes", &self.invalidate_prefixes)
            .field("placeholder", &self.placeholder)
            .field("expects_data", &self.expects_data)
            .finish_non_exhaustive()
    }
}
