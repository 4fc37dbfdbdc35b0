//! Placeholder reconciliation on cached snapshots.

use plaza_core::{replace_record_id, DomainRecord, RecordId};

/// A cached snapshot whose record identifiers can be rewritten once the
/// server assigns a real id to a placeholder.
pub trait Reconcile {
    /// Replace `from` with `to` everywhere (ids and references, nested
    /// children included). Returns the number of records rewritten.
    fn replace_record_id(&mut self, from: RecordId, to: RecordId) -> usize;
}

impl<R: DomainRecord> Reconcile for Vec<R> {
    fn replace_record_id(&mut self, from: RecordId, to: RecordId) -> usize {
        replace_record_id(self, from, to)
    }
}
