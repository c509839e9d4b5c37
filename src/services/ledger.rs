use dashmap::DashMap;

use crate::models::payment::Transaction;

/// In-memory routing table from payment id to the transaction that owns it.
/// Process-local: a restart loses all refund-routing information.
pub struct Ledger {
    entries: DashMap<String, Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Unconditional overwrite of the entry for `payment_id`.
    pub fn put(&self, payment_id: &str, entry: Transaction) {
        self.entries.insert(payment_id.to_string(), entry);
    }

    /// Clone-out snapshot of the entry, if present.
    pub fn get(&self, payment_id: &str) -> Option<Transaction> {
        self.entries.get(payment_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
