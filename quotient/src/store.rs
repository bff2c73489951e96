//! Shared quote collection and snapshot reconciliation.
//!
//! The store is the only writer surface for quote state: poll ticks merge
//! partial snapshots, the terminal transform replaces whole entries, and
//! submissions prepend. Entries keep their position on update so an
//! observer iterating the collection sees a stable order. A watch channel
//! publishes a revision counter bumped on every mutation so observers can
//! detect changes without polling the collection itself.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::watch;

use crate::protocol::QuoteRecord;
use crate::quote::QuoteAnalysis;

pub struct QuoteStore {
    quotes: RwLock<Vec<QuoteAnalysis>>,
    error: RwLock<Option<String>>,
    revision_tx: watch::Sender<u64>,
}

impl QuoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn bump_revision(&self) {
        self.revision_tx.send_modify(|revision| *revision += 1);
    }

    /// Subscribe to mutation notifications. The value is a counter, only
    /// its changes are meaningful.
    pub fn watch_revision(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Newest submissions go first, matching how the collection is shown.
    pub fn insert_front(&self, quote: QuoteAnalysis) {
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, quote);
        self.bump_revision();
    }

    /// Merge a polled snapshot into the entry with the same id.
    ///
    /// Snapshot fields win where the backend provided a value; fields the
    /// lightweight query never carries (items, summary, filename) are left
    /// alone. The entry keeps its position. An unknown id is a no-op: the
    /// entry must have been created by the submit operation, so this means
    /// the collection was cleared while the poll was in flight.
    pub fn apply_snapshot(&self, snapshot: &QuoteRecord) -> bool {
        let mut quotes = self.quotes.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = quotes.iter_mut().find(|q| q.id == snapshot.id) else {
            drop(quotes);
            tracing::warn!(quote_id = %snapshot.id, "snapshot for unknown quote, ignoring");
            return false;
        };

        entry.status = snapshot.status;
        if snapshot.vendor_name.is_some() {
            entry.vendor.name = snapshot.vendor_name.clone();
        }
        if snapshot.vendor_company.is_some() {
            entry.vendor.company = snapshot.vendor_company.clone();
        }
        if snapshot.quote_number.is_some() {
            entry.vendor.quote_number = snapshot.quote_number.clone();
        }
        if snapshot.quote_date.is_some() {
            entry.vendor.quote_date = snapshot.quote_date.clone();
        }
        if snapshot.subtotal.is_some() {
            entry.financials.subtotal = snapshot.subtotal;
        }
        if snapshot.tax.is_some() {
            entry.financials.tax = snapshot.tax;
        }
        if snapshot.shipping.is_some() {
            entry.financials.shipping = snapshot.shipping;
        }
        if snapshot.total.is_some() {
            entry.financials.total = snapshot.total;
        }
        if snapshot.item_count.is_some() {
            entry.item_count = snapshot.item_count;
        }
        if snapshot.matched_item_count.is_some() {
            entry.matched_item_count = snapshot.matched_item_count;
        }
        entry.estimated_time_remaining = snapshot.estimated_time_remaining;
        if snapshot.parsing_error.is_some() {
            entry.parsing_error = snapshot.parsing_error.clone();
        }
        if let Some(created_at) = &snapshot.created_at {
            entry.created_at = created_at.clone();
        }
        if let Some(updated_at) = &snapshot.updated_at {
            entry.updated_at = updated_at.clone();
        }
        if snapshot.processed_at.is_some() {
            entry.processed_at = snapshot.processed_at.clone();
        }

        drop(quotes);
        self.bump_revision();
        true
    }

    /// Swap the whole entry with the same id, keeping its position.
    pub fn replace(&self, analysis: QuoteAnalysis) -> bool {
        let mut quotes = self.quotes.write().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = quotes.iter_mut().find(|q| q.id == analysis.id) else {
            drop(quotes);
            tracing::warn!(quote_id = %analysis.id, "replacement for unknown quote, ignoring");
            return false;
        };

        *entry = analysis;
        drop(quotes);
        self.bump_revision();
        true
    }

    /// Replace the whole collection, e.g. from the backend listing.
    pub fn set_all(&self, quotes: Vec<QuoteAnalysis>) {
        *self.quotes.write().unwrap_or_else(PoisonError::into_inner) = quotes;
        self.bump_revision();
    }

    pub fn get(&self, id: &str) -> Option<QuoteAnalysis> {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|q| q.id == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<QuoteAnalysis> {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.quotes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty the collection and the error slot.
    pub fn clear(&self) {
        self.quotes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.bump_revision();
    }

    /// Current subsystem error, e.g. a terminal parsing failure.
    pub fn error(&self) -> Option<String> {
        self.error
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = Some(message.into());
        self.bump_revision();
    }

    pub fn clear_error(&self) {
        *self.error.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl Default for QuoteStore {
    fn default() -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            quotes: RwLock::new(Vec::new()),
            error: RwLock::new(None),
            revision_tx,
        }
    }
}
