//! Client-side view of one ordered collection.
//!
//! A viewer applies its own reorders optimistically, sends the request,
//! and then folds incoming realtime events into its local list. Anything it
//! cannot patch safely is answered with [`Reconciliation::Refetch`]: the
//! server's ordering is authoritative and last write wins.

use super::ordering::{clamp_move, is_noop, move_item};
use crate::models::{sort_by_display_order, ChangeEvent, ChangeKind, Collection, Ordered};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The local list was updated from the event.
    Applied,
    /// The event carried nothing new for this view.
    Ignored,
    /// The local list can no longer be trusted; reload it from the server.
    Refetch,
}

/// The wire body of a reorder request, as sent by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub source_index: usize,
    pub target_index: usize,
}

/// An optimistic reorder awaiting the server's answer.
#[derive(Debug, Clone)]
pub struct PendingReorder<T> {
    pub request: ReorderRequest,
    snapshot: Vec<T>,
}

#[derive(Debug, Clone)]
pub struct CollectionView<T> {
    collection: Collection,
    items: Vec<T>,
}

impl<T> CollectionView<T>
where
    T: Ordered + DeserializeOwned,
{
    pub fn new(collection: Collection, mut items: Vec<T>) -> Self {
        sort_by_display_order(&mut items);
        Self { collection, items }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id()).collect()
    }

    /// Installs a freshly fetched list.
    pub fn replace(&mut self, mut items: Vec<T>) {
        sort_by_display_order(&mut items);
        self.items = items;
    }

    /// Clamps the drag indices, applies the move locally and returns the
    /// request to send. `None` when the move would change nothing.
    pub fn begin_reorder(&mut self, source: i64, target: i64) -> Option<PendingReorder<T>> {
        let (source, target) = clamp_move(self.items.len(), source, target)?;
        if is_noop(source, target) {
            return None;
        }

        let snapshot = self.items.clone();
        move_item(&mut self.items, source, target);
        self.renumber();

        Some(PendingReorder {
            request: ReorderRequest {
                source_index: source,
                target_index: target,
            },
            snapshot,
        })
    }

    /// Undoes a failed optimistic reorder. The caller should still refetch,
    /// since other viewers may have changed the list meanwhile.
    pub fn rollback(&mut self, pending: PendingReorder<T>) -> Reconciliation {
        self.items = pending.snapshot;
        Reconciliation::Refetch
    }

    pub fn apply(&mut self, event: &ChangeEvent) -> Reconciliation {
        if event.collection() != Some(self.collection) {
            return Reconciliation::Ignored;
        }

        match event.kind {
            ChangeKind::Update => self.apply_update(event),
            ChangeKind::Reorder => self.apply_order(event.order.as_deref()),
            ChangeKind::Insert | ChangeKind::Delete => Reconciliation::Refetch,
        }
    }

    fn apply_update(&mut self, event: &ChangeEvent) -> Reconciliation {
        let Some(record) = event
            .record
            .clone()
            .and_then(|value| serde_json::from_value::<T>(value).ok())
        else {
            return Reconciliation::Refetch;
        };

        let Some(local) = self.items.iter_mut().find(|item| item.id() == record.id()) else {
            return Reconciliation::Refetch;
        };

        let previous = event.old_display_order.unwrap_or(local.display_order());
        if record.display_order() != previous || record.display_order() != local.display_order() {
            return Reconciliation::Refetch;
        }

        *local = record;
        Reconciliation::Applied
    }

    fn apply_order(&mut self, order: Option<&[String]>) -> Reconciliation {
        let Some(order) = order else {
            return Reconciliation::Refetch;
        };

        if order.len() == self.items.len() && order.iter().zip(&self.items).all(|(id, item)| id == item.id()) {
            return Reconciliation::Ignored;
        }

        if order.len() != self.items.len() {
            return Reconciliation::Refetch;
        }

        let mut remaining = std::mem::take(&mut self.items);
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in order {
            match remaining.iter().position(|item| item.id() == id) {
                Some(pos) => reordered.push(remaining.swap_remove(pos)),
                None => {
                    // Unknown id: restore what we had and ask for a reload.
                    reordered.append(&mut remaining);
                    self.items = reordered;
                    sort_by_display_order(&mut self.items);
                    return Reconciliation::Refetch;
                }
            }
        }

        self.items = reordered;
        self.renumber();
        Reconciliation::Applied
    }

    fn renumber(&mut self) {
        for (pos, item) in self.items.iter_mut().enumerate() {
            item.set_display_order(pos as i64);
        }
    }
}
