//! FIFO transcription queue with manual reordering.
//!
//! A pure value transformer with no interior concurrency; one logical
//! owner mutates it. Operations over unknown ids or invalid indices are
//! no-ops — the queue refuses to act, it never errors on bad input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// One pending/active/finished unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub file_path: String,
    pub file_name: String,
    pub status: QueueItemStatus,
    pub progress: f64,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    fn new(path: &str) -> Self {
        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string());
        Self {
            id: Uuid::new_v4().to_string(),
            file_path: path.to_string(),
            file_name,
            status: QueueItemStatus::Pending,
            progress: 0.0,
            added_at: Utc::now(),
        }
    }
}

/// Ordered collection of queue items. Insertion order is preserved until
/// explicitly reordered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptionQueue {
    items: Vec<QueueItem>,
}

impl TranscriptionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Appends new Pending items at the tail, in the given order.
    /// Returns the ids of the created items.
    pub fn enqueue<I, S>(&mut self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = Vec::new();
        for path in paths {
            let item = QueueItem::new(path.as_ref());
            ids.push(item.id.clone());
            self.items.push(item);
        }
        ids
    }

    /// Earliest-inserted item still Pending, regardless of status churn
    /// elsewhere in the queue.
    pub fn next_pending(&self) -> Option<&QueueItem> {
        self.items
            .iter()
            .find(|item| item.status == QueueItemStatus::Pending)
    }

    /// Moves the item at `from` to position `to`, shifting the items in
    /// between; the relative order of all other items is untouched.
    /// Out-of-range indices and `from == to` leave the queue unchanged.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from == to || from >= self.items.len() || to >= self.items.len() {
            return;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
    }

    /// Mutates exactly one item's status (and progress, when given).
    /// Unknown ids are a no-op.
    pub fn update_status(&mut self, id: &str, status: QueueItemStatus, progress: Option<f64>) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.status = status;
            if let Some(progress) = progress {
                item.progress = progress;
            }
        }
    }

    /// Deletes one item without disturbing the others' relative order.
    /// Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) {
        self.items.retain(|item| item.id != id);
    }

    /// Bulk-clears finished items (Completed and Error).
    pub fn clear_finished(&mut self) {
        self.items.retain(|item| {
            !matches!(
                item.status,
                QueueItemStatus::Completed | QueueItemStatus::Error
            )
        });
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_of(paths: &[&str]) -> (TranscriptionQueue, Vec<String>) {
        let mut queue = TranscriptionQueue::new();
        let ids = queue.enqueue(paths.iter().copied());
        (queue, ids)
    }

    #[test]
    fn enqueue_appends_pending_items_in_order() {
        let (queue, ids) = queue_of(&["/audio/a.mp3", "/audio/b.wav", "/audio/c.m4a"]);

        assert_eq!(queue.len(), 3);
        assert_eq!(ids.len(), 3);
        for (item, path) in queue.items().iter().zip(["/audio/a.mp3", "/audio/b.wav", "/audio/c.m4a"]) {
            assert_eq!(item.file_path, path);
            assert_eq!(item.status, QueueItemStatus::Pending);
            assert_eq!(item.progress, 0.0);
        }
        assert_eq!(queue.items()[1].file_name, "b.wav");
    }

    #[test]
    fn next_pending_is_fifo_despite_status_churn() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);

        // Finish the first, error the third: FIFO head is now b.
        queue.update_status(&ids[0], QueueItemStatus::Completed, Some(100.0));
        queue.update_status(&ids[2], QueueItemStatus::Error, None);
        assert_eq!(queue.next_pending().unwrap().id, ids[1]);

        // Mark b processing: next candidate is d.
        queue.update_status(&ids[1], QueueItemStatus::Processing, None);
        assert_eq!(queue.next_pending().unwrap().id, ids[3]);

        queue.update_status(&ids[3], QueueItemStatus::Completed, None);
        assert!(queue.next_pending().is_none());
    }

    #[test]
    fn reorder_moves_one_item_preserving_the_rest() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3", "c.mp3"]);

        // [a, b, c] --move 0→2--> [b, c, a]
        queue.reorder(0, 2);
        let order: Vec<_> = queue.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(order, vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]);
        assert_eq!(queue.next_pending().unwrap().id, ids[1]);
    }

    #[test]
    fn reorder_backwards() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);

        // [a, b, c, d] --move 3→1--> [a, d, b, c]
        queue.reorder(3, 1);
        let order: Vec<_> = queue.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(
            order,
            vec![ids[0].clone(), ids[3].clone(), ids[1].clone(), ids[2].clone()]
        );
    }

    #[test]
    fn reorder_out_of_range_or_same_index_is_noop() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3"]);
        let before: Vec<_> = queue.items().to_vec();

        queue.reorder(0, 0);
        queue.reorder(5, 1);
        queue.reorder(0, 2);
        queue.reorder(7, 9);

        assert_eq!(queue.items(), before.as_slice());
        assert_eq!(queue.next_pending().unwrap().id, ids[0]);
    }

    #[test]
    fn update_status_touches_exactly_one_item() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3"]);
        queue.update_status(&ids[0], QueueItemStatus::Processing, Some(42.0));

        assert_eq!(queue.items()[0].status, QueueItemStatus::Processing);
        assert_eq!(queue.items()[0].progress, 42.0);
        assert_eq!(queue.items()[1].status, QueueItemStatus::Pending);
        assert_eq!(queue.items()[1].progress, 0.0);
    }

    #[test]
    fn operations_on_unknown_ids_are_noops() {
        let (mut queue, _) = queue_of(&["a.mp3"]);
        let before = queue.items().to_vec();

        queue.update_status("ghost", QueueItemStatus::Completed, Some(100.0));
        queue.remove("ghost");

        assert_eq!(queue.items(), before.as_slice());
        assert!(queue.get("ghost").is_none());
    }

    #[test]
    fn remove_keeps_relative_order() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3", "c.mp3"]);
        queue.remove(&ids[1]);

        let order: Vec<_> = queue.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(order, vec![ids[0].clone(), ids[2].clone()]);
    }

    #[test]
    fn clear_finished_keeps_pending_and_processing() {
        let (mut queue, ids) = queue_of(&["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
        queue.update_status(&ids[0], QueueItemStatus::Completed, None);
        queue.update_status(&ids[1], QueueItemStatus::Error, None);
        queue.update_status(&ids[2], QueueItemStatus::Processing, None);

        queue.clear_finished();
        let order: Vec<_> = queue.items().iter().map(|i| i.id.clone()).collect();
        assert_eq!(order, vec![ids[2].clone(), ids[3].clone()]);

        queue.clear();
        assert!(queue.is_empty());
    }
}
