//! Upload item store
//!
//! Ordered collection of [`UploadItem`]s keyed by stable [`ItemId`]s.
//! Removal hands the item's preview back so the caller can release it.

use super::item::{ItemEvent, ItemId, ItemState, TransitionError, UploadItem};
use super::preview::PreviewHandle;
use super::SelectedFile;

/// Result of applying an event to a queued item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The item was removed before the event arrived
    Missing,
    Rejected(TransitionError),
}

#[derive(Debug, Default)]
pub struct UploadQueue {
    items: Vec<UploadItem>,
    next_id: u64,
}

impl UploadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `Selected` item and return its id
    pub fn append(&mut self, file: SelectedFile, preview: PreviewHandle) -> ItemId {
        self.next_id += 1;
        let id = ItemId::new(self.next_id);
        self.items.push(UploadItem::new(id, file, preview));
        id
    }

    /// Remove one item, keeping the order of the rest
    pub fn remove(&mut self, id: ItemId) -> Option<PreviewHandle> {
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some(self.items.remove(index).into_preview())
    }

    /// Remove every item
    pub fn clear(&mut self) -> Vec<PreviewHandle> {
        self.items.drain(..).map(UploadItem::into_preview).collect()
    }

    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Ids of every item not yet uploaded, in queue order
    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| !item.is_uploaded())
            .map(UploadItem::id)
            .collect()
    }

    pub fn count_in(&self, state: ItemState) -> usize {
        self.items.iter().filter(|item| item.state() == state).count()
    }

    /// URLs of every uploaded item, in queue order
    pub fn uploaded_urls(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| item.remote_url().map(str::to_string))
            .collect()
    }

    /// Route an executor event to the item with `id`
    pub fn apply(&mut self, id: ItemId, event: ItemEvent) -> ApplyOutcome {
        match self.items.iter_mut().find(|item| item.id() == id) {
            None => ApplyOutcome::Missing,
            Some(item) => match item.apply(event) {
                Ok(()) => ApplyOutcome::Applied,
                Err(e) => ApplyOutcome::Rejected(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::preview::PreviewManager;

    fn fill(queue: &mut UploadQueue, previews: &mut PreviewManager, names: &[&str]) -> Vec<ItemId> {
        names
            .iter()
            .map(|name| {
                let file = SelectedFile::new(*name, name.as_bytes().to_vec());
                let preview = previews.acquire(&file).unwrap();
                queue.append(file, preview)
            })
            .collect()
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut queue = UploadQueue::new();
        let ids = fill(&mut queue, &mut previews, &["a.png", "b.png"]);

        assert_eq!(queue.len(), 2);
        assert!(ids[0] < ids[1]);
        assert_eq!(queue.get(ids[1]).unwrap().source_name(), "b.png");
    }

    #[test]
    fn test_remove_preserves_order_and_never_reuses_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut queue = UploadQueue::new();
        let ids = fill(&mut queue, &mut previews, &["a.png", "b.png", "c.png"]);

        let handle = queue.remove(ids[1]).unwrap();
        assert!(previews.release(handle));
        assert!(queue.remove(ids[1]).is_none());

        let names: Vec<_> = queue.items().iter().map(|i| i.source_name()).collect();
        assert_eq!(names, vec!["a.png", "c.png"]);

        let new_ids = fill(&mut queue, &mut previews, &["d.png"]);
        assert!(!ids.contains(&new_ids[0]));
    }

    #[test]
    fn test_clear_returns_every_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut queue = UploadQueue::new();
        fill(&mut queue, &mut previews, &["a.png", "b.png", "c.png"]);

        let handles = queue.clear();
        assert_eq!(handles.len(), 3);
        assert!(queue.is_empty());
        for handle in handles {
            assert!(previews.release(handle));
        }
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn test_apply_to_missing_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut queue = UploadQueue::new();
        let ids = fill(&mut queue, &mut previews, &["a.png"]);
        previews.release(queue.remove(ids[0]).unwrap());

        let outcome = queue.apply(ids[0], ItemEvent::Succeeded { url: "u".into() });
        assert_eq!(outcome, ApplyOutcome::Missing);
    }

    #[test]
    fn test_pending_and_uploaded_views() {
        let dir = tempfile::tempdir().unwrap();
        let mut previews = PreviewManager::new(dir.path());
        let mut queue = UploadQueue::new();
        let ids = fill(&mut queue, &mut previews, &["a.png", "b.png"]);

        queue.apply(ids[0], ItemEvent::Started { key: "k".into() });
        queue.apply(ids[0], ItemEvent::Succeeded { url: "https://cdn/a.png".into() });

        assert_eq!(queue.pending_ids(), vec![ids[1]]);
        assert_eq!(queue.uploaded_urls(), vec!["https://cdn/a.png".to_string()]);
        assert_eq!(queue.count_in(ItemState::Uploaded), 1);
        assert_eq!(queue.count_in(ItemState::Selected), 1);

        let rejected = queue.apply(ids[0], ItemEvent::Started { key: "k2".into() });
        assert!(matches!(rejected, ApplyOutcome::Rejected(_)));
    }
}
