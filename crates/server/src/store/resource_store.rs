use dashmap::DashMap;
use std::sync::Arc;

use super::resource_record::Owned;

#[derive(Clone)]
pub struct ResourceStore<T> {
    items: Arc<DashMap<String, T>>,
}

impl<T> Default for ResourceStore<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Owned + Clone> ResourceStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: T) {
        self.items.insert(item.id().to_string(), item);
    }

    pub fn get(&self, owner: &str, id: &str) -> Option<T> {
        self.items
            .get(id)
            .filter(|r| r.value().owner() == owner)
            .map(|r| r.value().clone())
    }

    /// Oldest first.
    pub fn list(&self, owner: &str) -> Vec<T> {
        let mut items: Vec<T> = self
            .items
            .iter()
            .filter(|r| r.value().owner() == owner)
            .map(|r| r.value().clone())
            .collect();
        items.sort_by(|a, b| {
            a.created_at_ms()
                .cmp(&b.created_at_ms())
                .then_with(|| a.id().cmp(b.id()))
        });
        items
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Reminder;

    fn reminder(id: &str, owner: &str, at: i64) -> Reminder {
        Reminder {
            id: id.into(),
            owner: owner.into(),
            title: "water plants".into(),
            due_at_ms: None,
            created_at_ms: at,
        }
    }

    #[test]
    fn insert_and_get() {
        let store = ResourceStore::new();
        store.insert(reminder("r-1", "alice", 1));
        assert_eq!(store.get("alice", "r-1").unwrap().title, "water plants");
    }

    #[test]
    fn other_owner_cannot_see() {
        let store = ResourceStore::new();
        store.insert(reminder("r-1", "alice", 1));
        assert!(store.get("bob", "r-1").is_none());
        assert!(store.list("bob").is_empty());
    }

    #[test]
    fn list_sorted_by_creation() {
        let store = ResourceStore::new();
        store.insert(reminder("r-2", "alice", 20));
        store.insert(reminder("r-1", "alice", 10));
        store.insert(reminder("r-3", "bob", 5));
        let ids: Vec<String> = store.list("alice").into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["r-1", "r-2"]);
        assert_eq!(store.count(), 3);
    }
}
