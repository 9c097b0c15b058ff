//! In-memory, insertion-ordered task collection.

use std::sync::Arc;

use {tokio::sync::RwLock, tracing::debug};

use crate::{
    error::{Error, Result},
    model::Task,
};

/// Store handle shared between the HTTP layer and the provider event pump.
pub type SharedTaskStore = Arc<RwLock<TaskStore>>;

/// Ordered list of tasks. Ids are not checked for uniqueness here; lookups
/// act on the first match.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh store for sharing.
    pub fn shared() -> SharedTaskStore {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn add(&mut self, task: Task) {
        debug!(id = %task.id, category = %task.category, "task added");
        self.tasks.push(task);
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Overwrite the status of a task and return the updated record.
    pub fn update_status(&mut self, id: &str, status: impl Into<String>) -> Result<&Task> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        task.status = status.into();
        debug!(id, status = %task.status, "task status updated");
        Ok(task)
    }

    /// Remove a task and hand it back.
    pub fn delete(&mut self, id: &str) -> Result<Task> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        debug!(id, "task deleted");
        Ok(self.tasks.remove(index))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use crate::classifier::classify;

    fn task(message: &str) -> Task {
        classify(message, "Ana", "5511999990000").expect("actionable message")
    }

    #[test]
    fn add_then_list_round_trips() {
        let mut store = TaskStore::new();
        let t = task("Can we schedule a call tomorrow?");
        store.add(t.clone());

        assert_eq!(store.list(), std::slice::from_ref(&t));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn preserves_insertion_order() {
        let mut store = TaskStore::new();
        let first = task("first?");
        let second = task("second?");
        let third = task("third?");
        store.add(first.clone());
        store.add(second.clone());
        store.add(third.clone());

        let ids: Vec<&str> = store.list().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![
            first.id.as_str(),
            second.id.as_str(),
            third.id.as_str()
        ]);
    }

    #[test]
    fn update_status_mutates_in_place() {
        let mut store = TaskStore::new();
        let t = task("any news?");
        store.add(t.clone());

        let updated = store.update_status(&t.id, "done").unwrap();
        assert_eq!(updated.status, "done");
        assert_eq!(updated.original_message, t.original_message);
        assert_eq!(updated.category, t.category);
        assert_eq!(store.get(&t.id).unwrap().status, "done");
    }

    #[test]
    fn update_status_accepts_arbitrary_strings() {
        let mut store = TaskStore::new();
        let t = task("any news?");
        store.add(t.clone());

        store.update_status(&t.id, "waiting on legal").unwrap();
        assert_eq!(store.get(&t.id).unwrap().status, "waiting on legal");
    }

    #[test]
    fn update_unknown_id_leaves_store_unchanged() {
        let mut store = TaskStore::new();
        let t = task("any news?");
        store.add(t.clone());

        let err = store.update_status("missing", "done").unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id } if id == "missing"));
        assert_eq!(store.list(), std::slice::from_ref(&t));
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut store = TaskStore::new();
        let keep = task("keep?");
        let gone = task("gone?");
        store.add(keep.clone());
        store.add(gone.clone());

        let removed = store.delete(&gone.id).unwrap();
        assert_eq!(removed, gone);
        assert_eq!(store.list(), std::slice::from_ref(&keep));

        assert!(matches!(store.delete(&gone.id), Err(Error::NotFound { .. })));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_store() {
        let store = TaskStore::new();
        assert!(store.is_empty());
        assert!(store.list().is_empty());
        assert!(store.get("anything").is_none());
    }

    #[tokio::test]
    async fn shared_store_is_visible_across_handles() {
        let store = TaskStore::shared();
        let other = Arc::clone(&store);
        store.write().await.add(task("ping?"));
        assert_eq!(other.read().await.len(), 1);
    }
}
