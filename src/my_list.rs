use crate::models::CatalogItem;
use crate::session::UserId;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Per-user saved list, stored as one document per item under
/// `customers/{user}/myList/{item_id}`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite the document for `item` with its full payload.
    async fn put_item(&self, user: &UserId, item: &CatalogItem) -> Result<()>;
    async fn delete_item(&self, user: &UserId, item_id: i64) -> Result<()>;
    async fn list_items(&self, user: &UserId) -> Result<Vec<CatalogItem>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListAction {
    Added,
    Removed,
}

pub fn is_member(item: &CatalogItem, snapshot: &[CatalogItem]) -> bool {
    snapshot.iter().any(|saved| saved.id == item.id)
}

/// Add `item` when it is not a member, remove it otherwise.
pub async fn toggle_membership(
    store: &dyn DocumentStore,
    user: &UserId,
    item: &CatalogItem,
    currently_member: bool,
) -> Result<ListAction> {
    if currently_member {
        store
            .delete_item(user, item.id)
            .await
            .with_context(|| format!("Failed to remove '{}' from My List", item.display_title()))?;
        Ok(ListAction::Removed)
    } else {
        store
            .put_item(user, item)
            .await
            .with_context(|| format!("Failed to add '{}' to My List", item.display_title()))?;
        Ok(ListAction::Added)
    }
}

pub fn notice_text(item: &CatalogItem, action: ListAction) -> String {
    match action {
        ListAction::Added => format!("{} has been added to My List.", item.display_title()),
        ListAction::Removed => format!("{} has been removed from My List", item.display_title()),
    }
}

/// In-process store used when no remote project is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    lists: Mutex<HashMap<UserId, BTreeMap<String, CatalogItem>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put_item(&self, user: &UserId, item: &CatalogItem) -> Result<()> {
        let mut lists = self.lists.lock().await;
        lists
            .entry(user.clone())
            .or_default()
            .insert(item.id.to_string(), item.clone());
        Ok(())
    }

    async fn delete_item(&self, user: &UserId, item_id: i64) -> Result<()> {
        let mut lists = self.lists.lock().await;
        if let Some(list) = lists.get_mut(user) {
            list.remove(&item_id.to_string());
        }
        Ok(())
    }

    async fn list_items(&self, user: &UserId) -> Result<Vec<CatalogItem>> {
        let lists = self.lists.lock().await;
        Ok(lists
            .get(user)
            .map(|list| list.values().cloned().collect())
            .unwrap_or_default())
    }
}

/// Live mirror of one user's list.
///
/// Lists the collection on start, then again every `every` and whenever
/// [`MembershipFeed::refresh`] is called. `on_snapshot` only sees snapshots
/// that differ from the previous one. Dropping the feed stops it.
pub struct MembershipFeed {
    user: UserId,
    refresh: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MembershipFeed {
    pub fn spawn<F>(
        store: Arc<dyn DocumentStore>,
        user: UserId,
        every: Duration,
        mut on_snapshot: F,
    ) -> Self
    where
        F: FnMut(Vec<CatalogItem>) + Send + 'static,
    {
        let refresh = Arc::new(Notify::new());
        let poke = refresh.clone();
        let task_user = user.clone();
        let task = tokio::spawn(async move {
            let mut last: Option<Vec<CatalogItem>> = None;
            loop {
                match store.list_items(&task_user).await {
                    Ok(items) => {
                        if last.as_ref() != Some(&items) {
                            debug!(user = %task_user, count = items.len(), "My List changed");
                            last = Some(items.clone());
                            on_snapshot(items);
                        }
                    }
                    Err(e) => warn!(user = %task_user, "My List refresh failed: {:#}", e),
                }
                tokio::select! {
                    _ = tokio::time::sleep(every) => {}
                    _ = poke.notified() => {}
                }
            }
        });
        Self {
            user,
            refresh,
            task,
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn refresh(&self) {
        self.refresh.notify_one();
    }
}

impl Drop for MembershipFeed {
    fn drop(&mut self) {
        debug!(user = %self.user, "Releasing My List subscription");
        self.task.abort();
    }
}
