//! The CalDAV-shaped upstream the todo provider round-trips against on
//! every call; there is no local cache. CalDAV itself is an external
//! collaborator out of scope for this core — this trait is the seam a
//! real CalDAV client would plug into, with method shapes
//! (`getCalendarByName`, `createList`, `listItems`, `addToList`,
//! `removeFromList`, `updateItemPriority`) matching what a CalDAV-backed
//! todo list needs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub priority: Option<i32>,
    pub due: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub priority: Option<i32>,
    pub due: Option<String>,
    pub description: Option<String>,
}

#[async_trait]
pub trait TodoUpstream: Send + Sync {
    async fn list_available_lists(&self) -> Result<Vec<String>, String>;
    async fn create_list(&self, list_name: &str) -> Result<(), String>;
    async fn add_item(&self, list_name: &str, item: NewItem) -> Result<(), String>;
    async fn list_items(&self, list_name: &str) -> Result<Vec<Item>, String>;
    async fn remove_item(&self, list_name: &str, item_id: &str) -> Result<(), String>;
    async fn update_priority(&self, list_name: &str, item_id: &str, priority: i32) -> Result<(), String>;
}

/// The default list name used whenever a caller omits one explicitly.
pub const DEFAULT_LIST: &str = "TODO";

/// In-memory stand-in for the real CalDAV connection. Good enough to
/// exercise the tool contract; a production deployment swaps this for a
/// `caldav`-backed implementation without touching `TodoProvider`.
pub struct InMemoryTodoUpstream {
    lists: Mutex<HashMap<String, Vec<Item>>>,
    next_id: Mutex<u64>,
}

impl Default for InMemoryTodoUpstream {
    fn default() -> Self {
        let mut lists = HashMap::new();
        lists.insert(DEFAULT_LIST.to_string(), Vec::new());
        Self {
            lists: Mutex::new(lists),
            next_id: Mutex::new(1),
        }
    }
}

impl InMemoryTodoUpstream {
    async fn fresh_id(&self) -> String {
        let mut next = self.next_id.lock().await;
        let id = *next;
        *next += 1;
        id.to_string()
    }
}

#[async_trait]
impl TodoUpstream for InMemoryTodoUpstream {
    async fn list_available_lists(&self) -> Result<Vec<String>, String> {
        Ok(self.lists.lock().await.keys().cloned().collect())
    }

    async fn create_list(&self, list_name: &str) -> Result<(), String> {
        self.lists.lock().await.entry(list_name.to_string()).or_default();
        Ok(())
    }

    async fn add_item(&self, list_name: &str, item: NewItem) -> Result<(), String> {
        let id = self.fresh_id().await;
        let mut lists = self.lists.lock().await;
        let list = lists.get_mut(list_name).ok_or_else(|| format!("List '{list_name}' not found"))?;
        list.push(Item {
            id,
            name: item.name,
            priority: item.priority,
            due: item.due,
            description: item.description,
        });
        Ok(())
    }

    async fn list_items(&self, list_name: &str) -> Result<Vec<Item>, String> {
        let lists = self.lists.lock().await;
        lists
            .get(list_name)
            .cloned()
            .ok_or_else(|| format!("List '{list_name}' not found"))
    }

    async fn remove_item(&self, list_name: &str, item_id: &str) -> Result<(), String> {
        let mut lists = self.lists.lock().await;
        let list = lists.get_mut(list_name).ok_or_else(|| format!("List '{list_name}' not found"))?;
        let before = list.len();
        list.retain(|i| i.id != item_id);
        if list.len() == before {
            return Err(format!("Item '{item_id}' not found in '{list_name}'"));
        }
        Ok(())
    }

    async fn update_priority(&self, list_name: &str, item_id: &str, priority: i32) -> Result<(), String> {
        let mut lists = self.lists.lock().await;
        let list = lists.get_mut(list_name).ok_or_else(|| format!("List '{list_name}' not found"))?;
        let item = list
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| format!("Item '{item_id}' not found in '{list_name}'"))?;
        item.priority = Some(priority);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_list_round_trips() {
        let upstream = InMemoryTodoUpstream::default();
        upstream
            .add_item(DEFAULT_LIST, NewItem { name: "buy milk".into(), priority: None, due: None, description: None })
            .await
            .unwrap();
        let items = upstream.list_items(DEFAULT_LIST).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "buy milk");
    }

    #[tokio::test]
    async fn remove_then_list_omits_item() {
        let upstream = InMemoryTodoUpstream::default();
        upstream
            .add_item(DEFAULT_LIST, NewItem { name: "buy milk".into(), priority: None, due: None, description: None })
            .await
            .unwrap();
        let id = upstream.list_items(DEFAULT_LIST).await.unwrap()[0].id.clone();
        upstream.remove_item(DEFAULT_LIST, &id).await.unwrap();
        assert!(upstream.list_items(DEFAULT_LIST).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_list_is_idempotent() {
        let upstream = InMemoryTodoUpstream::default();
        upstream.create_list("Groceries").await.unwrap();
        upstream.create_list("Groceries").await.unwrap();
        let lists = upstream.list_available_lists().await.unwrap();
        assert_eq!(lists.iter().filter(|l| *l == "Groceries").count(), 1);
    }

    #[tokio::test]
    async fn missing_list_is_an_error() {
        let upstream = InMemoryTodoUpstream::default();
        assert!(upstream.list_items("Nonexistent").await.is_err());
    }
}
