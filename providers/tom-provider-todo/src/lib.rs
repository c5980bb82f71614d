//! The todo/list-management provider: six tools, no local cache, always
//! round-tripping to the upstream list store.

pub mod upstream;

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tom_core::model::Tool;
use tom_provider::{ToolOutcome, ToolProvider};
use upstream::{NewItem, TodoUpstream};

const SERVER_DESCRIPTION: &str = "This module manages various types of task lists including TODO lists, \
grocery/shopping lists, and custom lists. It provides comprehensive list management capabilities for \
organizing different types of tasks and items. Common list names include: 'TODO', 'Tasks', 'Groceries', \
'Shopping', 'Shopping List', 'Courses', 'Music', but users can create custom lists with any name.";

pub struct TodoProvider {
    upstream: Arc<dyn TodoUpstream>,
    /// Snapshot of known list names, refreshed opportunistically on every
    /// call that touches the list set. `description://prompt_consign` is
    /// synchronous in the shared [`ToolProvider`] contract, so this cache
    /// is what makes the live list names available without an await.
    known_lists: Mutex<Vec<String>>,
}

impl TodoProvider {
    pub fn new(upstream: Arc<dyn TodoUpstream>) -> Self {
        Self {
            upstream,
            known_lists: Mutex::new(vec![upstream::DEFAULT_LIST.to_string()]),
        }
    }

    fn remember_lists(&self, lists: &[String]) {
        *self.known_lists.lock().expect("known_lists mutex poisoned") = lists.to_vec();
    }
}

#[async_trait]
impl ToolProvider for TodoProvider {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> String {
        SERVER_DESCRIPTION.to_string()
    }

    fn tools(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "list_available_lists".into(),
                description: "List all available lists. Use this when user asks about what lists they have.".into(),
                parameters_schema: json!({"type":"object","properties":{},"required":[],"additionalProperties":false}),
                strict: true,
            },
            Tool {
                name: "create_list".into(),
                description: "Create a new list. Use this when user wants to create a new list.".into(),
                parameters_schema: json!({
                    "type":"object",
                    "properties": {"list_name": {"type":"string","description":"Name of the new list to create"}},
                    "required":["list_name"], "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "add_to_list".into(),
                description: "Add an item to a list. Use this for adding tasks, products, or any items to lists.".into(),
                parameters_schema: json!({
                    "type":"object",
                    "properties": {
                        "item_name": {"type":"string","description":"The name/title of the item to add to the list"},
                        "list_name": {"type":"string","description":"Name of the list to add the item to"},
                        "priority": {"type":["integer","null"],"description":"Priority from 1-9 (1 is highest)"},
                        "due": {"type":["string","null"],"description":"Due date in 'YYYY-MM-DD HH:MM:SS' format"},
                        "description": {"type":["string","null"],"description":"Additional description or notes"},
                    },
                    "required":["item_name","list_name"], "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "list_items".into(),
                description: "List all items in a specific list. Use this to show contents of any list.".into(),
                parameters_schema: json!({
                    "type":"object",
                    "properties": {"list_name": {"type":"string","description":"Name of the list to show items from"}},
                    "required":["list_name"], "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "remove_from_list".into(),
                description: "Remove/close an item from a list. Use this to remove items, mark tasks as done, etc.".into(),
                parameters_schema: json!({
                    "type":"object",
                    "properties": {
                        "item_id": {"type":"string","description":"The ID of the item to remove"},
                        "list_name": {"type":"string","description":"Name of the list containing the item"},
                    },
                    "required":["item_id","list_name"], "additionalProperties": false,
                }),
                strict: true,
            },
            Tool {
                name: "update_item_priority".into(),
                description: "Update the priority of an item in a list (1 highest, 9 lowest).".into(),
                parameters_schema: json!({
                    "type":"object",
                    "properties": {
                        "item_id": {"type":"string","description":"The ID of the item to update"},
                        "list_name": {"type":"string","description":"Name of the list containing the item"},
                        "priority": {"type":"integer","description":"New priority, 1 (highest) to 9 (lowest)"},
                    },
                    "required":["item_id","list_name","priority"], "additionalProperties": false,
                }),
                strict: true,
            },
        ]
    }

    fn prompt_consign(&self) -> Option<Value> {
        let lists = self.known_lists.lock().expect("known_lists mutex poisoned").clone();
        Some(json!({
            "description": "Available lists",
            "list_name": lists,
            "is_list_name_case_sensitive": true,
        }))
    }

    async fn invoke(&self, tool_name: &str, arguments: Value) -> ToolOutcome {
        match tool_name {
            "list_available_lists" => match self.upstream.list_available_lists().await {
                Ok(lists) => {
                    self.remember_lists(&lists);
                    ToolOutcome::ok(json!({ "lists": lists }))
                }
                Err(e) => ToolOutcome::error(e),
            },
            "create_list" => {
                let Some(list_name) = arguments.get("list_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("list_name is required");
                };
                match self.upstream.create_list(list_name).await {
                    Ok(()) => {
                        if let Ok(lists) = self.upstream.list_available_lists().await {
                            self.remember_lists(&lists);
                        }
                        ToolOutcome::ok(json!({ "message": format!("Todo list '{list_name}' created") }))
                    }
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "add_to_list" => {
                let Some(item_name) = arguments.get("item_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("item_name is required");
                };
                let Some(list_name) = arguments.get("list_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("list_name is required");
                };
                let item = NewItem {
                    name: item_name.to_string(),
                    priority: arguments.get("priority").and_then(|v| v.as_i64()).map(|v| v as i32),
                    due: arguments.get("due").and_then(|v| v.as_str()).map(str::to_string),
                    description: arguments.get("description").and_then(|v| v.as_str()).map(str::to_string),
                };
                match self.upstream.add_item(list_name, item).await {
                    Ok(()) => ToolOutcome::ok(json!({ "message": format!("Item added to {list_name}") })),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "list_items" => {
                let Some(list_name) = arguments.get("list_name").and_then(|v| v.as_str()) else {
                    return ToolOutcome::error("list_name is required");
                };
                match self.upstream.list_items(list_name).await {
                    Ok(items) => ToolOutcome::ok(json!(items)),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "remove_from_list" => {
                let (Some(item_id), Some(list_name)) = (
                    arguments.get("item_id").and_then(|v| v.as_str()),
                    arguments.get("list_name").and_then(|v| v.as_str()),
                ) else {
                    return ToolOutcome::error("item_id and list_name are required");
                };
                match self.upstream.remove_item(list_name, item_id).await {
                    Ok(()) => ToolOutcome::ok(json!({ "message": format!("Item removed from {list_name}") })),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            "update_item_priority" => {
                let (Some(item_id), Some(list_name), Some(priority)) = (
                    arguments.get("item_id").and_then(|v| v.as_str()),
                    arguments.get("list_name").and_then(|v| v.as_str()),
                    arguments.get("priority").and_then(|v| v.as_i64()),
                ) else {
                    return ToolOutcome::error("item_id, list_name and priority are required");
                };
                match self.upstream.update_priority(list_name, item_id, priority as i32).await {
                    Ok(()) => ToolOutcome::ok(json!({ "message": format!("Priority updated to {priority} for item in {list_name}") })),
                    Err(e) => ToolOutcome::error(e),
                }
            }
            other => ToolOutcome::error(format!("unknown tool '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upstream::InMemoryTodoUpstream;

    fn provider() -> TodoProvider {
        TodoProvider::new(Arc::new(InMemoryTodoUpstream::default()))
    }

    #[tokio::test]
    async fn add_then_list_items_matches_scenario_four() {
        let provider = provider();
        let add = provider
            .invoke("add_to_list", json!({"item_name": "buy milk", "list_name": "TODO"}))
            .await
            .into_json();
        assert_eq!(add["status"], "ok");

        let listed = provider.invoke("list_items", json!({"list_name": "TODO"})).await.into_json();
        let array = listed["result"].as_array().expect("list_items returns a JSON array");
        assert!(array.iter().any(|i| i["name"] == "buy milk"));
    }

    #[tokio::test]
    async fn unknown_list_name_returns_tool_error_not_panic() {
        let provider = provider();
        let outcome = provider.invoke("list_items", json!({"list_name": "Nope"})).await.into_json();
        assert_eq!(outcome["status"], "error");
    }

    #[tokio::test]
    async fn prompt_consign_lists_default_list_before_any_call() {
        let provider = provider();
        let consign = provider.prompt_consign().unwrap();
        assert!(consign["list_name"].as_array().unwrap().iter().any(|v| v == "TODO"));
    }
}
