//! Tool dispatch: routes a parsed tool call to the provider process that
//! owns it and returns the JSON result.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tom_core::model::Module;

/// Maps function name -> (module name, base_url), built once from the
/// loaded modules' tool lists.
pub struct DispatchTable {
    function_to_module: HashMap<String, String>,
    modules: HashMap<String, Module>,
    client: reqwest::Client,
}

impl DispatchTable {
    pub fn build(modules: Vec<Module>) -> Self {
        let mut function_to_module = HashMap::new();
        let mut modules_by_name = HashMap::new();
        for module in modules {
            for tool in &module.tools {
                function_to_module.insert(tool.name.clone(), module.name.clone());
            }
            modules_by_name.insert(module.name.clone(), module);
        }
        DispatchTable {
            function_to_module,
            modules: modules_by_name,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build dispatch http client"),
        }
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Call `function_name` with pre-parsed `arguments`, returning the
    /// provider's JSON result. Per spec §4.1.7, a provider-side failure is
    /// represented as a JSON `{"error": ...}` value, not a hard `Err`: the
    /// caller appends it as a tool result so the model can see and react to
    /// it. `Err` is reserved for "we don't know which provider owns this
    /// function at all" and for provider processes that are unreachable.
    pub async fn dispatch(&self, function_name: &str, arguments: Value) -> Result<Value, String> {
        let module_name = self
            .function_to_module
            .get(function_name)
            .ok_or_else(|| format!("Function '{function_name}' not available. This might be due to a module loading error."))?;
        let module = self
            .modules
            .get(module_name)
            .expect("function_to_module only maps to known modules");

        let url = format!("{}/tools/execute/{function_name}", module.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "arguments": arguments }))
            .send()
            .await
            .map_err(|e| format!("provider '{module_name}' unreachable: {e}"))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| format!("provider '{module_name}' returned malformed JSON: {e}"))
    }

    /// Live `description://prompt_consign` re-fetch for an active module
    /// (spec §4.3.1, §4.3.3 — todo's list names must stay live, not frozen
    /// at boot). `None` when the module is unknown, the endpoint errors, or
    /// the provider has nothing to say (a `null` response).
    pub async fn fetch_prompt_consign(&self, module_name: &str) -> Option<Value> {
        let module = self.modules.get(module_name)?;
        let url = format!("{}/description/prompt_consign", module.base_url);
        let value: Value = self.client.get(&url).send().await.ok()?.json().await.ok()?;
        if value.is_null() {
            None
        } else {
            Some(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_function_reports_missing_module() {
        let table = DispatchTable::build(vec![]);
        let err = futures_lite_block_on(table.dispatch("nope", Value::Null));
        assert!(err.unwrap_err().contains("not available"));
    }

    #[test]
    fn fetch_prompt_consign_is_none_for_unknown_module() {
        let table = DispatchTable::build(vec![]);
        assert!(futures_lite_block_on(table.fetch_prompt_consign("todo")).is_none());
    }

    // Small local block_on so this unit test doesn't need a tokio runtime macro.
    fn futures_lite_block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
