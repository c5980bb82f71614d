//! The two-phase triage → execute orchestration loop.

use crate::dispatch::DispatchTable;
use crate::prompt::{self, ClientKind};
use chrono_tz::Tz;
use serde_json::{json, Value};
use std::collections::HashSet;
use tom_core::llm::{LlmOutcome, LlmRegistry, ToolSpec, WireMessage};
use tom_core::model::{CallLogEntry, Conversation, FunctionCallRecord, ToolCallRequest};

/// Default cap on execute-loop iterations, overridable via
/// `TOM_MAX_TOOL_ITERATIONS`.
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

pub fn max_iterations() -> usize {
    std::env::var("TOM_MAX_TOOL_ITERATIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_ITERATIONS)
}

pub struct ProcessRequest<'a> {
    pub text: &'a str,
    pub lang: &'a str,
    pub position: Option<(f64, f64)>,
    pub client_kind: ClientKind,
}

pub struct ProcessOutcome {
    pub response: String,
    pub functions_called: Vec<FunctionCallRecord>,
}

/// Drive one full `process()` turn: prompt assembly, triage, execute.
/// Mirrors `tomllm.py::processRequest` (see SPEC_FULL.md grounding notes).
pub async fn process(
    conversation: &mut Conversation,
    personal_context: &str,
    behavior_addendum: Option<&str>,
    timezone: Option<Tz>,
    dispatch: &DispatchTable,
    llm: &LlmRegistry,
    modules_catalogue: &[(String, String)],
    req: ProcessRequest<'_>,
) -> ProcessOutcome {
    assemble_prompt(conversation, personal_context, behavior_addendum, timezone, req.position, req.text);

    let triage_result = triage(conversation, llm, modules_catalogue, req.client_kind).await;

    match triage_result {
        TriageResult::ResetPerformed => {
            conversation.reset();
            let greeting = prompt::greeting(req.lang).to_string();
            ProcessOutcome {
                response: greeting,
                functions_called: vec![],
            }
        }
        TriageResult::Modules(modules) if !modules.is_empty() => {
            execute(conversation, llm, dispatch, modules, req.client_kind).await
        }
        TriageResult::Modules(_) => {
            // No modules needed: answer directly, no tools.
            answer_directly(conversation, llm, req.client_kind).await
        }
    }
}

fn assemble_prompt(
    conversation: &mut Conversation,
    personal_context: &str,
    behavior_addendum: Option<&str>,
    timezone: Option<Tz>,
    position: Option<(f64, f64)>,
    input: &str,
) {
    let clock = prompt::clock_preamble(timezone, position);
    let was_empty = conversation.is_empty();
    conversation.set_clock_preamble(clock);
    if was_empty {
        let mut charter = prompt::base_charter(personal_context);
        if let Some(addendum) = behavior_addendum {
            charter.push_str("\n\n");
            charter.push_str(addendum);
        }
        conversation.push_base_context(charter);
    }
    conversation.push_user(input.to_string());
}

enum TriageResult {
    Modules(HashSet<String>),
    ResetPerformed,
}

async fn triage(
    conversation: &Conversation,
    llm: &LlmRegistry,
    modules_catalogue: &[(String, String)],
    client_kind: ClientKind,
) -> TriageResult {
    let modules_name_list: Vec<&str> = modules_catalogue.iter().map(|(n, _)| n.as_str()).collect();

    let tools = vec![
        ToolSpec::new(
            "modules_needed_to_answer_user_prompt",
            "This function is used to execute the appropriate module to get the required data to answer the user's request",
            json!({
                "type": "object",
                "properties": {
                    "modules_name": { "type": "string", "enum": modules_name_list }
                },
                "required": ["modules_name"],
                "additionalProperties": false,
            }),
        ),
        ToolSpec::new(
            "reset_conversation",
            "Reset the conversation history when the user greets you with expressions like 'Hello', 'Hi', 'Salut', or similar greetings that indicate a fresh start",
            json!({
                "type": "object",
                "properties": {},
                "required": [],
                "additionalProperties": false,
            }),
        ),
    ];

    let catalogue_json = json!(modules_catalogue
        .iter()
        .map(|(name, description)| json!({ "module_name": name, "module_description": description }))
        .collect::<Vec<_>>());

    let triage_prompt = format!(
        "As an AI assistant, you have access to a wide range of functions, grouped into modules. \
         If you need a function that is not in your list of tools, call \
         'modules_needed_to_answer_user_prompt' with the necessary module(s); you may call it \
         multiple times. Do not invent module names — only the modules below exist.\n\n```json\n{catalogue_json}\n```"
    );

    let mut messages: Vec<WireMessage> = conversation.messages().iter().map(WireMessage::from).collect();
    messages.push(system_message(triage_prompt));
    messages.push(system_message(prompt::response_context(client_kind).to_string()));

    let complexity = 1;
    match llm.call_llm(&messages, Some(&tools), complexity, None).await {
        Ok(LlmOutcome::ToolCalls { calls }) => {
            let mut modules = HashSet::new();
            let mut reset_requested = false;
            for call in calls {
                if call.function_name == "reset_conversation" {
                    reset_requested = true;
                } else if call.function_name == "modules_needed_to_answer_user_prompt" {
                    if let Ok(args) = serde_json::from_str::<Value>(&call.arguments_json) {
                        if let Some(name) = args.get("modules_name").and_then(|v| v.as_str()) {
                            modules.insert(name.to_string());
                        }
                    }
                } else if modules_name_list.contains(&call.function_name.as_str()) {
                    modules.insert(call.function_name);
                }
            }
            if reset_requested {
                return TriageResult::ResetPerformed;
            }
            TriageResult::Modules(modules)
        }
        Ok(LlmOutcome::Stop { .. }) | Err(_) => TriageResult::Modules(HashSet::new()),
    }
}

async fn answer_directly(
    conversation: &mut Conversation,
    llm: &LlmRegistry,
    client_kind: ClientKind,
) -> ProcessOutcome {
    let mut messages: Vec<WireMessage> = conversation.messages().iter().map(WireMessage::from).collect();
    messages.push(system_message(prompt::response_context(client_kind).to_string()));

    match llm.call_llm(&messages, None, 0, None).await {
        Ok(LlmOutcome::Stop { content }) => {
            conversation.push_assistant(content.clone(), None);
            ProcessOutcome {
                response: content,
                functions_called: vec![],
            }
        }
        _ => ProcessOutcome {
            response: "Error while executing the function call".to_string(),
            functions_called: vec![],
        },
    }
}

async fn execute(
    conversation: &mut Conversation,
    llm: &LlmRegistry,
    dispatch: &DispatchTable,
    selected_modules: HashSet<String>,
    client_kind: ClientKind,
) -> ProcessOutcome {
    let mut tools = Vec::new();
    let mut complexity = 0usize;

    for module_name in &selected_modules {
        if let Some(module) = dispatch.module(module_name) {
            for tool in &module.tools {
                tools.push(ToolSpec::new(
                    tool.name.clone(),
                    tool.description.clone(),
                    tool.parameters_schema.clone(),
                ));
            }
            // Re-read `description://prompt_consign` live rather than trusting
            // the snapshot frozen into `module.system_context` at boot (spec
            // §4.3.1, §4.3.3): todo's list names, for one, can change while
            // the backend is running. Fall back to the boot-time snapshot if
            // the provider doesn't answer.
            let context = match dispatch.fetch_prompt_consign(module_name).await {
                Some(consign) => consign.to_string(),
                None => module.system_context.clone(),
            };
            if !context.is_empty() {
                conversation.push_base_context(context);
            }
            complexity = complexity.max(module.complexity as usize);
        } else {
            log::warn!("module '{module_name}' not loaded, skipping");
        }
    }

    let mut messages: Vec<WireMessage> = conversation.messages().iter().map(WireMessage::from).collect();
    messages.push(system_message(prompt::response_context(client_kind).to_string()));

    let mut functions_called = Vec::new();

    for _ in 0..max_iterations() {
        match llm.call_llm(&messages, Some(&tools), complexity, None).await {
            Ok(LlmOutcome::Stop { content }) => {
                conversation.push_assistant(content.clone(), None);
                return ProcessOutcome {
                    response: content,
                    functions_called,
                };
            }
            Ok(LlmOutcome::ToolCalls { calls }) => {
                conversation.push_assistant(String::new(), Some(calls.clone()));
                messages.push(assistant_tool_call_message(&calls));

                // Dispatch concurrently, but append results in request order.
                let dispatched = futures_util::future::join_all(
                    calls.iter().map(|c| dispatch_one(dispatch, c)),
                )
                .await;

                for (call, result_json) in calls.iter().zip(dispatched.into_iter()) {
                    functions_called.push(FunctionCallRecord {
                        function: call.function_name.clone(),
                        parameters: serde_json::from_str(&call.arguments_json).unwrap_or_default(),
                    });
                    let content = serde_json::to_string(&result_json).unwrap_or_default();
                    conversation.push_tool_result(call.id.clone(), content.clone());
                    messages.push(WireMessage {
                        role: "tool".to_string(),
                        content,
                        tool_call_id: Some(call.id.clone()),
                        tool_calls: None,
                    });
                }
            }
            Err(e) => {
                log::error!("execute loop LLM call failed: {e}");
                conversation.push_assistant("Error while executing the function call".to_string(), None);
                return ProcessOutcome {
                    response: "Error while executing the function call".to_string(),
                    functions_called,
                };
            }
        }
    }

    log::warn!("execute loop hit max_iterations() without a final answer");
    ProcessOutcome {
        response: "Error while executing the function call".to_string(),
        functions_called,
    }
}

async fn dispatch_one(dispatch: &DispatchTable, call: &ToolCallRequest) -> Value {
    let arguments: Value = serde_json::from_str(&call.arguments_json).unwrap_or(Value::Null);
    match dispatch.dispatch(&call.function_name, arguments).await {
        Ok(result) => result,
        Err(message) => json!({ "error": message }),
    }
}

fn system_message(content: String) -> WireMessage {
    WireMessage {
        role: "system".to_string(),
        content,
        tool_call_id: None,
        tool_calls: None,
    }
}

fn assistant_tool_call_message(calls: &[ToolCallRequest]) -> WireMessage {
    WireMessage {
        role: "assistant".to_string(),
        content: String::new(),
        tool_call_id: None,
        tool_calls: Some(calls.to_vec()),
    }
}

pub fn build_call_log_entry(
    username: &str,
    user_input: &str,
    functions_called: Vec<FunctionCallRecord>,
    duration_ms: u64,
) -> CallLogEntry {
    CallLogEntry {
        timestamp: chrono::Utc::now(),
        username: username.to_string(),
        user_input: user_input.to_string(),
        functions_called,
        duration_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_iterations_is_eight() {
        std::env::remove_var("TOM_MAX_TOOL_ITERATIONS");
        assert_eq!(max_iterations(), 8);
    }
}
