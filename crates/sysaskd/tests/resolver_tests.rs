//! End-to-end resolver behavior with scripted fake collaborators.
//!
//! No network and no subprocesses: the completion client, command runner,
//! and inventory are all replaced with deterministic fakes.

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sysask_shared::envelope::{FALLBACK_LABEL, STRUCTURED_LABEL};
use sysaskd::executor::CommandRunner;
use sysaskd::inventory::{InfoKind, SystemInventory};
use sysaskd::llm::{ChatMessage, Completion, SamplingParams};
use sysaskd::resolver::QueryResolver;
use sysask_shared::AgentError;

/// Completion fake that pops scripted replies and records every request.
struct ScriptedLlm {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    fn new(replies: Vec<anyhow::Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn user_message(&self, call: usize) -> String {
        self.calls.lock().unwrap()[call]
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Completion for ScriptedLlm {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _params: SamplingParams,
    ) -> anyhow::Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
    }
}

/// Runner fake with scripted outcomes, recording executed commands.
struct ScriptedRunner {
    results: Mutex<VecDeque<Result<String, String>>>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn new(results: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
            commands: Mutex::new(Vec::new()),
        })
    }

    fn executed(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &str) -> Result<String, AgentError> {
        self.commands.lock().unwrap().push(command.to_string());
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(output)) => Ok(output),
            Some(Err(error)) => Err(AgentError::Execution(error)),
            None => Err(AgentError::Execution("no scripted result left".to_string())),
        }
    }
}

/// Inventory fake that fails every lookup.
struct FailingInventory;

impl SystemInventory for FailingInventory {
    fn lookup(&self, _kind: InfoKind) -> anyhow::Result<serde_json::Value> {
        Err(anyhow!("inventory offline"))
    }
}

/// Inventory fake returning a fixed value and counting lookups.
struct CountingInventory {
    value: serde_json::Value,
    lookups: Mutex<usize>,
}

impl CountingInventory {
    fn new(value: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            value,
            lookups: Mutex::new(0),
        })
    }

    fn lookup_count(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

impl SystemInventory for CountingInventory {
    fn lookup(&self, _kind: InfoKind) -> anyhow::Result<serde_json::Value> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self.value.clone())
    }
}

fn resolver(
    llm: Option<Arc<dyn Completion>>,
    runner: Arc<dyn CommandRunner>,
    inventory: Arc<dyn SystemInventory>,
) -> QueryResolver {
    QueryResolver::new(llm, runner, inventory, None)
}

#[tokio::test]
async fn every_dependency_failing_still_yields_an_interpretation() {
    let llm = ScriptedLlm::new(vec![
        Err(anyhow!("timeout")),
        Err(anyhow!("timeout")),
        Err(anyhow!("timeout")),
    ]);
    let runner = ScriptedRunner::new(vec![]);
    let envelope = resolver(Some(llm), runner, Arc::new(FailingInventory))
        .resolve("tell me something strange about the flux capacitor", 2)
        .await;

    assert!(!envelope.interpretation.is_empty());
    assert!(envelope.command.is_empty());
    assert!(envelope.raw_output.is_empty());
}

#[tokio::test]
async fn usage_query_bypasses_the_structured_shortcut() {
    // "cpu usage" names an inventory keyword but is a live-activity question.
    let inventory = CountingInventory::new(json!({"model": "should not be used"}));
    let llm = ScriptedLlm::new(vec![
        Ok("top -bn1 | head -20".to_string()), // generation
        Ok("Your CPU is mostly idle.".to_string()), // interpretation
    ]);
    let runner = ScriptedRunner::new(vec![Ok("cpu 1% idle 99%".to_string())]);

    let envelope = resolver(Some(llm), runner.clone(), inventory.clone())
        .resolve("what's my CPU usage?", 2)
        .await;

    assert_eq!(inventory.lookup_count(), 0);
    assert_eq!(envelope.command, "top -bn1 | head -20");
    assert_eq!(envelope.interpretation, "Your CPU is mostly idle.");
}

#[tokio::test]
async fn static_fact_query_takes_the_structured_shortcut() {
    let inventory = CountingInventory::new(json!({"model": "Ryzen 7", "logical_cores": 16}));
    let llm = ScriptedLlm::new(vec![Ok("You have a Ryzen 7 with 16 cores.".to_string())]);
    let runner = ScriptedRunner::new(vec![]);

    let envelope = resolver(Some(llm.clone()), runner.clone(), inventory.clone())
        .resolve("what cpu do I have?", 2)
        .await;

    assert_eq!(inventory.lookup_count(), 1);
    assert_eq!(envelope.command, STRUCTURED_LABEL);
    assert!(envelope.raw_output.contains("Ryzen 7"));
    assert!(runner.executed().is_empty(), "no shell command should run");
    // One completion call: the interpretation, never a generation.
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn inventory_failure_falls_through_to_generation() {
    let llm = ScriptedLlm::new(vec![
        Ok("lscpu".to_string()),
        Ok("It is a Ryzen.".to_string()),
    ]);
    let runner = ScriptedRunner::new(vec![Ok("Model name: Ryzen".to_string())]);

    let envelope = resolver(Some(llm), runner, Arc::new(FailingInventory))
        .resolve("what cpu do I have?", 2)
        .await;

    assert_eq!(envelope.command, "lscpu");
    assert_eq!(envelope.interpretation, "It is a Ryzen.");
}

#[tokio::test]
async fn retry_receives_the_previous_command_and_error_verbatim() {
    let llm = ScriptedLlm::new(vec![
        Ok("frzt --all".to_string()),
        Ok("df -h".to_string()),
        Ok("Plenty of space left.".to_string()),
    ]);
    let runner = ScriptedRunner::new(vec![
        Err("frzt: command not found".to_string()),
        Ok("/dev/sda1 40% used".to_string()),
    ]);

    let llm_handle = llm.clone();
    let envelope = resolver(Some(llm), runner.clone(), Arc::new(FailingInventory))
        .resolve("how full are my drives right now, really?", 2)
        .await;

    // Attempt 1 carries no failure context.
    assert!(!llm_handle.user_message(0).contains("previous attempt"));
    // Attempt 2 carries exactly attempt 1's command and error.
    let second = llm_handle.user_message(1);
    assert!(second.contains("`frzt --all`"));
    assert!(second.contains("frzt: command not found"));

    assert_eq!(runner.executed(), vec!["frzt --all", "df -h"]);
    assert_eq!(envelope.command, "df -h");
}

#[tokio::test]
async fn loop_stops_after_max_retries_plus_one_generations() {
    let llm = ScriptedLlm::new(vec![
        Ok("bad1".to_string()),
        Ok("bad2".to_string()),
        Ok("bad3".to_string()),
        Ok("bad4 - should never be requested".to_string()),
    ]);
    let runner = ScriptedRunner::new(vec![
        Err("boom 1".to_string()),
        Err("boom 2".to_string()),
        Err("boom 3".to_string()),
    ]);

    let llm_handle = llm.clone();
    let envelope = resolver(Some(llm), runner, Arc::new(FailingInventory))
        .resolve("summon the untestable dragon", 2)
        .await;

    // max_retries=2 means exactly 3 generation calls and no interpretation.
    assert_eq!(llm_handle.call_count(), 3);
    assert!(envelope.interpretation.contains("boom 3"));
    assert!(envelope.interpretation.to_lowercase().contains("rephras"));
}

#[tokio::test]
async fn exhausted_loop_prefers_the_fallback_table() {
    let llm = ScriptedLlm::new(vec![
        Ok("bad1".to_string()),
        Ok("bad2".to_string()),
        Ok("bad3".to_string()),
    ]);
    let runner = ScriptedRunner::new(vec![
        Err("boom".to_string()),
        Err("boom".to_string()),
        Err("boom".to_string()),
    ]);

    // "cores" matches the fallback table after all attempts fail.
    let envelope = resolver(Some(llm), runner, Arc::new(FailingInventory))
        .resolve("how many cores does the current beast have", 2)
        .await;

    assert!(envelope
        .interpretation
        .contains("Found another way after several attempts"));
    assert!(envelope.interpretation.contains("CPU cores:"));
    assert_eq!(envelope.command, FALLBACK_LABEL);
    assert!(envelope.raw_output.is_empty());
}

#[tokio::test]
async fn unknown_signal_exits_the_loop_early() {
    let llm = ScriptedLlm::new(vec![
        Ok("UNKNOWN".to_string()),
        Ok("never requested".to_string()),
    ]);
    let runner = ScriptedRunner::new(vec![]);

    let llm_handle = llm.clone();
    let envelope = resolver(Some(llm), runner.clone(), Arc::new(FailingInventory))
        .resolve("what color is the hypervisor's soul", 2)
        .await;

    assert_eq!(llm_handle.call_count(), 1, "no retries after UNKNOWN");
    assert!(runner.executed().is_empty());
    assert!(envelope
        .interpretation
        .contains("could not find a way to answer"));
}

#[tokio::test]
async fn unknown_signal_with_matching_fallback_uses_builtin_method() {
    let llm = ScriptedLlm::new(vec![Ok("UNKNOWN".to_string())]);
    let runner = ScriptedRunner::new(vec![]);

    let envelope = resolver(Some(llm), runner, Arc::new(FailingInventory))
        .resolve("how many cores do we currently have", 2)
        .await;

    assert!(envelope.interpretation.contains("Using built-in method"));
    assert_eq!(envelope.command, FALLBACK_LABEL);
}

#[tokio::test]
async fn degraded_mode_answers_core_count_from_the_fallback_table() {
    let runner = ScriptedRunner::new(vec![]);
    let envelope = resolver(None, runner, Arc::new(FailingInventory))
        .resolve("how many cores do I have?", 2)
        .await;

    assert!(envelope.interpretation.contains("Using built-in method"));
    assert!(
        envelope.interpretation.chars().any(|c| c.is_ascii_digit()),
        "expected a numeric core count in {:?}",
        envelope.interpretation
    );
    assert_eq!(envelope.command, FALLBACK_LABEL);
    assert!(envelope.raw_output.is_empty());
}

#[tokio::test]
async fn degraded_mode_without_fallback_match_apologizes() {
    let runner = ScriptedRunner::new(vec![]);
    let envelope = resolver(None, runner, Arc::new(FailingInventory))
        .resolve("compose a sonnet about my firewall", 2)
        .await;

    assert!(!envelope.interpretation.is_empty());
    assert!(envelope.command.is_empty());
}
