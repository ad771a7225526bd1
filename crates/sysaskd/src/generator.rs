//! Command generator - turns a question into one shell command via the LLM.
//!
//! Retries rebuild the prompt with the previous command and its error text
//! appended, and sample at a higher temperature to escape a repeated bad
//! answer.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::llm::{ChatMessage, Completion, SamplingParams};
use sysask_shared::AgentError;

/// Token the model is instructed to reply with when no command can answer.
pub const UNKNOWN_TOKEN: &str = "UNKNOWN";

const FIRST_ATTEMPT_TEMPERATURE: f32 = 0.2;
const RETRY_TEMPERATURE: f32 = 0.7;

const SYSTEM_ROLE: &str = "You are an expert Linux system administrator. \
Given a question about this machine, reply with exactly one non-interactive \
shell command that answers it. Reply with the command only: no explanation, \
no markdown fences. If no shell command can answer the question, reply with \
exactly UNKNOWN.";

/// The command and error text of the attempt that just failed
#[derive(Debug, Clone)]
pub struct AttemptFailure {
    pub command: String,
    pub error: String,
}

/// Outcome of one generation call
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Command(String),
    /// The model signalled it has no command for this question
    Unknown,
}

/// Load the optional static context file once at startup. Absence or read
/// failure is non-fatal.
pub fn load_static_context(path: Option<&Path>) -> Option<String> {
    let path = path?;
    match fs::read_to_string(path) {
        Ok(content) => {
            info!("Loaded static context from {}", path.display());
            Some(content)
        }
        Err(e) => {
            warn!("Could not read context file {}: {}", path.display(), e);
            None
        }
    }
}

pub struct CommandGenerator<'a> {
    llm: &'a dyn Completion,
    static_context: Option<&'a str>,
}

impl<'a> CommandGenerator<'a> {
    pub fn new(llm: &'a dyn Completion, static_context: Option<&'a str>) -> Self {
        Self {
            llm,
            static_context,
        }
    }

    /// Generate a command for the query. `attempt` is zero-based; every
    /// retry samples at the hotter temperature, including retries after a
    /// transport error where `previous` carries no failure context.
    pub async fn generate(
        &self,
        query: &str,
        attempt: u32,
        previous: Option<&AttemptFailure>,
    ) -> Result<Generated, AgentError> {
        let messages = self.build_messages(query, previous);
        let params = SamplingParams {
            temperature: if attempt == 0 {
                FIRST_ATTEMPT_TEMPERATURE
            } else {
                RETRY_TEMPERATURE
            },
            max_tokens: 256,
            ..SamplingParams::default()
        };

        let reply = self
            .llm
            .complete(&messages, params)
            .await
            .map_err(|e| AgentError::Generation(e.to_string()))?;

        let command = clean_reply(&reply);
        if command.is_empty() || command.eq_ignore_ascii_case(UNKNOWN_TOKEN) {
            info!("generator returned no usable command");
            return Ok(Generated::Unknown);
        }

        info!("generated command: {:?}", command);
        Ok(Generated::Command(command))
    }

    fn build_messages(&self, query: &str, previous: Option<&AttemptFailure>) -> Vec<ChatMessage> {
        let mut system = SYSTEM_ROLE.to_string();
        if let Some(context) = self.static_context {
            system.push_str("\n\nContext about this machine:\n");
            system.push_str(context.trim());
        }

        let mut user = format!("Question: {}", query);
        if let Some(prev) = previous {
            user.push_str(&format!(
                "\n\nA previous attempt ran `{}` and failed with:\n{}\n\
                 Produce a different command that avoids this failure.",
                prev.command, prev.error
            ));
        }

        vec![ChatMessage::system(system), ChatMessage::user(user)]
    }
}

/// Strip markdown fences, backticks, and prompt prefixes from a reply.
fn clean_reply(reply: &str) -> String {
    let mut text = reply.trim();

    if text.starts_with("```") {
        // Drop the opening fence line (possibly tagged, e.g. ```sh) and the
        // closing fence.
        if let Some(newline) = text.find('\n') {
            text = &text[newline + 1..];
        } else {
            text = text.trim_start_matches('`');
        }
        if let Some(fence) = text.rfind("```") {
            text = &text[..fence];
        }
    }

    text.trim()
        .trim_matches('`')
        .trim_start_matches("$ ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_reply_plain_command() {
        assert_eq!(clean_reply("df -h\n"), "df -h");
    }

    #[test]
    fn test_clean_reply_strips_fences() {
        assert_eq!(clean_reply("```sh\nfree -b\n```"), "free -b");
        assert_eq!(clean_reply("```\nuptime\n```"), "uptime");
    }

    #[test]
    fn test_clean_reply_strips_backticks_and_prompt() {
        assert_eq!(clean_reply("`lscpu`"), "lscpu");
        assert_eq!(clean_reply("$ ip addr show"), "ip addr show");
    }

    struct NoopLlm;

    #[async_trait::async_trait]
    impl Completion for NoopLlm {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: SamplingParams,
        ) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_first_attempt_prompt_has_no_failure_clause() {
        let generator = CommandGenerator::new(&NoopLlm, None);
        let messages = generator.build_messages("how much memory?", None);
        assert_eq!(messages.len(), 2);
        assert!(!messages[1].content.contains("previous attempt"));
    }

    #[test]
    fn test_retry_prompt_carries_exact_failure() {
        let generator = CommandGenerator::new(&NoopLlm, None);
        let failure = AttemptFailure {
            command: "frbl -x".to_string(),
            error: "frbl: command not found".to_string(),
        };
        let messages = generator.build_messages("how much memory?", Some(&failure));
        assert!(messages[1].content.contains("`frbl -x`"));
        assert!(messages[1].content.contains("frbl: command not found"));
    }

    #[test]
    fn test_static_context_prepended_to_system_message() {
        let generator = CommandGenerator::new(&NoopLlm, Some("This host runs nginx."));
        let messages = generator.build_messages("is the webserver up?", None);
        assert!(messages[0].content.contains("This host runs nginx."));
    }

    #[tokio::test]
    async fn test_empty_reply_is_unknown() {
        let generator = CommandGenerator::new(&NoopLlm, None);
        let generated = generator.generate("anything", 0, None).await.unwrap();
        assert_eq!(generated, Generated::Unknown);
    }

    struct TemperatureRecorder {
        temps: std::sync::Mutex<Vec<f32>>,
    }

    #[async_trait::async_trait]
    impl Completion for TemperatureRecorder {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            params: SamplingParams,
        ) -> anyhow::Result<String> {
            self.temps.lock().unwrap().push(params.temperature);
            Ok("uptime".to_string())
        }
    }

    #[tokio::test]
    async fn test_retries_sample_hotter_even_without_failure_context() {
        let recorder = TemperatureRecorder {
            temps: std::sync::Mutex::new(Vec::new()),
        };
        let generator = CommandGenerator::new(&recorder, None);
        // Attempt 1 with no failure context models a retry after a
        // transport error: the temperature still rises.
        generator.generate("q", 0, None).await.unwrap();
        generator.generate("q", 1, None).await.unwrap();

        let temps = recorder.temps.lock().unwrap();
        assert_eq!(temps[0], FIRST_ATTEMPT_TEMPERATURE);
        assert_eq!(temps[1], RETRY_TEMPERATURE);
    }

    #[test]
    fn test_load_static_context_missing_file_is_none() {
        assert!(load_static_context(Some(Path::new("/nonexistent/context.txt"))).is_none());
        assert!(load_static_context(None).is_none());
    }

    #[test]
    fn test_load_static_context_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("context.txt");
        fs::write(&path, "laptop, Arch Linux").unwrap();
        let context = load_static_context(Some(&path)).unwrap();
        assert!(context.contains("Arch Linux"));
    }
}
