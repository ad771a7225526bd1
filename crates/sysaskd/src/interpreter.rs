//! Result interpreter - turns raw command output into user-facing prose.
//!
//! The LLM does the explaining when it is reachable; otherwise a
//! deterministic local formatter takes over. Interpretation never fails:
//! every path returns text.

use serde_json::{Map, Value};
use tracing::warn;

use crate::llm::{ChatMessage, Completion, SamplingParams};
use sysask_shared::format::{format_bytes, strip_wrapping_quotes};

/// Shown when a command succeeded but produced nothing to explain.
pub const NO_DATA_MESSAGE: &str =
    "The command ran but returned no data for this question.";

/// Raw-output budget for the interpretation prompt.
const OUTPUT_BUDGET: usize = 6_000;

const FORMATTING_ROLE: &str = "You are a helpful system assistant. Explain \
the command output to the user who asked the question. Use a markdown bullet \
list for multi-item data, bold key/value lines for single facts, and a \
markdown table for tabular data. Be concise and do not invent values.";

/// Fields tried, in order, when guessing what names an item in a JSON array.
const NAME_FIELDS: &[&str] = &[
    "name",
    "Name",
    "ProcessName",
    "DeviceID",
    "model",
    "fs",
    "iface",
    "mount",
];

/// Fields tried, in order, when guessing an item's size or usage figure.
const SIZE_FIELDS: &[&str] = &[
    "size",
    "Size",
    "used",
    "used_bytes",
    "total",
    "total_bytes",
    "mem",
    "rss",
    "vsz",
    "usage",
];

pub struct ResultInterpreter<'a> {
    llm: Option<&'a dyn Completion>,
}

impl<'a> ResultInterpreter<'a> {
    pub fn new(llm: Option<&'a dyn Completion>) -> Self {
        Self { llm }
    }

    /// Explain `raw_output` for the user. Never errors.
    pub async fn interpret(&self, query: &str, command: &str, raw_output: &str) -> String {
        let trimmed = raw_output.trim();
        if trimmed.is_empty() || trimmed == "[]" || trimmed == "{}" {
            return NO_DATA_MESSAGE.to_string();
        }

        if let Some(llm) = self.llm {
            match interpret_with_llm(llm, query, command, trimmed).await {
                Ok(text) if !text.trim().is_empty() => {
                    return strip_wrapping_quotes(&text).to_string();
                }
                Ok(_) => warn!("interpreter got an empty reply, using local formatter"),
                Err(e) => warn!("interpretation failed ({}), using local formatter", e),
            }
        }

        format_locally(trimmed)
    }
}

async fn interpret_with_llm(
    llm: &dyn Completion,
    query: &str,
    command: &str,
    raw_output: &str,
) -> anyhow::Result<String> {
    let excerpt = if raw_output.len() > OUTPUT_BUDGET {
        let mut end = OUTPUT_BUDGET;
        while !raw_output.is_char_boundary(end) {
            end -= 1;
        }
        &raw_output[..end]
    } else {
        raw_output
    };

    let user = format!(
        "Question: {}\nCommand run: {}\nOutput:\n{}",
        query, command, excerpt
    );
    let messages = [ChatMessage::system(FORMATTING_ROLE), ChatMessage::user(user)];
    let params = SamplingParams {
        temperature: 0.3,
        ..SamplingParams::default()
    };

    llm.complete(&messages, params).await
}

/// Deterministic formatter used when the completion service is unreachable.
/// Heuristic by design: it guesses name and size fields instead of knowing
/// the schema.
pub fn format_locally(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => format_array(&items),
        Ok(Value::Object(map)) => format_object(&map),
        _ => raw.to_string(),
    }
}

fn format_array(items: &[Value]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(10)
        .map(|item| match item {
            Value::Object(map) => format_array_item(map),
            other => format!("- {}", scalar_text(other)),
        })
        .collect();

    if items.len() > 10 {
        lines.push(format!("- ... and {} more", items.len() - 10));
    }
    lines.join("\n")
}

fn format_array_item(map: &Map<String, Value>) -> String {
    let name = NAME_FIELDS
        .iter()
        .find_map(|field| map.get(*field))
        .map(scalar_text)
        .unwrap_or_else(|| "item".to_string());

    let size = SIZE_FIELDS.iter().find_map(|field| {
        let value = map.get(*field)?;
        match value {
            Value::Number(n) => {
                if byte_like(field) || n.as_u64().map(|v| v > 4096).unwrap_or(false) {
                    n.as_u64().map(format_bytes)
                } else {
                    Some(n.to_string())
                }
            }
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    });

    match size {
        Some(size) => format!("- {} ({})", name, size),
        None => format!("- {}", name),
    }
}

fn format_object(map: &Map<String, Value>) -> String {
    map.iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::Number(n) if byte_like(key) => {
                    n.as_u64().map(format_bytes).unwrap_or_else(|| n.to_string())
                }
                Value::Number(n) if percent_like(key) => {
                    format!("{}%", n)
                }
                other => scalar_text(other),
            };
            format!("**{}**: {}", key, rendered)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn byte_like(key: &str) -> bool {
    let k = key.to_lowercase();
    k.contains("byte") || k.contains("size") || k.ends_with("_mem") || k == "mem" || k == "rss"
}

fn percent_like(key: &str) -> bool {
    let k = key.to_lowercase();
    k.contains("percent") || k.ends_with("_pct")
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
