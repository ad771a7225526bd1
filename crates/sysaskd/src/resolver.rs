//! Query resolver - the per-query state machine.
//!
//! Classify, try the structured inventory, then drive generation and
//! execution through a bounded retry loop, and interpret whatever came back.
//! Every exit path returns a well-formed envelope; nothing propagates.

use std::sync::Arc;
use tracing::{info, warn};

use crate::executor::CommandRunner;
use crate::fallback;
use crate::generator::{AttemptFailure, CommandGenerator, Generated};
use crate::interpreter::ResultInterpreter;
use crate::inventory::{self, SystemInventory};
use crate::llm::Completion;
use sysask_shared::envelope::{ResponseEnvelope, FALLBACK_LABEL, STRUCTURED_LABEL};

/// Retries after the first generation attempt (so 3 attempts total).
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Live-activity markers. These questions rank or inspect current behavior,
/// which a static inventory snapshot cannot answer, so they skip the
/// structured shortcut even when they also name an inventory keyword.
const USAGE_KEYWORDS: &[&str] = &["usage", "running", "processes", "services", "current"];

pub fn is_usage_query(query: &str) -> bool {
    let q = query.to_lowercase();
    USAGE_KEYWORDS.iter().any(|keyword| q.contains(keyword))
}

pub struct QueryResolver {
    llm: Option<Arc<dyn Completion>>,
    runner: Arc<dyn CommandRunner>,
    inventory: Arc<dyn SystemInventory>,
    static_context: Option<String>,
}

impl QueryResolver {
    pub fn new(
        llm: Option<Arc<dyn Completion>>,
        runner: Arc<dyn CommandRunner>,
        inventory: Arc<dyn SystemInventory>,
        static_context: Option<String>,
    ) -> Self {
        Self {
            llm,
            runner,
            inventory,
            static_context,
        }
    }

    /// Resolve one query into exactly one envelope. Never fails.
    pub async fn resolve(&self, query: &str, max_retries: u32) -> ResponseEnvelope {
        info!("resolving query: {:?}", query);

        // Structured shortcut, static-fact questions only.
        if !is_usage_query(query) {
            if let Some(kind) = inventory::match_kind(query) {
                match self.inventory.lookup(kind) {
                    Ok(value) => {
                        let raw = serde_json::to_string_pretty(&value)
                            .unwrap_or_else(|_| value.to_string());
                        let interpretation =
                            self.interpreter().interpret(query, STRUCTURED_LABEL, &raw).await;
                        return ResponseEnvelope::new(interpretation, STRUCTURED_LABEL, raw);
                    }
                    Err(e) => {
                        warn!("inventory lookup {} failed ({}), falling through", kind, e);
                    }
                }
            }
        }

        let Some(llm) = self.llm.clone() else {
            return basic_mode_answer(query);
        };

        // Bounded generation loop; error N-1 feeds generation N.
        let generator = CommandGenerator::new(llm.as_ref(), self.static_context.as_deref());
        let mut last_failure: Option<AttemptFailure> = None;
        let mut last_error = String::new();

        for attempt in 0..=max_retries {
            let generated = match generator.generate(query, attempt, last_failure.as_ref()).await {
                Ok(generated) => generated,
                Err(e) => {
                    warn!("generation attempt {} failed: {}", attempt + 1, e);
                    last_error = e.to_string();
                    continue;
                }
            };

            let command = match generated {
                Generated::Command(command) => command,
                Generated::Unknown => {
                    // The model has no command for this; stop retrying.
                    if let Some(answer) = fallback::lookup(query) {
                        return ResponseEnvelope::new(
                            format!("Using built-in method. {}", answer),
                            FALLBACK_LABEL,
                            String::new(),
                        );
                    }
                    return ResponseEnvelope::failure(
                        "I could not find a way to answer that question. Try rephrasing it.",
                    );
                }
            };

            info!("attempt {}: executing {:?}", attempt + 1, command);
            match self.runner.run(&command).await {
                Ok(raw_output) => {
                    let interpretation =
                        self.interpreter().interpret(query, &command, &raw_output).await;
                    return ResponseEnvelope::new(interpretation, command, raw_output);
                }
                Err(e) => {
                    warn!("attempt {} failed: {}", attempt + 1, e);
                    last_error = e.to_string();
                    last_failure = Some(AttemptFailure {
                        command,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Retry budget exhausted.
        if let Some(answer) = fallback::lookup(query) {
            return ResponseEnvelope::new(
                format!("Found another way after several attempts. {}", answer),
                FALLBACK_LABEL,
                String::new(),
            );
        }

        let detail = if last_error.is_empty() {
            String::new()
        } else {
            format!(" (last error: {})", last_error)
        };
        ResponseEnvelope::failure(format!(
            "I tried several commands but none of them worked{}. Try rephrasing the question.",
            detail
        ))
    }

    fn interpreter(&self) -> ResultInterpreter<'_> {
        ResultInterpreter::new(self.llm.as_deref())
    }
}

/// Degraded mode: no completion client, so only local answers are possible.
fn basic_mode_answer(query: &str) -> ResponseEnvelope {
    if let Some(answer) = fallback::lookup(query) {
        return ResponseEnvelope::new(
            format!("Using built-in method. {}", answer),
            FALLBACK_LABEL,
            String::new(),
        );
    }
    ResponseEnvelope::failure(
        "The language model is not available and no built-in method matches this question. \
         Try a simpler question about cores, memory, disk, hostname, or uptime.",
    )
}
