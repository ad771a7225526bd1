//! Response envelope - the one artifact returned for every query.

use serde::{Deserialize, Serialize};

/// Label used in the `command` field when the structured inventory answered.
pub const STRUCTURED_LABEL: &str = "used built-in system inventory";

/// Label used in the `command` field when the static fallback table answered.
pub const FALLBACK_LABEL: &str = "used built-in method";

/// What the caller gets back for every query. `interpretation` is never
/// empty; failure paths substitute an explanatory message. Field names are
/// camelCase on the wire for the desktop-shell consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub interpretation: String,
    pub command: String,
    pub raw_output: String,
}

impl ResponseEnvelope {
    pub fn new(
        interpretation: impl Into<String>,
        command: impl Into<String>,
        raw_output: impl Into<String>,
    ) -> Self {
        Self {
            interpretation: interpretation.into(),
            command: command.into(),
            raw_output: raw_output.into(),
        }
    }

    /// Terminal failure envelope: explanation only, no command, no output.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            interpretation: message.into(),
            command: String::new(),
            raw_output: String::new(),
        }
    }
}
