//! sysaskd - agent answering natural-language questions about this machine.
//!
//! The pipeline per query: classify, try the structured inventory, otherwise
//! generate a shell command with the LLM, execute it, and interpret the
//! output. Every failure path degrades into an explanatory response; no
//! query ever crashes the daemon.

pub mod config;
pub mod executor;
pub mod fallback;
pub mod generator;
pub mod interpreter;
pub mod inventory;
pub mod llm;
pub mod resolver;
pub mod server;
