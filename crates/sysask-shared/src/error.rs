//! Error types for the sysask agent.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Interpretation error: {0}")]
    Interpretation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    pub fn code(&self) -> i32 {
        match self {
            AgentError::Initialization(_) => -32000,
            AgentError::Generation(_) => -32001,
            AgentError::Execution(_) => -32002,
            AgentError::Interpretation(_) => -32003,
            AgentError::Io(_) => -32004,
            AgentError::Json(_) => -32700,
        }
    }
}
