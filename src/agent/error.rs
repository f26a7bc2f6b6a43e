// Error types for the agent core

use thiserror::Error;

use crate::llm::LlmError;
use crate::tmux::TmuxError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM transport error: {0}")]
    Llm(#[from] LlmError),

    #[error("Multiplexer error: {0}")]
    Tmux(#[from] TmuxError),
}
