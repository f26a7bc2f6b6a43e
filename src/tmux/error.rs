// Error types for the tmux adapter

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("Not inside a tmux session")]
    NotInTmux,

    #[error("tmux {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to parse tmux output: {0}")]
    ParseFailed(String),

    #[error("Timed out after {0} seconds waiting for command completion")]
    Timeout(u64),

    #[error("Cannot prepare a '{0}' pane; supported shells are bash, zsh and fish")]
    UnsupportedShell(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
