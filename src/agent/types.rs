// Core data model for the agent loop

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// One turn of the conversation as stored in history.
///
/// The system prompt is not stored; the assembler prepends a fresh one per
/// request, so index 0 of every assembled send list is the system message.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub content: String,
    pub from_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            from_user: true,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            from_user: false,
            timestamp: Utc::now(),
        }
    }
}

/// A single step of a parsed reply, in source order.
///
/// One arm per action tag; prose between tags becomes `Message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStep {
    Message(String),
    SendKeys(String),
    ExecCommand(String),
    PasteMultiline(String),
    ExecAndWait(String),
}

/// The assistant's self-declared outcome of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    WorkingOnUserRequest,
    ExecPaneSeemsBusy,
    WaitingForUserResponse,
    RequestAccomplished,
    NoComment,
}

impl TerminalState {
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::WorkingOnUserRequest => "WorkingOnUserRequest",
            Self::ExecPaneSeemsBusy => "ExecPaneSeemsBusy",
            Self::WaitingForUserResponse => "WaitingForUserResponse",
            Self::RequestAccomplished => "RequestAccomplished",
            Self::NoComment => "NoComment",
        }
    }

    /// Parse the `state` payload of a ChangeState tag. Unknown values are
    /// dropped by the parser.
    pub fn from_tag(value: &str) -> Option<Self> {
        match value {
            "WorkingOnUserRequest" => Some(Self::WorkingOnUserRequest),
            "ExecPaneSeemsBusy" => Some(Self::ExecPaneSeemsBusy),
            "WaitingForUserResponse" => Some(Self::WaitingForUserResponse),
            "RequestAccomplished" => Some(Self::RequestAccomplished),
            "NoComment" => Some(Self::NoComment),
            _ => None,
        }
    }
}

/// Parsed form of one LLM completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReply {
    /// Actions and prose in source order, ChangeState excluded.
    pub sequence: Vec<ActionStep>,
    /// Last ChangeState wins when a reply carries several.
    pub state: Option<TerminalState>,
}

impl AgentReply {
    /// Concatenated prose of all Message steps, for rendering and history.
    pub fn message_text(&self) -> String {
        self.sequence
            .iter()
            .filter_map(|step| match step {
                ActionStep::Message(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One synchronous execution on a prepared pane.
#[derive(Debug, Clone)]
pub struct CommandExecRecord {
    pub command: String,
    pub output: String,
    pub exit_code: i32,
}

/// Run state of the loop; `Idle` is the cancellation value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Idle,
    Running,
    Waiting,
}

/// Shared status cell. The Ctrl-C handler flips it to `Idle`; the loop and
/// the executor observe the flip at their next suspension point. No other
/// state crosses activities, so an atomic is all the synchronisation needed.
#[derive(Debug, Clone, Default)]
pub struct StatusFlag(Arc<AtomicU8>);

impl StatusFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> RunStatus {
        match self.0.load(Ordering::SeqCst) {
            1 => RunStatus::Running,
            2 => RunStatus::Waiting,
            _ => RunStatus::Idle,
        }
    }

    pub fn set(&self, status: RunStatus) {
        let value = match status {
            RunStatus::Idle => 0,
            RunStatus::Running => 1,
            RunStatus::Waiting => 2,
        };
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.get() == RunStatus::Running
    }
}

/// How one loop invocation ended; the REPL maps this onto its prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopOutcome {
    /// RequestAccomplished, or watch-mode NoComment.
    Done,
    /// WaitingForUserResponse; the next REPL line resumes the dialogue.
    AwaitingUser,
    /// Status flipped away from Running, or the user declined a step.
    Cancelled,
    /// The retry cap ran out; the last complaint is surfaced.
    GuidelinesExhausted(String),
}
