// Agent core: the interaction loop and its collaborators
//
// Manager owns the process-wide context: configuration plus session
// overrides, the transport and driver seams, the exec pane, conversation
// history and the shared status flag. All mutation happens on the single
// logical thread of control; the status flag is the one cell the Ctrl-C
// handler touches from outside.

pub mod debug;
pub mod error;
pub mod executor;
pub mod guidelines;
pub mod history;
pub mod loop_;
pub mod parser;
pub mod prompts;
pub mod types;

pub use error::AgentError;
pub use executor::{ConfirmOutcome, Confirmer, ExecOutcome};
pub use types::{
    ActionStep, AgentReply, ChatMessage, CommandExecRecord, LoopOutcome, RunStatus, StatusFlag,
    TerminalState,
};

use std::sync::Arc;

use tracing::info;

use crate::config::{Config, SessionOverrides};
use crate::llm::CompletionClient;
use crate::tmux::{PaneDriver, TmuxError};

/// The pane the assistant drives, as the core sees it.
#[derive(Debug, Clone)]
pub struct ExecPane {
    pub id: String,
    /// Shell name, empty when unknown.
    pub shell: String,
    pub os: String,
    /// The foreground process is not a shell (editor, pager, ...); shell/OS
    /// hints are suppressed while this holds.
    pub is_sub_shell: bool,
    /// Prompt hook installed; unlocks ExecAndWait.
    pub is_prepared: bool,
}

pub struct Manager {
    pub config: Config,
    pub overrides: SessionOverrides,
    pub exec_pane: ExecPane,
    pub messages: Vec<ChatMessage>,
    pub exec_history: Vec<CommandExecRecord>,
    pub status: StatusFlag,
    pub watch_mode: bool,
    llm: Arc<dyn CompletionClient>,
    tmux: Arc<dyn PaneDriver>,
    confirmer: Box<dyn Confirmer>,
}

impl Manager {
    pub fn new(
        config: Config,
        llm: Arc<dyn CompletionClient>,
        tmux: Arc<dyn PaneDriver>,
        confirmer: Box<dyn Confirmer>,
        exec_pane: ExecPane,
    ) -> Self {
        Self {
            config,
            overrides: SessionOverrides::default(),
            exec_pane,
            messages: Vec::new(),
            exec_history: Vec::new(),
            status: StatusFlag::new(),
            watch_mode: false,
            llm,
            tmux,
            confirmer,
        }
    }

    /// Locate (or create) the pane the assistant will drive: the first pane
    /// of the window that is not the REPL's own, splitting the window when
    /// the REPL pane is the only one.
    pub async fn probe_exec_pane(
        tmux: &dyn PaneDriver,
        repl_pane_id: &str,
    ) -> Result<ExecPane, TmuxError> {
        let panes = tmux.list_window_panes().await?;
        let existing = panes.iter().find(|p| p.id != repl_pane_id);

        let details = match existing {
            Some(pane) => pane.clone(),
            None => {
                let id = tmux.split_window().await?;
                info!(pane = %id, "split window for exec pane");
                tmux.list_window_panes()
                    .await?
                    .into_iter()
                    .find(|p| p.id == id)
                    .ok_or_else(|| {
                        TmuxError::ParseFailed("freshly split pane not listed".to_string())
                    })?
            }
        };

        let shell = details.known_shell().map(str::to_string);
        Ok(ExecPane {
            id: details.id,
            is_sub_shell: shell.is_none(),
            shell: shell.unwrap_or_default(),
            os: std::env::consts::OS.to_string(),
            is_prepared: false,
        })
    }

    /// Re-read the exec pane's foreground process; the prepared flag is kept
    /// as long as the pane itself still exists.
    pub async fn refresh_exec_pane(&mut self) -> Result<(), TmuxError> {
        let panes = self.tmux.list_window_panes().await?;
        if let Some(details) = panes.iter().find(|p| p.id == self.exec_pane.id) {
            let shell = details.known_shell().map(str::to_string);
            self.exec_pane.is_sub_shell = shell.is_none();
            if let Some(shell) = shell {
                self.exec_pane.shell = shell;
            }
        } else {
            let repl = self.tmux.current_pane_id().await?;
            self.exec_pane = Self::probe_exec_pane(self.tmux.as_ref(), &repl).await?;
        }
        Ok(())
    }

    /// Install the prompt hook that lets ExecAndWait capture output and exit
    /// codes.
    pub async fn prepare_exec_pane(&mut self) -> Result<(), TmuxError> {
        self.refresh_exec_pane().await?;
        if self.exec_pane.is_sub_shell {
            return Err(TmuxError::UnsupportedShell(
                "current pane process is not a shell".to_string(),
            ));
        }
        self.tmux
            .prepare_pane(&self.exec_pane.id, &self.exec_pane.shell)
            .await?;
        self.exec_pane.is_prepared = true;
        Ok(())
    }

    /// Squash stored history through the transport. Split out so callers
    /// can borrow `messages` mutably while the client is in use.
    pub async fn squash_now(&mut self) -> Result<(), crate::llm::LlmError> {
        let llm = self.llm.clone();
        let model = self.model();
        history::squash(&mut self.messages, llm.as_ref(), &model).await
    }

    /// Drop conversation state; configuration and the pane stay.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.exec_history.clear();
        self.status.set(RunStatus::Idle);
    }

    pub(crate) fn llm(&self) -> &dyn CompletionClient {
        self.llm.as_ref()
    }

    pub(crate) fn tmux(&self) -> &dyn PaneDriver {
        self.tmux.as_ref()
    }

    pub(crate) fn confirmer(&self) -> &dyn Confirmer {
        self.confirmer.as_ref()
    }

    /// Render a line to the user's terminal.
    pub fn say(&self, message: &str) {
        println!("muxmate » {}", message);
    }

    // Typed config getters; session overrides win over the file.

    pub fn model(&self) -> String {
        self.overrides
            .get("model")
            .map(str::to_string)
            .unwrap_or_else(|| self.config.openrouter.model.clone())
    }

    pub fn wait_interval(&self) -> u64 {
        self.overrides
            .get_u64("wait_interval")
            .unwrap_or(self.config.wait_interval)
    }

    pub fn max_context_tokens(&self) -> usize {
        self.overrides
            .get_u64("max_context_tokens")
            .map(|v| v as usize)
            .unwrap_or(self.config.max_context_tokens)
    }

    pub fn exec_confirm(&self) -> bool {
        self.overrides
            .get_bool("exec_confirm")
            .unwrap_or(self.config.exec_confirm)
    }

    pub fn send_keys_confirm(&self) -> bool {
        self.overrides
            .get_bool("send_keys_confirm")
            .unwrap_or(self.config.send_keys_confirm)
    }

    pub fn paste_multiline_confirm(&self) -> bool {
        self.overrides
            .get_bool("paste_multiline_confirm")
            .unwrap_or(self.config.paste_multiline_confirm)
    }

    pub fn debug_enabled(&self) -> bool {
        self.overrides
            .get_bool("debug")
            .unwrap_or(self.config.debug)
    }
}
