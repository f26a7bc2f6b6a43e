// Shared scripted collaborators for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use muxmate::agent::{ConfirmOutcome, Confirmer, ExecPane, Manager, StatusFlag};
use muxmate::agent::RunStatus;
use muxmate::config::Config;
use muxmate::llm::{CompletionClient, LlmError, WireMessage};
use muxmate::tmux::{PaneDetails, PaneDriver, TmuxError};

/// Transport that replays canned completions in order and records every
/// request it saw. Running out of script yields a transport error.
pub struct ScriptedLlm {
    responses: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<Vec<WireMessage>>>,
    /// When set, the status is flipped to Idle after this many calls,
    /// simulating a Ctrl-C racing the request.
    flip: Option<(StatusFlag, usize)>,
    calls: Mutex<usize>,
}

impl ScriptedLlm {
    pub fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            flip: None,
            calls: Mutex::new(0),
        })
    }

    pub fn flipping(responses: &[&str], status: StatusFlag, after_calls: usize) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
            flip: Some((status, after_calls)),
            calls: Mutex::new(0),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_user_content(&self) -> String {
        let requests = self.requests.lock().unwrap();
        requests
            .last()
            .and_then(|msgs| msgs.last())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for ScriptedLlm {
    async fn complete(&self, messages: &[WireMessage], model: &str) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if let Some((status, after)) = &self.flip {
            if *calls >= *after {
                status.set(RunStatus::Idle);
            }
        }

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::NoChoices {
                model: model.to_string(),
            });
        }
        Ok(responses.remove(0))
    }
}

/// Pane driver that records deliveries instead of touching tmux.
#[derive(Default)]
pub struct RecordingPane {
    pub sent: Mutex<Vec<(String, String, bool)>>,
    pub exec_calls: Mutex<Vec<String>>,
}

impl RecordingPane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent_keys(&self) -> Vec<(String, String, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaneDriver for RecordingPane {
    async fn send_keys(
        &self,
        pane_id: &str,
        text: &str,
        press_enter: bool,
    ) -> Result<(), TmuxError> {
        self.sent
            .lock()
            .unwrap()
            .push((pane_id.to_string(), text.to_string(), press_enter));
        Ok(())
    }

    async fn capture_pane(&self, _pane_id: &str) -> Result<String, TmuxError> {
        Ok("$ ".to_string())
    }

    async fn list_window_panes(&self) -> Result<Vec<PaneDetails>, TmuxError> {
        Ok(vec![
            PaneDetails {
                id: "%0".to_string(),
                is_active: true,
                current_command: "muxmate".to_string(),
                width: 80,
                height: 24,
            },
            PaneDetails {
                id: "%1".to_string(),
                is_active: false,
                current_command: "bash".to_string(),
                width: 80,
                height: 24,
            },
        ])
    }

    async fn current_pane_id(&self) -> Result<String, TmuxError> {
        Ok("%0".to_string())
    }

    async fn create_session(&self) -> Result<String, TmuxError> {
        Ok("%9".to_string())
    }

    async fn split_window(&self) -> Result<String, TmuxError> {
        Ok("%2".to_string())
    }

    async fn attach_session(&self, _pane_id: &str) -> Result<(), TmuxError> {
        Ok(())
    }

    async fn exec_and_capture(&self, _pane_id: &str, cmd: &str) -> Result<(String, i32), TmuxError> {
        self.exec_calls.lock().unwrap().push(cmd.to_string());
        Ok(("captured output".to_string(), 0))
    }

    async fn prepare_pane(&self, _pane_id: &str, _shell: &str) -> Result<(), TmuxError> {
        Ok(())
    }
}

pub struct AcceptAll;

impl Confirmer for AcceptAll {
    fn confirm(&self, _question: &str, content: &str, _editable: bool) -> ConfirmOutcome {
        ConfirmOutcome::Accepted(content.to_string())
    }
}

pub struct DeclineAll;

impl Confirmer for DeclineAll {
    fn confirm(&self, _question: &str, _content: &str, _editable: bool) -> ConfirmOutcome {
        ConfirmOutcome::Declined
    }
}

/// Accepts the first `n` prompts, declines afterwards.
pub struct AcceptFirst {
    remaining: Mutex<usize>,
}

impl AcceptFirst {
    pub fn new(n: usize) -> Self {
        Self {
            remaining: Mutex::new(n),
        }
    }
}

impl Confirmer for AcceptFirst {
    fn confirm(&self, _question: &str, content: &str, _editable: bool) -> ConfirmOutcome {
        let mut remaining = self.remaining.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            ConfirmOutcome::Accepted(content.to_string())
        } else {
            ConfirmOutcome::Declined
        }
    }
}

/// Rewrites every editable confirmation to a fixed command.
pub struct EditingConfirmer(pub String);

impl Confirmer for EditingConfirmer {
    fn confirm(&self, _question: &str, content: &str, editable: bool) -> ConfirmOutcome {
        if editable {
            ConfirmOutcome::Accepted(self.0.clone())
        } else {
            ConfirmOutcome::Accepted(content.to_string())
        }
    }
}

pub fn test_pane(prepared: bool) -> ExecPane {
    ExecPane {
        id: "%1".to_string(),
        shell: "bash".to_string(),
        os: "linux".to_string(),
        is_sub_shell: false,
        is_prepared: prepared,
    }
}

/// Config with confirmations off so loop tests run unattended; individual
/// tests re-enable what they exercise.
pub fn quiet_config() -> Config {
    let mut config = Config::default();
    config.exec_confirm = false;
    config.send_keys_confirm = false;
    config.paste_multiline_confirm = false;
    config
}

pub fn test_manager(
    llm: Arc<dyn CompletionClient>,
    tmux: Arc<dyn PaneDriver>,
    confirmer: Box<dyn Confirmer>,
    prepared: bool,
) -> Manager {
    let mut manager = Manager::new(quiet_config(), llm, tmux, confirmer, test_pane(prepared));
    // No wall-clock waits inside tests.
    manager.overrides.set("wait_interval", "0");
    manager
}
