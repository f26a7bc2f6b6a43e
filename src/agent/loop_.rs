// Agent loop: snapshot -> ask -> parse -> validate -> execute -> decide
//
// A flat driver loop rather than tail recursion, so long busy-wait chains
// cannot grow the stack. Cancellation is observed at suspension points
// only: before each iteration, after the LLM call, before each action step
// and during countdowns.

use std::time::Duration;

use tracing::{info, warn};

use crate::llm::WireMessage;

use super::executor::ExecOutcome;
use super::guidelines::MAX_GUIDELINE_RETRIES;
use super::types::{ChatMessage, LoopOutcome, RunStatus, TerminalState};
use super::{debug, guidelines, history, parser, prompts};
use super::{AgentError, Manager};

impl Manager {
    /// Map an assembled send list onto wire roles: index 0 is the system
    /// prompt, then user/assistant by authorship.
    fn to_wire(sent: &[ChatMessage]) -> Vec<WireMessage> {
        sent.iter()
            .enumerate()
            .map(|(i, msg)| {
                if i == 0 && !msg.from_user {
                    WireMessage::system(msg.content.clone())
                } else if msg.from_user {
                    WireMessage::user(msg.content.clone())
                } else {
                    WireMessage::assistant(msg.content.clone())
                }
            })
            .collect()
    }

    /// Sleep `seconds`, waking early when the status flips.
    async fn countdown(&self, seconds: u64) {
        for _ in 0..seconds {
            if !self.status.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Drive one user request to an outcome. Errors from the transport or
    /// the multiplexer terminate the iteration with status back at idle.
    pub async fn run_request(&mut self, user_message: &str) -> Result<LoopOutcome, AgentError> {
        self.status.set(RunStatus::Running);
        let result = self.request_loop(user_message).await;
        if result.is_err() {
            self.status.set(RunStatus::Idle);
        }
        result
    }

    async fn request_loop(&mut self, user_message: &str) -> Result<LoopOutcome, AgentError> {
        let mut pending = user_message.to_string();
        let mut strikes: u32 = 0;

        loop {
            if !self.status.is_running() {
                return Ok(LoopOutcome::Cancelled);
            }

            if history::needs_squash(&self.messages, self.max_context_tokens()) {
                self.say("Context size exceeded, squashing history...");
                self.squash_now().await?;
            }

            let system = prompts::assemble_system_prompt(&self.config, false, &self.exec_pane);
            let snapshot = self.tmux().capture_window_xml(&self.exec_pane.id).await?;
            let user_turn =
                prompts::user_turn(&snapshot, &self.exec_pane, &self.exec_history, &pending);

            let mut sent = Vec::with_capacity(self.messages.len() + 2);
            sent.push(system);
            sent.extend(self.messages.iter().cloned());
            sent.push(user_turn.clone());

            let raw = self.llm().complete(&Self::to_wire(&sent), &self.model()).await?;

            // A cancellation racing the LLM call lands here, quietly.
            if !self.status.is_running() {
                return Ok(LoopOutcome::Cancelled);
            }

            if self.debug_enabled() {
                if let Err(e) = debug::dump_transcript(&sent, &raw) {
                    warn!(error = %e, "failed to write debug transcript");
                }
            }

            let reply = parser::parse_reply(&raw);
            info!(steps = reply.sequence.len(), state = ?reply.state, "parsed reply");

            if let Err(complaint) = guidelines::check(&reply, false, self.exec_pane.is_prepared) {
                strikes += 1;
                warn!(strike = strikes, complaint = %complaint, "reply violated guidelines");
                if strikes >= MAX_GUIDELINE_RETRIES {
                    self.status.set(RunStatus::Idle);
                    return Ok(LoopOutcome::GuidelinesExhausted(complaint));
                }
                // Self-correction: the complaint becomes the next user turn.
                pending = complaint;
                continue;
            }
            strikes = 0;

            // Busy waits and NoComment replies stay out of history, so the
            // stored turns keep alternating user/assistant.
            let skip_append = matches!(
                reply.state,
                Some(TerminalState::ExecPaneSeemsBusy) | Some(TerminalState::NoComment)
            );
            if !skip_append {
                self.messages.push(user_turn);
                self.messages
                    .push(ChatMessage::assistant(reply.message_text()));
            }

            if self.execute_sequence(&reply.sequence).await? == ExecOutcome::Aborted {
                return Ok(LoopOutcome::Cancelled);
            }

            match reply.state {
                Some(TerminalState::RequestAccomplished) => {
                    self.status.set(RunStatus::Idle);
                    return Ok(LoopOutcome::Done);
                }
                Some(TerminalState::WaitingForUserResponse) => {
                    self.status.set(RunStatus::Waiting);
                    return Ok(LoopOutcome::AwaitingUser);
                }
                Some(TerminalState::NoComment) => {
                    return Ok(LoopOutcome::Done);
                }
                Some(TerminalState::ExecPaneSeemsBusy) => {
                    let interval = self.wait_interval();
                    self.say(&format!("Waiting {}s for the pane...", interval));
                    self.countdown(interval).await;
                    pending = format!(
                        "waited {} seconds, here is the new pane content",
                        interval
                    );
                }
                Some(TerminalState::WorkingOnUserRequest) | None => {
                    pending = "sending updated pane(s) content".to_string();
                }
            }
        }
    }

    /// Passive observation: tick, snapshot, ask with the watch prompt, speak
    /// only when the reply is not NoComment. Watch replies never enter
    /// history. Runs until cancelled or a collaborator errors.
    pub async fn run_watch(&mut self, goal: &str) -> Result<(), AgentError> {
        self.watch_mode = true;
        self.status.set(RunStatus::Running);
        self.say(&format!("Watching panes: {}", goal));

        let result = self.watch_loop(goal).await;

        self.watch_mode = false;
        self.status.set(RunStatus::Idle);
        result
    }

    async fn watch_loop(&mut self, goal: &str) -> Result<(), AgentError> {
        loop {
            self.countdown(self.wait_interval()).await;
            if !self.status.is_running() {
                return Ok(());
            }

            let system = prompts::assemble_system_prompt(&self.config, true, &self.exec_pane);
            let snapshot = self.tmux().capture_window_xml(&self.exec_pane.id).await?;
            let user_turn = prompts::user_turn(&snapshot, &self.exec_pane, &[], goal);

            let mut sent = Vec::with_capacity(self.messages.len() + 2);
            sent.push(system);
            sent.extend(self.messages.iter().cloned());
            sent.push(user_turn);

            let raw = self.llm().complete(&Self::to_wire(&sent), &self.model()).await?;
            if !self.status.is_running() {
                return Ok(());
            }

            if self.debug_enabled() {
                if let Err(e) = debug::dump_transcript(&sent, &raw) {
                    warn!(error = %e, "failed to write debug transcript");
                }
            }

            let reply = parser::parse_reply(&raw);
            if let Err(complaint) = guidelines::check(&reply, true, self.exec_pane.is_prepared) {
                warn!(complaint = %complaint, "watch reply violated guidelines, ignoring");
                continue;
            }

            if reply.state == Some(TerminalState::NoComment) {
                continue;
            }

            let text = reply.message_text();
            if !text.is_empty() {
                self.say(&text);
            }
        }
    }
}
