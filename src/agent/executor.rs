// Action executor: run a validated sequence against the exec pane
//
// The pane is shared with a human; confirmation keeps them in the loop, and
// the status flag is re-read before every step so an interrupt lands at the
// next step boundary rather than after the whole sequence.

use std::time::Duration;

use tracing::{info, warn};

use super::types::{ActionStep, CommandExecRecord, RunStatus};
use super::{AgentError, Manager};

/// Pause after delivering a step, giving the shell time to start.
const STEP_PAUSE: Duration = Duration::from_secs(1);

/// What the user decided at a confirmation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Carries the final text: for editable prompts the user may have
    /// changed it, and the edited text is what executes.
    Accepted(String),
    Declined,
}

/// Human-in-the-loop gate. Reading the answer is a suspension point.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, question: &str, content: &str, editable: bool) -> ConfirmOutcome;
}

/// How a sequence execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Completed,
    /// Declined confirmation or status flip; the iteration is over.
    Aborted,
}

impl Manager {
    /// Execute the steps in parsed order. On decline or cancellation the
    /// remaining steps are skipped and status is already `Idle`.
    pub async fn execute_sequence(
        &mut self,
        sequence: &[ActionStep],
    ) -> Result<ExecOutcome, AgentError> {
        for step in sequence {
            if self.status.get() != RunStatus::Running {
                info!("sequence interrupted by status flip");
                return Ok(ExecOutcome::Aborted);
            }

            match step {
                ActionStep::Message(text) => {
                    self.say(text);
                }

                ActionStep::ExecCommand(cmd) => {
                    let command = if self.exec_confirm() {
                        match self.confirmer().confirm("Execute this command?", cmd, true) {
                            ConfirmOutcome::Accepted(edited) => edited,
                            ConfirmOutcome::Declined => {
                                self.status.set(RunStatus::Idle);
                                return Ok(ExecOutcome::Aborted);
                            }
                        }
                    } else {
                        cmd.clone()
                    };

                    info!(command = %command, "executing command");
                    self.say(&format!("Executing: {}", command));
                    self.tmux()
                        .send_keys(&self.exec_pane.id, &command, true)
                        .await?;
                    tokio::time::sleep(STEP_PAUSE).await;
                }

                ActionStep::SendKeys(keys) => {
                    if self.send_keys_confirm() {
                        match self.confirmer().confirm("Send these keys?", keys, false) {
                            ConfirmOutcome::Accepted(_) => {}
                            ConfirmOutcome::Declined => {
                                self.status.set(RunStatus::Idle);
                                return Ok(ExecOutcome::Aborted);
                            }
                        }
                    }

                    info!(keys = %keys, "sending keys");
                    self.say(&format!("Sending keys: {}", keys));
                    self.tmux()
                        .send_keys(&self.exec_pane.id, keys, false)
                        .await?;
                    tokio::time::sleep(STEP_PAUSE).await;
                }

                ActionStep::PasteMultiline(content) => {
                    if self.paste_multiline_confirm() {
                        match self
                            .confirmer()
                            .confirm("Paste multiline content?", content, false)
                        {
                            ConfirmOutcome::Accepted(_) => {}
                            ConfirmOutcome::Declined => {
                                self.status.set(RunStatus::Idle);
                                return Ok(ExecOutcome::Aborted);
                            }
                        }
                    }

                    info!(bytes = content.len(), "pasting multiline content");
                    self.say("Pasting...");
                    self.tmux()
                        .send_keys(&self.exec_pane.id, content, true)
                        .await?;
                    tokio::time::sleep(STEP_PAUSE).await;
                }

                ActionStep::ExecAndWait(cmd) => {
                    let command = if self.exec_confirm() {
                        match self.confirmer().confirm("Execute this command?", cmd, true) {
                            ConfirmOutcome::Accepted(edited) => edited,
                            ConfirmOutcome::Declined => {
                                self.status.set(RunStatus::Idle);
                                return Ok(ExecOutcome::Aborted);
                            }
                        }
                    } else {
                        cmd.clone()
                    };

                    self.say(&format!("Executing and waiting: {}", command));
                    let result = self
                        .tmux()
                        .exec_and_capture(&self.exec_pane.id, &command)
                        .await;
                    match result {
                        Ok((output, exit_code)) => {
                            info!(command = %command, exit_code, "captured execution finished");
                            self.say(&format!("Finished with exit code {}", exit_code));
                            self.exec_history.push(CommandExecRecord {
                                command,
                                output,
                                exit_code,
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "captured execution failed");
                            return Err(e.into());
                        }
                    }
                }
            }
        }

        Ok(ExecOutcome::Completed)
    }
}
