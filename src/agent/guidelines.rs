// Guideline checks on a parsed reply
//
// Rejections are returned as complaint text that the loop feeds back to the
// model as a synthetic user turn; the wording therefore addresses the model,
// not the user. Checking is pure: same reply, same verdict.

use super::types::{ActionStep, AgentReply};

/// Maximum characters in a single ExecCommand payload.
pub const MAX_EXEC_COMMAND_LEN: usize = 120;
/// Maximum characters in a single TmuxSendKeys payload.
pub const MAX_SEND_KEYS_LEN: usize = 120;
/// Maximum TmuxSendKeys steps per reply.
pub const MAX_SEND_KEYS_STEPS: usize = 5;
/// Consecutive complaints before the loop gives up and returns to idle.
pub const MAX_GUIDELINE_RETRIES: u32 = 3;

fn is_action(step: &ActionStep) -> bool {
    !matches!(step, ActionStep::Message(_))
}

/// Verify a reply against the response guidelines. `Err` carries the
/// complaint to send back for self-correction.
///
/// The one-terminal-state rule holds by construction: the parser collapses
/// repeated ChangeState tags into a single `state` (last writer wins).
pub fn check(reply: &AgentReply, watch_mode: bool, pane_prepared: bool) -> Result<(), String> {
    let action_count = reply.sequence.iter().filter(|s| is_action(s)).count();

    if watch_mode {
        // Watch mode is observe-only: prose or a NoComment state, nothing else.
        if action_count > 0 {
            return Err(
                "You didn't follow the guidelines. In watch mode you must not send keys, \
                 execute commands or paste content; respond with text or NoComment only. \
                 Pay attention!"
                    .to_string(),
            );
        }
        return Ok(());
    }

    if action_count == 0 && reply.state.is_none() {
        return Err(
            "You didn't follow the guidelines. You must call at least one function in your \
             response. Pay attention!"
                .to_string(),
        );
    }

    let mut send_keys_count = 0usize;
    for step in &reply.sequence {
        match step {
            ActionStep::ExecCommand(cmd) if cmd.chars().count() > MAX_EXEC_COMMAND_LEN => {
                return Err(format!(
                    "You didn't follow the guidelines. ExecCommand content should have max {} \
                     characters, but you provided {} characters. Pay attention!",
                    MAX_EXEC_COMMAND_LEN,
                    cmd.chars().count()
                ));
            }
            ActionStep::SendKeys(keys) => {
                send_keys_count += 1;
                if keys.chars().count() > MAX_SEND_KEYS_LEN {
                    return Err(format!(
                        "You didn't follow the guidelines. TmuxSendKeys content should have max \
                         {} characters, but you provided {} characters. Pay attention!",
                        MAX_SEND_KEYS_LEN,
                        keys.chars().count()
                    ));
                }
            }
            ActionStep::ExecAndWait(_) if !pane_prepared => {
                return Err(
                    "You didn't follow the guidelines. ExecAndWait is only available when the \
                     exec pane is prepared; use ExecCommand instead. Pay attention!"
                        .to_string(),
                );
            }
            _ => {}
        }
    }

    if send_keys_count > MAX_SEND_KEYS_STEPS {
        return Err(format!(
            "You didn't follow the guidelines. There should be max {} TmuxSendKeys calls, but \
             you provided {} calls. Pay attention!",
            MAX_SEND_KEYS_STEPS, send_keys_count
        ));
    }

    Ok(())
}
