// Prompt assembly
//
// Exactly one system message per request, selected by mode. A base_system
// override replaces the base wholesale; the mode-specific overrides are
// appended after the base instead of the built-in instructions.

use crate::config::Config;

use super::types::{ChatMessage, CommandExecRecord};
use super::ExecPane;

/// How many captured executions the prompt recalls.
const EXEC_HISTORY_WINDOW: usize = 5;

const BASE_SYSTEM: &str = "You are muxmate, an AI pair operator living inside the user's tmux \
window. You see what the user sees: the visible content of every pane in the window. You and \
the user share one exec pane, which you drive by calling tools; the user may type into it at \
any time.

Use your common sense to reach conclusions yourself instead of asking questions back when the \
answer is inferable. You are an expert in shell usage across bash, zsh, fish and different \
operating systems. Strive for simple, effective solutions: prefer plain shell commands over \
scripts, avoid creating intermediate files, and never emit binary or extremely long generated \
content. Address the user directly as 'you'.

BE CONCISE. Minimize output while staying helpful and accurate. Place tool calls at the end of \
your response and write no text after them.";

const CHAT_INSTRUCTIONS: &str = "You act by embedding XML action tags in your response. Each \
tag wraps a single JSON object:

1. <TmuxSendKeys>{\"keys\":\"...\"}</TmuxSendKeys> - send one keystroke or key chord to the \
exec pane. Supported: standard characters, function keys (F1-F12), navigation keys (Up, Down, \
Left, Right, Enter, Escape, Home, End, PageUp, PageDown, Space, Tab, BSpace, DC) and modifier \
prefixes (C-, M-).
2. <ExecCommand>{\"command\":\"...\"}</ExecCommand> - execute a shell command in the exec pane.
3. <PasteMultilineContent>{\"content\":\"...\"}</PasteMultilineContent> - paste multiline text \
into the pane. Only for feeding text into a running program such as an editor; never use it to \
run commands at a shell prompt.
4. <ChangeState>{\"state\":\"...\"}</ChangeState> - declare the outcome of this reply. States: \
WorkingOnUserRequest, ExecPaneSeemsBusy (waiting for the pane to finish), \
WaitingForUserResponse (you asked a question), RequestAccomplished (verified done), NoComment.

When responding: analyze the request and the current pane content, decide whether the pane is \
busy or idle, then act.

Rules you must follow in every response:
- Include at least one action tag or a ChangeState tag; a bare prose reply is invalid.
- At most one ChangeState per response.
- ExecCommand content must be at most 120 characters; split longer work into steps and send \
only the first step.
- TmuxSendKeys content must be at most 120 characters, and at most 5 TmuxSendKeys tags per \
response.

Examples:
I'll open the file in vim.
<TmuxSendKeys>{\"keys\":\"vim example.txt\"}</TmuxSendKeys>
<TmuxSendKeys>{\"keys\":\"Enter\"}</TmuxSendKeys>

I'll list the directory.
<ExecCommand>{\"command\":\"ls -l\"}</ExecCommand>

Do you want me to overwrite the existing file?
<ChangeState>{\"state\":\"WaitingForUserResponse\"}</ChangeState>

The ping is still running; I'll wait.
<ChangeState>{\"state\":\"ExecPaneSeemsBusy\"}</ChangeState>";

const WATCH_INSTRUCTIONS: &str = "You are in watch mode, passively observing the pane content \
for the user's stated goal. Respond only when you have something genuinely valuable to say \
about what changed; keep it short and informative. Do not send keys, execute commands or \
paste content in watch mode.

If no response is needed, output exactly:
<ChangeState>{\"state\":\"NoComment\"}</ChangeState>";

fn prepared_instructions(shell: &str) -> String {
    format!(
        "Shell command execution capabilities: enabled.

<ExecAndWait>{{\"command\":\"...\"}}</ExecAndWait> - run a command in the exec pane and wait \
for it to finish. The output and exit code are captured and sent back to you in the next \
message, so you can chain commands by sending one, reading its result, then sending the next. \
The command is delivered verbatim to the shell: {shell}

Use <ChangeState>{{\"state\":\"RequestAccomplished\"}}</ChangeState> once you have verified \
the user's request is complete, and \
<ChangeState>{{\"state\":\"WaitingForUserResponse\"}}</ChangeState> whenever you need input, \
confirmation or clarification from the user."
    )
}

fn base(config: &Config) -> String {
    config
        .prompts
        .base_system
        .clone()
        .unwrap_or_else(|| BASE_SYSTEM.to_string())
}

/// The system message for the current mode and pane state.
pub fn assemble_system_prompt(config: &Config, watch_mode: bool, pane: &ExecPane) -> ChatMessage {
    let instructions = if watch_mode {
        config
            .prompts
            .watch
            .clone()
            .unwrap_or_else(|| WATCH_INSTRUCTIONS.to_string())
    } else if pane.is_prepared {
        config
            .prompts
            .chat_assistant_prepared
            .clone()
            .unwrap_or_else(|| prepared_instructions(&pane.shell))
    } else {
        config
            .prompts
            .chat_assistant
            .clone()
            .unwrap_or_else(|| CHAT_INSTRUCTIONS.to_string())
    };

    ChatMessage::assistant(format!("{}\n\n{}", base(config), instructions))
}

/// One sentence pinning command syntax to the pane's shell and OS; empty for
/// sub-shells, where the foreground process is not a shell at all.
pub fn env_hint(pane: &ExecPane) -> String {
    if pane.is_sub_shell || pane.shell.is_empty() {
        return String::new();
    }
    format!(
        "IMPORTANT: exec command syntax must target shell `{}` on OS `{}`.",
        pane.shell, pane.os
    )
}

/// Recent captured executions on a prepared pane, rendered for recall.
pub fn exec_history_block(records: &[CommandExecRecord]) -> String {
    if records.is_empty() {
        return String::new();
    }
    let mut block = String::from("Recent captured executions:");
    for record in records.iter().rev().take(EXEC_HISTORY_WINDOW).rev() {
        block.push_str(&format!(
            "\n$ {}\n{}\n[exit code: {}]",
            record.command,
            record.output.trim_end(),
            record.exit_code
        ));
    }
    block
}

/// The user turn for one iteration: snapshot, environment hint, captured
/// executions (prepared panes only), then the actual message.
pub fn user_turn(
    snapshot_xml: &str,
    pane: &ExecPane,
    exec_history: &[CommandExecRecord],
    message: &str,
) -> ChatMessage {
    let mut parts = vec![snapshot_xml.to_string()];
    let hint = env_hint(pane);
    if !hint.is_empty() {
        parts.push(hint);
    }
    if pane.is_prepared {
        let block = exec_history_block(exec_history);
        if !block.is_empty() {
            parts.push(block);
        }
    }
    parts.push(message.to_string());
    ChatMessage::user(parts.join("\n\n"))
}
