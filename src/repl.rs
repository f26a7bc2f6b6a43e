// Interactive REPL: read a line, run one loop invocation, render the
// outcome. Slash commands adjust the session; anything else is a request.

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use tracing::warn;

use crate::agent::{history, ConfirmOutcome, Confirmer, LoopOutcome, Manager, RunStatus};
use crate::config::config_dir;

/// Confirmation prompts over rustyline. For editable prompts the proposed
/// text is pre-filled on the line; the user edits it in place and the edited
/// text is what executes. An empty line or Ctrl-C declines.
pub struct ReplConfirmer;

impl Confirmer for ReplConfirmer {
    fn confirm(&self, question: &str, content: &str, editable: bool) -> ConfirmOutcome {
        let mut rl: Editor<(), FileHistory> = match Editor::new() {
            Ok(editor) => editor,
            Err(e) => {
                warn!(error = %e, "no editor for confirmation, declining");
                return ConfirmOutcome::Declined;
            }
        };

        if editable {
            println!("{} (edit the line, Enter to accept, empty or Ctrl-C to cancel)", question);
            match rl.readline_with_initial("> ", (content, "")) {
                Ok(line) if !line.trim().is_empty() => ConfirmOutcome::Accepted(line),
                _ => ConfirmOutcome::Declined,
            }
        } else {
            println!("{}\n{}", question, content);
            match rl.readline("[y/N] ") {
                Ok(answer) if matches!(answer.trim(), "y" | "Y" | "yes") => {
                    ConfirmOutcome::Accepted(content.to_string())
                }
                _ => ConfirmOutcome::Declined,
            }
        }
    }
}

fn prompt_string(manager: &Manager, last_done: bool) -> String {
    let symbol = if manager.watch_mode {
        "∞"
    } else {
        match manager.status.get() {
            RunStatus::Running => "▶",
            RunStatus::Waiting => "?",
            RunStatus::Idle if last_done => "✓",
            RunStatus::Idle => "",
        }
    };
    if symbol.is_empty() {
        "muxmate » ".to_string()
    } else {
        format!("muxmate [{}] » ", symbol)
    }
}

fn render_outcome(manager: &Manager, outcome: LoopOutcome) -> bool {
    match outcome {
        LoopOutcome::Done => true,
        LoopOutcome::AwaitingUser => false,
        LoopOutcome::Cancelled => {
            manager.say("Request cancelled.");
            false
        }
        LoopOutcome::GuidelinesExhausted(complaint) => {
            manager.say(&format!(
                "Giving up after repeated guideline violations: {}",
                complaint
            ));
            false
        }
    }
}

async fn run_request(manager: &mut Manager, message: &str) -> bool {
    match manager.run_request(message).await {
        Ok(outcome) => render_outcome(manager, outcome),
        Err(e) => {
            manager.say(&format!("Error: {}", e));
            false
        }
    }
}

async fn handle_command(manager: &mut Manager, line: &str) -> Result<bool> {
    let mut parts = line.splitn(3, ' ');
    let command = parts.next().unwrap_or_default();

    match command {
        "/exit" | "/quit" => return Ok(true),

        "/reset" | "/clear" => {
            manager.reset();
            manager.say("Conversation reset.");
        }

        "/info" => {
            let pane = &manager.exec_pane;
            manager.say(&format!(
                "model: {} | exec pane: {} ({}{}{}) | history: {} turns (~{} tokens) | captured execs: {}",
                manager.model(),
                pane.id,
                if pane.shell.is_empty() { "unknown" } else { pane.shell.as_str() },
                if pane.is_sub_shell { ", sub-shell" } else { "" },
                if pane.is_prepared { ", prepared" } else { "" },
                manager.messages.len(),
                history::estimate_history_tokens(&manager.messages),
                manager.exec_history.len(),
            ));
        }

        "/config" => match (parts.next(), parts.next()) {
            (Some("set"), Some(rest)) => {
                let mut kv = rest.splitn(2, ' ');
                match (kv.next(), kv.next()) {
                    (Some(key), Some(value)) => {
                        manager.overrides.set(key, value);
                        manager.say(&format!("Session override: {} = {}", key, value));
                    }
                    _ => manager.say("Usage: /config set <key> <value>"),
                }
            }
            (None, _) => {
                manager.say(&format!(
                    "wait_interval={} exec_confirm={} send_keys_confirm={} paste_multiline_confirm={} max_context_tokens={} debug={}",
                    manager.wait_interval(),
                    manager.exec_confirm(),
                    manager.send_keys_confirm(),
                    manager.paste_multiline_confirm(),
                    manager.max_context_tokens(),
                    manager.debug_enabled(),
                ));
                if !manager.overrides.is_empty() {
                    for (key, value) in manager.overrides.iter() {
                        manager.say(&format!("  override: {} = {}", key, value));
                    }
                }
            }
            _ => manager.say("Usage: /config set <key> <value>"),
        },

        "/prepare" => match manager.prepare_exec_pane().await {
            Ok(()) => manager.say("Exec pane prepared; captured execution enabled."),
            Err(e) => manager.say(&format!("Prepare failed: {}", e)),
        },

        "/watch" => {
            let goal = line.trim_start_matches("/watch").trim();
            if goal.is_empty() {
                manager.say("Usage: /watch <goal>");
            } else if let Err(e) = manager.run_watch(goal).await {
                manager.say(&format!("Watch mode error: {}", e));
            }
        }

        "/squash" => match manager.squash_now().await {
            Ok(()) => manager.say("History squashed."),
            Err(e) => manager.say(&format!("Squash failed: {}", e)),
        },

        _ => manager.say("Commands: /info /config /prepare /watch /squash /reset /exit"),
    }

    Ok(false)
}

/// One-shot mode: drive a single request to termination. When the assistant
/// ends the dialogue waiting on the user, the session stays alive and drops
/// into the interactive loop instead of exiting mid-question.
pub async fn run_once(mut manager: Manager, message: &str) -> Result<()> {
    match manager.run_request(message).await {
        Ok(LoopOutcome::AwaitingUser) => run(manager).await,
        Ok(outcome) => {
            render_outcome(&manager, outcome);
            Ok(())
        }
        Err(e) => {
            manager.say(&format!("Error: {}", e));
            Ok(())
        }
    }
}

/// The interactive read-eval loop.
pub async fn run(mut manager: Manager) -> Result<()> {
    let mut rl: Editor<(), FileHistory> = Editor::new()?;
    let history_file = config_dir().join("history");
    if history_file.exists() {
        if let Err(e) = rl.load_history(&history_file) {
            warn!(error = %e, "failed to load REPL history");
        }
    }

    println!("muxmate v{}", env!("CARGO_PKG_VERSION"));
    println!("Type a request, /help-style commands start with '/'. Ctrl+D to quit.");

    let mut last_done = false;
    loop {
        match rl.readline(&prompt_string(&manager, last_done)) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if input.starts_with('/') {
                    last_done = false;
                    if handle_command(&mut manager, input).await? {
                        break;
                    }
                } else {
                    last_done = run_request(&mut manager, input).await;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("readline error: {}", e);
                break;
            }
        }
    }

    if let Some(parent) = history_file.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = rl.save_history(&history_file) {
        warn!(error = %e, "failed to save REPL history");
    }

    println!("Goodbye!");
    Ok(())
}
