// Production PaneDriver driving the tmux binary

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::error::TmuxError;
use super::{PaneDetails, PaneDriver};

/// Prompt marker injected into prepared panes; the `%d` slot carries the
/// exit code of the last foreground command.
const DONE_MARKER_PREFIX: &str = "[muxmate-done:";

/// How long exec_and_capture waits for the marker before giving up.
const EXEC_WAIT_TIMEOUT_SECS: u64 = 120;
const EXEC_POLL_INTERVAL_MS: u64 = 500;

fn marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[muxmate-done:(-?\d+)\]").unwrap())
}

pub struct TmuxClient {
    tmux_path: String,
}

impl TmuxClient {
    pub fn new() -> Self {
        Self {
            tmux_path: "tmux".to_string(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let output = Command::new(&self.tmux_path).args(args).output().await?;
        if !output.status.success() {
            return Err(TmuxError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn count_markers(content: &str) -> usize {
        marker_re().find_iter(content).count()
    }

    /// Pull the output slice and exit code that belong to `cmd` out of a
    /// pane capture whose last marker is the freshly printed one.
    fn extract_result(content: &str, cmd: &str) -> Result<(String, i32), TmuxError> {
        let lines: Vec<&str> = content.lines().collect();
        let marker_idx = lines
            .iter()
            .rposition(|line| marker_re().is_match(line))
            .ok_or_else(|| TmuxError::ParseFailed("completion marker vanished".to_string()))?;

        let exit_code = marker_re()
            .captures(lines[marker_idx])
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or_else(|| TmuxError::ParseFailed("unreadable exit code in marker".to_string()))?;

        // Output spans from just below the echoed command up to the marker.
        // If the echo scrolled out of the visible region, fall back to the
        // previous marker as the upper bound.
        let start = lines[..marker_idx]
            .iter()
            .rposition(|line| line.contains(cmd) || marker_re().is_match(line))
            .map(|i| i + 1)
            .unwrap_or(0);

        let output = lines[start..marker_idx].join("\n");
        Ok((output, exit_code))
    }
}

impl Default for TmuxClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaneDriver for TmuxClient {
    async fn send_keys(
        &self,
        pane_id: &str,
        text: &str,
        press_enter: bool,
    ) -> Result<(), TmuxError> {
        if press_enter {
            // Literal payload first, then a real Enter key press.
            self.run(&["send-keys", "-t", pane_id, "-l", "--", text])
                .await?;
            self.run(&["send-keys", "-t", pane_id, "Enter"]).await?;
        } else {
            // No -l: tmux interprets key names (Enter, Escape, C-c, ...).
            self.run(&["send-keys", "-t", pane_id, "--", text]).await?;
        }
        debug!(pane = pane_id, press_enter, chars = text.len(), "sent keys");
        Ok(())
    }

    async fn capture_pane(&self, pane_id: &str) -> Result<String, TmuxError> {
        self.run(&["capture-pane", "-p", "-t", pane_id]).await
    }

    async fn list_window_panes(&self) -> Result<Vec<PaneDetails>, TmuxError> {
        let out = self
            .run(&[
                "list-panes",
                "-F",
                "#{pane_id}|#{pane_active}|#{pane_current_command}|#{pane_width}|#{pane_height}",
            ])
            .await?;

        let mut panes = Vec::new();
        for line in out.lines() {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 5 {
                warn!(line = line, "skipping unparseable pane line");
                continue;
            }
            panes.push(PaneDetails {
                id: parts[0].to_string(),
                is_active: parts[1] == "1",
                current_command: parts[2].to_string(),
                width: parts[3].parse().unwrap_or(0),
                height: parts[4].parse().unwrap_or(0),
            });
        }
        if panes.is_empty() {
            return Err(TmuxError::ParseFailed("no panes in current window".to_string()));
        }
        Ok(panes)
    }

    async fn current_pane_id(&self) -> Result<String, TmuxError> {
        if std::env::var("TMUX").is_err() {
            return Err(TmuxError::NotInTmux);
        }
        let out = self.run(&["display-message", "-p", "#{pane_id}"]).await?;
        Ok(out.trim().to_string())
    }

    async fn create_session(&self) -> Result<String, TmuxError> {
        let out = self
            .run(&["new-session", "-d", "-P", "-F", "#{pane_id}"])
            .await?;
        let pane_id = out.trim().to_string();
        info!(pane = %pane_id, "created detached session");
        Ok(pane_id)
    }

    async fn split_window(&self) -> Result<String, TmuxError> {
        let out = self
            .run(&["split-window", "-d", "-P", "-F", "#{pane_id}"])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn attach_session(&self, pane_id: &str) -> Result<(), TmuxError> {
        let status = Command::new(&self.tmux_path)
            .args(["attach-session", "-t", pane_id])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await?;
        if !status.success() {
            return Err(TmuxError::CommandFailed {
                command: "attach-session".to_string(),
                stderr: format!("exit status {}", status.code().unwrap_or(-1)),
            });
        }
        Ok(())
    }

    async fn exec_and_capture(&self, pane_id: &str, cmd: &str) -> Result<(String, i32), TmuxError> {
        let before = self.capture_pane(pane_id).await?;
        let markers_before = Self::count_markers(&before);

        self.send_keys(pane_id, cmd, true).await?;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(EXEC_WAIT_TIMEOUT_SECS);
        loop {
            tokio::time::sleep(Duration::from_millis(EXEC_POLL_INTERVAL_MS)).await;

            let content = self.capture_pane(pane_id).await?;
            if Self::count_markers(&content) > markers_before {
                let (output, exit_code) = Self::extract_result(&content, cmd)?;
                info!(pane = pane_id, exit_code, output_bytes = output.len(), "captured exec result");
                return Ok((output, exit_code));
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(TmuxError::Timeout(EXEC_WAIT_TIMEOUT_SECS));
            }
        }
    }

    async fn prepare_pane(&self, pane_id: &str, shell: &str) -> Result<(), TmuxError> {
        let hook = match shell {
            "bash" => format!(
                "export PROMPT_COMMAND='echo \"{}$?]\"'",
                DONE_MARKER_PREFIX
            ),
            "zsh" => format!("precmd() {{ echo \"{}$?]\" }}", DONE_MARKER_PREFIX),
            "fish" => format!(
                "function muxmate_done --on-event fish_prompt; echo \"{}$status]\"; end",
                DONE_MARKER_PREFIX
            ),
            other => return Err(TmuxError::UnsupportedShell(other.to_string())),
        };

        self.send_keys(pane_id, &hook, true).await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!(pane = pane_id, shell, "pane prepared for captured execution");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_output_and_exit_code() {
        let content = "\
$ echo hello\n\
hello\n\
[muxmate-done:0]\n\
$";
        let (output, code) = TmuxClient::extract_result(content, "echo hello").unwrap();
        assert_eq!(output, "hello");
        assert_eq!(code, 0);
    }

    #[test]
    fn extracts_nonzero_exit_code() {
        let content = "\
[muxmate-done:0]\n\
$ false\n\
[muxmate-done:1]\n\
$";
        let (output, code) = TmuxClient::extract_result(content, "false").unwrap();
        assert_eq!(output, "");
        assert_eq!(code, 1);
    }

    #[test]
    fn falls_back_to_previous_marker_when_echo_scrolled_out() {
        let content = "\
[muxmate-done:0]\n\
line one\n\
line two\n\
[muxmate-done:3]\n\
$";
        let (output, code) = TmuxClient::extract_result(content, "some-long-gone-cmd").unwrap();
        assert_eq!(output, "line one\nline two");
        assert_eq!(code, 3);
    }

    #[test]
    fn marker_counting() {
        assert_eq!(TmuxClient::count_markers("no markers here"), 0);
        assert_eq!(
            TmuxClient::count_markers("[muxmate-done:0]\nx\n[muxmate-done:127]"),
            2
        );
    }
}
