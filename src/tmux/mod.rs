// Multiplexer adapter: everything the core knows about tmux lives behind
// the PaneDriver trait. The snapshot XML schema is opaque to the core; it
// travels verbatim into the prompt.

pub mod client;
pub mod error;

use async_trait::async_trait;

pub use client::TmuxClient;
pub use error::TmuxError;

/// Raw metadata of one pane in the current window.
#[derive(Debug, Clone)]
pub struct PaneDetails {
    pub id: String,
    pub is_active: bool,
    /// Foreground process name as tmux reports it.
    pub current_command: String,
    pub width: u32,
    pub height: u32,
}

impl PaneDetails {
    /// The shells we know how to drive (and, for prepared mode, hook).
    pub fn known_shell(&self) -> Option<&str> {
        match self.current_command.as_str() {
            "bash" | "zsh" | "fish" | "sh" | "dash" | "ksh" => Some(&self.current_command),
            _ => None,
        }
    }
}

/// Driver interface consumed by the executor and the loop.
#[async_trait]
pub trait PaneDriver: Send + Sync {
    /// Deliver `text` to the pane as if typed. With `press_enter` the text is
    /// sent literally followed by an Enter key press; without it the payload
    /// is passed through tmux key-name interpretation so tokens like
    /// `Enter`, `Escape` or `C-c` act as keys.
    async fn send_keys(&self, pane_id: &str, text: &str, press_enter: bool)
        -> Result<(), TmuxError>;

    /// Visible text of one pane.
    async fn capture_pane(&self, pane_id: &str) -> Result<String, TmuxError>;

    /// All panes of the current window.
    async fn list_window_panes(&self) -> Result<Vec<PaneDetails>, TmuxError>;

    /// Pane the process is running in; errors outside tmux.
    async fn current_pane_id(&self) -> Result<String, TmuxError>;

    /// Detached session for bootstrap; returns its first pane id.
    async fn create_session(&self) -> Result<String, TmuxError>;

    /// Split the current window; returns the new pane's id.
    async fn split_window(&self) -> Result<String, TmuxError>;

    /// Attach the controlling terminal; returns when the user detaches.
    async fn attach_session(&self, pane_id: &str) -> Result<(), TmuxError>;

    /// Synchronous run-and-capture; requires a pane prepared with
    /// [`PaneDriver::prepare_pane`]. Returns output and exit code.
    async fn exec_and_capture(&self, pane_id: &str, cmd: &str) -> Result<(String, i32), TmuxError>;

    /// Hook the pane's shell prompt so exec_and_capture can detect command
    /// completion and exit codes.
    async fn prepare_pane(&self, pane_id: &str, shell: &str) -> Result<(), TmuxError>;

    /// XML snapshot of every pane in the window, exec pane flagged.
    async fn capture_window_xml(&self, exec_pane_id: &str) -> Result<String, TmuxError> {
        let panes = self.list_window_panes().await?;
        let mut xml = String::from("<tmux_window>\n");
        for pane in panes {
            let content = self.capture_pane(&pane.id).await?;
            xml.push_str(&format!(
                "<pane id=\"{}\" active=\"{}\" is_exec_pane=\"{}\" command=\"{}\" size=\"{}x{}\">\n{}\n</pane>\n",
                pane.id,
                pane.is_active as u8,
                (pane.id == exec_pane_id) as u8,
                pane.current_command,
                pane.width,
                pane.height,
                content.trim_end(),
            ));
        }
        xml.push_str("</tmux_window>");
        Ok(xml)
    }
}
