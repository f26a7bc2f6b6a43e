// Per-iteration transcript dump, enabled by the `debug` config flag

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::config::config_dir;

use super::types::ChatMessage;

/// Write one plain-text file holding the messages sent this iteration
/// (role, timestamp, content) followed by the raw LLM response. Returns the
/// file path for logging.
pub fn dump_transcript(sent: &[ChatMessage], raw_response: &str) -> std::io::Result<PathBuf> {
    let debug_dir = config_dir().join("debug");
    fs::create_dir_all(&debug_dir)?;

    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let path = debug_dir.join(format!("debug-{}.txt", timestamp));
    let mut file = fs::File::create(&path)?;

    writeln!(file, "==================    SENT CHAT MESSAGES ==================\n")?;
    for (i, msg) in sent.iter().enumerate() {
        let role = if i == 0 && !msg.from_user {
            "system"
        } else if msg.from_user {
            "user"
        } else {
            "assistant"
        };
        writeln!(
            file,
            "Message {}: Role={}, Time={}",
            i + 1,
            role,
            msg.timestamp.to_rfc3339()
        )?;
        writeln!(file, "Content:\n{}\n", msg.content)?;
    }

    writeln!(file, "==================    RECEIVED RESPONSE ==================\n")?;
    writeln!(file, "{}", raw_response)?;
    writeln!(file, "\n==================    END DEBUG ==================")?;

    Ok(path)
}
