// Response parser: free-form completion text -> AgentReply
//
// The model is instructed to emit `<Name>{json}</Name>` action tags inside
// ordinary prose, optionally wrapped in a <tool_code> envelope and/or
// triple-backtick fences. Parsing is total: malformed input degrades to an
// empty reply and the guideline check decides what to do about it.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use super::types::{ActionStep, AgentReply, TerminalState};

fn tool_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)(?:`{3}(?:xml)?\s*)?<tool_code>(.*?)</tool_code>(?:\s*`)?(?:`{2})?")
            .unwrap()
    })
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A leading fence attached to the tag is absorbed into the match so it
    // never leaks into the surrounding prose.
    RE.get_or_init(|| Regex::new(r"(?s)(?:`{3}(?:xml)?\s*)?<(\w+)>").unwrap())
}

/// Strip one level of <tool_code> envelope. Idempotent: input without the
/// envelope is returned unchanged.
pub fn strip_tool_code(input: &str) -> String {
    let trimmed = input.trim();
    if !tool_code_re().is_match(trimmed) {
        return input.to_string();
    }
    tool_code_re().replace_all(trimmed, "$1").into_owned()
}

struct TagMatch<'a> {
    /// Byte offset where the tag (including an attached fence) begins.
    start: usize,
    /// Byte offset just past the closing tag and any trailing fence.
    end: usize,
    name: &'a str,
    payload: &'a str,
}

/// Find the next well-shaped tag at or after `from`: `<Name>` with a matching
/// `</Name>` enclosing a `{...}` slice. Anything else stays prose.
fn find_next_tag(response: &str, from: usize) -> Option<TagMatch<'_>> {
    let mut cursor = from;
    while cursor < response.len() {
        let caps = open_tag_re().captures_at(response, cursor)?;
        let open = caps.get(0).unwrap();
        let name = caps.get(1).unwrap().as_str();
        let payload_start = open.end();

        let closing = format!("</{}>", name);
        if let Some(rel) = response[payload_start..].find(&closing) {
            let payload = &response[payload_start..payload_start + rel];
            let trimmed = payload.trim();
            if trimmed.starts_with('{') && trimmed.ends_with('}') {
                let close_end = payload_start + rel + closing.len();
                return Some(TagMatch {
                    start: open.start(),
                    end: close_end + trailing_fence_len(&response[close_end..]),
                    name,
                    payload: trimmed,
                });
            }
        }

        // Not a tag after all; resume the scan past this opening bracket.
        cursor = open.start() + 1;
    }
    None
}

/// Length of an optional `\s*` + backtick fence remnant directly after a
/// closing tag (one backtick, optionally followed by two more).
fn trailing_fence_len(rest: &str) -> usize {
    let ws: usize = rest
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(|c| c.len_utf8())
        .sum();
    let after = &rest[ws..];
    if after.starts_with("```") {
        ws + 3
    } else if after.starts_with('`') {
        ws + 1
    } else {
        0
    }
}

/// Trim fence markers left at the edges of a prose segment that abuts a tag.
fn trim_fences(text: &str) -> &str {
    let t = text.trim();
    let t = t
        .strip_prefix("```xml")
        .or_else(|| t.strip_prefix("```"))
        .or_else(|| t.strip_prefix("`"))
        .unwrap_or(t);
    let t = t
        .strip_suffix("```")
        .or_else(|| t.strip_suffix("`"))
        .unwrap_or(t);
    t.trim()
}

fn push_prose(reply: &mut AgentReply, text: &str, abuts_tag: bool) {
    let text = if abuts_tag { trim_fences(text) } else { text.trim() };
    if !text.is_empty() {
        reply.sequence.push(ActionStep::Message(text.to_string()));
    }
}

/// Extract a required string field from a tag's JSON payload.
fn payload_field<'a>(args: &'a Value, field: &str) -> Option<&'a str> {
    args.get(field).and_then(Value::as_str)
}

/// Parse one completion into an ordered action sequence plus an optional
/// terminal state. Never fails; see the module docs for the degradation
/// rules.
pub fn parse_reply(input: &str) -> AgentReply {
    let response = strip_tool_code(input);
    let mut reply = AgentReply::default();
    let mut cursor = 0usize;

    while cursor < response.len() {
        let Some(tag) = find_next_tag(&response, cursor) else {
            push_prose(&mut reply, &response[cursor..], false);
            break;
        };

        push_prose(&mut reply, &response[cursor..tag.start], true);
        cursor = tag.end;

        let args: Value = match serde_json::from_str(tag.payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(tag = tag.name, error = %e, "dropping tag with malformed JSON payload");
                continue;
            }
        };

        match tag.name {
            "TmuxSendKeys" => {
                if let Some(keys) = payload_field(&args, "keys") {
                    reply.sequence.push(ActionStep::SendKeys(keys.to_string()));
                }
            }
            "ExecCommand" => {
                if let Some(cmd) = payload_field(&args, "command") {
                    reply.sequence.push(ActionStep::ExecCommand(cmd.to_string()));
                }
            }
            "PasteMultilineContent" => {
                if let Some(content) = payload_field(&args, "content") {
                    reply
                        .sequence
                        .push(ActionStep::PasteMultiline(content.to_string()));
                }
            }
            "ExecAndWait" => {
                if let Some(cmd) = payload_field(&args, "command") {
                    reply.sequence.push(ActionStep::ExecAndWait(cmd.to_string()));
                }
            }
            "ChangeState" => {
                if let Some(state) = payload_field(&args, "state") {
                    if let Some(parsed) = TerminalState::from_tag(state) {
                        reply.state = Some(parsed);
                    } else {
                        warn!(state = state, "dropping ChangeState with unknown state value");
                    }
                }
            }
            other => {
                warn!(tag = other, "skipping unknown action tag");
            }
        }
    }

    reply
}

/// Render a structured reply back into tag text. Inverse of `parse_reply`
/// on prose-free replies; Message steps are emitted as bare prose and do
/// not round-trip their surrounding whitespace.
pub fn unparse(reply: &AgentReply) -> String {
    let mut out = String::new();
    for step in &reply.sequence {
        match step {
            ActionStep::Message(text) => out.push_str(text),
            ActionStep::SendKeys(keys) => out.push_str(&format!(
                "<TmuxSendKeys>{}</TmuxSendKeys>",
                serde_json::json!({ "keys": keys })
            )),
            ActionStep::ExecCommand(cmd) => out.push_str(&format!(
                "<ExecCommand>{}</ExecCommand>",
                serde_json::json!({ "command": cmd })
            )),
            ActionStep::PasteMultiline(content) => out.push_str(&format!(
                "<PasteMultilineContent>{}</PasteMultilineContent>",
                serde_json::json!({ "content": content })
            )),
            ActionStep::ExecAndWait(cmd) => out.push_str(&format!(
                "<ExecAndWait>{}</ExecAndWait>",
                serde_json::json!({ "command": cmd })
            )),
        }
    }
    if let Some(state) = reply.state {
        out.push_str(&format!(
            "<ChangeState>{}</ChangeState>",
            serde_json::json!({ "state": state.as_tag() })
        ));
    }
    out
}
