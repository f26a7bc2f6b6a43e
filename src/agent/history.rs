// History budgeting and squash
//
// Token counts are estimated with a character heuristic: one token per four
// characters, rounded up, plus a flat per-message overhead for role and
// framing. Accurate within ~10% for BPE tokenizers on English text, which
// is all the squash threshold needs.

use tracing::info;

use crate::llm::{CompletionClient, LlmError, WireMessage};

use super::types::ChatMessage;

/// Flat per-message cost of role name and wire framing.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

const SQUASH_SYSTEM_PROMPT: &str = "You compress terminal-assistant conversation history. \
Summarize the transcript you are given into one compact brief that preserves: the user's \
goals, commands that were executed and their observable outcomes, current working state, \
and any unresolved questions. Respond with the summary only.";

pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    (text.len() + 3) / 4
}

pub fn estimate_message_tokens(message: &ChatMessage) -> usize {
    MESSAGE_OVERHEAD_TOKENS + estimate_tokens(&message.content)
}

pub fn estimate_history_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

pub fn needs_squash(messages: &[ChatMessage], max_context_tokens: usize) -> bool {
    messages.len() >= 2 && estimate_history_tokens(messages) > max_context_tokens
}

/// Replace the earliest half of the history with a single LLM-written
/// summary, in place. One synchronous transport call, no confirmation.
/// The system prompt is assembled per request and never stored here, so
/// it is untouched by construction.
pub async fn squash(
    messages: &mut Vec<ChatMessage>,
    llm: &dyn CompletionClient,
    model: &str,
) -> Result<(), LlmError> {
    let half = messages.len() / 2;
    if half == 0 {
        return Ok(());
    }

    let transcript = messages[..half]
        .iter()
        .map(|m| {
            let role = if m.from_user { "user" } else { "assistant" };
            format!("[{}] {}", role, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let before_tokens = estimate_history_tokens(messages);
    let sending = [
        WireMessage::system(SQUASH_SYSTEM_PROMPT),
        WireMessage::user(transcript),
    ];
    let summary = llm.complete(&sending, model).await?;

    let summary_message = ChatMessage::assistant(format!(
        "Summary of the earlier conversation:\n{}",
        summary.trim()
    ));
    messages.splice(..half, [summary_message]);

    info!(
        squashed_turns = half,
        tokens_before = before_tokens,
        tokens_after = estimate_history_tokens(messages),
        "history squashed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct CannedSummary;

    #[async_trait]
    impl CompletionClient for CannedSummary {
        async fn complete(&self, _: &[WireMessage], _: &str) -> Result<String, LlmError> {
            Ok("user built a widget; tests pass".to_string())
        }
    }

    #[test]
    fn empty_string_is_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_chars_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_chars_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = ChatMessage::user("test");
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn squash_triggers_only_above_threshold() {
        let messages = vec![
            ChatMessage::user("a".repeat(100)),
            ChatMessage::assistant("b".repeat(100)),
        ];
        // 2 * (25 + 4) = 58 estimated tokens
        assert!(!needs_squash(&messages, 58));
        assert!(needs_squash(&messages, 57));
    }

    #[test]
    fn single_message_never_squashes() {
        let messages = vec![ChatMessage::user("x".repeat(10_000))];
        assert!(!needs_squash(&messages, 10));
    }

    #[tokio::test]
    async fn squash_replaces_earliest_half_with_summary() {
        let mut messages = vec![
            ChatMessage::user("first request"),
            ChatMessage::assistant("first reply"),
            ChatMessage::user("second request"),
            ChatMessage::assistant("second reply"),
        ];

        squash(&mut messages, &CannedSummary, "test-model")
            .await
            .unwrap();

        assert_eq!(messages.len(), 3);
        assert!(!messages[0].from_user);
        assert!(messages[0].content.contains("widget"));
        assert_eq!(messages[1].content, "second request");
        assert_eq!(messages[2].content, "second reply");
    }

    #[tokio::test]
    async fn squash_on_tiny_history_is_a_noop() {
        let mut messages = vec![ChatMessage::user("only turn")];
        squash(&mut messages, &CannedSummary, "test-model")
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "only turn");
    }
}
