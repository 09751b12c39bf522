use crate::sessions::Message;

/// Number of prior messages folded into an inquiry.
pub const MAX_HISTORY_TURNS: usize = 6;

/// Fold the recent conversation and the new message into the text sent to the model.
///
/// With no history the message is returned unchanged. Otherwise the last
/// [`MAX_HISTORY_TURNS`] messages are listed as `User:`/`Assistant:` lines,
/// followed by the new message as a final `User:` line and again under a
/// "Current inquiry" footer. Message length is never truncated.
pub fn build_inquiry(message: &str, history: &[Message]) -> String {
    if history.is_empty() {
        return message.to_string();
    }

    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    let mut lines: Vec<String> = history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role.speaker(), m.content))
        .collect();
    lines.push(format!("User: {message}"));

    format!(
        "Conversation history:\n{}\n\nCurrent inquiry:\n{message}",
        lines.join("\n")
    )
}
