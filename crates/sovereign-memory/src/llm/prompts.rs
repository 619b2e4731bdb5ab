use super::ChatMessage;

/// Messages of prior conversation kept in a request (three exchanges).
pub const MAX_HISTORY_MESSAGES: usize = 6;

/// System prompt used when retrieved context is available.
///
/// `{rag_context}` is replaced with the formatted retrieval block.
pub const CHAT_SYSTEM_PROMPT: &str = r#"You are Sovereign Shell, a C#/.NET expert assistant running locally on the user's machine. You have deep knowledge of every C# version from 1.0 through 14.0 and the entire .NET ecosystem.

When answering:
- Cite the C# version and .NET version for any feature you mention.
- Show compilable code snippets with necessary using statements.
- When relevant, show how things were done in older versions (migration context).
- Be concise but thorough. Prefer code over prose.
- If retrieved context is provided below, prioritize it over general knowledge.

{rag_context}"#;

/// System prompt used when retrieval produced nothing.
pub const CHAT_SYSTEM_PROMPT_NO_CONTEXT: &str = r#"You are Sovereign Shell, a C#/.NET expert assistant running locally on the user's machine. You have deep knowledge of every C# version from 1.0 through 14.0 and the entire .NET ecosystem.

When answering:
- Cite the C# version and .NET version for any feature you mention.
- Show compilable code snippets with necessary using statements.
- When relevant, show how things were done in older versions (migration context).
- Be concise but thorough. Prefer code over prose."#;

/// Builds the message list for a chat completion.
///
/// Only the last [`MAX_HISTORY_MESSAGES`] history entries are kept.
pub fn build_chat_messages(
    question: &str,
    history: &[ChatMessage],
    rag_context: &str,
) -> Vec<ChatMessage> {
    let system = if rag_context.is_empty() {
        CHAT_SYSTEM_PROMPT_NO_CONTEXT.to_string()
    } else {
        CHAT_SYSTEM_PROMPT.replace("{rag_context}", rag_context)
    };

    let skip = history.len().saturating_sub(MAX_HISTORY_MESSAGES);

    let mut messages = Vec::with_capacity(2 + history.len() - skip);
    messages.push(ChatMessage::system(system));
    messages.extend(history.iter().skip(skip).cloned());
    messages.push(ChatMessage::user(question));
    messages
}
