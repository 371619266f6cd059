//! Compile-time configuration for the tech support chatbot.
//!
//! Everything here is a constant: there are no CLI flags, environment
//! variables, or config files. Edit and rebuild to change behavior.

/// Display name shown in the header and sidebar.
pub const CHATBOT_NAME: &str = "TinyLlama Tech Support";

/// Avatar glyphs prefixed to chat messages.
pub const CHATBOT_AVATAR: &str = "🤖";
pub const USER_AVATAR: &str = "👤";

/// Configured model identifier.
pub const MODEL_NAME: &str = "tinyllama:latest";

/// Model identifier pinned after a successful startup probe finds a
/// TinyLlama-family tag. See `resolve_model` in main.rs.
pub const PINNED_MODEL: &str = "tinyllama:latest";

/// Base URL of the local Ollama server.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// System instruction sent as the first message of every chat request.
pub const SYSTEM_PROMPT: &str = "You are a helpful tech support assistant.";

/// Single-prompt template used on the generate-API fallback path.
/// Contains exactly one `{question}` placeholder.
pub const TECH_SUPPORT_PROMPT: &str = "\
You are a helpful tech support assistant powered by TinyLlama.
You specialize in providing clear, concise solutions to technical problems.
Always be polite, patient, and thorough in your responses.
If you don't know the answer to a question, admit it and suggest where the user might find more information.
Focus on providing step-by-step instructions when helping users troubleshoot issues.

User: {question}
Tech Support:
";

/// Assistant greeting seeded into every new (or cleared) conversation.
pub const INITIAL_MESSAGE: &str =
    "Hello! I'm your TinyLlama tech support assistant. How can I help you today?";

/// Shown inline when both backend calls fail for a turn.
pub const STREAM_FAILED_MESSAGE: &str = "I'm having trouble connecting to the model. \
Please check if Ollama is running with the TinyLlama model loaded.";

/// Placeholder text for the empty input box.
pub const INPUT_PLACEHOLDER: &str = "Ask your tech support question...";

/// Cosmetic delay between streamed chunk renders, in milliseconds.
pub const STREAM_PACING_MS: u64 = 10;

/// Substitute the user's question into the fallback prompt template.
pub fn format_prompt(question: &str) -> String {
    TECH_SUPPORT_PROMPT.replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_prompt_substitutes_question() {
        let prompt = format_prompt("my wifi keeps dropping");
        assert!(prompt.contains("User: my wifi keeps dropping"));
        assert!(!prompt.contains("{question}"));
    }

    #[test]
    fn template_has_single_placeholder() {
        assert_eq!(TECH_SUPPORT_PROMPT.matches("{question}").count(), 1);
    }
}
