//! Vision/language model client abstraction.
//!
//! Conversation history is an explicit value passed into and returned
//! from calls — the client itself is stateless, so repeated or
//! interleaved tasks stay reproducible.

pub mod openai;
pub mod parse;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// System prompt for the step-by-step action protocol. The executor's
/// command grammar (`executor::Command`) is the counterpart of the format
/// described here.
pub(crate) const NEXT_ACTION_SYSTEM_PROMPT: &str = "\
You are a web automation assistant. The page's interactive elements are \
tagged in the screenshot and listed as text:
- [#ID]: text input
- [@ID]: hyperlink
- [$ID]: button or other interactive element

Given the user's instruction, respond with exactly ONE action command:
- CLICK [ID] — click the element
- TYPE [ID] \"text\" — type into the input
- SCROLL UP or SCROLL DOWN — scroll the page
- GOTO \"url\" — navigate to a URL
- WAIT seconds — wait (e.g. WAIT 5)
- PAUSE — suspend for manual intervention (captcha, QR login, 2FA)
- DONE — the task is complete

Rules:
1. Output a single command and nothing else.
2. Use PAUSE when the page requires human verification.
3. Use WAIT while the page is still loading.
4. Output DONE once the instruction is satisfied.";

/// One chat message. `content` is either a plain string or an array of
/// text/image parts, matching the wire format.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

/// Per-task conversation history, owned by the caller.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: Value) {
        self.messages.push(ChatMessage {
            role: "user".to_string(),
            content,
        });
    }

    pub fn push_assistant(&mut self, text: &str) {
        self.messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: Value::String(text.to_string()),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A vision-capable language model.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// One-shot vision analysis of a screenshot against a prompt.
    async fn vision(&self, screenshot: &[u8], prompt: &str) -> Result<String>;

    /// Ask for the next action command given the full page state. The
    /// exchange is appended to `conversation`.
    async fn next_action(
        &self,
        conversation: &mut Conversation,
        screenshot: &[u8],
        page_text: &str,
        instruction: &str,
        current_url: &str,
    ) -> Result<String>;

    /// Plain text completion.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_accumulates_in_order() {
        let mut conversation = Conversation::new();
        conversation.push_user(Value::String("hello".into()));
        conversation.push_assistant("CLICK [1]");

        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].role, "user");
        assert_eq!(conversation.messages()[1].role, "assistant");

        conversation.clear();
        assert!(conversation.is_empty());
    }
}
