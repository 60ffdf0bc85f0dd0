//! Message types for LLM communication

use serde::{Deserialize, Serialize};

/// Role of the message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (instructions)
    System,
    /// User message
    User,
    /// Assistant (AI) message
    Assistant,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    pub role: Role,
    /// Text content
    pub content: String,
    /// Optional author name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Set the name for this message
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Get the text content of this message
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// Ordered conversation history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history seeded with a system prompt
    pub fn with_system(prompt: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.push(Message::system(prompt));
        history
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages appended after the history had `len` entries
    pub fn since(&self, len: usize) -> &[Message] {
        &self.messages[len.min(self.messages.len())..]
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Consume into the message list
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

impl From<Vec<Message>> for ChatHistory {
    fn from(messages: Vec<Message>) -> Self {
        Self { messages }
    }
}

impl FromIterator<Message> for ChatHistory {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "Hello");
        assert_eq!(Message::system("x").role.as_str(), "system");
    }

    #[test]
    fn test_history_since() {
        let mut history = ChatHistory::with_system("Answer with a quote.");
        history.push_user("What is the meaning of life?");
        history.push_assistant("Forty-two");
        let before = history.len();

        history.push_user("In what book can I find this quote?");
        history.push_assistant("The Hitchhiker's Guide to the Galaxy");

        let added = history.since(before);
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].role, Role::User);
        assert_eq!(history.since(100).len(), 0);
        assert_eq!(history.last().map(Message::text), Some("The Hitchhiker's Guide to the Galaxy"));
    }

    #[test]
    fn test_history_serializes_as_list() {
        let history: ChatHistory = vec![Message::user("hi")].into();
        let json = serde_json::to_value(&history).expect("serialize");
        assert_eq!(json[0]["role"], "user");
        assert_eq!(json[0]["content"], "hi");
    }
}
