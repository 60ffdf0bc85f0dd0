//! Prompt templates for answer generation
//!
//! Placeholders are written `{{name}}`. They resolve against the payload of
//! the top search hit, plus `{{query}}` and `{{key}}`. Unknown placeholders
//! render as empty text.

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::store::SearchHit;

const DEFAULT_SYSTEM: &str = "You are an AI agent that searches a collection of markdown articles for answers to questions.
The following article was returned from a vector search. Use the information to generate a response.

Markdown document: {{contents}}
Markdown document path: {{path}}

Include only citations from the article above in your response and provide the document path.";

const DEFAULT_USER: &str = "{{query}}";

/// System + user message template fed with the top search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// System message template
    pub system: String,
    /// User message template
    pub user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            user: DEFAULT_USER.to_string(),
        }
    }
}

impl PromptTemplate {
    /// Create a template from system and user parts
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Render the messages for `query` grounded on `hit`
    pub fn render(&self, query: &str, hit: &SearchHit) -> Vec<Message> {
        let lookup = |name: &str| -> Option<String> {
            match name {
                "query" => Some(query.to_string()),
                "key" => Some(hit.record.key.to_string()),
                field => hit.record.field(field).map(|v| v.to_string()),
            }
        };

        vec![
            Message::system(substitute(&self.system, &lookup)),
            Message::user(substitute(&self.user, &lookup)),
        ]
    }
}

fn substitute(template: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                if let Some(value) = lookup(after[..end].trim()) {
                    out.push_str(&value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // unterminated placeholder, keep verbatim
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
