//! Transient question-and-answer conversation with the completion service.
//!
//! A session only lives in memory. Asking a question appends the question and a pending
//! assistant placeholder, then replaces that placeholder in place once the completion call
//! finishes, with either the formatted answer or a fixed error reply.

use crate::completion::{CompletionClient, Content, Part};
use crate::constants::{CHAT_ERROR_REPLY, CHAT_PENDING_REPLY, NO_INFORMATION_PLACEHOLDER};
use crate::markdown::FormattedResponse;
use crate::retry::HttpTransport;
use crate::{CareError, CareResult};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Formatted(FormattedResponse),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_formatted(reply: FormattedResponse) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: MessageContent::Formatted(reply),
        }
    }

    fn pending() -> Self {
        Self::assistant_text(CHAT_PENDING_REPLY)
    }

    pub fn is_pending(&self) -> bool {
        self.role == ChatRole::Assistant
            && matches!(&self.content, MessageContent::Text(t) if t == CHAT_PENDING_REPLY)
    }

    /// Content as structured plain text.
    ///
    /// An empty formatted reply reads as the "no information" placeholder, the same text
    /// that is displayed for it.
    pub fn plain_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Formatted(reply) if reply.is_empty() => {
                NO_INFORMATION_PLACEHOLDER.to_string()
            }
            MessageContent::Formatted(reply) => reply.to_plain_text(),
        }
    }

    /// Content as HTML for display. Plain text is escaped, line breaks kept.
    pub fn html(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => FormattedResponse::plain(text).to_html(),
            MessageContent::Formatted(reply) => reply.to_html(),
        }
    }

    fn to_turn(&self) -> Content {
        match self.role {
            ChatRole::User => Content::user(vec![Part::text(self.plain_text())]),
            ChatRole::Assistant => Content::model_text(self.plain_text()),
        }
    }
}

/// An in-memory conversation. Messages are kept in append order.
#[derive(Clone, Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a conversation whose earlier messages are held elsewhere, e.g. by a browser.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Ask `question` with the conversation so far as context.
    ///
    /// The question and a pending placeholder are appended before the call is made. On
    /// return the placeholder has been replaced: with the formatted answer on success, or
    /// with a fixed error reply on failure.
    ///
    /// # Arguments
    ///
    /// * `client` - Completion client used for the request.
    /// * `question` - The user's question. Surrounding whitespace is trimmed.
    /// * `cancel` - Optional token that aborts the request.
    ///
    /// # Returns
    ///
    /// The assistant message that replaced the placeholder.
    ///
    /// # Errors
    ///
    /// Returns `CareError::InvalidInput` if `question` is blank, in which case the session is
    /// left untouched. Any error from the completion client is returned after the
    /// placeholder has been replaced by the error reply.
    pub async fn ask<T: HttpTransport>(
        &mut self,
        client: &CompletionClient<T>,
        question: &str,
        cancel: Option<&CancellationToken>,
    ) -> CareResult<&ChatMessage> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CareError::InvalidInput("question cannot be empty".into()));
        }

        let mut turns: Vec<Content> = self.messages.iter().map(ChatMessage::to_turn).collect();
        turns.push(Content::user(vec![Part::text(question)]));

        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::pending());

        let outcome = client.generate(turns, cancel).await;
        let (reply, result) = match outcome {
            Ok(text) => (
                ChatMessage::assistant_formatted(FormattedResponse::from_optional(text.as_deref())),
                Ok(()),
            ),
            Err(e) => {
                tracing::error!("chat question failed: {}", e);
                (ChatMessage::assistant_text(CHAT_ERROR_REPLY), Err(e))
            }
        };

        let index = self.replace_pending(reply);
        result.map(|()| &self.messages[index])
    }

    fn replace_pending(&mut self, reply: ChatMessage) -> usize {
        match self.messages.iter().rposition(ChatMessage::is_pending) {
            Some(index) => {
                self.messages[index] = reply;
                index
            }
            None => {
                self.messages.push(reply);
                self.messages.len() - 1
            }
        }
    }
}
