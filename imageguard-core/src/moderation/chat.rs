//! Chat transport contract.
//!
//! The transport itself (gateway connection, message delivery) lives outside
//! this crate. These types describe what the moderation code needs from it.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, Result};

/// A file attached to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    /// MIME type as reported by the chat service, if any.
    #[serde(default)]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: Some(content_type.into()),
        }
    }

    /// Whether the reported content type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Identifier of the message this one replies to.
    #[serde(default)]
    pub reply_to: Option<String>,
}

impl ChatMessage {
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        author_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            author_id: author_id.into(),
            content: content.into(),
            attachments: Vec::new(),
            reply_to: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn replying_to(mut self, message_id: impl Into<String>) -> Self {
        self.reply_to = Some(message_id.into());
        self
    }
}

/// Events delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    MessageCreated(ChatMessage),
}

/// Outbound chat primitive, as performed on a [`ChatGateway`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutboundAction {
    DeleteMessage {
        channel_id: String,
        message_id: String,
    },
    SendText {
        channel_id: String,
        text: String,
    },
}

/// Operations the moderation code performs against the chat service.
///
/// Failures are reported as [`GuardError::Gateway`].
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()>;

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<()>;

    /// Look up a message by identifier, used to resolve reply targets.
    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage>;
}

/// Gateway that records every action and serves messages from memory.
///
/// Intended for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    messages: Mutex<HashMap<String, ChatMessage>>,
    actions: Mutex<Vec<OutboundAction>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `message` resolvable through [`ChatGateway::fetch_message`].
    pub fn remember(&self, message: ChatMessage) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message.id.clone(), message);
    }

    pub fn actions(&self) -> Vec<OutboundAction> {
        self.actions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Texts sent, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                OutboundAction::SendText { text, .. } => Some(text),
                OutboundAction::DeleteMessage { .. } => None,
            })
            .collect()
    }

    /// Identifiers of deleted messages, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                OutboundAction::DeleteMessage { message_id, .. } => Some(message_id),
                OutboundAction::SendText { .. } => None,
            })
            .collect()
    }

    fn record(&self, action: OutboundAction) {
        self.actions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(action);
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.record(OutboundAction::DeleteMessage {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<()> {
        self.record(OutboundAction::SendText {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn fetch_message(&self, _channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(message_id)
            .cloned()
            .ok_or_else(|| GuardError::Gateway(format!("Unknown message {message_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attachment_is_image() {
        assert!(Attachment::new("u", "image/png").is_image());
        assert!(!Attachment::new("u", "video/mp4").is_image());
        assert!(!Attachment {
            url: "u".into(),
            content_type: None
        }
        .is_image());
    }

    #[test]
    fn test_event_wire_format() {
        let event: ChatEvent = serde_json::from_value(json!({
            "type": "message_created",
            "id": "2",
            "channel_id": "c",
            "author_id": "u",
            "content": "!blockimage",
            "reply_to": "1"
        }))
        .unwrap();
        let ChatEvent::MessageCreated(message) = event;
        assert_eq!(message.reply_to.as_deref(), Some("1"));
        assert!(message.attachments.is_empty());
    }

    #[test]
    fn test_action_wire_format() {
        let action = OutboundAction::SendText {
            channel_id: "c".into(),
            text: "hi".into(),
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"action": "send_text", "channel_id": "c", "text": "hi"})
        );
    }

    #[tokio::test]
    async fn test_recording_gateway() {
        let gateway = RecordingGateway::new();
        gateway.remember(ChatMessage::new("1", "c", "u", "hello"));

        assert_eq!(gateway.fetch_message("c", "1").await.unwrap().content, "hello");
        assert!(matches!(
            gateway.fetch_message("c", "9").await,
            Err(GuardError::Gateway(_))
        ));

        gateway.delete_message("c", "1").await.unwrap();
        gateway.send_text("c", "bye").await.unwrap();
        assert_eq!(gateway.deleted(), vec!["1".to_string()]);
        assert_eq!(gateway.sent_texts(), vec!["bye".to_string()]);
    }
}
