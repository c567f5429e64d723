//! JSON-lines chat bridge.
//!
//! Inbound [`ChatEvent`]s are read one per line by the `run` command.
//! Outbound actions are written here as one [`OutboundAction`] JSON object
//! per line, for a transport adapter on the other side of the pipe.

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use dashmap::DashMap;
use imageguard_core::{ChatGateway, ChatMessage, GuardError, OutboundAction, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Gateway writing actions as JSON lines to `W`.
///
/// Reply targets are resolved from a bounded cache of recently seen
/// messages; older messages cannot be curated.
pub struct JsonLinesGateway<W> {
    writer: Mutex<W>,
    recent: DashMap<String, ChatMessage>,
    order: StdMutex<VecDeque<String>>,
    capacity: usize,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesGateway<W> {
    pub fn new(writer: W, capacity: usize) -> Self {
        Self {
            writer: Mutex::new(writer),
            recent: DashMap::new(),
            order: StdMutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Record `message` as a possible reply target, evicting the oldest
    /// entry once the cache is full.
    pub fn remember(&self, message: &ChatMessage) {
        let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        if self
            .recent
            .insert(message.id.clone(), message.clone())
            .is_none()
        {
            order.push_back(message.id.clone());
        }
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.recent.remove(&evicted);
            }
        }
    }

    #[cfg(test)]
    fn recent_len(&self) -> usize {
        self.recent.len()
    }

    #[cfg(test)]
    fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    async fn emit(&self, action: OutboundAction) -> Result<()> {
        let mut line = serde_json::to_vec(&action)
            .map_err(|e| GuardError::Gateway(format!("Failed to encode action: {e}")))?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| GuardError::Gateway(format!("Failed to write action: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| GuardError::Gateway(format!("Failed to flush action: {e}")))?;
        debug!(?action, "Emitted action");
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> ChatGateway for JsonLinesGateway<W> {
    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.emit(OutboundAction::DeleteMessage {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        })
        .await
    }

    async fn send_text(&self, channel_id: &str, text: &str) -> Result<()> {
        self.emit(OutboundAction::SendText {
            channel_id: channel_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<ChatMessage> {
        self.recent
            .get(message_id)
            .filter(|message| message.channel_id == channel_id)
            .map(|message| message.clone())
            .ok_or_else(|| {
                GuardError::Gateway(format!("Message {message_id} not in recent history"))
            })
    }
}
