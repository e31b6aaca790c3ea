use async_nats::Client;
use model::snapshot::{RemovalFrame as ModelRemovalFrame, SnapshotFrame};
use prost::Message as _;

use crate::frame::{RemovalFrame, UpdateFrame};

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("failed to connect to NATS: {0}")]
    Connect(#[from] async_nats::ConnectError),
    #[error("failed to publish: {0}")]
    Publish(#[from] async_nats::PublishError),
    #[error("failed to subscribe: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
}

/// Subject-based publish/subscribe over binary frames (spec §4.2). Delivery
/// is at-least-once within one process, best-effort across processes;
/// consumers are expected to be idempotent (snapshot `set`/`update_local`
/// already are).
#[derive(Clone)]
pub struct EventBus {
    client: Client,
}

impl EventBus {
    pub async fn connect(url: &str) -> Result<Self, EventBusError> {
        let client = async_nats::connect(url).await?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Publishes a snapshot's current state. The cache's `set` does not
    /// publish itself (spec §4.1) -- the producer always calls this right
    /// after `set`.
    pub async fn publish_update(
        &self,
        subject: String,
        frame: &SnapshotFrame,
    ) -> Result<(), EventBusError> {
        let encoded = UpdateFrame::from(frame).encode_to_vec();
        self.client.publish(subject, encoded.into()).await?;
        Ok(())
    }

    pub async fn publish_removal(
        &self,
        subject: String,
        frame: &ModelRemovalFrame,
    ) -> Result<(), EventBusError> {
        let encoded = RemovalFrame::from(frame).encode_to_vec();
        self.client.publish(subject, encoded.into()).await?;
        Ok(())
    }

    pub async fn subscribe(&self, subject: String) -> Result<async_nats::Subscriber, EventBusError> {
        Ok(self.client.subscribe(subject).await?)
    }
}

/// Decodes a raw NATS payload back into an update frame. Malformed payloads
/// are a bus-integrity bug, not a normal runtime condition, so this returns
/// a plain decode error rather than swallowing it the way upstream HTTP
/// decode failures are (spec §7 draws that distinction implicitly: this
/// isn't "upstream unavailable", it's our own wire format).
pub fn decode_update(bytes: &[u8]) -> Result<UpdateFrame, prost::DecodeError> {
    UpdateFrame::decode(bytes)
}

pub fn decode_removal(bytes: &[u8]) -> Result<RemovalFrame, prost::DecodeError> {
    RemovalFrame::decode(bytes)
}
