// ── Bus publisher ──
//
// Uniform outbound envelope and the publishing seam. The concrete bus
// client sits behind `Publisher`; `ChannelPublisher` hands envelopes to
// whatever drains its channel.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl QoS {
    pub fn level(self) -> u8 {
        match self {
            Self::AtMostOnce => 0,
            Self::AtLeastOnce => 1,
            Self::ExactlyOnce => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub retain: bool,
    pub qos: QoS,
}

impl PublishOptions {
    pub const RETAINED: Self = Self {
        retain: true,
        qos: QoS::AtMostOnce,
    };
}

/// Serialized JSON body of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(String);

impl Payload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: Payload,
    pub options: PublishOptions,
}

impl Outbound {
    pub fn json<T: Serialize + ?Sized>(
        topic: impl Into<String>,
        body: &T,
        options: PublishOptions,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic.into(),
            payload: Payload(serde_json::to_string(body)?),
            options,
        })
    }
}

/// `{"type": .., "message": ..}` envelope carried on the bridge log topic.
#[derive(Debug, Serialize)]
pub struct LogEvent<'a, M: Serialize> {
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub message: M,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Bus connection closed")]
    Closed,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Invoked exactly once when delivery is acknowledged or has failed.
pub type DeliveryCallback = Box<dyn FnOnce(Result<(), BusError>) + Send>;

/// A callback that only logs failed deliveries.
pub fn log_delivery_failure(topic: &str) -> DeliveryCallback {
    let topic = topic.to_owned();
    Box::new(move |result| {
        if let Err(e) = result {
            tracing::warn!(%topic, error = %e, "publish not delivered");
        }
    })
}

/// Outbound side of the message bus. Must not block.
pub trait Publisher: Send + Sync {
    fn publish(&self, message: Outbound, on_delivery: DeliveryCallback);
}

/// Publishes by forwarding envelopes into an unbounded channel. Delivery
/// is acknowledged once the envelope is queued.
#[derive(Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, message: Outbound, on_delivery: DeliveryCallback) {
        let result = self.tx.send(message).map_err(|_| BusError::Closed);
        on_delivery(result);
    }
}
