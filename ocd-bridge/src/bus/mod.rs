//! Publish/subscribe message bus.
//!
//! The drivers only talk to each other through a [`Bus`]. Commands are sent to
//! `<interface>/cmds/<command>` and state is published as attributes on
//! `<interface>/atts/<attribute>`, usually retained so a late subscriber sees
//! the last known value without having to ask for it.

mod local;
mod topic;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::bytes::Bytes;

pub use local::LocalBus;
pub use topic::{Interface, TopicFilter};

/// A single message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Bytes,
    /// Retained messages are kept by the bus and replayed to every new
    /// subscriber whose filter matches.
    pub retain: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    pub fn retained(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            retain: true,
            ..Self::new(topic, payload)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, docsplay::Display)]
pub enum BusError {
    /// Invalid topic `{0}`
    InvalidTopic(String),
    /// Invalid subscription filter `{0}`
    InvalidFilter(String),
    /// The bus has been shut down
    Closed,
}

/// A publish/subscribe transport.
///
/// Publishing never blocks: the message is queued for every matching
/// subscriber and the call returns.
pub trait Bus: Clone + Send + Sync + 'static {
    fn publish(&self, message: Message) -> Result<(), BusError>;

    fn subscribe(&self, filter: &str) -> Result<Subscription, BusError>;
}

/// The receiving end of a subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    filter: TopicFilter,
    receiver: UnboundedReceiver<Message>,
}

impl Subscription {
    pub(crate) fn new(filter: TopicFilter, receiver: UnboundedReceiver<Message>) -> Self {
        Self { filter, receiver }
    }

    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Waits for the next message. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    /// Returns the next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.receiver.try_recv().ok()
    }
}
