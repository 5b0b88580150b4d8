use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};

use super::topic::validate_topic;
use super::{Bus, BusError, Message, Subscription, TopicFilter};

/// An in-process broker.
///
/// All drivers of one bridge process share a `LocalBus`; transports (like the
/// stdio transport of the command line tool) inject external traffic into it
/// and forward attribute updates out of it.
#[derive(Debug, Clone, Default)]
pub struct LocalBus {
    broker: Arc<Mutex<Broker>>,
}

#[derive(Debug, Default)]
struct Broker {
    subscribers: Vec<Subscriber>,
    retained: BTreeMap<String, Message>,
}

#[derive(Debug)]
struct Subscriber {
    filter: TopicFilter,
    sender: UnboundedSender<Message>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// The retained message currently stored for `topic`, if any.
    pub fn retained(&self, topic: &str) -> Option<Message> {
        self.broker.lock().retained.get(topic).cloned()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut broker = self.broker.lock();
        broker.subscribers.retain(|s| !s.sender.is_closed());
        broker.subscribers.len()
    }
}

impl Bus for LocalBus {
    fn publish(&self, message: Message) -> Result<(), BusError> {
        validate_topic(&message.topic)?;

        let mut broker = self.broker.lock();

        if message.retain {
            if message.payload.is_empty() {
                broker.retained.remove(&message.topic);
            } else {
                broker
                    .retained
                    .insert(message.topic.clone(), message.clone());
            }
        }

        broker.subscribers.retain(|subscriber| {
            if !subscriber.filter.matches(&message.topic) {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(message.clone()).is_ok()
        });

        Ok(())
    }

    fn subscribe(&self, filter: &str) -> Result<Subscription, BusError> {
        let filter: TopicFilter = filter.parse()?;
        let (sender, receiver) = unbounded_channel();

        let mut broker = self.broker.lock();

        // Replay under the lock so no live message can overtake the retained state.
        for message in broker.retained.values() {
            if filter.matches(&message.topic) {
                // The receiver is still in scope, sending cannot fail.
                let _ = sender.send(message.clone());
            }
        }

        broker.subscribers.push(Subscriber {
            filter: filter.clone(),
            sender,
        });

        tracing::trace!("New subscription on {}", filter.as_str());

        Ok(Subscription::new(filter, receiver))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn delivers_to_matching_subscribers() {
        let bus = LocalBus::new();
        let mut commands = bus.subscribe("itf/cmds/#").unwrap();
        let mut attributes = bus.subscribe("itf/atts/+").unwrap();

        bus.publish(Message::new("itf/cmds/read", "{}")).unwrap();

        assert_eq!(commands.recv().await.unwrap().topic, "itf/cmds/read");
        assert!(attributes.try_recv().is_none());
    }

    #[tokio::test]
    async fn retained_messages_are_replayed() {
        let bus = LocalBus::new();
        bus.publish(Message::retained("itf/atts/map", "first"))
            .unwrap();
        bus.publish(Message::retained("itf/atts/map", "second"))
            .unwrap();
        bus.publish(Message::new("itf/atts/other", "volatile"))
            .unwrap();

        let mut late = bus.subscribe("itf/atts/#").unwrap();

        let replayed = late.recv().await.unwrap();
        assert_eq!(replayed.payload, "second");
        assert!(replayed.retain);
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn empty_retained_payload_clears() {
        let bus = LocalBus::new();
        bus.publish(Message::retained("itf/atts/map", "value"))
            .unwrap();
        bus.publish(Message::retained("itf/atts/map", "")).unwrap();

        assert_eq!(bus.retained("itf/atts/map"), None);
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let bus = LocalBus::new();
        let subscription = bus.subscribe("#").unwrap();
        assert_eq!(bus.subscriber_count(), 1);

        drop(subscription);
        bus.publish(Message::new("itf/cmds/read", "{}")).unwrap();

        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn wildcard_topics_cannot_be_published() {
        let bus = LocalBus::new();

        assert_eq!(
            bus.publish(Message::new("itf/cmds/#", "{}")),
            Err(BusError::InvalidTopic("itf/cmds/#".to_string()))
        );
    }
}
