use super::{ChannelId, Message};
use lattice_output_tracker::{OutputListenerMt, OutputTrackerMt};
use std::sync::Arc;

/// Sends messages to peered nodes
pub trait MessagePublisher: Send + Sync {
    /// Returns false if the message was dropped
    fn send(&self, channel_id: ChannelId, message: &Message) -> bool;

    /// Sends the message to principal representatives and a random share of
    /// the other peers. `scale` is the share of non representative peers.
    fn flood(&self, message: &Message, scale: f32);
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PublishedMessage {
    /// None for flooded messages
    pub channel_id: Option<ChannelId>,
    pub message: Message,
}

/// Publisher that sends nothing but records what would have been sent
#[derive(Default)]
pub struct NullMessagePublisher {
    published: OutputListenerMt<PublishedMessage>,
}

impl NullMessagePublisher {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn track(&self) -> Arc<OutputTrackerMt<PublishedMessage>> {
        self.published.track()
    }
}

impl MessagePublisher for NullMessagePublisher {
    fn send(&self, channel_id: ChannelId, message: &Message) -> bool {
        self.published.emit(PublishedMessage {
            channel_id: Some(channel_id),
            message: message.clone(),
        });
        true
    }

    fn flood(&self, message: &Message, _scale: f32) {
        self.published.emit(PublishedMessage {
            channel_id: None,
            message: message.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::Block;

    #[test]
    fn records_sent_and_flooded_messages() {
        let publisher = NullMessagePublisher::new();
        let tracker = publisher.track();
        let message = Message::Publish(Block::new_test_instance());

        assert!(publisher.send(ChannelId::from(3), &message));
        publisher.flood(&message, 0.5);

        let output = tracker.output();
        assert_eq!(output.len(), 2);
        assert_eq!(output[0].channel_id, Some(ChannelId::from(3)));
        assert_eq!(output[1].channel_id, None);
    }
}
