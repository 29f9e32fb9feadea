use crate::stats::DetailType;
use lattice_core::{Block, BlockHash, Root, Vote};
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MessageType {
    Publish,
    ConfirmReq,
    ConfirmAck,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Publish => "publish",
            MessageType::ConfirmReq => "confirm_req",
            MessageType::ConfirmAck => "confirm_ack",
        }
    }
}

impl From<MessageType> for DetailType {
    fn from(msg: MessageType) -> Self {
        match msg {
            MessageType::Publish => DetailType::Publish,
            MessageType::ConfirmReq => DetailType::ConfirmReq,
            MessageType::ConfirmAck => DetailType::ConfirmAck,
        }
    }
}

/// The consensus relevant messages exchanged with peers
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Message {
    Publish(Block),
    /// Asks the receiver to vote on the given hashes
    ConfirmReq(Vec<(BlockHash, Root)>),
    ConfirmAck(Arc<Vote>),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Publish(_) => MessageType::Publish,
            Message::ConfirmReq(_) => MessageType::ConfirmReq,
            Message::ConfirmAck(_) => MessageType::ConfirmAck,
        }
    }
}
