//! JSON wire form of [`Message`].
//!
//! Floats are written in shortest round-trip form and parsed back exactly, so
//! `decode(encode(m)) == m` for every message with finite fields.

use crate::{Message, ProtocolResult};

pub fn encode(message: &Message) -> ProtocolResult<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode(bytes: &[u8]) -> ProtocolResult<Message> {
    Ok(serde_json::from_slice(bytes)?)
}
