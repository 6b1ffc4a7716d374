//! JSON encoding of frames and decoding of commands.

use bytes::Bytes;

use chatline_core::error::AppResult;

use super::types::{InboundCommand, OutboundFrame};

/// Encode a frame once so it can be shared across a fan-out.
pub fn encode_frame(frame: &OutboundFrame) -> AppResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(frame)?))
}

/// Decode a raw text frame into a command.
pub fn decode_command(text: &str) -> AppResult<InboundCommand> {
    Ok(serde_json::from_str(text)?)
}
