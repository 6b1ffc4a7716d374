//! Wire message types, payload builders, serialization, and validation.

pub mod builder;
pub mod serializer;
pub mod types;
pub mod validator;

pub use types::{InboundCommand, OutboundFrame, commands, events};
