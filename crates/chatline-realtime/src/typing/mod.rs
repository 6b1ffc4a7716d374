//! Typing indicators.

pub mod tracker;

pub use tracker::{TypingKey, TypingTracker};
