//! Fan-out hub and its control loop.

pub mod delivery;
pub mod engine;
pub mod envelope;
pub mod event_loop;
pub mod notifier;
pub mod stats;

pub use engine::Hub;
pub use envelope::{BroadcastMessage, BroadcastTarget};
pub use event_loop::HubLoop;
pub use notifier::Notifier;
pub use stats::{DeliveryReport, HubStats};
