//! Subscription indexes shared by conversations and presence watches.

pub mod index;
pub mod tracker;

pub use index::SubscriptionIndex;
pub use tracker::SubscriptionTracker;
