//! Rate limiting primitives.

pub mod bucket;
pub mod keyed;

pub use bucket::TokenBucket;
pub use keyed::IntervalLimiter;
