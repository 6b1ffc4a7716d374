//! Connection state: handles, outbound queues, and the connection table.

pub mod handle;
pub mod pool;

pub use handle::{ConnectionHandle, ConnectionInfo, SendOutcome};
pub use pool::ConnectionPool;
