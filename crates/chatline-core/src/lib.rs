//! # chatline-core
//!
//! Core crate for Chatline. Contains configuration schemas, typed
//! identifiers, the data models and traits of the external collaborators
//! the real-time hub consumes, and the unified error system.
//!
//! This crate has **no** internal dependencies on other Chatline crates.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use error::AppResult;
