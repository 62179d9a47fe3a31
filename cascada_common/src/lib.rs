//! Common types and utilities for the Cascada worker client.

pub mod config;
pub mod error;
pub mod variable;

pub use ::anyhow;
pub use ::serde;
pub use ::serde_json;
pub use ::tracing;
pub use ::tracing_subscriber;
