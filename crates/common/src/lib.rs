//! Error plumbing and process utilities shared by the taskwire crates.

pub mod error;
pub mod shutdown;

pub use error::FromMessage;
