//! Task extraction from inbound chat messages.
//!
//! A keyword classifier turns a message into an optional [`Task`]; the
//! [`TaskStore`] keeps the extracted tasks in arrival order and supports
//! status updates and deletion.

pub mod classifier;
pub mod error;
pub mod model;
pub mod store;

pub use {
    classifier::classify,
    error::{Error, Result},
    model::{Category, Priority, Task},
    store::{SharedTaskStore, TaskStore},
};
