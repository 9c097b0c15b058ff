/// Crate-wide result type for task store operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No task with the given id exists in the store.
    #[error("task not found: {id}")]
    NotFound { id: String },
}

impl Error {
    #[must_use]
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}
