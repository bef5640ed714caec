use thiserror::Error;

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A concurrent transaction modified a row this transaction read.
    /// The whole transition was rolled back; retrying is safe.
    #[error("Write conflict on {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (e.g. a reused order number).
    #[error("Duplicate {entity}: {id}")]
    Duplicate { entity: &'static str, id: String },

    /// The store refused or failed the write as a whole.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
