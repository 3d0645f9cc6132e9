// Store error taxonomy

use uuid::Uuid;

/// Error type for store operations
///
/// Writes never partially apply: a failed operation leaves the database
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Primary-key collision or foreign-key violation
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Row not found
    #[error("not found: {0}")]
    NotFound(Uuid),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                let kind = db.kind();
                if matches!(
                    kind,
                    sqlx::error::ErrorKind::UniqueViolation
                        | sqlx::error::ErrorKind::ForeignKeyViolation
                ) {
                    return StoreError::Constraint(db.message().to_string());
                }
                StoreError::Database(e.to_string())
            }
            _ => StoreError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
