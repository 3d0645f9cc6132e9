// SQLite storage layer with sqlx
//
// Single-writer embedded store: WAL journaling, enforced foreign keys,
// transactional writes. All durable state lives here.

pub mod error;
pub mod models;
pub mod queue;
pub mod repositories;

pub use error::StoreError;
pub use models::*;
pub use queue::{EnqueueOptions, FailOutcome, QueueStats, TaskQueue};
pub use repositories::Database;
