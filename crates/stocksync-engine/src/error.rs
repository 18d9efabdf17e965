use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Db(#[from] stocksync_db::DbError),

    /// Failure inside a non-database store (lock poisoning, broken invariant).
    #[error("store error: {0}")]
    Store(String),

    #[error("sync config {0} not found")]
    ConfigNotFound(Uuid),

    #[error("product {0} not found")]
    ProductNotFound(Uuid),
}
