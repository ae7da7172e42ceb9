use thiserror::Error;

/// Errors surfaced by the recognition runtime and the asset cache.
///
/// Cache read/write failures are recovered internally (reads degrade to a
/// miss, writes are dropped with a log line); `CacheIo` only reaches a
/// caller from the explicit cache-clear operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("failed to fetch {filename}: {reason}")]
    AssetFetch { filename: String, reason: String },

    #[error("cache storage error: {0}")]
    CacheIo(String),

    #[error("failed to construct recognizer: {0}")]
    EngineConstruction(String),

    #[error("recognizer failure: {0}")]
    EngineRuntime(String),
}

pub type Result<T> = std::result::Result<T, Error>;
