/// Top-level prmine error type.
///
/// All fallible operations in `prmine-core` return [`Result<T, PrMineError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information.
#[derive(thiserror::Error, Debug)]
pub enum PrMineError {
    /// Error from the SQLite store layer (schema, upserts, lookups).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from the GraphQL API client (transport, decoding, credentials).
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Error in configuration parsing or validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from the SQLite-backed activity store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row expected to exist after an upsert could not be read back.
    #[error("Row not found: {0}")]
    RowNotFound(String),
}

/// Errors from the GraphQL transport and response decoding.
///
/// The transport classifies failures into tagged variants so the sync
/// engine never has to match on message text.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The server reported the API quota as exceeded.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The current credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Every credential in the pool was rejected in turn.
    #[error("credential pool exhausted after rate-limit or authorization failures")]
    CredentialsExhausted,

    /// A response arrived but lacked the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// Any other transport-level failure. Fatal, never retried.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors in prmine configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Cannot read config {path}: {message}")]
    Io {
        /// Path of the file that failed to load.
        path: String,
        /// Description of the I/O failure.
        message: String,
    },

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Convenience alias for `Result<T, PrMineError>`.
pub type Result<T> = std::result::Result<T, PrMineError>;
