//! Error types for the screening/assessment orchestration engine.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors raised by a provider client (C1) before any retry policy is applied.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Provider returned HTTP 429, or otherwise signaled rate limiting.
    #[error("provider rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying, if the provider supplied one.
        retry_after_secs: Option<u64>,
    },

    /// Authentication failed (bad or expired API key). Not retryable.
    #[error("provider authentication failed: {message}")]
    Auth {
        /// Details from the provider's error body.
        message: String,
    },

    /// The request exceeded its configured deadline.
    #[error("provider call timed out after {elapsed_ms}ms")]
    Timeout {
        /// How long the call ran before being abandoned.
        elapsed_ms: u64,
    },

    /// A network-level failure (DNS, connection reset, TLS, etc).
    #[error("provider network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider returned a 5xx.
    #[error("provider server error (status {status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error body, if any.
        message: String,
    },

    /// The response body could not be parsed into the expected shape.
    #[error("provider response did not parse: {raw}")]
    InvalidResponse {
        /// The raw response text, preserved for audit.
        raw: String,
    },
}

impl ProviderError {
    /// Whether this error is worth retrying under C5's backoff policy.
    ///
    /// `Auth` and `InvalidResponse` are deterministic failures — retrying
    /// with the same input produces the same outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ProviderError::Auth { .. } | ProviderError::InvalidResponse { .. })
    }
}

/// Errors surfaced by the dispatcher (C5) after applying cache/rate-limit/breaker/retry policy.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The underlying provider call failed and retries are exhausted or not applicable.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The circuit breaker for (provider, model) is open and no fallback was available.
    #[error("circuit breaker open for provider '{provider}' model '{model}'")]
    CircuitOpen {
        /// The provider name.
        provider: String,
        /// The model id.
        model: String,
    },

    /// Every configured fallback for this (provider, model) has also failed.
    #[error("all fallback providers exhausted for '{provider}'/'{model}'")]
    AllFallbacksExhausted {
        /// The originating provider name.
        provider: String,
        /// The originating model id.
        model: String,
    },

    /// The caller named a (provider, model) pair that isn't in the registry.
    #[error("unknown provider/model: {provider}/{model}")]
    UnknownTarget {
        /// The provider name.
        provider: String,
        /// The model id.
        model: String,
    },
}

/// Fatal error from the rule engine (C6) — a programming error, not a content issue.
#[derive(Debug, thiserror::Error)]
pub enum RuleEngineError {
    /// The criteria's framework tag isn't recognized by the engine.
    #[error("unknown criteria framework: {framework}")]
    InvalidFramework {
        /// The unrecognized framework name.
        framework: String,
    },
}

/// Errors from the durable job state store (C11).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the backing database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// A stored value failed to (de)serialize as JSON.
    #[error("job store serialization error: {source}")]
    Serialize {
        /// The underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// `get`/`update` addressed a key that does not exist.
    #[error("job store key not found: {key}")]
    NotFound {
        /// The missing key.
        key: String,
    },

    /// The on-disk snapshot file was present but unreadable/corrupt.
    #[error("job store snapshot error: {message}")]
    Snapshot {
        /// Details about the failure.
        message: String,
    },
}

/// Errors from the cross-process ID generator (C12).
#[derive(Debug, thiserror::Error)]
pub enum IdGenError {
    /// The exclusive lock file could not be acquired (held by a stale or live holder).
    #[error("id generator lock unavailable")]
    LockUnavailable,

    /// Filesystem I/O failed while reading/writing the counter snapshot.
    #[error("id generator I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from rendering or parsing screening/assessment prompts (C8/C9 prompt layer).
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// The criteria's framework has no registered template.
    #[error("no prompt template registered for framework: {framework}")]
    MissingFrameworkTemplate {
        /// The framework name.
        framework: String,
    },

    /// The document type has no registered QA criteria catalog entry.
    #[error("no criteria catalog registered for document type: {document_type}")]
    MissingCatalogEntry {
        /// The document type name.
        document_type: String,
    },
}
