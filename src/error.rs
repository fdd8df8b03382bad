//! Error types for the onboarding engine.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geographic input error: {0}")]
    Geo(#[from] GeoError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load dataset {path}: {message}")]
    DatasetLoad { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Geographic resolution input errors.
///
/// These are user-input problems surfaced with a corrective prompt; the
/// session stays at the current node.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("Unknown location: {input}")]
    UnknownLocation { input: String },

    #[error("Location {name} has no usable coordinates")]
    MissingCoordinates { name: String },
}

/// NLU collaborator errors.
///
/// Unparseable output is NOT an error — the normalizer absorbs it. These
/// cover the transport level only.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-service enrichment failures.
///
/// Absorbed by the coordinator: recorded in the enrichment map, never
/// propagated as turn failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentFailure {
    #[error("Service {service} timed out after {timeout_ms}ms")]
    Timeout { service: String, timeout_ms: u64 },

    #[error("Service {service} found no match")]
    NotFound { service: String },

    #[error("Service {service} transport failure: {reason}")]
    Transport { service: String, reason: String },
}

/// Identity lookup service errors (transient — surfaced as a retry prompt).
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Registry returned status {status}")]
    BadStatus { status: u16 },

    #[error("Failed to parse registry response: {reason}")]
    ParseFailed { reason: String },
}

/// Session and session-store errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session {id} not found")]
    NotFound { id: Uuid },

    #[error("Session store backend error: {0}")]
    Backend(String),

    #[error("Session snapshot serialization error: {0}")]
    Serialization(String),
}

/// Invariant violations — implementation bugs, fatal to the turn's chain.
///
/// Never surfaced to the user as errors: the chain aborts, the last valid
/// StepResults are returned, and the violation is logged loudly.
#[derive(Debug, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Auto-chain revisited node {node} within one request")]
    ChainCycle { node: String },

    #[error("StepResult schema violated after normalization: {reason}")]
    MalformedStepResult { reason: String },

    #[error("Final record written more than once for session {id}")]
    FinalRecordRewrite { id: Uuid },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
