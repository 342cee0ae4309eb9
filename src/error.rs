use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Everything that can go wrong while registering, loading, or resolving analyzers.
///
/// Most variants are fatal: the plugin cannot continue without the parsers it
/// was asked to provide. The binary is the only place that turns them into a
/// process exit; library code just returns them.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("host version mismatch: running with {running}, but plugin compiled for {compiled}")]
    VersionMismatch { running: u32, compiled: u32 },

    #[error("plugin cannot determine its file system path: {0}")]
    SelfLocate(#[source] std::io::Error),

    #[error("cannot resolve module path {path}: {source}")]
    Environment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not open library path {path}: {reason}")]
    ModuleOpen { path: PathBuf, reason: String },

    #[error("unknown parser '{parser}' requested by analyzer '{analyzer}'")]
    UnknownParser { parser: String, analyzer: String },

    #[error("cannot load '{0}', plugin was not compiled with JIT support")]
    JitUnsupported(PathBuf),

    #[error("cannot get analyzer tag for '{0}'")]
    MissingTag(String),

    #[error("unsupported transport protocol in port '{0}' for host conversion")]
    UnsupportedTransport(String),

    #[error("failed to lookup {kind} analyzer component '{name}'")]
    ComponentLookup { kind: &'static str, name: String },

    #[error("uncaught runtime exception {kind} during initialization: {message}")]
    RuntimeInit { kind: String, message: String },

    #[error("{operation} is not allowed after post-script initialization")]
    PhaseViolation { operation: &'static str },

    #[error("unsupported protocol {protocol} in analyzer '{analyzer}'")]
    UnsupportedProtocol { analyzer: String, protocol: String },

    #[error("failed to read configuration {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl BridgeError {
    /// Whether this condition must terminate the process.
    ///
    /// Non-fatal conditions are logged where they occur and normally never
    /// surface as `Err`; the classification exists for callers that
    /// construct them directly.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, BridgeError::UnsupportedProtocol { .. })
    }
}
