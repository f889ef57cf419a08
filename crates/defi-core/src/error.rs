use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Closed classification of every failure the core can report.
///
/// The CLI translates a kind into a process exit code and the `kind` field of
/// the JSON envelope; nothing below the command layer looks at exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller-correctable input problem.
    Usage,
    /// An upstream read (RPC, indexer, provider API) failed or returned unusable data.
    Unavailable,
    /// Protocol, provider or capability not implemented for the request.
    Unsupported,
    /// Signer could not be resolved or does not match the plan's sender.
    Signer,
    /// Should be unreachable with valid input.
    Internal,
    /// A step did not confirm within its bound.
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Usage => "usage",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Signer => "signer",
            ErrorKind::Internal => "internal",
            ErrorKind::Timeout => "timeout",
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Internal => 1,
            ErrorKind::Usage => 2,
            ErrorKind::Unavailable => 3,
            ErrorKind::Unsupported => 4,
            ErrorKind::Signer => 5,
            ErrorKind::Timeout => 6,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DefiError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DefiError {
    #[error("{0}")]
    Usage(String),

    #[error("action not found: {0}")]
    ActionNotFound(String),

    #[error("unknown chain '{0}'")]
    UnknownChain(String),

    #[error("unknown asset '{asset}' on {chain}")]
    UnknownAsset { asset: String, chain: String },

    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: String, value: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("unsupported protocol '{0}'")]
    UnsupportedProtocol(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Signer(String),

    #[error("signer address {signer} does not match action sender {expected}")]
    SignerMismatch { signer: String, expected: String },

    #[error("step '{step_id}' was not confirmed within {secs}s (tx {tx_hash})")]
    StepTimeout {
        step_id: String,
        tx_hash: String,
        secs: u64,
    },

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("command deadline reached during step '{step_id}'; resume with submit")]
    DeadlineExceeded { step_id: String },

    #[error("step '{step_id}' was broadcast as {tx_hash} but not recorded: {cause}; check the transaction before resubmitting")]
    Unrecorded {
        step_id: String,
        tx_hash: String,
        cause: Box<DefiError>,
    },

    #[error("{cause} (action state not saved: {persist})")]
    NotPersisted {
        cause: Box<DefiError>,
        persist: Box<DefiError>,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("action store error: {0}")]
    Store(String),

    #[error("action store is locked by another process")]
    StoreLocked,

    #[error("home directory not found: set HOME or DEFI_HOME")]
    HomeNotFound,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DefiError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn signer(msg: impl Into<String>) -> Self {
        Self::Signer(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DefiError::Usage(_)
            | DefiError::ActionNotFound(_)
            | DefiError::UnknownChain(_)
            | DefiError::UnknownAsset { .. }
            | DefiError::InvalidAddress { .. } => ErrorKind::Usage,
            DefiError::Unavailable(_) | DefiError::StoreLocked => ErrorKind::Unavailable,
            DefiError::UnsupportedProtocol(_) | DefiError::Unsupported(_) => {
                ErrorKind::Unsupported
            }
            DefiError::Signer(_) | DefiError::SignerMismatch { .. } => ErrorKind::Signer,
            DefiError::StepTimeout { .. }
            | DefiError::Timeout(_)
            | DefiError::DeadlineExceeded { .. } => ErrorKind::Timeout,
            DefiError::Unrecorded { cause, .. } | DefiError::NotPersisted { cause, .. } => {
                cause.kind()
            }
            DefiError::HomeNotFound => ErrorKind::Usage,
            DefiError::Encoding(_)
            | DefiError::Internal(_)
            | DefiError::Store(_)
            | DefiError::Io(_)
            | DefiError::Yaml(_)
            | DefiError::Json(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, DefiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_a_usage_error() {
        let err = DefiError::ActionNotFound("act_missing".into());
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.kind().exit_code(), 2);
        assert_eq!(err.to_string(), "action not found: act_missing");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let kinds = [
            ErrorKind::Usage,
            ErrorKind::Unavailable,
            ErrorKind::Unsupported,
            ErrorKind::Signer,
            ErrorKind::Internal,
            ErrorKind::Timeout,
        ];
        let mut codes: Vec<i32> = kinds.iter().map(|k| k.exit_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
    }

    #[test]
    fn io_errors_are_internal() {
        let err: DefiError = std::io::Error::other("disk").into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn wrapped_errors_keep_their_cause_kind() {
        let err = DefiError::NotPersisted {
            cause: Box::new(DefiError::unavailable("rpc down")),
            persist: Box::new(DefiError::StoreLocked),
        };
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.to_string().starts_with("rpc down"));
    }
}
