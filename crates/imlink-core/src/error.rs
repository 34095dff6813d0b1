//! Shared error type across imlink crates.

use thiserror::Error;

/// Stable error codes (used by logs and test vectors).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Dead or desynchronized transport.
    Transport,
    /// Well-framed body that does not fit its command's layout.
    Malformed,
    /// Server rejected the auth token.
    AuthFailed,
    /// A specific reply was required and something else arrived.
    Protocol,
    /// A correlated reply did not arrive in time.
    Timeout,
    /// Operation attempted outside the `Ready` state.
    NotReady,
    /// Invalid configuration.
    BadConfig,
    /// Unsupported config version.
    UnsupportedVersion,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Malformed => "MALFORMED",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::Protocol => "PROTOCOL",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::NotReady => "NOT_READY",
            ErrorCode::BadConfig => "BAD_CONFIG",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ImlinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum ImlinkError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("short read: needed {needed} bytes, got {got}")]
    ShortRead { needed: usize, got: usize },
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
    #[error("malformed {cmd} body: {reason}")]
    Malformed { cmd: &'static str, reason: String },
    #[error("auth field too long: {field} is {len} bytes")]
    AuthFieldTooLong { field: &'static str, len: usize },
    #[error("authentication failed (status {0})")]
    AuthFailed(i32),
    #[error("unexpected command {got} while waiting for {expected}")]
    UnexpectedCommand { expected: &'static str, got: String },
    #[error("session not ready")]
    NotReady,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("bad config: {0}")]
    BadConfig(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("internal: {0}")]
    Internal(String),
}

impl ImlinkError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ImlinkError::Io(_)
            | ImlinkError::ConnectionClosed
            | ImlinkError::ShortRead { .. }
            | ImlinkError::FrameTooLarge { .. } => ErrorCode::Transport,
            ImlinkError::Malformed { .. } | ImlinkError::AuthFieldTooLong { .. } => {
                ErrorCode::Malformed
            }
            ImlinkError::AuthFailed(_) => ErrorCode::AuthFailed,
            ImlinkError::UnexpectedCommand { .. } => ErrorCode::Protocol,
            ImlinkError::NotReady => ErrorCode::NotReady,
            ImlinkError::Timeout(_) => ErrorCode::Timeout,
            ImlinkError::BadConfig(_) => ErrorCode::BadConfig,
            ImlinkError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            ImlinkError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Transport faults end the connection; the only recovery is a full
    /// reconnect and re-authentication.
    pub fn is_transport(&self) -> bool {
        self.code() == ErrorCode::Transport
    }

    pub(crate) fn malformed(cmd: &'static str, reason: impl Into<String>) -> Self {
        ImlinkError::Malformed {
            cmd,
            reason: reason.into(),
        }
    }
}
