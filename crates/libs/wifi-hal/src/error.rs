use serde::{Deserialize, Serialize};

/// Failure reported by a remote HAL call.
///
/// `Transport` means the remote endpoint is gone (dead object, broken pipe).
/// `Status` means the daemon is alive and refused the request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("status {code}: {message}")]
    Status { code: i32, message: String },
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn status(code: i32, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors produced by the HAL proxies before they are collapsed to the
/// boolean / optional results of the public surface.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum HalError {
    #[error("can't call {method}, {target} is null")]
    NotInitialized { method: String, target: String },

    #[error("{method}: invalid argument: {message}")]
    InvalidArgument { method: String, message: String },

    #[error("{method}: requires HAL version {required}, negotiated {negotiated}")]
    Unsupported {
        method: String,
        required: i32,
        negotiated: i32,
    },

    #[error("{method} failed with transport error: {message}")]
    Transport { method: String, message: String },

    #[error("{method} failed with status {code}: {message}")]
    Rejected {
        method: String,
        code: i32,
        message: String,
    },
}

impl HalError {
    /// Returns `true` when the failure came from a dead remote endpoint.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn not_initialized(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self::NotInitialized {
            method: method.into(),
            target: target.into(),
        }
    }

    pub fn invalid(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(method: impl Into<String>, required: i32, negotiated: i32) -> Self {
        Self::Unsupported {
            method: method.into(),
            required,
            negotiated,
        }
    }

    /// Wraps a downstream failure with the proxy method that issued it.
    pub fn from_remote(method: impl Into<String>, err: RemoteError) -> Self {
        let method = method.into();
        match err {
            RemoteError::Transport { message } => Self::Transport { method, message },
            RemoteError::Status { code, message } => Self::Rejected {
                method,
                code,
                message,
            },
        }
    }
}

pub type HalResult<T> = Result<T, HalError>;
