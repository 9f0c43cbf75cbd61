use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad cause of a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemoteErrorKind {
    Network,
    Validation,
    Unauthorized,
    NotFound,
    /// Request or response did not match the operation's shape.
    Codec,
    Internal,
}

/// Failure reported by the backend for a query or mutation.
///
/// Displays as the bare message so UI code can show it directly.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(RemoteErrorKind::Unauthorized, "Unauthorized")
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(RemoteErrorKind::NotFound, format!("{what} not found"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Internal, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(RemoteErrorKind::Codec, e.to_string())
    }
}
