use super::AssistantError;
use thiserror::Error;

/// Failures raised while acquiring a remote session. None of these are
/// retried.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no SSH credential configured (set SSH_PASSWORD or SSH_KEY_PATH)")]
    MissingCredential,
    #[error("failed to reach {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("SSH handshake failed: {0}")]
    Handshake(#[source] ssh2::Error),
    #[error("SSH host key mismatch (expected {expected}, got {observed})")]
    HostKeyMismatch { expected: String, observed: String },
    #[error("SSH authentication failed for {user}: {reason}")]
    Auth { user: String, reason: String },
}

impl SessionError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, SessionError::MissingCredential)
    }
}

impl From<SessionError> for AssistantError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        if err.is_configuration() {
            AssistantError::configuration(message)
                .with_hint("Configure SSH_PASSWORD or an existing SSH_KEY_PATH.")
        } else {
            AssistantError::unavailable(message)
        }
    }
}
