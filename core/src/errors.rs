use thiserror::Error;

/// Generic detail used when a transport failure carries no message.
pub const CONNECTION_FALLBACK: &str =
    "Failed to connect to the server. Please make sure the backend is running.";

/// Failure to obtain a usable payload from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Server error: {status_code}")] Status { status_code: u16 },
    #[error("{message}")] Network { message: String },
    #[error("{message}")] Malformed { message: String },
}

impl TransportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Status { .. } => "NET-1001",
            Self::Network { .. } => "NET-1002",
            Self::Malformed { .. } => "NET-1003",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::Status { .. } => "The backend answered with a non-success HTTP status.",
            Self::Network { .. } => "The backend could not be reached or did not answer in time.",
            Self::Malformed { .. } => "The backend answered with a body that is not the expected JSON.",
        }
    }
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code } => Some(*status_code),
            _ => None,
        }
    }
    /// Text shown after the `Connection Error: ` prefix.
    pub fn detail(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            CONNECTION_FALLBACK.to_string()
        } else {
            text
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::Status { status_code: status.as_u16() }
        } else if err.is_timeout() {
            Self::Network { message: "Request timed out. Please try again.".to_string() }
        } else if err.is_decode() {
            Self::Malformed { message: err.to_string() }
        } else {
            Self::Network { message: err.to_string() }
        }
    }
}

/// Caller errors rejected by [`crate::conversation::ConversationStore::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("A request is already in flight")] Busy,
    #[error("Message is empty")] EmptyInput,
}

impl SendError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Busy => "CHAT-1001",
            Self::EmptyInput => "CHAT-1002",
        }
    }
    pub fn explain(&self) -> &'static str {
        match self {
            Self::Busy => "Wait for the current reply before sending another message.",
            Self::EmptyInput => "Type something before sending.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_render_server_code() {
        let err = TransportError::Status { status_code: 500 };
        assert_eq!(err.detail(), "Server error: 500");
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.code(), "NET-1001");
    }

    #[test]
    fn blank_messages_fall_back_to_generic_detail() {
        let err = TransportError::Network { message: "  ".into() };
        assert_eq!(err.detail(), CONNECTION_FALLBACK);
    }
}
