//! Error types for the conversation log and the generation transport.

use thiserror::Error;

/// Prefix shared by every failure shown in the conversation.
pub const USER_ERROR_PREFIX: &str = "Error: could not connect to the generation server";

/// Why a generation request did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The server answered with a non-2xx status.
    #[error("server responded with HTTP {code}")]
    HttpStatus { code: u16 },

    /// Connection refused, DNS failure, timeout or an interrupted body.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The reply body was not the expected JSON.
    #[error("malformed response: {message}")]
    Decode { message: String },
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::HttpStatus { .. } => "http-status",
            GenerationError::Transport { .. } => "transport",
            GenerationError::Decode { .. } => "decode",
        }
    }

    /// Text appended to the conversation. All kinds share one prefix so the
    /// user sees a single "could not connect" presentation.
    pub fn user_message(&self) -> String {
        format!("{} ({})", USER_ERROR_PREFIX, self)
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return GenerationError::HttpStatus {
                code: status.as_u16(),
            };
        }
        if err.is_decode() {
            return GenerationError::Decode {
                message: err.to_string(),
            };
        }
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        GenerationError::Transport { message }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Decode {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("message text must not be empty")]
    EmptyText,
}
