pub type ApiResult<T> = Result<T, ApiError>;

/// Input rejected before anything is sent to the store. The message is shown
/// to the user as is.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Annotation description required")]
    EmptyDescription,

    #[error("Bookmark title required")]
    EmptyTitle,

    #[error("Invalid timestamp")]
    InvalidTimestamp(String),

    #[error("Session expired, sign in again")]
    SessionExpired,
}

/// Failure reported by the persistence collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("session expired or not authorized")]
    Unauthorized,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::status(404, format!("{what} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(400, message)
    }

    /// The human-readable message sent by the service, if there was one.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } if !message.is_empty() => Some(message),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

/// Parses user-typed seconds. Must be a finite, non-negative number.
pub fn parse_timestamp(text: &str) -> Result<f64, ValidationError> {
    let trimmed = text.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(ValidationError::InvalidTimestamp(trimmed.to_string())),
    }
}
