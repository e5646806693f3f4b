use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParloError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("session expired")]
    Expired,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid response payload: {0}")]
    Decode(String),
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("storage error: {0}")]
    Storage(String),
    #[error("subscription guard: {0}")]
    Subscription(String),
}

impl ParloError {
    /// Human-readable message for store-level `last_error` fields.
    ///
    /// Server-provided messages win; transport and other opaque failures
    /// collapse to the caller's fallback string.
    pub fn surface(&self, fallback: &str) -> String {
        match self {
            Self::Validation(msg) | Self::Auth(msg) => msg.clone(),
            Self::Api { message, .. } if !message.is_empty() => message.clone(),
            Self::Expired => "Session expired".to_string(),
            _ => fallback.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_prefers_server_message() {
        let err = ParloError::Api {
            status: 422,
            message: "The email has already been taken.".into(),
        };
        assert_eq!(err.surface("Registration failed"), "The email has already been taken.");
    }

    #[test]
    fn surface_falls_back_on_transport_failure() {
        let err = ParloError::Transport("dns error".into());
        assert_eq!(err.surface("Login failed"), "Login failed");
    }

    #[test]
    fn surface_reports_expiry() {
        assert_eq!(ParloError::Expired.surface("Login failed"), "Session expired");
    }
}
