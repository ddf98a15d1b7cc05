use thiserror::Error;

const EMAIL_NOT_CONFIRMED_MESSAGE: &str = "email not confirmed";
const EMAIL_NOT_CONFIRMED_CODE: &str = "email_not_confirmed";

/// Failure of a call to the hosted auth or data service.
///
/// `Display` is the service's own message so it can be shown to the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("{message}")]
    Auth {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Service { status: u16, message: String },
    #[error("{0}")]
    Decode(String),
}

impl GatewayError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            GatewayError::Auth { message, .. } | GatewayError::Service { message, .. } => message,
            GatewayError::Transport(message) | GatewayError::Decode(message) => message,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Auth { status, .. } => *status,
            GatewayError::Service { status, .. } => Some(*status),
            GatewayError::Transport(_) | GatewayError::Decode(_) => None,
        }
    }

    pub fn is_email_not_confirmed(&self) -> bool {
        match self {
            GatewayError::Auth { code, message, .. } => {
                code.as_deref() == Some(EMAIL_NOT_CONFIRMED_CODE)
                    || is_email_not_confirmed_message(message)
            }
            _ => false,
        }
    }
}

pub fn is_email_not_confirmed_message(message: &str) -> bool {
    message
        .to_ascii_lowercase()
        .contains(EMAIL_NOT_CONFIRMED_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_raw_service_message() {
        let err = GatewayError::Service {
            status: 503,
            message: "upstream unavailable".into(),
        };
        assert_eq!(err.to_string(), "upstream unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn detects_unconfirmed_email_by_message_or_code() {
        assert!(GatewayError::auth("Email not confirmed").is_email_not_confirmed());
        assert!(GatewayError::Auth {
            status: Some(400),
            code: Some("email_not_confirmed".into()),
            message: "Please verify".into(),
        }
        .is_email_not_confirmed());
        assert!(!GatewayError::auth("Invalid login credentials").is_email_not_confirmed());
        assert!(!GatewayError::transport("email not confirmed").is_email_not_confirmed());
    }
}
