use std::any::Any;

use chatcore_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибки разбора строкового протокола чата.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty command")]
    EmptyLine,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("{command} expects {expected}")]
    WrongArgCount {
        command: &'static str,
        expected: &'static str,
    },

    #[error("message text must not be empty")]
    EmptyMessage,

    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}

impl ErrorExt for ProtocolError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyLine | Self::UnknownCommand(_) => StatusCode::InvalidCommand,
            Self::WrongArgCount { .. } => StatusCode::WrongArgCount,
            Self::EmptyMessage => StatusCode::EmptyMessage,
            Self::LineTooLong { .. } => StatusCode::SizeLimit,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_codes() {
        assert_eq!(
            ProtocolError::UnknownCommand("FOO".into()).status_code(),
            StatusCode::InvalidCommand
        );
        assert_eq!(
            ProtocolError::WrongArgCount {
                command: "MSG",
                expected: "<user> <text>",
            }
            .client_message(),
            "MSG expects <user> <text>"
        );
        assert!(ProtocolError::EmptyMessage.status_code().is_client_error());
    }
}
