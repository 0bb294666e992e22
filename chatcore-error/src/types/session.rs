use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки жизненного цикла клиентской сессии.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Первая строка соединения не была `HELLO <user>`.
    HandshakeRequired,
    /// Недопустимый идентификатор пользователя.
    InvalidUserId { user: String, reason: &'static str },
    /// Сессия вытеснена новым `HELLO` с тем же идентификатором.
    Replaced { user: String },
    /// Пользователь удалён из реестра без новой регистрации.
    Unregistered { user: String },
    /// Истёк таймаут на указанной фазе (`handshake`, `write`, `idle`).
    Timeout { phase: &'static str },
    /// Достигнут лимит одновременных соединений.
    TooManyConnections { limit: usize },
}

impl std::fmt::Display for SessionError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::HandshakeRequired => write!(f, "expected HELLO <user> first"),
            Self::InvalidUserId { user, reason } => {
                write!(f, "invalid user id '{user}': {reason}")
            }
            Self::Replaced { user } => write!(f, "session replaced for user {user}"),
            Self::Unregistered { user } => write!(f, "user {user} was unregistered"),
            Self::Timeout { phase } => write!(f, "{phase} timeout"),
            Self::TooManyConnections { limit } => {
                write!(f, "too many connections (limit {limit})")
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl ErrorExt for SessionError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::HandshakeRequired => StatusCode::HandshakeRequired,
            Self::InvalidUserId { .. } => StatusCode::InvalidUserId,
            Self::Replaced { .. } => StatusCode::SessionReplaced,
            Self::Unregistered { .. } => StatusCode::SessionClosed,
            Self::Timeout { .. } => StatusCode::Timeout,
            Self::TooManyConnections { .. } => StatusCode::TooManyConnections,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Replaced { .. } => "session replaced".to_string(),
            Self::Unregistered { .. } => "session closed by server".to_string(),
            Self::TooManyConnections { .. } => "too many connections".to_string(),
            other => other.to_string(),
        }
    }
}
