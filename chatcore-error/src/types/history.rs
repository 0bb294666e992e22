use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки журнала истории сообщений.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Сообщение с таким id не найдено.
    NotFound { id: String },
    /// Хранилище истории недоступно (внешний бэкенд).
    Unavailable { reason: String },
}

impl std::fmt::Display for HistoryError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "message not found: {id}"),
            Self::Unavailable { reason } => write!(f, "history storage unavailable: {reason}"),
        }
    }
}

impl std::error::Error for HistoryError {}

impl ErrorExt for HistoryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NotFound,
            Self::Unavailable { .. } => StatusCode::StorageUnavailable,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::NotFound { id } => format!("message not found: {id}"),
            Self::Unavailable { .. } => "history unavailable".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_error() {
        let err = HistoryError::NotFound {
            id: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NotFound);
        assert_eq!(err.client_message(), "message not found: abc");

        let err = HistoryError::Unavailable {
            reason: "db down".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::StorageUnavailable);
        assert!(!err.client_message().contains("db down"));
    }
}
