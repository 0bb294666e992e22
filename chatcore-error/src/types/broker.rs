use std::any::Any;

use crate::{ErrorExt, StatusCode};

/// Ошибки публикации сообщения в брокер.
///
/// Потери доставки конкретному получателю (переполненный канал,
/// неизвестный адресат) сюда не входят: это политика маршрутизации,
/// а не ошибка публикации.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// Родительский токен отмены сработал, брокер больше не принимает работу.
    Cancelled,
    /// Цикл диспетчеризации уже завершился.
    BrokerShuttingDown,
    /// Входящая очередь заполнена; можно повторить позже.
    QueueFull { capacity: usize },
}

impl PublishError {
    /// Брокер больше никогда не примет сообщение.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::BrokerShuttingDown)
    }
}

impl std::fmt::Display for PublishError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "broker context cancelled"),
            Self::BrokerShuttingDown => write!(f, "broker is shutting down"),
            Self::QueueFull { capacity } => {
                write!(f, "message queue is full (capacity {capacity})")
            }
        }
    }
}

impl std::error::Error for PublishError {}

impl ErrorExt for PublishError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Cancelled => StatusCode::Cancelled,
            Self::BrokerShuttingDown => StatusCode::ShuttingDown,
            Self::QueueFull { .. } => StatusCode::QueueFull,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Cancelled | Self::BrokerShuttingDown => "server shutting down".to_string(),
            Self::QueueFull { .. } => "server busy, retry later".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "broker_publish".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::QueueFull { capacity } = self {
            tags.push(("queue_capacity", capacity.to_string()));
        }
        tags
    }
}
