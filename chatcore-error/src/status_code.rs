use std::fmt;

use num_enum::TryFromPrimitive;
#[cfg(feature = "serde")]
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Коды статуса для категоризации ошибок chatcore.
///
/// # Диапазоны:
/// - 0xxx: Успех
/// - 1xxx: Общие ошибки
/// - 2xxx: Ошибки данных (история сообщений, пользователи)
/// - 4xxx: Ограничения (backpressure, лимиты соединений)
/// - 6xxx: Сеть / IO
/// - 7xxx: Жизненный цикл брокера
/// - 8xxx: Ошибки строкового протокола
#[cfg_attr(feature = "serde", derive(Serialize_repr, Deserialize_repr))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Успех ===
    Success = 0,

    // === 1xxx: Общие ошибки ===
    Unknown = 1000,
    Unexpected = 1001,
    Internal = 1002,
    InvalidArgs = 1003,
    Config = 1004,

    // === 2xxx: Ошибки данных ===
    NotFound = 2000,
    InvalidUserId = 2001,
    EmptyMessage = 2002,
    StorageUnavailable = 2003,

    // === 4xxx: Ограничения ===
    QueueFull = 4000,
    TooManyConnections = 4001,
    SizeLimit = 4002,

    // === 6xxx: Сеть/IO ===
    Io = 6000,
    ConnectionClosed = 6001,
    Timeout = 6002,
    ConnectionFailed = 6003,
    UnexpectedEof = 6004,

    // === 7xxx: Жизненный цикл ===
    Cancelled = 7000,
    ShuttingDown = 7001,
    SessionReplaced = 7002,
    SessionClosed = 7003,

    // === 8xxx: Протокол ===
    InvalidCommand = 8000,
    WrongArgCount = 8001,
    InvalidUtf8 = 8002,
    HandshakeRequired = 8003,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Числовое представление кода статуса.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Пытается получить вариант `StatusCode` из `u32`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Имеет ли смысл повторить операцию после паузы.
    ///
    /// `QueueFull` это временный backpressure, а `Cancelled` и `ShuttingDown`
    /// терминальны: брокер больше не примет работу.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::QueueFull | Self::Timeout | Self::TooManyConnections | Self::ConnectionFailed
        )
    }

    /// Код означает, что брокер или его владелец завершает работу.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::ShuttingDown)
    }

    /// Ошибка со стороны клиента (диапазоны 2xxx и 8xxx, плюс
    /// `InvalidArgs`).
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=2999).contains(&c) || (8000..=8999).contains(&c) {
            return !matches!(self, Self::StorageUnavailable);
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Ошибка протокола (диапазон 8xxx).
    pub fn is_protocol_error(&self) -> bool {
        (8000..=8999).contains(&self.code())
    }

    /// Рекомендуемый уровень логирования для данного кода.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::QueueFull | Self::Cancelled | Self::ShuttingDown => {
                LogLevel::Debug
            }
            Self::InvalidArgs
            | Self::InvalidUserId
            | Self::EmptyMessage
            | Self::InvalidCommand
            | Self::WrongArgCount
            | Self::InvalidUtf8
            | Self::HandshakeRequired
            | Self::SessionReplaced
            | Self::SessionClosed => LogLevel::Info,
            Self::Internal | Self::StorageUnavailable | Self::Config => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StatusCode
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
