pub mod config;
pub mod protocol;

pub use config::ConfigError;
pub use protocol::ProtocolError;

// Ошибки брокера, истории и сессий живут в workspace-крейте
// `chatcore-error`; здесь они переэкспортируются для удобства.
pub use chatcore_error::{
    ChatResult, ErrorExt, HistoryError, PublishError, SessionError, StackError, StatusCode,
};
