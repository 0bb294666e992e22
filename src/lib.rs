//! chatcore: внутрипроцессный брокер сообщений чата с TCP-фронтендом.

/// Broker: Message, UserRegistry, dispatch loop, publish gateway, lifecycle.
pub mod broker;
/// Configuration loading (file + CHATCORE_* environment).
pub mod config;
/// Common error types: protocol and configuration errors, re-exports.
pub mod error;
/// Message history log: trait and in-memory implementation.
pub mod history;
/// Flexible logging (formatting, filters, sinks).
pub mod logging;
/// Network front end: line protocol and Tokio-based server.
pub mod network;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Broker API.
pub use broker::{
    delivery_channel, Broker, BrokerConfig, BrokerStatsSnapshot, DeliveryReceiver,
    DeliverySender, Message, UserRegistry,
};
/// config
pub use config::Settings;
/// Operation errors and result types.
pub use error::{
    ChatResult, ConfigError, HistoryError, ProtocolError, PublishError, SessionError, StackError,
};
/// History log.
pub use history::{InMemoryHistory, MessageHistory};
/// Network server.
pub use network::{ChatServer, ServerConfig};
