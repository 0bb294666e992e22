//! Сетевой фронтенд чата.
//!
//! ## Подмодули
//!
//! - `banner`: баннер при старте сервера.
//! - `protocol`: строковый протокол: команды, ответы, формат доставок.
//! - `session`: обработчик одного соединения поверх брокера.
//! - `server`: приём соединений, лимит и корректная остановка.

pub mod banner;
pub mod protocol;
pub mod server;
pub mod session;

pub use protocol::{ChatCommand, Reply};
pub use server::{ChatServer, ServerConfig};
pub use session::{ChatSession, SessionConfig, SessionEnd};
