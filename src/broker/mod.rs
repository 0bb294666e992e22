//! Внутрипроцессный брокер сообщений чата.
//!
//! Продюсеры публикуют сообщения через неблокирующий шлюз, брокер
//! выстраивает их в одну ограниченную очередь, а единственная задача
//! диспетчеризации раскладывает их по личным каналам пользователей:
//!
//! - `message`: структура сообщения (личное или broadcast).
//! - `registry`: реестр `user id → канал доставки`.
//! - `dispatch` (приватный): цикл диспетчеризации с drop-on-full.
//! - `broker`: фасад [`Broker`], шлюз публикации и жизненный цикл.
//! - `stats`: счётчики публикаций, доставок и пропусков.

#[allow(clippy::module_inception)]
pub mod broker;
mod dispatch;
pub mod message;
pub mod registry;
pub mod stats;

pub use broker::*;
pub use message::*;
pub use registry::{
    delivery_channel, DeliveryReceiver, DeliverySender, UserRegistry, WeakDeliverySender,
};
pub use stats::*;
