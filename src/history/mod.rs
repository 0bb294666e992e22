//! Журнал истории сообщений.
//!
//! Брокер сам историю не ведёт: её пишет сетевой слой после успешной
//! публикации. Хранилище описано трейтом [`MessageHistory`], чтобы внешний
//! бэкенд можно было подставить без изменений в остальном коде.
//!
//! - `memory`: [`InMemoryHistory`], реализация в памяти процесса.

pub mod memory;

pub use memory::*;

use chatcore_error::ChatResult;

use crate::broker::Message;

/// Журнал сообщений в порядке добавления.
pub trait MessageHistory: Send + Sync {
    /// Сохраняет сообщение. Пустая метка времени заменяется текущей.
    ///
    /// Возвращает сохранённую копию.
    fn append(
        &self,
        message: Message,
    ) -> ChatResult<Message>;

    /// Все сообщения в порядке добавления либо только отправленные `sender`.
    fn query(
        &self,
        sender: Option<&str>,
    ) -> ChatResult<Vec<Message>>;

    fn get(
        &self,
        id: &str,
    ) -> ChatResult<Message>;

    /// Заменяет текст сообщения и возвращает обновлённую копию.
    ///
    /// Для неизвестного id возвращает `NotFound`.
    fn update(
        &self,
        id: &str,
        content: &str,
    ) -> ChatResult<Message>;

    /// Удаляет сообщение; для неизвестного id возвращает `NotFound`.
    fn remove(
        &self,
        id: &str,
    ) -> ChatResult<()>;

    fn len(&self) -> ChatResult<usize>;

    fn is_empty(&self) -> ChatResult<bool> {
        Ok(self.len()? == 0)
    }
}
