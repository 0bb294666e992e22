use std::{collections::HashMap, sync::Arc};

use parking_lot::{RwLock, RwLockReadGuard};
use tokio::sync::mpsc;

use super::Message;

type UserKey = Arc<str>;

/// Отправляющая сторона личного канала доставки пользователя.
pub type DeliverySender = mpsc::Sender<Message>;
/// Принимающая сторона; принадлежит обработчику соединения.
pub type DeliveryReceiver = mpsc::Receiver<Message>;
/// Слабая ссылка на канал, не удерживающая его открытым.
pub type WeakDeliverySender = mpsc::WeakSender<Message>;

/// Создаёт ограниченный канал доставки.
///
/// # Panics
/// Паникует при `capacity == 0` (как и `tokio::sync::mpsc::channel`).
pub fn delivery_channel(capacity: usize) -> (DeliverySender, DeliveryReceiver) {
    mpsc::channel(capacity)
}

/// Реестр пользователей: `user id → канал доставки`.
///
/// Чтение (поиск адресата, обход при broadcast) идёт параллельно,
/// изменения эксклюзивны. Реестр хранит только `Sender`; опустошение
/// канала и его `Receiver` остаются за обработчиком соединения.
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<UserKey, DeliverySender>>,
}

/// Согласованное представление реестра на время одной диспетчеризации.
///
/// Держит read-lock, поэтому не должно жить через `.await`.
pub(crate) struct RegistrySnapshot<'a> {
    users: RwLockReadGuard<'a, HashMap<UserKey, DeliverySender>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Устанавливает или заменяет канал пользователя.
    ///
    /// Прежний канал не закрывается реестром: он возвращается вызывающему.
    /// Если вызывающий просто отбросит его и других `Sender` нет, старый
    /// потребитель дочитает буфер и увидит закрытие канала. Чтобы старый
    /// канал остался открытым, его нужно удержать.
    #[must_use = "dropping the displaced sender closes the previous consumer's channel"]
    pub fn register(
        &self,
        user_id: &str,
        channel: DeliverySender,
    ) -> Option<DeliverySender> {
        self.users.write().insert(Arc::from(user_id), channel)
    }

    /// Удаляет пользователя и закрывает его канал (отпускает `Sender`
    /// брокера). Для неизвестного пользователя ничего не делает.
    ///
    /// Возвращает `true`, если запись существовала.
    pub fn unregister(
        &self,
        user_id: &str,
    ) -> bool {
        self.users.write().remove(user_id).is_some()
    }

    /// Удаляет запись, только если она всё ещё указывает на канал `own`.
    ///
    /// Сессия, которую вытеснили повторной регистрацией, не должна удалить
    /// запись своего преемника.
    pub fn unregister_if_current(
        &self,
        user_id: &str,
        own: &WeakDeliverySender,
    ) -> bool {
        let mut users = self.users.write();
        let is_current = match (users.get(user_id), own.upgrade()) {
            (Some(current), Some(mine)) => current.same_channel(&mine),
            _ => false,
        };
        if is_current {
            users.remove(user_id);
        }
        is_current
    }

    pub fn contains(
        &self,
        user_id: &str,
    ) -> bool {
        self.users.read().contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    /// Отсортированный список зарегистрированных пользователей.
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.users.read().keys().map(|k| k.to_string()).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn snapshot(&self) -> RegistrySnapshot<'_> {
        RegistrySnapshot {
            users: self.users.read(),
        }
    }
}

impl RegistrySnapshot<'_> {
    pub fn get(
        &self,
        user_id: &str,
    ) -> Option<&DeliverySender> {
        self.users.get(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DeliverySender)> {
        self.users.iter().map(|(k, v)| (&**k, v))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }
}
