use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики брокера.
///
/// Обновляются с `Ordering::Relaxed`: это статистика, а не синхронизация.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Успешно поставлено во входящую очередь.
    pub published: AtomicU64,
    /// Отклонено шлюзом публикации (`Cancelled`, `BrokerShuttingDown`, `QueueFull`).
    pub rejected: AtomicU64,
    /// Извлечено из очереди циклом диспетчеризации.
    pub dispatched: AtomicU64,
    /// Успешных записей в каналы пользователей.
    pub delivered: AtomicU64,
    /// Пропущено: канал получателя переполнен.
    pub dropped_full: AtomicU64,
    /// Пропущено: потребитель уже отпустил свой `Receiver`.
    pub dropped_closed: AtomicU64,
    /// Личные сообщения без зарегистрированного адресата.
    pub unroutable: AtomicU64,
}

/// Снимок счётчиков на момент вызова.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStatsSnapshot {
    pub published: u64,
    pub rejected: u64,
    pub dispatched: u64,
    pub delivered: u64,
    pub dropped_full: u64,
    pub dropped_closed: u64,
    pub unroutable: u64,
}

impl BrokerStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BrokerStatsSnapshot {
        BrokerStatsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_closed: self.dropped_closed.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
        }
    }
}

impl BrokerStatsSnapshot {
    /// Все пропуски доставки, по любой причине.
    pub fn dropped(&self) -> u64 {
        self.dropped_full + self.dropped_closed + self.unroutable
    }
}
