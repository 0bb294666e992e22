use std::sync::Arc;

use chatcore_error::PublishError;
use parking_lot::Mutex;
use tokio::sync::{
    mpsc::{self, error::TrySendError},
    watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    dispatch::Dispatcher, BrokerStats, BrokerStatsSnapshot, DeliverySender, Message,
    UserRegistry, WeakDeliverySender,
};

/// Ёмкость входящей очереди по умолчанию.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Параметры брокера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Ёмкость общей входящей очереди. Должна быть больше нуля.
    pub queue_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Брокер сообщений чата.
///
/// Принимает сообщения от продюсеров через [`Broker::publish`], выстраивает
/// их в одну ограниченную очередь и доставляет зарегистрированным
/// пользователям из единственной задачи диспетчеризации. Клонирование
/// дешёвое: все клоны разделяют одно состояние.
///
/// Жизненный цикл: `new` → `run` → отмена родительского токена →
/// `closed()` завершается.
#[derive(Debug, Clone)]
pub struct Broker {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    /// Дочерний токен родительского контекста.
    cancel: CancellationToken,
    /// Отменяется при выходе цикла диспетчеризации.
    done: CancellationToken,
    inbound: mpsc::Sender<Message>,
    /// Приёмник очереди до вызова `run`.
    pending: Mutex<Option<mpsc::Receiver<Message>>>,
    started: watch::Sender<bool>,
    registry: Arc<UserRegistry>,
    stats: Arc<BrokerStats>,
    capacity: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    /// Создаёт брокер с настройками по умолчанию.
    ///
    /// Брокер ничего не доставляет, пока не вызван [`Broker::run`].
    pub fn new(parent: &CancellationToken) -> Self {
        Self::with_config(parent, BrokerConfig::default())
    }

    /// Создаёт брокер, привязанный к `parent`.
    ///
    /// # Panics
    /// Паникует при `queue_capacity == 0`.
    pub fn with_config(
        parent: &CancellationToken,
        config: BrokerConfig,
    ) -> Self {
        let (inbound, receiver) = mpsc::channel(config.queue_capacity);
        let (started, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                cancel: parent.child_token(),
                done: CancellationToken::new(),
                inbound,
                pending: Mutex::new(Some(receiver)),
                started,
                registry: Arc::new(UserRegistry::new()),
                stats: Arc::new(BrokerStats::default()),
                capacity: config.queue_capacity,
            }),
        }
    }

    /// Запускает цикл диспетчеризации в фоне и сразу возвращается.
    ///
    /// Повторный вызов игнорируется с предупреждением в лог.
    /// Должен вызываться внутри tokio runtime.
    pub fn run(&self) {
        let Some(receiver) = self.shared.pending.lock().take() else {
            warn!("Broker::run called more than once, ignoring");
            return;
        };

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.shared.registry),
            Arc::clone(&self.shared.stats),
        );
        tokio::spawn(dispatcher.run(
            receiver,
            self.shared.cancel.clone(),
            self.shared.done.clone(),
        ));

        self.shared.started.send_replace(true);
        info!(queue_capacity = self.shared.capacity, "Broker started");
    }

    /// Неблокирующая публикация.
    ///
    /// Порядок проверок: отмена контекста, остановленный цикл, место в
    /// очереди. Никогда не ждёт; при переполнении сразу возвращает
    /// [`PublishError::QueueFull`].
    pub fn publish(
        &self,
        message: Message,
    ) -> Result<(), PublishError> {
        let result = self.enqueue(message);
        match &result {
            Ok(()) => BrokerStats::incr(&self.shared.stats.published),
            Err(error) => {
                BrokerStats::incr(&self.shared.stats.rejected);
                debug!(%error, "Publish rejected");
            }
        }
        result
    }

    /// Регистрирует пользователя, заменяя прежнюю запись.
    ///
    /// Возвращает вытесненный канал; брокер его не закрывает. Если
    /// отбросить результат, старый потребитель увидит закрытие канала.
    #[must_use = "dropping the displaced sender closes the previous consumer's channel"]
    pub fn register_user(
        &self,
        user_id: &str,
        channel: DeliverySender,
    ) -> Option<DeliverySender> {
        let displaced = self.shared.registry.register(user_id, channel);
        if displaced.is_some() {
            warn!(user = user_id, "User re-registered, previous channel displaced");
        } else {
            debug!(user = user_id, "User registered");
        }
        displaced
    }

    /// Удаляет пользователя и закрывает его канал.
    pub fn unregister_user(
        &self,
        user_id: &str,
    ) {
        if self.shared.registry.unregister(user_id) {
            debug!(user = user_id, "User unregistered");
        }
    }

    /// Удаляет пользователя, только если запись всё ещё принадлежит `own`.
    pub fn unregister_session(
        &self,
        user_id: &str,
        own: &WeakDeliverySender,
    ) -> bool {
        let removed = self.shared.registry.unregister_if_current(user_id, own);
        if removed {
            debug!(user = user_id, "Session unregistered");
        }
        removed
    }

    /// Ждёт, пока брокер запустится или его контекст будет отменён.
    pub async fn wait(&self) {
        let mut started = self.shared.started.subscribe();
        tokio::select! {
            _ = started.wait_for(|running| *running) => {}
            _ = self.shared.cancel.cancelled() => {}
        }
    }

    /// Завершается, когда цикл диспетчеризации остановлен.
    ///
    /// Для брокера, у которого не вызывали `run`, не завершится никогда.
    pub async fn closed(&self) {
        self.shared.done.cancelled().await
    }

    pub fn is_closed(&self) -> bool {
        self.shared.done.is_cancelled()
    }

    pub fn is_running(&self) -> bool {
        *self.shared.started.borrow() && !self.is_closed()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }

    pub fn queue_capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn registry(&self) -> &UserRegistry {
        &self.shared.registry
    }

    pub fn stats(&self) -> BrokerStatsSnapshot {
        self.shared.stats.snapshot()
    }

    fn enqueue(
        &self,
        message: Message,
    ) -> Result<(), PublishError> {
        self.ensure_accepting()?;
        match self.shared.inbound.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                // Отмена могла прийти, пока очередь была полна.
                self.ensure_accepting()?;
                Err(PublishError::QueueFull {
                    capacity: self.shared.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(PublishError::BrokerShuttingDown),
        }
    }

    fn ensure_accepting(&self) -> Result<(), PublishError> {
        if self.shared.cancel.is_cancelled() {
            return Err(PublishError::Cancelled);
        }
        if self.shared.done.is_cancelled() {
            return Err(PublishError::BrokerShuttingDown);
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
