use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{BrokerStats, DeliverySender, Message, UserRegistry};

/// Единственный потребитель входящей очереди.
///
/// Раскладывает сообщения по каналам пользователей неблокирующей записью:
/// переполненный канал одного получателя не тормозит остальных.
pub(crate) struct Dispatcher {
    registry: Arc<UserRegistry>,
    stats: Arc<BrokerStats>,
}

impl Dispatcher {
    pub(crate) fn new(
        registry: Arc<UserRegistry>,
        stats: Arc<BrokerStats>,
    ) -> Self {
        Self { registry, stats }
    }

    /// Цикл диспетчеризации; живёт до отмены `cancel`.
    ///
    /// `done` отменяется ровно один раз при выходе из цикла, в том числе
    /// если задачу уничтожил runtime.
    pub(crate) async fn run(
        self,
        mut inbound: mpsc::Receiver<Message>,
        cancel: CancellationToken,
        done: CancellationToken,
    ) {
        let _done = done.drop_guard();
        info!("Dispatch loop started");

        loop {
            tokio::select! {
                // Отмена приоритетнее: после неё очередь больше не читается.
                biased;

                _ = cancel.cancelled() => {
                    debug!("Dispatch loop observed cancellation");
                    break;
                }

                next = inbound.recv() => match next {
                    Some(message) => self.dispatch(message),
                    None => break,
                },
            }
        }

        let stats = self.stats.snapshot();
        info!(
            dispatched = stats.dispatched,
            delivered = stats.delivered,
            dropped = stats.dropped(),
            "Dispatch loop stopped"
        );
    }

    /// Доставляет одно сообщение по снимку реестра.
    pub(crate) fn dispatch(
        &self,
        message: Message,
    ) {
        BrokerStats::incr(&self.stats.dispatched);
        let message = message.stamped();
        let users = self.registry.snapshot();

        if message.broadcast {
            trace!(
                id = %message.id,
                sender = %message.sender,
                recipients = users.len(),
                "Broadcasting message"
            );
            for (user_id, channel) in users.iter() {
                self.deliver(user_id, channel, message.clone());
            }
            return;
        }

        match users.get(&message.recipient) {
            Some(channel) => {
                let recipient = message.recipient.clone();
                self.deliver(&recipient, channel, message);
            }
            None => {
                BrokerStats::incr(&self.stats.unroutable);
                trace!(
                    id = %message.id,
                    recipient = %message.recipient,
                    "No such recipient, message discarded"
                );
            }
        }
    }

    fn deliver(
        &self,
        user_id: &str,
        channel: &DeliverySender,
        message: Message,
    ) {
        match channel.try_send(message) {
            Ok(()) => BrokerStats::incr(&self.stats.delivered),
            Err(TrySendError::Full(message)) => {
                BrokerStats::incr(&self.stats.dropped_full);
                debug!(
                    user = user_id,
                    id = %message.id,
                    "Delivery channel full, message dropped for this user"
                );
            }
            Err(TrySendError::Closed(message)) => {
                BrokerStats::incr(&self.stats.dropped_closed);
                debug!(
                    user = user_id,
                    id = %message.id,
                    "Delivery channel closed by consumer, message dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::broker::delivery_channel;

    fn dispatcher() -> (Dispatcher, Arc<UserRegistry>, Arc<BrokerStats>) {
        let registry = Arc::new(UserRegistry::new());
        let stats = Arc::new(BrokerStats::default());
        (
            Dispatcher::new(Arc::clone(&registry), Arc::clone(&stats)),
            registry,
            stats,
        )
    }

    /// Тест проверяет, что личное сообщение попадает только адресату.
    #[test]
    fn test_unicast_reaches_only_recipient() {
        let (dispatcher, registry, stats) = dispatcher();
        let (a_tx, mut a_rx) = delivery_channel(4);
        let (b_tx, mut b_rx) = delivery_channel(4);
        assert!(registry.register("a", a_tx).is_none());
        assert!(registry.register("b", b_tx).is_none());

        dispatcher.dispatch(Message::direct("a", "b", "hi"));

        let got = b_rx.try_recv().unwrap();
        assert_eq!(got.content, "hi");
        assert!(got.timestamp.is_some());
        assert!(matches!(a_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(stats.snapshot().delivered, 1);
    }

    /// Тест проверяет, что broadcast получают все, включая отправителя.
    #[test]
    fn test_broadcast_includes_sender() {
        let (dispatcher, registry, _) = dispatcher();
        let mut receivers = Vec::new();
        for id in ["a", "b", "c"] {
            let (tx, rx) = delivery_channel(1);
            assert!(registry.register(id, tx).is_none());
            receivers.push(rx);
        }

        dispatcher.dispatch(Message::broadcast("a", "x"));

        for rx in receivers.iter_mut() {
            assert_eq!(rx.try_recv().unwrap().content, "x");
        }
    }

    /// Тест проверяет drop-on-full: переполненный канал пропускается,
    /// остальные получают сообщение.
    #[test]
    fn test_full_channel_is_skipped() {
        let (dispatcher, registry, stats) = dispatcher();
        let (a_tx, mut a_rx) = delivery_channel(1);
        let (b_tx, mut b_rx) = delivery_channel(1);
        b_tx.try_send(Message::direct("z", "b", "old")).unwrap();
        assert!(registry.register("a", a_tx).is_none());
        assert!(registry.register("b", b_tx).is_none());

        dispatcher.dispatch(Message::broadcast("a", "x"));

        assert_eq!(a_rx.try_recv().unwrap().content, "x");
        assert_eq!(b_rx.try_recv().unwrap().content, "old");
        assert!(matches!(b_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(stats.snapshot().dropped_full, 1);
    }

    /// Тест проверяет, что сообщения без адресата отбрасываются молча.
    #[test]
    fn test_unknown_and_empty_recipient_discarded() {
        let (dispatcher, registry, stats) = dispatcher();
        let (tx, mut rx) = delivery_channel(1);
        assert!(registry.register("a", tx).is_none());

        dispatcher.dispatch(Message::direct("a", "ghost", "boo"));
        dispatcher.dispatch(Message::direct("a", "", "nowhere"));

        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(stats.snapshot().unroutable, 2);
    }

    /// Тест проверяет учёт закрытого потребителем канала.
    #[test]
    fn test_closed_consumer_counted() {
        let (dispatcher, registry, stats) = dispatcher();
        let (tx, rx) = delivery_channel(1);
        assert!(registry.register("gone", tx).is_none());
        drop(rx);

        dispatcher.dispatch(Message::direct("a", "gone", "hello?"));
        assert_eq!(stats.snapshot().dropped_closed, 1);
    }

    /// Тест проверяет, что цикл завершается по отмене и закрывает `done`.
    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let (dispatcher, _, _) = dispatcher();
        let (_tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let handle = tokio::spawn(dispatcher.run(rx, cancel.clone(), done.clone()));
        assert!(!done.is_cancelled());

        cancel.cancel();
        handle.await.unwrap();
        assert!(done.is_cancelled());
    }
}
