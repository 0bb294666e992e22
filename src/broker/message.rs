use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Сообщение чата, проходящее через брокер.
///
/// После постановки в очередь брокер не меняет сообщение отправителя:
/// метка времени проставляется на собственной копии брокера.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Непрозрачный идентификатор.
    pub id: String,
    pub sender: String,
    /// Адресат; имеет смысл только при `broadcast == false`.
    #[serde(default)]
    pub recipient: String,
    pub content: String,
    /// `true`: всем зарегистрированным пользователям.
    #[serde(default)]
    pub broadcast: bool,
    /// Проставляется системой, если продюсер не указал.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Личное сообщение одному адресату.
    pub fn direct(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            broadcast: false,
            timestamp: None,
        }
    }

    /// Сообщение всем зарегистрированным пользователям, включая отправителя.
    pub fn broadcast(
        sender: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender: sender.into(),
            recipient: String::new(),
            content: content.into(),
            broadcast: true,
            timestamp: None,
        }
    }

    pub fn with_id(
        mut self,
        id: impl Into<String>,
    ) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_timestamp(
        mut self,
        timestamp: DateTime<Utc>,
    ) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Есть ли у сообщения хотя бы теоретический адресат.
    ///
    /// Личное сообщение с пустым `recipient` тихо отбрасывается брокером.
    pub fn is_routable(&self) -> bool {
        self.broadcast || !self.recipient.is_empty()
    }

    /// Возвращает сообщение с меткой времени (текущей, если её не было).
    pub(crate) fn stamped(mut self) -> Self {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    /// Тест проверяет конструктор личного сообщения.
    #[test]
    fn test_direct_message() {
        let msg = Message::direct("alice", "bob", "hi");
        assert_eq!(msg.sender, "alice");
        assert_eq!(msg.recipient, "bob");
        assert_eq!(msg.content, "hi");
        assert!(!msg.broadcast);
        assert!(msg.timestamp.is_none());
        assert!(Uuid::parse_str(&msg.id).is_ok());
        assert!(msg.is_routable());
    }

    /// Тест проверяет конструктор широковещательного сообщения.
    #[test]
    fn test_broadcast_message() {
        let msg = Message::broadcast("alice", "x");
        assert!(msg.broadcast);
        assert!(msg.recipient.is_empty());
        assert!(msg.is_routable());
    }

    /// Тест проверяет, что личное сообщение без адресата не маршрутизируется.
    #[test]
    fn test_direct_without_recipient_is_unroutable() {
        assert!(!Message::direct("alice", "", "lost").is_routable());
    }

    /// Тест проверяет, что `stamped` не перезаписывает заданное время.
    #[test]
    fn test_stamped_keeps_existing_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let msg = Message::direct("a", "b", "c").with_timestamp(at).stamped();
        assert_eq!(msg.timestamp, Some(at));

        let fresh = Message::direct("a", "b", "c").stamped();
        assert!(fresh.timestamp.is_some());
    }

    /// Тест проверяет JSON-представление и значения по умолчанию.
    #[test]
    fn test_json_defaults() {
        let msg: Message =
            serde_json::from_str(r#"{"id":"1","sender":"a","content":"hey"}"#).unwrap();
        assert!(!msg.broadcast);
        assert!(msg.recipient.is_empty());
        assert!(msg.timestamp.is_none());

        let json = serde_json::to_string(&msg.clone().with_id("2")).unwrap();
        assert!(json.contains(r#""id":"2""#));
    }
}
