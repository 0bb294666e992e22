use std::collections::VecDeque;

use chatcore_error::{ChatResult, HistoryError};
use parking_lot::RwLock;
use tracing::trace;

use super::MessageHistory;
use crate::broker::Message;

/// История в памяти процесса.
///
/// При заданном `max_entries` самые старые записи вытесняются первыми.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: RwLock<VecDeque<Message>>,
    max_entries: Option<usize>,
}

impl InMemoryHistory {
    /// Неограниченная история.
    pub fn new() -> Self {
        Self::default()
    }

    /// История с ограничением числа записей. `0` трактуется как
    /// "без ограничения".
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            max_entries: (max_entries > 0).then_some(max_entries),
        }
    }

    pub fn max_entries(&self) -> Option<usize> {
        self.max_entries
    }
}

impl MessageHistory for InMemoryHistory {
    fn append(
        &self,
        message: Message,
    ) -> ChatResult<Message> {
        let message = message.stamped();
        let mut entries = self.entries.write();
        if let Some(limit) = self.max_entries {
            while entries.len() >= limit {
                if let Some(evicted) = entries.pop_front() {
                    trace!(id = %evicted.id, "History entry evicted");
                }
            }
        }
        entries.push_back(message.clone());
        Ok(message)
    }

    fn query(
        &self,
        sender: Option<&str>,
    ) -> ChatResult<Vec<Message>> {
        let entries = self.entries.read();
        let found = match sender {
            Some(sender) => entries
                .iter()
                .filter(|m| m.sender == sender)
                .cloned()
                .collect(),
            None => entries.iter().cloned().collect(),
        };
        Ok(found)
    }

    fn get(
        &self,
        id: &str,
    ) -> ChatResult<Message> {
        self.entries
            .read()
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound { id: id.to_string() }.into())
    }

    fn update(
        &self,
        id: &str,
        content: &str,
    ) -> ChatResult<Message> {
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|m| m.id == id) {
            Some(entry) => {
                entry.content = content.to_string();
                Ok(entry.clone())
            }
            None => Err(HistoryError::NotFound { id: id.to_string() }.into()),
        }
    }

    fn remove(
        &self,
        id: &str,
    ) -> ChatResult<()> {
        let mut entries = self.entries.write();
        match entries.iter().position(|m| m.id == id) {
            Some(index) => {
                entries.remove(index);
                Ok(())
            }
            None => Err(HistoryError::NotFound { id: id.to_string() }.into()),
        }
    }

    fn len(&self) -> ChatResult<usize> {
        Ok(self.entries.read().len())
    }
}
