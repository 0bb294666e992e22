//! Строковый протокол чата.
//!
//! Одна команда на строку, регистр имени команды не важен:
//!
//! ```text
//! HELLO <user>        представиться (первая строка соединения)
//! MSG <user> <text>   личное сообщение
//! ALL <text>          сообщение всем
//! HISTORY [user]      история, опционально только от <user>
//! WHO                 список подключённых
//! PING [text]         проверка связи
//! QUIT                завершить сессию
//! ```
//!
//! Ответы: `+OK`, `+PONG`, `-ERR <текст>`, `*<n>` и затем `n` строк.
//! Доставки приходят асинхронно как `>MSG <от> <текст>` и
//! `>ALL <от> <текст>`.

use chatcore_error::SessionError;
use chrono::SecondsFormat;

use crate::{broker::Message, error::ProtocolError};

/// Максимальная длина идентификатора пользователя в байтах.
pub const MAX_USER_ID_LEN: usize = 64;

/// Разобранная команда клиента.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Hello { user: String },
    Msg { to: String, text: String },
    All { text: String },
    History { sender: Option<String> },
    Who,
    Ping { payload: Option<String> },
    Quit,
}

/// Ответ сервера на команду.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Pong(Option<String>),
    Error(String),
    Lines(Vec<String>),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim_start();
        if trimmed.is_empty() {
            return Err(ProtocolError::EmptyLine);
        }

        let (name, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (trimmed, ""),
        };

        match name.to_ascii_uppercase().as_str() {
            "HELLO" => match single_word(rest) {
                Some(user) => Ok(Self::Hello {
                    user: user.to_string(),
                }),
                None => Err(ProtocolError::WrongArgCount {
                    command: "HELLO",
                    expected: "<user>",
                }),
            },
            "MSG" => {
                let Some((to, text)) = rest.split_once(char::is_whitespace) else {
                    return Err(ProtocolError::WrongArgCount {
                        command: "MSG",
                        expected: "<user> <text>",
                    });
                };
                Ok(Self::Msg {
                    to: to.to_string(),
                    text: non_empty_text(text)?,
                })
            }
            "ALL" => Ok(Self::All {
                text: non_empty_text(rest)?,
            }),
            "HISTORY" => {
                if rest.trim().is_empty() {
                    return Ok(Self::History { sender: None });
                }
                match single_word(rest) {
                    Some(sender) => Ok(Self::History {
                        sender: Some(sender.to_string()),
                    }),
                    None => Err(ProtocolError::WrongArgCount {
                        command: "HISTORY",
                        expected: "at most one <user>",
                    }),
                }
            }
            "WHO" => no_args(rest, "WHO").map(|_| Self::Who),
            "QUIT" => no_args(rest, "QUIT").map(|_| Self::Quit),
            "PING" => {
                let payload = rest.trim_end();
                Ok(Self::Ping {
                    payload: (!payload.is_empty()).then(|| payload.to_string()),
                })
            }
            _ => Err(ProtocolError::UnknownCommand(name.to_string())),
        }
    }
}

impl Reply {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Кодирует ответ в строки протокола, каждая с `\r\n`.
    pub fn encode(&self) -> String {
        match self {
            Self::Ok => "+OK\r\n".to_string(),
            Self::Pong(None) => "+PONG\r\n".to_string(),
            Self::Pong(Some(payload)) => format!("+{}\r\n", single_line(payload)),
            Self::Error(message) => format!("-ERR {}\r\n", single_line(message)),
            Self::Lines(lines) => {
                let mut out = format!("*{}\r\n", lines.len());
                for line in lines {
                    out.push_str(&single_line(line));
                    out.push_str("\r\n");
                }
                out
            }
        }
    }
}

/// Проверяет идентификатор пользователя из `HELLO`.
pub fn validate_user_id(user: &str) -> Result<(), SessionError> {
    let reason = if user.is_empty() {
        "must not be empty"
    } else if user.len() > MAX_USER_ID_LEN {
        "longer than 64 bytes"
    } else if user.chars().any(|c| c.is_whitespace() || c.is_control()) {
        "contains whitespace or control characters"
    } else {
        return Ok(());
    };

    Err(SessionError::InvalidUserId {
        user: user.to_string(),
        reason,
    })
}

/// Строка асинхронной доставки.
pub fn encode_delivery(message: &Message) -> String {
    let kind = if message.broadcast { "ALL" } else { "MSG" };
    format!(
        ">{kind} {} {}\r\n",
        message.sender,
        single_line(&message.content)
    )
}

/// Строка ответа `HISTORY`: `<время> <от> <кому|*> <текст>`.
pub fn format_history_entry(message: &Message) -> String {
    let at = message
        .timestamp
        .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string());
    let target = if message.broadcast {
        "*"
    } else {
        message.recipient.as_str()
    };
    format!("{at} {} {target} {}", message.sender, message.content)
}

fn single_word(rest: &str) -> Option<&str> {
    let rest = rest.trim();
    (!rest.is_empty() && !rest.contains(char::is_whitespace)).then_some(rest)
}

fn non_empty_text(text: &str) -> Result<String, ProtocolError> {
    let text = text.trim();
    if text.is_empty() {
        Err(ProtocolError::EmptyMessage)
    } else {
        Ok(text.to_string())
    }
}

fn no_args(
    rest: &str,
    command: &'static str,
) -> Result<(), ProtocolError> {
    if rest.trim().is_empty() {
        Ok(())
    } else {
        Err(ProtocolError::WrongArgCount {
            command,
            expected: "no arguments",
        })
    }
}

/// Перевод строки внутри полезной нагрузки сломал бы кадрирование.
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ChatCommand::parse("HELLO alice\r\n").unwrap(),
            ChatCommand::Hello {
                user: "alice".into()
            }
        );
        assert_eq!(
            ChatCommand::parse("msg bob  hello there ").unwrap(),
            ChatCommand::Msg {
                to: "bob".into(),
                text: "hello there".into()
            }
        );
        assert_eq!(
            ChatCommand::parse("ALL good morning").unwrap(),
            ChatCommand::All {
                text: "good morning".into()
            }
        );
        assert_eq!(
            ChatCommand::parse("HISTORY").unwrap(),
            ChatCommand::History { sender: None }
        );
        assert_eq!(
            ChatCommand::parse("history bob").unwrap(),
            ChatCommand::History {
                sender: Some("bob".into())
            }
        );
        assert_eq!(ChatCommand::parse("who").unwrap(), ChatCommand::Who);
        assert_eq!(
            ChatCommand::parse("PING").unwrap(),
            ChatCommand::Ping { payload: None }
        );
        assert_eq!(
            ChatCommand::parse("PING are you there").unwrap(),
            ChatCommand::Ping {
                payload: Some("are you there".into())
            }
        );
        assert_eq!(ChatCommand::parse("QUIT").unwrap(), ChatCommand::Quit);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(ChatCommand::parse("  \r\n"), Err(ProtocolError::EmptyLine));
        assert_eq!(
            ChatCommand::parse("JUMP high"),
            Err(ProtocolError::UnknownCommand("JUMP".into()))
        );
        assert!(matches!(
            ChatCommand::parse("MSG bob"),
            Err(ProtocolError::WrongArgCount { command: "MSG", .. })
        ));
        assert_eq!(ChatCommand::parse("ALL   "), Err(ProtocolError::EmptyMessage));
        assert!(matches!(
            ChatCommand::parse("HELLO a b"),
            Err(ProtocolError::WrongArgCount { command: "HELLO", .. })
        ));
        assert!(matches!(
            ChatCommand::parse("WHO everyone"),
            Err(ProtocolError::WrongArgCount { command: "WHO", .. })
        ));
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id(&"a".repeat(MAX_USER_ID_LEN)).is_ok());
        assert!(validate_user_id("").is_err());
        assert!(validate_user_id(&"a".repeat(MAX_USER_ID_LEN + 1)).is_err());
        assert!(validate_user_id("tab\tbed").is_err());
    }

    #[test]
    fn test_reply_encoding() {
        assert_eq!(Reply::Ok.encode(), "+OK\r\n");
        assert_eq!(Reply::Pong(None).encode(), "+PONG\r\n");
        assert_eq!(Reply::Pong(Some("hey".into())).encode(), "+hey\r\n");
        assert_eq!(Reply::error("boom").encode(), "-ERR boom\r\n");
        assert_eq!(
            Reply::Lines(vec!["alice".into(), "bob".into()]).encode(),
            "*2\r\nalice\r\nbob\r\n"
        );
        assert_eq!(Reply::Lines(Vec::new()).encode(), "*0\r\n");
    }

    #[test]
    fn test_delivery_and_history_lines() {
        let direct = Message::direct("alice", "bob", "two\nlines");
        assert_eq!(encode_delivery(&direct), ">MSG alice two lines\r\n");
        assert_eq!(
            encode_delivery(&Message::broadcast("bob", "hi all")),
            ">ALL bob hi all\r\n"
        );

        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = format_history_entry(&Message::broadcast("bob", "hi").with_timestamp(at));
        assert_eq!(entry, "2024-03-01T12:00:00.000Z bob * hi");
        assert_eq!(
            format_history_entry(&Message::direct("a", "b", "x")),
            "- a b x"
        );
    }
}
