use std::{
    io::{self, ErrorKind},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use chatcore_error::{ChatResult, ErrorExt, ResultExt, SessionError};
use chrono::Utc;
use futures::StreamExt;
use tokio::{
    io::AsyncWriteExt,
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    select,
    time::{sleep_until, timeout, Instant},
};
use tokio_util::{
    codec::{FramedRead, LinesCodec, LinesCodecError},
    sync::CancellationToken,
};
use tracing::{debug, info, trace, warn};

use super::protocol::{
    encode_delivery, format_history_entry, validate_user_id, ChatCommand, Reply,
};
use crate::{
    broker::{delivery_channel, Broker, Message},
    config::Settings,
    error::ProtocolError,
    history::MessageHistory,
};

/// Параметры одной клиентской сессии.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Сколько ждать `HELLO` после подключения.
    pub handshake_timeout: Duration,
    /// Простой без команд клиента; доставки его не сбрасывают.
    pub idle_timeout: Duration,
    pub write_timeout: Duration,
    /// Ёмкость личного канала доставки.
    pub channel_capacity: usize,
    pub max_line_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            handshake_timeout: settings.network.handshake_timeout(),
            idle_timeout: settings.network.idle_timeout(),
            write_timeout: settings.network.write_timeout(),
            channel_capacity: settings.broker.user_channel_capacity,
            max_line_length: settings.network.max_line_length,
        }
    }
}

/// Почему завершилась сессия.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Клиент отправил `QUIT` или закрыл соединение.
    ClientClosed,
    /// Тот же пользователь подключился заново.
    Replaced,
    /// Пользователя удалили из реестра в обход сессии.
    Unregistered,
    Shutdown,
    IdleTimeout,
    /// Не пройден `HELLO`.
    Rejected,
}

/// Обработчик одного TCP-соединения.
///
/// После `HELLO` регистрирует личный канал доставки в брокере и
/// одновременно читает команды клиента и пересылает ему доставки.
pub struct ChatSession {
    id: u64,
    addr: SocketAddr,
    broker: Broker,
    history: Arc<dyn MessageHistory>,
    config: SessionConfig,
    shutdown: CancellationToken,
}

/// Строка от клиента.
#[derive(Debug, PartialEq, Eq)]
enum ClientLine {
    Line(String),
    /// Строка длиннее лимита; её остаток отбрасывается без буферизации.
    TooLong,
    Closed,
}

/// Построчное чтение с ограничением длины строки.
///
/// Буфер никогда не растёт больше лимита: слишком длинная строка
/// отбрасывается кодеком до ближайшего перевода строки. `next_line`
/// безопасен для отмены в `select!`, всё состояние живёт в `FramedRead`.
struct LineReader {
    frames: FramedRead<OwnedReadHalf, LinesCodec>,
    /// После ошибки кодека `FramedRead` один раз отдаёт `None`; это не EOF.
    resuming: bool,
}

impl LineReader {
    fn new(
        read_half: OwnedReadHalf,
        max_line_length: usize,
    ) -> Self {
        // +1 под `\r`, который кодек срезает уже после проверки длины.
        let codec = LinesCodec::new_with_max_length(max_line_length.saturating_add(1));
        Self {
            frames: FramedRead::new(read_half, codec),
            resuming: false,
        }
    }

    async fn next_line(&mut self) -> io::Result<ClientLine> {
        loop {
            match self.frames.next().await {
                Some(Ok(line)) => return Ok(ClientLine::Line(line)),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    self.resuming = true;
                    return Ok(ClientLine::TooLong);
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    self.resuming = true;
                    return Err(e);
                }
                None if self.resuming => self.resuming = false,
                None => return Ok(ClientLine::Closed),
            }
        }
    }
}

impl ChatSession {
    pub fn new(
        id: u64,
        addr: SocketAddr,
        broker: Broker,
        history: Arc<dyn MessageHistory>,
        config: SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            addr,
            broker,
            history,
            config,
            shutdown,
        }
    }

    pub async fn run(
        self,
        socket: TcpStream,
    ) -> ChatResult<SessionEnd> {
        let (read_half, mut writer) = socket.into_split();
        let mut lines = LineReader::new(read_half, self.config.max_line_length);

        let end = match self.handshake(&mut lines, &mut writer).await? {
            Some(user) => self.serve(&user, &mut lines, &mut writer).await?,
            None => SessionEnd::Rejected,
        };

        graceful_close_writer(self.id, writer).await;
        Ok(end)
    }

    /// Ждёт `HELLO <user>`; при отказе клиент получает `-ERR` и `None`.
    async fn handshake(
        &self,
        lines: &mut LineReader,
        writer: &mut OwnedWriteHalf,
    ) -> ChatResult<Option<String>> {
        let line = select! {
            _ = self.shutdown.cancelled() => {
                self.reply(writer, &Reply::error("server shutting down")).await?;
                return Ok(None);
            }
            read = timeout(self.config.handshake_timeout, lines.next_line()) => match read {
                Ok(Ok(ClientLine::Line(line))) if line.len() <= self.config.max_line_length => line,
                Ok(Ok(ClientLine::Line(_) | ClientLine::TooLong)) => {
                    let err = ProtocolError::LineTooLong { limit: self.config.max_line_length };
                    self.reply(writer, &Reply::error(err.client_message())).await?;
                    return Ok(None);
                }
                Ok(Ok(ClientLine::Closed)) => return Ok(None),
                Ok(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                    let err = SessionError::HandshakeRequired;
                    self.reply(writer, &Reply::error(err.client_message())).await?;
                    return Ok(None);
                }
                Ok(Err(e)) if is_recoverable_error(&e) => {
                    debug!(session = self.id, error = %e, "Connection dropped during handshake");
                    return Ok(None);
                }
                Ok(Err(e)) => return Err(e).context("handshake read failed"),
                Err(_) => {
                    let err = SessionError::Timeout { phase: "handshake" };
                    self.reply(writer, &Reply::error(err.client_message())).await?;
                    return Ok(None);
                }
            },
        };

        let user = match ChatCommand::parse(&line) {
            Ok(ChatCommand::Hello { user }) => user,
            _ => {
                let err = SessionError::HandshakeRequired;
                self.reply(writer, &Reply::error(err.client_message())).await?;
                return Ok(None);
            }
        };

        if let Err(err) = validate_user_id(&user) {
            debug!(session = self.id, error = %err, "Handshake rejected");
            self.reply(writer, &Reply::error(err.client_message())).await?;
            return Ok(None);
        }

        Ok(Some(user))
    }

    async fn serve(
        &self,
        user: &str,
        lines: &mut LineReader,
        writer: &mut OwnedWriteHalf,
    ) -> ChatResult<SessionEnd> {
        let (tx, mut deliveries) = delivery_channel(self.config.channel_capacity);
        // Сессия держит только слабую ссылку: как только брокер отпустит
        // канал, `recv` вернёт `None`.
        let own = tx.downgrade();
        if let Some(displaced) = self.broker.register_user(user, tx) {
            info!(session = self.id, user, "Replacing previous session of the same user");
            drop(displaced);
        }

        info!(session = self.id, user, addr = %self.addr, "Session established");
        let outcome = self.reply(writer, &Reply::Ok).await;
        let end = match outcome {
            Ok(()) => self.session_loop(user, lines, writer, &mut deliveries).await,
            Err(e) => Err(e),
        };

        self.broker.unregister_session(user, &own);
        info!(session = self.id, user, ?end, "Session finished");
        end
    }

    async fn session_loop(
        &self,
        user: &str,
        lines: &mut LineReader,
        writer: &mut OwnedWriteHalf,
        deliveries: &mut crate::broker::DeliveryReceiver,
    ) -> ChatResult<SessionEnd> {
        let mut last_activity = Instant::now();

        loop {
            select! {
                _ = self.shutdown.cancelled() => {
                    self.reply(writer, &Reply::error("server shutting down")).await?;
                    return Ok(SessionEnd::Shutdown);
                }

                delivery = deliveries.recv() => match delivery {
                    Some(message) => {
                        trace!(session = self.id, user, id = %message.id, "Forwarding delivery");
                        self.send(writer, &encode_delivery(&message)).await?;
                    }
                    None => {
                        // Канал закрывается либо при вытеснении новой сессией,
                        // либо при явном удалении пользователя из реестра.
                        let (err, end) = if self.broker.registry().contains(user) {
                            let err = SessionError::Replaced { user: user.to_string() };
                            (err, SessionEnd::Replaced)
                        } else {
                            let err = SessionError::Unregistered { user: user.to_string() };
                            (err, SessionEnd::Unregistered)
                        };
                        warn!(session = self.id, error = %err, "Delivery channel closed");
                        self.reply(writer, &Reply::error(err.client_message())).await?;
                        return Ok(end);
                    }
                },

                _ = sleep_until(last_activity + self.config.idle_timeout) => {
                    let err = SessionError::Timeout { phase: "idle" };
                    debug!(session = self.id, user, "Idle timeout");
                    self.reply(writer, &Reply::error(err.client_message())).await?;
                    return Ok(SessionEnd::IdleTimeout);
                }

                read = lines.next_line() => match read {
                    Ok(ClientLine::TooLong) => {
                        last_activity = Instant::now();
                        let err = ProtocolError::LineTooLong { limit: self.config.max_line_length };
                        self.reply(writer, &Reply::error(err.client_message())).await?;
                    }
                    Ok(ClientLine::Line(line)) => {
                        last_activity = Instant::now();
                        if line.len() > self.config.max_line_length {
                            let err = ProtocolError::LineTooLong { limit: self.config.max_line_length };
                            self.reply(writer, &Reply::error(err.client_message())).await?;
                            continue;
                        }

                        let command = match ChatCommand::parse(&line) {
                            Ok(command) => command,
                            Err(err) => {
                                trace!(session = self.id, error = %err, "Bad command");
                                self.reply(writer, &Reply::error(err.client_message())).await?;
                                continue;
                            }
                        };

                        let quit = command == ChatCommand::Quit;
                        let reply = self.execute(user, command);
                        self.reply(writer, &reply).await?;
                        if quit {
                            return Ok(SessionEnd::ClientClosed);
                        }
                    }
                    Ok(ClientLine::Closed) => return Ok(SessionEnd::ClientClosed),
                    Err(e) if e.kind() == ErrorKind::InvalidData => {
                        warn!(session = self.id, "Ignoring invalid UTF-8 from client");
                        self.reply(writer, &Reply::error("invalid utf-8")).await?;
                    }
                    Err(e) if is_recoverable_error(&e) => {
                        debug!(session = self.id, error = %e, "Connection dropped");
                        return Ok(SessionEnd::ClientClosed);
                    }
                    Err(e) => return Err(e).context("read failed"),
                },
            }
        }
    }

    /// Выполняет команду уже представившегося пользователя.
    fn execute(
        &self,
        user: &str,
        command: ChatCommand,
    ) -> Reply {
        match command {
            ChatCommand::Msg { to, text } => {
                self.publish(Message::direct(user, to, text).with_timestamp(Utc::now()))
            }
            ChatCommand::All { text } => {
                self.publish(Message::broadcast(user, text).with_timestamp(Utc::now()))
            }
            ChatCommand::History { sender } => match self.history.query(sender.as_deref()) {
                Ok(messages) => Reply::Lines(messages.iter().map(format_history_entry).collect()),
                Err(err) => {
                    warn!(session = self.id, error = %err, "History query failed");
                    Reply::error(err.client_message())
                }
            },
            ChatCommand::Who => Reply::Lines(self.broker.registry().user_ids()),
            ChatCommand::Ping { payload } => Reply::Pong(payload),
            ChatCommand::Quit => Reply::Ok,
            ChatCommand::Hello { .. } => Reply::error(format!("already identified as {user}")),
        }
    }

    /// Публикует сообщение и при успехе записывает его в историю.
    fn publish(
        &self,
        message: Message,
    ) -> Reply {
        match self.broker.publish(message.clone()) {
            Ok(()) => {
                if let Err(err) = self.history.append(message) {
                    warn!(session = self.id, error = %err, "Failed to record message in history");
                }
                Reply::Ok
            }
            Err(err) => Reply::error(err.client_message()),
        }
    }

    async fn reply(
        &self,
        writer: &mut OwnedWriteHalf,
        reply: &Reply,
    ) -> ChatResult<()> {
        self.send(writer, &reply.encode()).await
    }

    /// Пишет в сокет с таймаутом записи.
    async fn send(
        &self,
        writer: &mut OwnedWriteHalf,
        payload: &str,
    ) -> ChatResult<()> {
        match timeout(self.config.write_timeout, writer.write_all(payload.as_bytes())).await {
            Ok(result) => result.context("failed to write to client"),
            Err(_) => Err(SessionError::Timeout { phase: "write" }.into()),
        }
    }
}

/// Ошибки, при которых соединение просто закрывается без ошибки сессии.
fn is_recoverable_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::UnexpectedEof
            | ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut
    )
}

async fn graceful_close_writer(
    session: u64,
    mut writer: OwnedWriteHalf,
) {
    if let Err(e) = writer.shutdown().await {
        // Игнорируем ошибки при закрытии уже закрытого соединения
        if e.kind() != ErrorKind::NotConnected {
            debug!(session, error = %e, "Error during shutdown");
        }
    }
}
