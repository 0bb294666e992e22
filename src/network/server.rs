use std::{
    io::ErrorKind,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chatcore_error::{ChatResult, ErrorExt, ResultExt, SessionError};
use tokio::{
    io::AsyncWriteExt,
    net::{TcpListener, TcpStream},
    select,
    sync::{OwnedSemaphorePermit, Semaphore},
    time::{sleep, timeout},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::session::{ChatSession, SessionConfig};
use crate::{broker::Broker, config::Settings, history::MessageHistory};

/// Параметры TCP-сервера.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Максимальное кол-во одновременных соединений
    pub max_connections: usize,
    /// Сколько ждать завершения сессий после сигнала остановки.
    pub shutdown_grace: Duration,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for ServerConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_connections: settings.network.max_connections,
            shutdown_grace: Duration::from_secs(5),
            session: SessionConfig::from(settings),
        }
    }
}

/// TCP-фронтенд брокера: принимает соединения и запускает на каждое
/// [`ChatSession`].
pub struct ChatServer {
    listener: TcpListener,
    broker: Broker,
    history: Arc<dyn MessageHistory>,
    config: ServerConfig,
    /// Семафор для ограничения числа соединений
    connections: Arc<Semaphore>,
    shutdown: CancellationToken,
    next_session: AtomicU64,
}

impl ChatServer {
    pub async fn bind(
        addr: &str,
        broker: Broker,
        history: Arc<dyn MessageHistory>,
        config: ServerConfig,
        shutdown: CancellationToken,
    ) -> ChatResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        Ok(Self {
            listener,
            broker,
            history,
            connections: Arc::new(Semaphore::new(config.max_connections)),
            config,
            shutdown,
            next_session: AtomicU64::new(0),
        })
    }

    pub fn local_addr(&self) -> ChatResult<SocketAddr> {
        self.listener
            .local_addr()
            .context("failed to read listener address")
    }

    /// Текущее кол-во открытых сессий.
    pub fn active_sessions(&self) -> usize {
        self.config
            .max_connections
            .saturating_sub(self.connections.available_permits())
    }

    /// Цикл приёма соединений до отмены `shutdown`, затем ожидание
    /// завершения открытых сессий.
    pub async fn run(self) -> ChatResult<()> {
        info!(addr = %self.local_addr()?, max_connections = self.config.max_connections, "Chat server listening");

        loop {
            select! {
                biased;

                _ = self.shutdown.cancelled() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((socket, addr)) => self.accept(socket, addr),
                    Err(e) if is_transient_accept_error(&e) => {
                        debug!(error = %e, "Transient accept error");
                    }
                    Err(e) => {
                        // Например, исчерпаны файловые дескрипторы.
                        error!(error = %e, "Accept failed");
                        sleep(Duration::from_millis(100)).await;
                    }
                },
            }
        }

        info!(active = self.active_sessions(), "Chat server stopping");
        self.drain().await;
        Ok(())
    }

    fn accept(
        &self,
        socket: TcpStream,
        addr: SocketAddr,
    ) {
        let permit = match Arc::clone(&self.connections).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let err = SessionError::TooManyConnections {
                    limit: self.config.max_connections,
                };
                warn!(%addr, error = %err, "Connection refused");
                tokio::spawn(refuse(socket, err, self.config.session.write_timeout));
                return;
            }
        };

        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(session = id, %addr, "Connection accepted");

        let session = ChatSession::new(
            id,
            addr,
            self.broker.clone(),
            Arc::clone(&self.history),
            self.config.session.clone(),
            self.shutdown.child_token(),
        );
        tokio::spawn(serve(session, socket, permit, id));
    }

    /// Ждёт, пока все сессии вернут свои разрешения.
    async fn drain(&self) {
        let all = u32::try_from(self.config.max_connections).unwrap_or(u32::MAX);
        match timeout(self.config.shutdown_grace, self.connections.acquire_many(all)).await {
            Ok(_) => info!("All sessions closed"),
            Err(_) => warn!(
                active = self.active_sessions(),
                "Shutdown grace period elapsed with sessions still open"
            ),
        }
    }
}

async fn serve(
    session: ChatSession,
    socket: TcpStream,
    _permit: OwnedSemaphorePermit,
    id: u64,
) {
    match session.run(socket).await {
        Ok(end) => debug!(session = id, ?end, "Connection closed"),
        Err(err) => error!(session = id, error = %err, "Connection closed with error"),
    }
}

async fn refuse(
    mut socket: TcpStream,
    err: SessionError,
    write_timeout: Duration,
) {
    let reply = format!("-ERR {}\r\n", err.client_message());
    let _ = timeout(write_timeout, socket.write_all(reply.as_bytes())).await;
    let _ = socket.shutdown().await;
}

fn is_transient_accept_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted
    )
}
