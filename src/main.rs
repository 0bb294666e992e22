use std::sync::Arc;

use anyhow::Context;
use chatcore::{
    history::{InMemoryHistory, MessageHistory},
    logging::init_logging,
    network::{
        banner::{print_banner, print_startup_log},
        ChatServer, ServerConfig,
    },
    Broker, Settings,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    let logging = init_logging(settings.logging.clone())
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    print_banner(&settings);

    let shutdown = CancellationToken::new();
    let broker = Broker::with_config(&shutdown, settings.broker_config());
    broker.run();
    broker.wait().await;

    let history: Arc<dyn MessageHistory> = match settings.history.max_entries {
        Some(limit) => Arc::new(InMemoryHistory::with_max_entries(limit)),
        None => Arc::new(InMemoryHistory::new()),
    };

    let server = ChatServer::bind(
        &settings.listen_address,
        broker.clone(),
        history,
        ServerConfig::from(&settings),
        shutdown.clone(),
    )
    .await
    .context("failed to start chat server")?;

    print_startup_log();
    let server_task = tokio::spawn(server.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "Chat server stopped with error"),
        Err(e) => error!(error = %e, "Chat server task failed"),
    }
    broker.closed().await;

    let stats = broker.stats();
    info!(
        published = stats.published,
        delivered = stats.delivered,
        dropped = stats.dropped(),
        "Broker stopped"
    );

    logging.shutdown();
    Ok(())
}
