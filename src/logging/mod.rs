//! Логирование на `tracing`.
//!
//! - `config`: [`LoggingConfig`], формат, уровни и каналы вывода.
//! - `filters`: `EnvFilter` из `RUST_LOG` или конфигурации.
//! - `formatter`: fmt-слои compact/pretty/json.
//! - `sinks`: консольный и файловый (ежедневная ротация) выводы.
//! - `handle`: [`LoggingHandle`] для корректного завершения.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
pub mod sinks;

pub use config::{ConsoleConfig, FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Инициализация логирования с конфигурацией.
///
/// Устанавливает глобальный подписчик, поэтому вызывается один раз на
/// процесс. Возвращённый handle нужно держать до выхода и завершить через
/// [`LoggingHandle::shutdown`].
pub fn init_logging(
    mut config: LoggingConfig
) -> Result<LoggingHandle, Box<dyn std::error::Error + Send + Sync>> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_active() {
        layers.push(sinks::console::layer_with_config(&config));
    }

    let file_guard = if config.file_active() {
        let (file_layer, guard) = sinks::file::layer_with_config(&config)?;
        layers.push(file_layer);
        Some(guard)
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        log_dir = %config.log_dir.display(),
        console_enabled = config.console_active(),
        file_enabled = config.file_active(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
