use std::io;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, LayerOptions},
};

/// Файловый слой: ежедневная ротация, неблокирующая запись.
///
/// `WorkerGuard` нужно держать до завершения процесса, иначе хвост
/// буфера потеряется.
pub fn layer_with_config<S>(
    config: &LoggingConfig
) -> io::Result<(Box<dyn LayerTrait<S> + Send + Sync>, WorkerGuard)>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    std::fs::create_dir_all(&config.log_dir)?;
    let appender = rolling::daily(&config.log_dir, &config.file.filename);
    let (writer, guard) = non_blocking(appender);

    let options = LayerOptions {
        ansi: false,
        ..LayerOptions::from(&config.console)
    };
    let layer = formatter::build_layer(config.file_format(), writer, options);
    Ok((layer, guard))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Тест проверяет, что события попадают в файл в каталоге логов.
    #[test]
    fn test_file_layer_writes_to_log_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            log_dir: tmp.path().to_path_buf(),
            file_enabled: true,
            ..Default::default()
        };

        let (layer, guard) = layer_with_config::<Registry>(&cfg).unwrap();
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(user = "alice", "file sink smoke test");
        });
        drop(guard);

        let written: String = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("chatcore.log"))
            .map(|e| std::fs::read_to_string(e.path()).unwrap())
            .collect();
        assert!(written.contains("file sink smoke test"));
    }
}
