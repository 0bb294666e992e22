use std::io::{self, Stdout};

use tracing_subscriber::{layer::Layer as LayerTrait, registry::LookupSpan};

use crate::logging::{
    config::LoggingConfig,
    formatter::{self, LayerOptions},
};

/// Консольный слой с учётом конфигурации.
///
/// ANSI-цвета отключаются, если stdout не терминал.
pub fn layer_with_config<S>(config: &LoggingConfig) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let mut options = LayerOptions::from(&config.console);
    options.ansi = options.ansi && atty::is(atty::Stream::Stdout);

    let writer: fn() -> Stdout = io::stdout;
    formatter::build_layer(config.console_format(), writer, options)
}

#[cfg(test)]
mod tests {
    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;
    use crate::logging::config::{ConsoleConfig, LogFormat};

    /// Тест проверяет, что слой строится для всех форматов и логирование
    /// через него не паникует.
    #[test]
    fn test_layer_for_every_format() {
        for format in [LogFormat::Compact, LogFormat::Pretty, LogFormat::Json] {
            let cfg = LoggingConfig {
                format,
                console: ConsoleConfig {
                    with_ansi: false,
                    ..Default::default()
                },
                ..Default::default()
            };
            let subscriber = Registry::default().with(layer_with_config::<Registry>(&cfg));
            tracing::subscriber::with_default(subscriber, || {
                info!(?format, "console layer smoke test");
            });
        }
    }
}
