use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer as LayerTrait,
    registry::LookupSpan,
};

use crate::logging::config::{ConsoleConfig, LogFormat};

/// Флаги оформления одного вывода.
#[derive(Debug, Clone, Copy)]
pub struct LayerOptions {
    pub ansi: bool,
    pub target: bool,
    pub thread_ids: bool,
    pub line_numbers: bool,
}

impl From<&ConsoleConfig> for LayerOptions {
    fn from(console: &ConsoleConfig) -> Self {
        Self {
            ansi: console.with_ansi,
            target: console.with_target,
            thread_ids: console.with_thread_ids,
            line_numbers: console.with_line_numbers,
        }
    }
}

/// Собирает fmt-слой нужного формата поверх произвольного writer.
///
/// Возвращаем boxed trait-объект, чтобы стереть конкретный тип формата
/// (json/pretty/compact).
pub fn build_layer<S, W>(
    format: LogFormat,
    writer: W,
    options: LayerOptions,
) -> Box<dyn LayerTrait<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => Box::new(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_writer(writer)
                .with_ansi(false)
                .with_target(options.target)
                .with_thread_ids(options.thread_ids)
                .with_line_number(options.line_numbers),
        ),
        LogFormat::Pretty => Box::new(
            fmt::layer()
                .pretty()
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(writer)
                .with_ansi(options.ansi)
                .with_target(options.target)
                .with_thread_ids(options.thread_ids)
                .with_line_number(options.line_numbers),
        ),
        LogFormat::Compact => Box::new(
            fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(options.ansi)
                .with_target(options.target)
                .with_thread_ids(options.thread_ids)
                .with_line_number(options.line_numbers),
        ),
    }
}
