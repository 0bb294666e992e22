use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления жизненным циклом логирования.
///
/// Держит `WorkerGuard` файлового вывода: пока handle жив, фоновый поток
/// записи работает.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
    shutdown_started: AtomicBool,
    /// Порог, после которого долгий flush при shutdown попадает в stderr.
    flush_timeout: Duration,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self {
            file_guard,
            shutdown_started: AtomicBool::new(false),
            flush_timeout: Duration::from_secs(5),
        }
    }

    pub fn with_flush_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.flush_timeout = timeout;
        self
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    pub fn is_shutdown_in_progress(&self) -> bool {
        self.shutdown_started.load(Ordering::Acquire)
    }

    /// Сбрасывает буферы и останавливает фоновую запись.
    pub fn shutdown(mut self) {
        self.shutdown_started.store(true, Ordering::Release);
        tracing::info!(
            file_sink = self.file_guard.is_some(),
            "Initiating logging shutdown"
        );

        let start = Instant::now();
        drop(self.file_guard.take());
        let elapsed = start.elapsed();

        // После drop guard-а файловый вывод уже закрыт, остаётся stderr.
        if elapsed > self.flush_timeout {
            eprintln!(
                "WARNING: logging shutdown took {}ms (timeout: {}ms)",
                elapsed.as_millis(),
                self.flush_timeout.as_millis()
            );
        }
    }
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if self.file_guard.is_some() && !self.is_shutdown_in_progress() {
            eprintln!(
                "WARNING: LoggingHandle dropped without explicit shutdown(). \
                 Some logs may be lost."
            );
        }
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.file_guard.is_some())
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_without_file_sink() {
        let handle = LoggingHandle::new(None).with_flush_timeout(Duration::from_millis(10));
        assert!(!handle.has_file_sink());
        assert!(!handle.is_shutdown_in_progress());
        handle.shutdown();
    }

    /// Тест проверяет, что shutdown отпускает guard файлового вывода.
    #[test]
    fn test_shutdown_releases_guard() {
        let (_writer, guard) = tracing_appender::non_blocking(std::io::sink());
        let handle = LoggingHandle::new(Some(guard));
        assert!(handle.has_file_sink());
        handle.shutdown();
    }
}
