use std::{fmt, panic::Location, sync::Arc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, LogLevel, StatusCode};

/// Ошибка с цепочкой контекстов.
///
/// Контекст добавляется по мере того, как ошибка поднимается от места
/// возникновения (например, `MessageHistory::get`) к обработчику сессии.
#[derive(Clone)]
pub struct StackError {
    inner: Arc<dyn ErrorExt>,
    contexts: Arc<Vec<ErrorContext>>,
}

/// Один кадр контекста и место, где он был добавлен.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub message: String,
    pub location: Option<&'static Location<'static>>,
}

/// Ошибка в виде, пригодном для JSON-ответа.
#[cfg(feature = "serde")]
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            inner: Arc::new(err),
            contexts: Arc::new(Vec::new()),
        }
    }

    /// Добавляет контекст к ошибке.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        let mut contexts = (*self.contexts).clone();
        contexts.push(ErrorContext {
            message: msg.into(),
            location: Some(Location::caller()),
        });
        self.contexts = Arc::new(contexts);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.inner.status_code()
    }

    pub fn client_message(&self) -> String {
        self.inner.client_message()
    }

    /// Корневая ошибка.
    pub fn root(&self) -> &dyn ErrorExt {
        self.inner.as_ref()
    }

    pub fn contexts(&self) -> &[ErrorContext] {
        &self.contexts
    }

    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        self.inner.metrics_tags()
    }

    /// Попытка downcast к конкретному типу ошибки.
    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }

    pub fn log_level(&self) -> LogLevel {
        self.status_code().log_level()
    }

    #[cfg(feature = "serde")]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.status_code().code(),
            message: self.client_message(),
            #[cfg(debug_assertions)]
            contexts: Some(self.format_contexts()),
            #[cfg(not(debug_assertions))]
            contexts: None,
        }
    }

    fn format_contexts(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|ctx| match ctx.location {
                Some(loc) => format!("{} ({}:{})", ctx.message, loc.file(), loc.line()),
                None => ctx.message.clone(),
            })
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut debug = f.debug_struct("StackError");
        debug.field("inner", &self.inner.to_string());
        debug.field("status_code", &self.status_code());
        if !self.contexts.is_empty() {
            debug.field("contexts", &self.format_contexts());
        }
        debug.finish()
    }
}

impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.contexts.is_empty() {
            return write!(f, "{}", self.inner);
        }
        let contexts: Vec<&str> = self.contexts.iter().map(|c| c.message.as_str()).collect();
        write!(f, "{}: {}", contexts.join(" → "), self.inner)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
