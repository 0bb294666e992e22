use std::{any::Any, error::Error};

use crate::StatusCode;

/// Общий интерфейс ошибок chatcore (object-safe).
///
/// Даёт каждой ошибке числовой статус, безопасный текст для строкового
/// протокола (`-ERR ...`) и теги для логов.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Статус ошибки. По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Ошибка как [`Any`] для downcast к конкретному типу.
    fn as_any(&self) -> &dyn Any;

    /// Сообщение, которое можно отправить клиенту в ответе `-ERR`.
    ///
    /// Для внутренних ошибок детали не раскрываются.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Подробное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Пары ключ–значение для структурированных логов.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки (без пути модулей).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct Opaque;

    impl fmt::Display for Opaque {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "secret detail")
        }
    }

    impl Error for Opaque {}

    impl ErrorExt for Opaque {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct Missing(&'static str);

    impl fmt::Display for Missing {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "missing: {}", self.0)
        }
    }

    impl Error for Missing {}

    impl ErrorExt for Missing {
        fn status_code(&self) -> StatusCode {
            StatusCode::NotFound
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Тест проверяет, что внутренние ошибки не раскрывают детали клиенту.
    #[test]
    fn test_client_message_hides_internal() {
        let e = Opaque;
        assert_eq!(e.status_code(), StatusCode::Internal);
        assert_eq!(e.client_message(), "internal server error");
        assert!(e.log_message().contains("Opaque"));
    }

    /// Тест проверяет, что клиентские ошибки отдаются как `Display`.
    #[test]
    fn test_client_message_passes_display() {
        let e = Missing("alice");
        assert_eq!(e.client_message(), "missing: alice");
    }

    /// Тест проверяет теги и короткое имя типа.
    #[test]
    fn test_tags_and_type_name() {
        let e = Missing("x");
        assert!(e.type_name().ends_with("Missing"));
        let tags = e.metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "status_code" && v == &StatusCode::NotFound.to_string()));
        assert!(e.as_any().downcast_ref::<Missing>().is_some());
    }
}
