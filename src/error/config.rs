use std::any::Any;

use chatcore_error::{ErrorExt, StatusCode};
use thiserror::Error;

/// Ошибки загрузки и проверки конфигурации.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(
        key: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key,
            reason: reason.into(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn status_code(&self) -> StatusCode {
        StatusCode::Config
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        self.to_string()
    }
}
