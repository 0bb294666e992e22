use std::{path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{broker::BrokerConfig, error::ConfigError, logging::LoggingConfig};

/// Файл настроек, который читается из рабочего каталога, если существует.
pub const DEFAULT_CONFIG_FILE: &str = "chatcore.toml";

/// Настройки брокера.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Ёмкость общей входящей очереди.
    pub queue_capacity: usize,
    /// Ёмкость личного канала доставки каждой сессии.
    pub user_channel_capacity: usize,
}

/// Настройки журнала истории.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Предел числа записей; `None` означает без ограничения.
    pub max_entries: Option<usize>,
}

/// Настройки сетевого фронтенда. Таймауты в секундах.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub max_connections: usize,
    pub handshake_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Максимальная длина строки команды в байтах.
    pub max_line_length: usize,
}

/// Конфигурация процесса.
///
/// Источники по возрастанию приоритета: значения по умолчанию, файл
/// `chatcore.toml`, переменные окружения `CHATCORE_*` (вложенные ключи
/// через `__`, например `CHATCORE_BROKER__QUEUE_CAPACITY=500`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_address: String,
    pub broker: BrokerSettings,
    pub history: HistorySettings,
    pub network: NetworkSettings,
    pub logging: LoggingConfig,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: crate::broker::DEFAULT_QUEUE_CAPACITY,
            user_channel_capacity: 32,
        }
    }
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            handshake_timeout_secs: 10,
            write_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_line_length: 4096,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:7878".to_string(),
            broker: BrokerSettings::default(),
            history: HistorySettings::default(),
            network: NetworkSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Загружает настройки из `chatcore.toml` (если есть) и окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Как [`Settings::load`], но с явным путём к файлу.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            // Переменные окружения с префиксом CHATCORE_
            .add_source(
                Environment::with_prefix("CHATCORE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // Поля, которых нет ни в одном источнике, берутся из Default.
        let settings: Self = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::invalid("listen_address", "must not be empty"));
        }
        if self.broker.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "broker.queue_capacity",
                "must be greater than zero",
            ));
        }
        if self.broker.user_channel_capacity == 0 {
            return Err(ConfigError::invalid(
                "broker.user_channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.network.max_connections == 0 {
            return Err(ConfigError::invalid(
                "network.max_connections",
                "must be greater than zero",
            ));
        }
        if self.network.max_line_length == 0 {
            return Err(ConfigError::invalid(
                "network.max_line_length",
                "must be greater than zero",
            ));
        }
        self.logging.validate()
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            queue_capacity: self.broker.queue_capacity,
        }
    }
}

impl NetworkSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::{env, fs};

    use serial_test::serial;

    use super::*;

    fn missing_file() -> std::path::PathBuf {
        std::path::PathBuf::from("definitely-not-here.toml")
    }

    /// Тест проверяет значения по умолчанию без файла и окружения.
    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::load_from(&missing_file()).unwrap();
        assert_eq!(settings.listen_address, "127.0.0.1:7878");
        assert_eq!(settings.broker.queue_capacity, 100);
        assert_eq!(settings.broker.user_channel_capacity, 32);
        assert_eq!(settings.history.max_entries, None);
        assert_eq!(settings.network.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(settings.broker_config().queue_capacity, 100);
    }

    /// Тест проверяет чтение TOML-файла.
    #[test]
    #[serial]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chatcore.toml");
        fs::write(
            &path,
            r#"
listen_address = "0.0.0.0:9000"

[broker]
queue_capacity = 8

[history]
max_entries = 50

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.listen_address, "0.0.0.0:9000");
        assert_eq!(settings.broker.queue_capacity, 8);
        assert_eq!(settings.broker.user_channel_capacity, 32);
        assert_eq!(settings.history.max_entries, Some(50));
        assert_eq!(settings.logging.level, "debug");
    }

    /// Тест проверяет переопределение вложенного ключа из окружения.
    #[test]
    #[serial]
    fn test_env_override_nested_key() {
        env::set_var("CHATCORE_BROKER__QUEUE_CAPACITY", "500");
        let result = Settings::load_from(&missing_file());
        env::remove_var("CHATCORE_BROKER__QUEUE_CAPACITY");

        assert_eq!(result.unwrap().broker.queue_capacity, 500);
    }

    /// Тест проверяет отказ при нулевой ёмкости очереди.
    #[test]
    #[serial]
    fn test_zero_capacity_rejected() {
        env::set_var("CHATCORE_BROKER__QUEUE_CAPACITY", "0");
        let result = Settings::load_from(&missing_file());
        env::remove_var("CHATCORE_BROKER__QUEUE_CAPACITY");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("broker.queue_capacity"));
    }
}
