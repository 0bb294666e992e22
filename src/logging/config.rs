use std::{collections::BTreeMap, env, fs, io, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Формат вывода событий.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::invalid(
                "logging.format",
                format!("unknown format '{other}'"),
            )),
        }
    }
}

/// Настройки консольного вывода.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    /// Переопределяет общий `format` для консоли.
    pub format: Option<LogFormat>,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// Настройки файлового вывода (ежедневная ротация).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub enabled: bool,
    /// Переопределяет общий `format` для файла.
    pub format: Option<LogFormat>,
    /// Префикс имени файла; к нему добавляется дата.
    pub filename: String,
}

/// Конфигурация логирования.
///
/// Читается из секции `logging` настроек; отдельные поля можно
/// переопределить переменными `CHATCORE_LOG_LEVEL`, `CHATCORE_LOG_FORMAT`
/// и `CHATCORE_LOG_DIR`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень: `trace`, `debug`, `info`, `warn`, `error`.
    pub level: String,
    pub format: LogFormat,
    pub log_dir: PathBuf,
    pub console_enabled: bool,
    pub file_enabled: bool,
    pub console: ConsoleConfig,
    pub file: FileConfig,
    /// Уровни для отдельных модулей, например `chatcore::broker = "trace"`.
    pub module_levels: BTreeMap<String, String>,
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: None,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: Some(LogFormat::Json),
            filename: "chatcore.log".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            log_dir: PathBuf::from("logs"),
            console_enabled: true,
            file_enabled: false,
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
            module_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Применяет короткие переменные окружения поверх конфигурации.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("CHATCORE_LOG_LEVEL") {
            self.level = level;
        }
        if let Some(format) = env::var("CHATCORE_LOG_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
        {
            self.format = format;
        }
        if let Ok(dir) = env::var("CHATCORE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_level("logging.level", &self.level)?;
        for level in self.module_levels.values() {
            validate_level("logging.module_levels", level)?;
        }
        if self.file_enabled && self.file.filename.trim().is_empty() {
            return Err(ConfigError::invalid(
                "logging.file.filename",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Создаёт каталог логов, если включён файловый вывод.
    pub fn ensure_log_dir(&self) -> io::Result<()> {
        if self.file_active() {
            fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Директива для `EnvFilter`: базовый уровень плюс уровни модулей.
    pub fn build_filter_directive(&self) -> String {
        let mut directive = self.level.to_ascii_lowercase();
        for (module, level) in &self.module_levels {
            directive.push(',');
            directive.push_str(module);
            directive.push('=');
            directive.push_str(&level.to_ascii_lowercase());
        }
        directive
    }

    pub fn console_active(&self) -> bool {
        self.console_enabled && self.console.enabled
    }

    pub fn file_active(&self) -> bool {
        self.file_enabled && self.file.enabled
    }

    pub fn console_format(&self) -> LogFormat {
        self.console.format.unwrap_or(self.format)
    }

    pub fn file_format(&self) -> LogFormat {
        self.file.format.unwrap_or(self.format)
    }
}

fn validate_level(
    key: &'static str,
    level: &str,
) -> Result<(), ConfigError> {
    let normalized = level.to_ascii_lowercase();
    if LEVELS.contains(&normalized.as_str()) || normalized == "off" {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("unknown level '{level}'")))
    }
}
