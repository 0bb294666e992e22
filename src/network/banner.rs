use std::env;

use atty::Stream;
use chrono::{DateTime, Local};
use owo_colors::OwoColorize;

use crate::config::Settings;

/// Полный баннер с информацией о сервере.
pub const ASCII_FULL: &str = r#"
    chatcore {version}
    ----------------------------------------------
    Mode:             {mode}
    Listening:        {listen}
    Queue capacity:   {queue}
    User channel:     {channel}
    Max connections:  {max_conn}
    History limit:    {history}
    PID:              {pid}
    Host:             {host}
    OS/Arch:          {os}/{arch}
    CPU(s):           {cpus}
    Build:            {git} ({build_time})
"#;

/// Компактный баннер для вывода.
pub const ASCII_COMPACT: &str = "\nchatcore {version} | {mode} | {listen} | PID {pid}\n";

/// Вывод баннера сервера с информацией о конфигурации.
///
/// Режим задаётся `CHATCORE_BANNER=full|compact|off`; по умолчанию полный
/// в debug-сборке и компактный в release.
pub fn print_banner(settings: &Settings) {
    let forced = env::var("CHATCORE_BANNER").ok();
    let full = match forced.as_deref() {
        Some("off") => return,
        Some("full") => true,
        Some("compact") => false,
        _ => cfg!(debug_assertions),
    };

    let text = if full {
        render_full(settings)
    } else {
        render_compact(settings)
    };

    if atty::is(Stream::Stdout) {
        let mut lines = text.lines();
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                println!();
                continue;
            }
            println!("{}", line.bold().bright_blue());
            break;
        }
        for line in lines {
            if line.trim_start().starts_with("Build:") {
                println!("{}", line.dimmed());
            } else {
                println!("{line}");
            }
        }
    } else {
        println!("{text}");
    }
    println!();
}

fn mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn version() -> String {
    // добавляем разрядность (32/64-bit) к версии
    let bits = std::mem::size_of::<usize>() * 8;
    format!("{} ({bits}-bit)", env!("CARGO_PKG_VERSION"))
}

/// Полный баннер как строка.
pub fn render_full(settings: &Settings) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".into());
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let history = settings
        .history
        .max_entries
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unbounded".into());

    // Git и время сборки
    let git = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let build_time_raw = option_env!("BUILD_TIME").unwrap_or("unknown");
    let build_time = match DateTime::parse_from_rfc3339(build_time_raw) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%d.%m.%Y %H:%M:%S")
            .to_string(),
        Err(_) => build_time_raw.to_string(),
    };

    ASCII_FULL
        .replace("{version}", &version())
        .replace("{mode}", mode())
        .replace("{listen}", &settings.listen_address)
        .replace("{queue}", &settings.broker.queue_capacity.to_string())
        .replace("{channel}", &settings.broker.user_channel_capacity.to_string())
        .replace("{max_conn}", &settings.network.max_connections.to_string())
        .replace("{history}", &history)
        .replace("{pid}", &std::process::id().to_string())
        .replace("{host}", &host)
        .replace("{os}", env::consts::OS)
        .replace("{arch}", env::consts::ARCH)
        .replace("{cpus}", &cpus.to_string())
        .replace("{git}", git)
        .replace("{build_time}", &build_time)
}

/// Компактный баннер как строка.
pub fn render_compact(settings: &Settings) -> String {
    ASCII_COMPACT
        .replace("{version}", &version())
        .replace("{mode}", mode())
        .replace("{listen}", &settings.listen_address)
        .replace("{pid}", &std::process::id().to_string())
}

/// Строка готовности с точностью до миллисекунд.
pub fn print_startup_log() {
    let pid = std::process::id();
    let ts = Local::now().format("%d %b %Y %H:%M:%S%.3f");

    if atty::is(Stream::Stdout) {
        println!(
            "[{}] {} {}",
            pid.to_string().red(),
            ts.to_string().white(),
            "* Ready to accept connections".green()
        );
    } else {
        println!("[{pid}] {ts} * Ready to accept connections");
    }
}
