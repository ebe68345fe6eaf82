use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "recorder-server", about = "Запись телеметрии из pub/sub topic'ов")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Запустить сервер
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug)]
pub struct ServeArgs {
    /// Путь к TOML конфиг файлу (если файла нет — значения по умолчанию)
    #[arg(long, default_value = "recorder.toml", env = "CONFIG_PATH")]
    pub config: String,
}

// ---- TOML Config ----

/// Конфигурация процесса. Читается один раз при старте; живая часть
/// настроек — только документ модели в `{home}/streamer/model.json`.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Корневая директория данных.
    #[serde(default = "default_home")]
    pub home: PathBuf,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Пауза между sweep'ами retention, мс.
    #[serde(default = "default_retention_interval_ms")]
    pub retention_interval_ms: u64,
    /// Окно схлопывания событий watcher'а модели, мс.
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

#[derive(Debug, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Пауза перед повторным poll'ом после ошибки соединения, мс.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

fn default_home() -> PathBuf {
    PathBuf::from("./var")
}
fn default_api_port() -> u16 {
    5080
}
fn default_retention_interval_ms() -> u64 {
    1000
}
fn default_watch_debounce_ms() -> u64 {
    200
}
fn default_mqtt_host() -> String {
    "localhost".into()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "recorder".into()
}
fn default_keep_alive_secs() -> u64 {
    30
}
fn default_reconnect_delay_ms() -> u64 {
    1000
}

impl ServerConfig {
    /// Загрузить конфиг. Отсутствующий файл — не ошибка, берутся значения по умолчанию.
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(config = %path, "config file not found, using defaults");
                String::new()
            }
            Err(e) => {
                return Err(ServerError::Config { context: "read", detail: format!("'{path}': {e}") });
            }
        };
        Self::parse(&content)
            .map_err(|detail| ServerError::Config { context: "parse", detail: format!("'{path}': {detail}") })
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_millis(self.retention_interval_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }
}
