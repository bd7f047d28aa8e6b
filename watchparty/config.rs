use crate::error::App;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// `<state>;<time>` text frames.
    #[default]
    Text,
    /// Typed JSON room updates.
    Room,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PlayerOptions {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            password: String::new(),
            poll_interval_ms: 500,
            request_timeout_ms: 3000,
        }
    }
}

impl PlayerOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct Options {
    pub server_address: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default = "default_room_name")]
    pub room_name: String,
    #[serde(default = "default_content_path")]
    pub content_path: String,
    #[serde(default)]
    pub player: PlayerOptions,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_to_stderr: bool,
}

fn default_room_name() -> String {
    "party".to_string()
}

fn default_content_path() -> String {
    "/magnet".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Options {
    pub async fn load_from_file(file_path: &Path) -> Result<Self, App> {
        let content = tokio::fs::read_to_string(file_path).await.map_err(|e| {
            App::Config(format!("Failed to read {}: {e}", file_path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, App> {
        let options: Options = toml::from_str(content)?;
        if options.server_address.trim().is_empty() {
            return Err(App::Config("server_address must not be empty".to_string()));
        }
        if options.player.poll_interval_ms == 0 {
            return Err(App::Config("player.poll_interval_ms must be positive".to_string()));
        }
        if options.player.request_timeout_ms == 0 {
            return Err(App::Config("player.request_timeout_ms must be positive".to_string()));
        }
        Ok(options)
    }
}
