use crate::config::PlayerOptions;
use crate::error::App;
use crate::player::{PlaybackState, Status, Surface};
use async_trait::async_trait;
use log::info;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::path::Path;

/// VLC driven through its `requests/status.json` HTTP interface.
pub struct Vlc {
    client: Client,
    endpoint: String,
    password: String,
}

#[derive(Deserialize)]
struct RawStatus {
    #[serde(default)]
    time: f64,
    #[serde(default)]
    state: String,
}

impl From<RawStatus> for Status {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from(raw: RawStatus) -> Self {
        let time = if raw.time.is_finite() && raw.time > 0.0 {
            raw.time as u64
        } else {
            0
        };
        Status {
            time,
            state: PlaybackState::from_name(&raw.state),
        }
    }
}

impl Vlc {
    pub fn new(options: &PlayerOptions) -> Result<Self, App> {
        let client = Client::builder()
            .timeout(options.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "http://{}:{}/requests/status.json",
                options.host, options.port
            ),
            password: options.password.clone(),
        })
    }

    async fn request(&self, query: &[(&str, &str)]) -> Result<Status, App> {
        let response = self
            .client
            .get(&self.endpoint)
            .basic_auth("", Some(&self.password))
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        let raw: RawStatus = response.json().await?;
        Ok(raw.into())
    }
}

#[async_trait]
impl Surface for Vlc {
    async fn enqueue(&self, path: &Path) -> Result<(), App> {
        let uri = Url::from_file_path(path)
            .map_err(|()| App::InvalidInput(format!("Not an absolute path: {}", path.display())))?;
        self.request(&[("command", "in_enqueue"), ("input", uri.as_str())])
            .await?;
        info!("File added to playlist: {}", path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), App> {
        self.request(&[("command", "pl_empty")]).await?;
        info!("Playlist cleared");
        Ok(())
    }

    async fn play(&self) -> Result<Status, App> {
        self.request(&[("command", "pl_play")]).await
    }

    async fn pause(&self) -> Result<Status, App> {
        self.request(&[("command", "pl_forcepause")]).await
    }

    async fn seek(&self, position: u64) -> Result<(), App> {
        let value = position.to_string();
        self.request(&[("command", "seek"), ("val", &value)]).await?;
        Ok(())
    }

    async fn status(&self) -> Result<Status, App> {
        self.request(&[]).await
    }
}
