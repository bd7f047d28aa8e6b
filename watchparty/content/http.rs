use crate::config::Options;
use crate::content::{acquisition, percent, Acquire, Progress};
use crate::error::App;
use async_trait::async_trait;
use futures_util::StreamExt;
use log::info;
use reqwest::{Client, Url};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Fetches the content identifier from the relay and downloads http(s) content.
pub struct HttpAcquirer {
    client: Client,
    identity_url: String,
    progress: Progress,
}

/// Last path segment of the URL, or `content` when there is no usable one.
pub(crate) fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map_or_else(|| "content".to_string(), str::to_string)
}

impl HttpAcquirer {
    pub fn new(options: &Options, progress: Progress) -> Self {
        Self {
            client: Client::new(),
            identity_url: format!("http://{}{}", options.server_address, options.content_path),
            progress,
        }
    }
}

#[async_trait]
impl Acquire for HttpAcquirer {
    async fn identify(&self) -> Result<String, App> {
        let response = self
            .client
            .get(&self.identity_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(acquisition("Error fetching content identifier"))?;
        let identifier = response
            .text()
            .await
            .map_err(acquisition("Error reading content identifier"))?;
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(App::Acquisition("Relay returned an empty identifier".to_string()));
        }
        info!("Content identifier: {identifier}");
        Ok(identifier.to_string())
    }

    async fn download(&self, identifier: &str, dir: &Path) -> Result<PathBuf, App> {
        let url = Url::parse(identifier).map_err(acquisition("Invalid identifier"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(App::Acquisition(format!(
                "Unsupported identifier scheme: {}",
                url.scheme()
            )));
        }
        let name = file_name(&url);
        let path = dir.join(&name);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(acquisition("Error requesting content"))?;
        let total = response.content_length();

        if let (Some(total), Ok(metadata)) = (total, fs::metadata(&path).await) {
            if metadata.len() == total {
                info!("Content already downloaded: {}", path.display());
                self.progress.set(100);
                return Ok(path);
            }
        }

        info!("Begin downloading {name}");
        let mut file = fs::File::create(&path)
            .await
            .map_err(acquisition("Error creating file"))?;
        let mut body = response.bytes_stream();
        let mut completed: u64 = 0;
        let mut reported = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(acquisition("Error while downloading"))?;
            file.write_all(&chunk)
                .await
                .map_err(acquisition("Error writing file"))?;
            completed += chunk.len() as u64;
            let current = percent(completed, total.unwrap_or(0));
            if current != reported {
                reported = current;
                info!(
                    "{name}, {}MB / {}MB [{current}%]",
                    completed / 1024 / 1024,
                    total.unwrap_or(0) / 1024 / 1024
                );
                self.progress.set(current);
            }
        }
        file.flush().await.map_err(acquisition("Error writing file"))?;

        info!("Content downloaded: {}", path.display());
        self.progress.set(100);
        Ok(path)
    }
}
