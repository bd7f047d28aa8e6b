pub mod http;
pub mod torrent;

use crate::config::Options;
use crate::error::App;
use async_trait::async_trait;
use reqwest::Url;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub use http::HttpAcquirer;
pub use torrent::TorrentAcquirer;

/// Download progress in percent, shared between the acquirer and the control surface.
#[derive(Clone, Default, Debug)]
pub struct Progress(Arc<AtomicU8>);

impl Progress {
    pub fn set(&self, percent: u8) {
        self.0.store(percent.min(100), Ordering::SeqCst);
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst)
    }
}

/// `completed * 100 / total`, or 0 while the total is unknown.
pub fn percent(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(completed) * 100 / u128::from(total);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// Resolves the room's content to a local file.
#[async_trait]
pub trait Acquire: Send + Sync {
    /// Asks the relay what the room is watching.
    async fn identify(&self) -> Result<String, App>;

    async fn download(&self, identifier: &str, dir: &Path) -> Result<PathBuf, App>;
}

pub(crate) fn acquisition<E: Display>(context: &str) -> impl FnOnce(E) -> App + '_ {
    move |e| App::Acquisition(format!("{context}: {e}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Http,
    Magnet,
}

impl Source {
    pub fn of(identifier: &str) -> Result<Self, App> {
        let url = Url::parse(identifier).map_err(acquisition("Invalid identifier"))?;
        match url.scheme() {
            "http" | "https" => Ok(Source::Http),
            "magnet" => Ok(Source::Magnet),
            other => Err(App::Acquisition(format!(
                "Unsupported identifier scheme: {other}"
            ))),
        }
    }
}

/// Asks the relay for the identifier, then downloads it with the matching backend.
pub struct ContentAcquirer {
    http: HttpAcquirer,
    torrent: TorrentAcquirer,
}

impl ContentAcquirer {
    pub fn new(options: &Options, progress: Progress) -> Self {
        Self {
            http: HttpAcquirer::new(options, progress.clone()),
            torrent: TorrentAcquirer::new(progress),
        }
    }
}

#[async_trait]
impl Acquire for ContentAcquirer {
    async fn identify(&self) -> Result<String, App> {
        self.http.identify().await
    }

    async fn download(&self, identifier: &str, dir: &Path) -> Result<PathBuf, App> {
        match Source::of(identifier)? {
            Source::Http => self.http.download(identifier, dir).await,
            Source::Magnet => self.torrent.download(identifier, dir).await,
        }
    }
}
