pub mod controller;
#[cfg(test)]
pub mod fake;
pub mod state;
pub mod vlc;

use crate::error::App;
use async_trait::async_trait;
use std::path::Path;

pub use controller::Player;
pub use state::{Origin, PlaybackState, StatusEvent};
pub use vlc::Vlc;

/// Status as reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub time: u64,
    pub state: PlaybackState,
}

/// Request/response control surface of a media player.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn enqueue(&self, path: &Path) -> Result<(), App>;
    async fn clear(&self) -> Result<(), App>;
    async fn play(&self) -> Result<Status, App>;
    async fn pause(&self) -> Result<Status, App>;
    async fn seek(&self, position: u64) -> Result<(), App>;
    async fn status(&self) -> Result<Status, App>;
}
