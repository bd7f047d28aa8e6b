use crate::config::Options;
use crate::content::{ContentAcquirer, Progress};
use crate::error::App;
use crate::player::Vlc;
use crate::session::{Outcome, Session};
use crate::signal::StopSignal;
use crate::sync;
use log::info;
use std::path::Path;
use std::sync::Arc;

/// Builds the collaborators for one session from the daemon's options and runs it.
pub struct Worker {
    options: Options,
    client_id: String,
    progress: Progress,
}

impl Worker {
    pub fn new(options: Options, client_id: String, progress: Progress) -> Self {
        Self {
            options,
            client_id,
            progress,
        }
    }

    pub async fn run(&self, download_dir: &Path, stop: StopSignal) -> Result<Outcome, App> {
        info!(
            "Session startup, client {}, directory {}",
            self.client_id,
            download_dir.display()
        );
        self.progress.set(0);

        let surface = Arc::new(Vlc::new(&self.options.player)?);
        let channel = sync::channel_for(&self.options, &self.client_id);
        let acquirer = Arc::new(ContentAcquirer::new(&self.options, self.progress.clone()));

        let mut session = Session::new(
            surface,
            channel,
            acquirer,
            self.options.player.poll_interval(),
        );
        let result = session.run(download_dir, stop).await;
        if let Some(content) = session.content() {
            info!("Session over for {} ({:?})", content.display(), session.phase());
        }
        result
    }
}
