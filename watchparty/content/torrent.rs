use crate::content::{acquisition, percent, Progress};
use crate::error::App;
use librqbit::{AddTorrent, AddTorrentOptions, ManagedTorrentHandle, Session};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Downloads magnet links into the session directory.
pub struct TorrentAcquirer {
    progress: Progress,
}

impl TorrentAcquirer {
    pub fn new(progress: Progress) -> Self {
        Self { progress }
    }

    /// Fetches the whole torrent and returns the path of its first file.
    pub async fn download(&self, magnet: &str, dir: &Path) -> Result<PathBuf, App> {
        let session = Session::new(dir.to_path_buf())
            .await
            .map_err(acquisition("Torrent client creation error"))?;
        let result = self.fetch(&session, magnet, dir).await;
        session.stop().await;
        result
    }

    async fn fetch(&self, session: &Session, magnet: &str, dir: &Path) -> Result<PathBuf, App> {
        let options = AddTorrentOptions {
            output_folder: Some(dir.to_string_lossy().into_owned()),
            overwrite: true,
            ..Default::default()
        };
        let handle = session
            .add_torrent(AddTorrent::from_url(magnet), Some(options))
            .await
            .map_err(acquisition("Add magnet error"))?
            .into_handle()
            .ok_or_else(|| App::Acquisition("Torrent was not added".to_string()))?;

        info!("Getting torrent info");
        handle
            .wait_until_initialized()
            .await
            .map_err(acquisition("Torrent info error"))?;
        let path = first_file(&handle)?;
        info!("Got torrent info, playing {}", path.display());

        if handle.stats().finished {
            info!("Torrent already downloaded");
            self.progress.set(100);
            return Ok(path);
        }

        info!("Begin downloading");
        let completed = handle.wait_until_completed();
        tokio::pin!(completed);
        let mut ticker = time::interval(REPORT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                result = &mut completed => {
                    result.map_err(acquisition("Error while downloading torrent"))?;
                    break;
                }
                _ = ticker.tick() => {
                    let stats = handle.stats();
                    self.report(&path, stats.progress_bytes, stats.total_bytes);
                }
            }
        }

        info!("Torrent downloaded");
        self.progress.set(100);
        Ok(path)
    }

    fn report(&self, path: &Path, completed: u64, total: u64) {
        let current = percent(completed, total);
        info!(
            "{}, {}MB / {}MB [{current}%]",
            path.display(),
            completed / 1024 / 1024,
            total / 1024 / 1024
        );
        self.progress.set(current);
    }
}

fn first_file(handle: &ManagedTorrentHandle) -> Result<PathBuf, App> {
    let info = handle.info();
    let (name, _length) = info
        .info
        .iter_filenames_and_lengths()
        .map_err(acquisition("Torrent info error"))?
        .next()
        .ok_or_else(|| App::Acquisition("Torrent has no files".to_string()))?;
    let relative = name.to_pathbuf().map_err(acquisition("Bad file name in torrent"))?;
    if relative.is_absolute() {
        warn!("Torrent file path is absolute: {}", relative.display());
        return Err(App::Acquisition("Torrent file path escapes the folder".to_string()));
    }
    Ok(info.out_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_tracks_completed_over_total() {
        let progress = Progress::default();
        let acquirer = TorrentAcquirer::new(progress.clone());
        let path = Path::new("/srv/party/movie.mkv");

        acquirer.report(path, 0, 0);
        assert_eq!(progress.get(), 0);
        acquirer.report(path, 512 * 1024 * 1024, 2048 * 1024 * 1024);
        assert_eq!(progress.get(), 25);
        acquirer.report(path, 10, 10);
        assert_eq!(progress.get(), 100);
    }
}
