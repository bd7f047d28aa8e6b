use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::{self, JoinHandle};
use zbus::{fdo, interface, ConnectionBuilder};

use crate::content::Progress;
use crate::error::App;
use crate::signal::{stop_pair, StopHandle};
use crate::worker::Worker;

pub const SERVICE_NAME: &str = "org.watchparty.Control";
pub const OBJECT_PATH: &str = "/org/watchparty/Control";

struct Running {
    id: u64,
    stop: StopHandle,
    task: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<Running>>>;

pub struct ControlDBus {
    worker: Arc<Worker>,
    progress: Progress,
    client_id: String,
    running: Slot,
    next_id: AtomicU64,
    stop_signal: watch::Sender<()>,
}

async fn check_dir(path: &Path) -> Result<(), &'static str> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|_| "Folder not found")?;
    if metadata.is_dir() {
        Ok(())
    } else {
        Err("Is not a folder")
    }
}

#[interface(name = "org.watchparty.Control")]
impl ControlDBus {
    #[allow(clippy::unused_self)]
    fn test_connection(&self) {}

    async fn begin(&self, path: String) -> fdo::Result<()> {
        let dir = PathBuf::from(path);
        check_dir(&dir)
            .await
            .map_err(|reason| fdo::Error::InvalidArgs(reason.to_string()))?;

        let mut running = self.running.lock().await;
        if running.is_some() {
            info!("Session already running, ignoring begin for {}", dir.display());
            return Ok(());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (stop, signal) = stop_pair();
        let worker = Arc::clone(&self.worker);
        let slot = Arc::clone(&self.running);
        let task = task::spawn(async move {
            match worker.run(&dir, signal).await {
                Ok(outcome) => info!("Session {id} finished: {outcome:?}"),
                Err(e) => error!("Session {id} error: {e}"),
            }
            let mut running = slot.lock().await;
            if running.as_ref().is_some_and(|current| current.id == id) {
                *running = None;
            }
        });
        *running = Some(Running { id, stop, task });
        Ok(())
    }

    fn progress(&self) -> u8 {
        self.progress.get()
    }

    async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    fn client_id(&self) -> String {
        self.client_id.clone()
    }

    async fn stop(&self) -> fdo::Result<()> {
        match self.running.lock().await.as_ref() {
            Some(current) => {
                info!("Stopping session {}", current.id);
                current.stop.stop();
            }
            None => info!("No session to stop"),
        }
        Ok(())
    }

    async fn quit(&self) -> fdo::Result<()> {
        if let Err(e) = self.stop_signal.send(()) {
            error!("Failed to send quit signal: {e}");
            return Err(fdo::Error::Failed("Daemon is already shutting down".to_string()));
        }
        Ok(())
    }
}

async fn shutdown(running: &Slot) {
    let current = running.lock().await.take();
    if let Some(current) = current {
        info!("Stopping session {} before exit", current.id);
        current.stop.stop();
        if let Err(e) = current.task.await {
            warn!("Session {} ended abnormally: {e}", current.id);
        }
    }
}

pub async fn run_dbus_server(
    worker: Arc<Worker>,
    progress: Progress,
    client_id: String,
) -> Result<(), App> {
    let (stop_signal, mut stop_receiver) = watch::channel(());
    let running: Slot = Arc::new(Mutex::new(None));
    let control = ControlDBus {
        worker,
        progress,
        client_id,
        running: Arc::clone(&running),
        next_id: AtomicU64::new(1),
        stop_signal,
    };

    let _connection = ConnectionBuilder::session()?
        .name(SERVICE_NAME)?
        .serve_at(OBJECT_PATH, control)?
        .build()
        .await?;
    info!("Control surface ready at {SERVICE_NAME}");

    tokio::select! {
        _ = stop_receiver.changed() => {
            info!("Quit requested, shutting down DBus server...");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {e}");
            }
            info!("Interrupted, shutting down DBus server...");
        }
    }

    shutdown(&running).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn begin_requires_an_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_dir(dir.path()).await, Ok(()));

        let file = dir.path().join("movie.mkv");
        std::fs::write(&file, b"").unwrap();
        assert_eq!(check_dir(&file).await, Err("Is not a folder"));

        assert_eq!(
            check_dir(&dir.path().join("missing")).await,
            Err("Folder not found")
        );
    }

    #[tokio::test]
    async fn shutdown_stops_and_awaits_the_session() {
        let (stop, mut signal) = stop_pair();
        let task = task::spawn(async move { signal.stopped().await });
        let running: Slot = Arc::new(Mutex::new(Some(Running { id: 7, stop, task })));

        shutdown(&running).await;
        assert!(running.lock().await.is_none());
    }
}
