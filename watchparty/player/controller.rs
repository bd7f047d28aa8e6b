use crate::error::App;
use crate::player::{Origin, PlaybackState, StatusEvent, Surface};
use crate::signal::StopSignal;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{self, JoinHandle};
use tokio::time::{self, MissedTickBehavior};

/// Capacity of the status event queue. Producers wait when it is full.
pub const EVENT_CAPACITY: usize = 10;

struct Shared {
    prev_state: PlaybackState,
    /// Bumped on every state-changing command.
    generation: u64,
}

/// The only owner of the player: every command and status read goes through here.
#[derive(Clone)]
pub struct Player {
    surface: Arc<dyn Surface>,
    shared: Arc<Mutex<Shared>>,
    events: mpsc::Sender<StatusEvent>,
}

impl Player {
    pub fn new(surface: Arc<dyn Surface>) -> (Self, mpsc::Receiver<StatusEvent>) {
        let (events, receiver) = mpsc::channel(EVENT_CAPACITY);
        let player = Self {
            surface,
            shared: Arc::new(Mutex::new(Shared {
                prev_state: PlaybackState::Stopped,
                generation: 0,
            })),
            events,
        };
        (player, receiver)
    }

    pub async fn state(&self) -> PlaybackState {
        self.shared.lock().await.prev_state
    }

    pub async fn clear(&self) -> Result<(), App> {
        self.surface.clear().await
    }

    pub async fn load(&self, path: &Path) -> Result<(), App> {
        self.surface.enqueue(path).await
    }

    pub async fn play_by(&self, origin: Origin) -> Result<(), App> {
        self.command(PlaybackState::Playing, origin).await
    }

    pub async fn pause_by(&self, origin: Origin) -> Result<(), App> {
        self.command(PlaybackState::Paused, origin).await
    }

    /// Always reaches the player, even when the position is unchanged.
    pub async fn seek(&self, position: u64) -> Result<(), App> {
        self.surface.seek(position).await?;
        info!("Seeking to {position}s");
        Ok(())
    }

    async fn command(&self, target: PlaybackState, origin: Origin) -> Result<(), App> {
        let mut shared = self.shared.lock().await;
        if shared.prev_state == target {
            info!("Already {target:?}, called by {origin}");
            return Ok(());
        }

        let status = match target {
            PlaybackState::Playing => self.surface.play().await?,
            _ => self.surface.pause().await?,
        };
        shared.prev_state = target;
        shared.generation += 1;
        info!("{target:?} by {origin}");

        self.emit(StatusEvent {
            position: status.time,
            state: target,
            origin,
        })
        .await;
        Ok(())
    }

    async fn emit(&self, event: StatusEvent) {
        if self.events.send(event).await.is_err() {
            debug!("Status event dropped, nobody is listening: {event:?}");
        }
    }

    /// Checks the player once for a change nobody here asked for.
    async fn poll_once(&self) -> Result<(), App> {
        let generation = self.shared.lock().await.generation;
        let status = self.surface.status().await?;

        let mut shared = self.shared.lock().await;
        if shared.generation != generation {
            debug!("Discarding status sampled before a command");
            return Ok(());
        }
        if status.state != shared.prev_state {
            shared.prev_state = status.state;
            self.emit(StatusEvent {
                position: status.time,
                state: status.state,
                origin: Origin::LocalUser,
            })
            .await;
        }
        Ok(())
    }

    pub fn spawn_poller(&self, interval: Duration, mut stop: StopSignal) -> JoinHandle<()> {
        let player = self.clone();
        task::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = stop.stopped() => {
                        info!("Stop signal received. Stopping status check");
                        return;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = player.poll_once().await {
                            warn!("Status check failed: {e}");
                        }
                    }
                }
            }
        })
    }
}
