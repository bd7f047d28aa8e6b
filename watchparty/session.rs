use crate::content::Acquire;
use crate::error::App;
use crate::player::{Origin, PlaybackState, Player, StatusEvent, Surface};
use crate::signal::{stop_pair, StopSignal};
use crate::sync::{Kind, SyncChannel, SyncMessage};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// How a session ended when nothing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Cancelled,
    ClosedByPlayer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Closed,
}

/// One run of the synchronization loop, from content resolution to termination.
pub struct Session {
    player: Player,
    events: mpsc::Receiver<StatusEvent>,
    channel: Box<dyn SyncChannel>,
    acquirer: Arc<dyn Acquire>,
    poll_interval: Duration,
    phase: Phase,
    content: Option<PathBuf>,
}

impl Session {
    pub fn new(
        surface: Arc<dyn Surface>,
        channel: Box<dyn SyncChannel>,
        acquirer: Arc<dyn Acquire>,
        poll_interval: Duration,
    ) -> Self {
        let (player, events) = Player::new(surface);
        Self {
            player,
            events,
            channel,
            acquirer,
            poll_interval,
            phase: Phase::Initializing,
            content: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Local file acquired for this session, once known.
    pub fn content(&self) -> Option<&Path> {
        self.content.as_deref()
    }

    /// Drives the session to its end. A session runs once.
    pub async fn run(&mut self, download_dir: &Path, stop: StopSignal) -> Result<Outcome, App> {
        if self.phase != Phase::Initializing {
            return Err(App::InvalidInput("Session already ran".to_string()));
        }
        let result = self.drive(download_dir, stop).await;
        self.phase = Phase::Closed;

        match &result {
            Ok(outcome) => info!("Session closed: {outcome:?}"),
            Err(e) => error!("Session failed: {e}"),
        }
        result
    }

    async fn drive(&mut self, download_dir: &Path, mut stop: StopSignal) -> Result<Outcome, App> {
        let acquirer = Arc::clone(&self.acquirer);
        let path = tokio::select! {
            biased;
            () = stop.stopped() => {
                info!("Stop signal received while acquiring content");
                return Ok(Outcome::Cancelled);
            }
            acquired = acquire(acquirer.as_ref(), download_dir) => acquired?,
        };
        self.content = Some(path.clone());

        self.prepare(&path).await?;
        if stop.is_stopped() {
            self.channel.close().await;
            return Ok(Outcome::Cancelled);
        }

        let (session_stop, session_signal) = stop_pair();
        let poller = self
            .player
            .spawn_poller(self.poll_interval, session_signal.clone());
        let result = match self.channel.listen(session_signal).await {
            Ok(mut inbound) => {
                self.phase = Phase::Running;
                info!(
                    "Session running with {}, player {:?}",
                    path.display(),
                    self.player.state().await
                );
                self.serve(&mut inbound, &mut stop).await
            }
            Err(e) => Err(e),
        };

        session_stop.stop();
        self.events.close();
        self.channel.close().await;
        if let Err(e) = poller.await {
            warn!("Status check ended abnormally: {e}");
        }
        result
    }

    /// Loads the content and puts the player into a known paused-at-zero state.
    async fn prepare(&mut self, path: &Path) -> Result<(), App> {
        self.player.clear().await?;
        self.player.load(path).await?;
        self.player.play_by(Origin::SystemInit).await?;
        self.player.pause_by(Origin::SystemInit).await?;
        self.player.seek(0).await?;
        self.channel.connect().await
    }

    async fn serve(
        &mut self,
        inbound: &mut mpsc::Receiver<SyncMessage>,
        stop: &mut StopSignal,
    ) -> Result<Outcome, App> {
        loop {
            tokio::select! {
                biased;
                () = stop.stopped() => {
                    info!("Stop signal received. Stopping controller");
                    return Ok(Outcome::Cancelled);
                }
                // Pending events go first: applying a message emits into this same queue.
                Some(event) = self.events.recv() => {
                    if let Some(outcome) = self.forward(event).await? {
                        return Ok(outcome);
                    }
                }
                message = inbound.recv() => {
                    let Some(message) = message else {
                        warn!("Channel closed. Stopping controller");
                        return Err(App::ChannelClosed);
                    };
                    self.apply(message).await?;
                }
            }
        }
    }

    /// Room state from the relay: state command first, then the seek.
    async fn apply(&mut self, message: SyncMessage) -> Result<(), App> {
        info!("Received status change: {message:?}");
        match message.kind {
            Kind::Play => self.player.play_by(Origin::Network).await?,
            Kind::Pause => self.player.pause_by(Origin::Network).await?,
        }
        self.player.seek(message.position).await
    }

    /// Passes user-made changes on to the relay; everything else is our own echo.
    async fn forward(&mut self, event: StatusEvent) -> Result<Option<Outcome>, App> {
        info!("Status changed to {:?} by {}", event.state, event.origin);
        if event.origin != Origin::LocalUser {
            return Ok(None);
        }
        let message = match event.state {
            PlaybackState::Stopped => {
                self.channel
                    .send(SyncMessage {
                        kind: Kind::Pause,
                        position: 0,
                    })
                    .await?;
                info!("Player stopped by user. Closing session");
                return Ok(Some(Outcome::ClosedByPlayer));
            }
            PlaybackState::Playing => SyncMessage {
                kind: Kind::Play,
                position: event.position,
            },
            PlaybackState::Paused => SyncMessage {
                kind: Kind::Pause,
                position: event.position,
            },
            PlaybackState::Unknown => return Ok(None),
        };
        self.channel.send(message).await?;
        Ok(None)
    }
}

async fn acquire(acquirer: &dyn Acquire, download_dir: &Path) -> Result<PathBuf, App> {
    let identifier = acquirer.identify().await?;
    acquirer.download(&identifier, download_dir).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::fake::{Call, FakeSurface};
    use crate::signal::StopHandle;
    use async_trait::async_trait;
    use std::future;
    use std::sync::Mutex;
    use tokio::task::{self, JoinHandle};
    use tokio::time::{self, timeout};

    #[derive(Clone, Default)]
    struct Sent(Arc<Mutex<Vec<SyncMessage>>>);

    impl Sent {
        fn get(&self) -> Vec<SyncMessage> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeChannel {
        inbound: Option<mpsc::Receiver<SyncMessage>>,
        sent: Sent,
        fail_connect: bool,
    }

    #[async_trait]
    impl SyncChannel for FakeChannel {
        async fn connect(&mut self) -> Result<(), App> {
            if self.fail_connect {
                return Err(App::Connect("relay unreachable".to_string()));
            }
            Ok(())
        }

        async fn listen(&mut self, _stop: StopSignal) -> Result<mpsc::Receiver<SyncMessage>, App> {
            self.inbound
                .take()
                .ok_or_else(|| App::Transport("already listening".to_string()))
        }

        async fn send(&mut self, message: SyncMessage) -> Result<(), App> {
            self.sent.0.lock().unwrap().push(message);
            Ok(())
        }

        async fn close(&mut self) {}
    }

    struct FakeAcquirer {
        path: Option<PathBuf>,
        hang: bool,
    }

    #[async_trait]
    impl Acquire for FakeAcquirer {
        async fn identify(&self) -> Result<String, App> {
            if self.hang {
                future::pending::<()>().await;
            }
            Ok("http://relay/movie.mkv".to_string())
        }

        async fn download(&self, _identifier: &str, _dir: &Path) -> Result<PathBuf, App> {
            self.path
                .clone()
                .ok_or_else(|| App::Acquisition("tracker unreachable".to_string()))
        }
    }

    struct Harness {
        surface: Arc<FakeSurface>,
        relay: mpsc::Sender<SyncMessage>,
        sent: Sent,
        stop: StopHandle,
        session: JoinHandle<Result<Outcome, App>>,
    }

    fn movie() -> PathBuf {
        PathBuf::from("/srv/party/movie.mkv")
    }

    fn start_with(
        surface: Arc<FakeSurface>,
        acquirer: FakeAcquirer,
        fail_connect: bool,
    ) -> Harness {
        let (relay, inbound) = mpsc::channel(16);
        let sent = Sent::default();
        let channel = FakeChannel {
            inbound: Some(inbound),
            sent: sent.clone(),
            fail_connect,
        };
        let session = Session::new(
            surface.clone(),
            Box::new(channel),
            Arc::new(acquirer),
            Duration::from_millis(500),
        );
        let (stop, signal) = stop_pair();
        let session = task::spawn(async move {
            let mut session = session;
            let result = session.run(Path::new("/srv/party"), signal).await;
            assert_eq!(session.phase(), Phase::Closed);
            result
        });
        Harness {
            surface,
            relay,
            sent,
            stop,
            session,
        }
    }

    fn start() -> Harness {
        start_with(
            FakeSurface::new(),
            FakeAcquirer {
                path: Some(movie()),
                hang: false,
            },
            false,
        )
    }

    fn baseline() -> Vec<Call> {
        vec![
            Call::Clear,
            Call::Enqueue(movie()),
            Call::Play,
            Call::Pause,
            Call::Seek(0),
        ]
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(60), async {
            while !condition() {
                time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition never became true");
    }

    #[tokio::test(start_paused = true)]
    async fn baseline_is_fixed_whatever_the_player_was_doing() {
        let surface = FakeSurface::new();
        surface.set_state(PlaybackState::Playing);
        let harness = start_with(
            surface,
            FakeAcquirer {
                path: Some(movie()),
                hang: false,
            },
            false,
        );

        wait_until(|| harness.surface.calls().len() >= 5).await;
        assert_eq!(harness.surface.calls(), baseline());

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
        assert!(harness.sent.get().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_message_is_command_then_seek_without_echo() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness
            .relay
            .send(SyncMessage {
                kind: Kind::Play,
                position: 120,
            })
            .await
            .unwrap();
        wait_until(|| harness.surface.calls().len() >= 7).await;
        assert_eq!(harness.surface.calls()[5..], [Call::Play, Call::Seek(120)]);

        // A user pause queued after the network echo is the first thing forwarded.
        harness.surface.set_state(PlaybackState::Paused);
        wait_until(|| !harness.sent.get().is_empty()).await;
        assert_eq!(
            harness.sent.get(),
            vec![SyncMessage {
                kind: Kind::Pause,
                position: 120
            }]
        );

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_message_matching_state_still_seeks() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness
            .relay
            .send(SyncMessage {
                kind: Kind::Pause,
                position: 64,
            })
            .await
            .unwrap();
        wait_until(|| harness.surface.calls().len() >= 6).await;
        assert_eq!(harness.surface.calls()[5..], [Call::Seek(64)]);

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
        assert!(harness.sent.get().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn user_play_is_forwarded_with_position() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness.surface.set_state(PlaybackState::Playing);
        wait_until(|| !harness.sent.get().is_empty()).await;
        assert_eq!(
            harness.sent.get(),
            vec![SyncMessage {
                kind: Kind::Play,
                position: 0
            }]
        );

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_player_state_is_not_forwarded() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness.surface.set_state(PlaybackState::Unknown);
        let polled = harness.surface.status_calls();
        wait_until(|| harness.surface.status_calls() >= polled + 2).await;
        assert!(harness.sent.get().is_empty());

        harness.surface.set_state(PlaybackState::Paused);
        wait_until(|| !harness.sent.get().is_empty()).await;
        assert_eq!(
            harness.sent.get(),
            vec![SyncMessage {
                kind: Kind::Pause,
                position: 0
            }]
        );

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn user_stop_sends_pause_at_zero_and_closes() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness.surface.set_state(PlaybackState::Stopped);
        let outcome = harness.session.await.unwrap().unwrap();

        assert_eq!(outcome, Outcome::ClosedByPlayer);
        assert_eq!(
            harness.sent.get(),
            vec![SyncMessage {
                kind: Kind::Pause,
                position: 0
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_sends_nothing() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);

        harness.surface.set_state(PlaybackState::Playing);
        time::sleep(Duration::from_secs(5)).await;
        assert!(harness.sent.get().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn relay_closing_the_stream_is_an_error() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        drop(harness.relay);
        let result = harness.session.await.unwrap();
        assert!(matches!(result, Err(App::ChannelClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_seek_ends_the_session() {
        let harness = start();
        wait_until(|| harness.surface.calls().len() >= 5).await;

        harness.surface.fail_seek(true);
        harness
            .relay
            .send(SyncMessage {
                kind: Kind::Play,
                position: 10,
            })
            .await
            .unwrap();
        let result = harness.session.await.unwrap();

        assert!(matches!(result, Err(App::Transport(_))));
        assert_eq!(harness.surface.calls().last(), Some(&Call::Play));
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_failure_is_fatal_before_touching_the_player() {
        let harness = start_with(
            FakeSurface::new(),
            FakeAcquirer {
                path: None,
                hang: false,
            },
            false,
        );

        let result = harness.session.await.unwrap();
        assert!(matches!(result, Err(App::Acquisition(_))));
        assert!(harness.surface.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn relay_unreachable_is_fatal_after_baseline() {
        let harness = start_with(
            FakeSurface::new(),
            FakeAcquirer {
                path: Some(movie()),
                hang: false,
            },
            true,
        );

        let result = harness.session.await.unwrap();
        assert!(matches!(result, Err(App::Connect(_))));
        assert_eq!(harness.surface.calls(), baseline());
    }

    #[tokio::test(start_paused = true)]
    async fn player_unreachable_is_fatal_at_startup() {
        let surface = FakeSurface::new();
        surface.fail_commands(true);
        let harness = start_with(
            surface,
            FakeAcquirer {
                path: Some(movie()),
                hang: false,
            },
            false,
        );

        let result = harness.session.await.unwrap();
        assert!(matches!(result, Err(App::Transport(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_acquisition() {
        let harness = start_with(
            FakeSurface::new(),
            FakeAcquirer {
                path: Some(movie()),
                hang: true,
            },
            false,
        );

        time::sleep(Duration::from_secs(1)).await;
        harness.stop.stop();
        assert_eq!(harness.session.await.unwrap().unwrap(), Outcome::Cancelled);
        assert!(harness.surface.calls().is_empty());
    }
}
