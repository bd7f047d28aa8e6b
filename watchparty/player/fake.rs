//! In-memory player used by the controller and session tests.

use crate::error::App;
use crate::player::{PlaybackState, Status, Surface};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Clear,
    Enqueue(PathBuf),
    Play,
    Pause,
    Seek(u64),
}

#[derive(Default)]
pub struct FakeSurface {
    calls: Mutex<Vec<Call>>,
    status: Mutex<Option<Status>>,
    fail_commands: AtomicBool,
    fail_seek: AtomicBool,
    status_calls: AtomicUsize,
    status_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Changes what the player reports, as if the user operated it directly.
    pub fn set_state(&self, state: PlaybackState) {
        let mut status = self.status.lock().unwrap();
        let time = status.map_or(0, |s| s.time);
        *status = Some(Status { time, state });
    }

    pub fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub fn fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Makes `status` snapshot the current state, then wait on `gate` before answering.
    pub fn gate_status(&self, gate: Arc<Notify>) {
        *self.status_gate.lock().unwrap() = Some(gate);
    }

    fn current(&self) -> Status {
        self.status.lock().unwrap().unwrap_or(Status {
            time: 0,
            state: PlaybackState::Stopped,
        })
    }

    fn command(&self, call: Call, state: PlaybackState) -> Result<Status, App> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(App::Transport("player unreachable".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        self.set_state(state);
        Ok(self.current())
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn enqueue(&self, path: &Path) -> Result<(), App> {
        self.command(Call::Enqueue(path.to_path_buf()), PlaybackState::Stopped)?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), App> {
        self.command(Call::Clear, PlaybackState::Stopped)?;
        Ok(())
    }

    async fn play(&self) -> Result<Status, App> {
        self.command(Call::Play, PlaybackState::Playing)
    }

    async fn pause(&self) -> Result<Status, App> {
        self.command(Call::Pause, PlaybackState::Paused)
    }

    async fn seek(&self, position: u64) -> Result<(), App> {
        if self.fail_seek.load(Ordering::SeqCst) {
            return Err(App::Transport("seek rejected".to_string()));
        }
        let state = self.current().state;
        self.command(Call::Seek(position), state)?;
        let mut status = self.status.lock().unwrap();
        *status = Some(Status {
            time: position,
            state,
        });
        Ok(())
    }

    async fn status(&self) -> Result<Status, App> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(App::Transport("player unreachable".to_string()));
        }
        let snapshot = self.current();
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.status_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }
}
