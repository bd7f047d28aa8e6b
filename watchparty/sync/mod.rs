pub mod room;
pub mod socket;
pub mod text;

use crate::config::{Options, Transport};
use crate::error::App;
use crate::signal::StopSignal;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt;
use tokio::sync::mpsc;

pub use room::RoomCodec;
pub use socket::WsChannel;
pub use text::TextCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Play,
    Pause,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Play => f.write_str("play"),
            Kind::Pause => f.write_str("pause"),
        }
    }
}

/// Room state exchanged with the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncMessage {
    pub kind: Kind,
    /// Whole seconds.
    pub position: u64,
}

/// One bidirectional session with the relay.
#[async_trait]
pub trait SyncChannel: Send {
    async fn connect(&mut self) -> Result<(), App>;

    /// Starts receiving. The returned stream ends when the transport closes
    /// on either side, fails, or `stop` fires.
    async fn listen(&mut self, stop: StopSignal) -> Result<mpsc::Receiver<SyncMessage>, App>;

    async fn send(&mut self, message: SyncMessage) -> Result<(), App>;

    /// Waits for the receive loop to finish and releases the connection.
    async fn close(&mut self);
}

/// Converts between `SyncMessage` and one wire representation.
pub trait Codec: Send + Sync + 'static {
    fn url(&self, server_address: &str) -> String;

    /// Frame sent right after the connection opens, if the binding needs one.
    fn join_frame(&self) -> Result<Option<String>, App>;

    fn encode(&self, message: &SyncMessage) -> Result<String, App>;

    /// `Ok(None)` for frames that carry no room state.
    fn decode(&self, frame: &str) -> Result<Option<SyncMessage>, App>;
}

pub fn channel_for(options: &Options, client_id: &str) -> Box<dyn SyncChannel> {
    match options.transport {
        Transport::Text => Box::new(WsChannel::new(
            TextCodec::new(&options.room_name),
            &options.server_address,
            client_id,
        )),
        Transport::Room => Box::new(WsChannel::new(
            RoomCodec::new(&options.room_name),
            &options.server_address,
            client_id,
        )),
    }
}

pub fn generate_client_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}
