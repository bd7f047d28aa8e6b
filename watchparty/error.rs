use flexi_logger::FlexiLoggerError;
use std::io;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_tungstenite::tungstenite::Error as WsError;
use zbus::Error as ZbusError;

#[derive(Error, Debug)]
pub enum App {
    #[error("Content acquisition failed: {0}")]
    Acquisition(String),

    #[error("Relay connection failed: {0}")]
    Connect(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sync channel closed by the relay")]
    ChannelClosed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Logger initialization error: {0}")]
    Logger(#[from] FlexiLoggerError),

    #[error("ZBus error: {0}")]
    Zbus(#[from] ZbusError),

    #[error("Data parsing error: {0}")]
    DataParsing(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Join task error: {0}")]
    JoinTask(#[from] JoinError),
}

impl From<reqwest::Error> for App {
    fn from(error: reqwest::Error) -> Self {
        App::Transport(error.to_string())
    }
}

impl From<WsError> for App {
    fn from(error: WsError) -> Self {
        App::Transport(error.to_string())
    }
}
