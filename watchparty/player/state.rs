use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Unknown,
    Stopped,
    Paused,
    Playing,
}

impl PlaybackState {
    /// Maps a state name reported by the player.
    pub fn from_name(name: &str) -> Self {
        match name {
            "stopped" => PlaybackState::Stopped,
            "paused" => PlaybackState::Paused,
            "playing" => PlaybackState::Playing,
            _ => PlaybackState::Unknown,
        }
    }
}

/// Why a playback transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Unknown,
    LocalUser,
    Network,
    SystemInit,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Unknown => "Unknown",
            Origin::LocalUser => "User",
            Origin::Network => "Net",
            Origin::SystemInit => "System",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    /// Playback position in whole seconds.
    pub position: u64,
    pub state: PlaybackState,
    pub origin: Origin,
}
