use crate::error::App;
use crate::sync::text::whole_seconds;
use crate::sync::{Codec, Kind, SyncMessage};
use serde::{Deserialize, Serialize};

/// Typed room updates: a join request, then `update` messages both ways.
pub struct RoomCodec {
    room_name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
enum StateType {
    Play,
    Pause,
    #[serde(other)]
    Unspecified,
}

#[derive(Serialize, Deserialize, Debug)]
struct Update {
    state: StateType,
    time: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum RoomRequest<'a> {
    Connect { room_name: &'a str },
    Update(Update),
}

#[derive(Deserialize)]
struct RoomResponse {
    #[serde(default)]
    update: Option<Update>,
}

impl RoomCodec {
    pub fn new(room_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
        }
    }
}

impl Codec for RoomCodec {
    fn url(&self, server_address: &str) -> String {
        format!("ws://{server_address}/room")
    }

    fn join_frame(&self) -> Result<Option<String>, App> {
        let request = RoomRequest::Connect {
            room_name: &self.room_name,
        };
        serde_json::to_string(&request)
            .map(Some)
            .map_err(|e| App::DataParsing(e.to_string()))
    }

    #[allow(clippy::cast_precision_loss)]
    fn encode(&self, message: &SyncMessage) -> Result<String, App> {
        let state = match message.kind {
            Kind::Play => StateType::Play,
            Kind::Pause => StateType::Pause,
        };
        let request = RoomRequest::Update(Update {
            state,
            time: message.position as f64,
        });
        serde_json::to_string(&request).map_err(|e| App::DataParsing(e.to_string()))
    }

    fn decode(&self, frame: &str) -> Result<Option<SyncMessage>, App> {
        let response: RoomResponse =
            serde_json::from_str(frame).map_err(|e| App::DataParsing(e.to_string()))?;
        let Some(update) = response.update else {
            return Ok(None);
        };
        let kind = match update.state {
            StateType::Play => Kind::Play,
            StateType::Pause | StateType::Unspecified => Kind::Pause,
        };
        Ok(Some(SyncMessage {
            kind,
            position: whole_seconds(update.time)?,
        }))
    }
}
