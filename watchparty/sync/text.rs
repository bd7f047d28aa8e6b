use crate::error::App;
use crate::sync::{Codec, Kind, SyncMessage};

/// Plain `<state>;<time>` frames, e.g. `play;12.5`.
pub struct TextCodec {
    room_name: String,
}

impl TextCodec {
    pub fn new(room_name: &str) -> Self {
        Self {
            room_name: room_name.to_string(),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn whole_seconds(time: f64) -> Result<u64, App> {
    if !time.is_finite() || time < 0.0 {
        return Err(App::DataParsing(format!("Invalid time: {time}")));
    }
    Ok(time as u64)
}

impl Codec for TextCodec {
    fn url(&self, server_address: &str) -> String {
        format!("ws://{server_address}/ws/{}", self.room_name)
    }

    fn join_frame(&self) -> Result<Option<String>, App> {
        Ok(None)
    }

    fn encode(&self, message: &SyncMessage) -> Result<String, App> {
        Ok(format!("{};{}", message.kind, message.position))
    }

    fn decode(&self, frame: &str) -> Result<Option<SyncMessage>, App> {
        let (state, time) = frame
            .split_once(';')
            .ok_or_else(|| App::DataParsing(format!("Malformed frame: {frame:?}")))?;
        let kind = match state {
            "play" => Kind::Play,
            "pause" => Kind::Pause,
            other => return Err(App::DataParsing(format!("Unknown state: {other:?}"))),
        };
        let time: f64 = time
            .trim()
            .parse()
            .map_err(|e| App::DataParsing(format!("Error while parse time {time:?}: {e}")))?;
        Ok(Some(SyncMessage {
            kind,
            position: whole_seconds(time)?,
        }))
    }
}
