use crate::error::App;
use crate::signal::StopSignal;
use crate::sync::{Codec, SyncChannel, SyncMessage};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{self, JoinHandle};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const INBOUND_CAPACITY: usize = 16;

/// A relay session over a WebSocket, speaking whichever `Codec` it was built with.
pub struct WsChannel<C: Codec> {
    codec: Arc<C>,
    url: String,
    client_id: String,
    sink: Option<SplitSink<WsStream, Message>>,
    stream: Option<SplitStream<WsStream>>,
    reader: Option<JoinHandle<()>>,
}

impl<C: Codec> WsChannel<C> {
    pub fn new(codec: C, server_address: &str, client_id: &str) -> Self {
        let url = codec.url(server_address);
        info!("WS client created, ID {client_id}, URL {url}");
        Self {
            codec: Arc::new(codec),
            url,
            client_id: client_id.to_string(),
            sink: None,
            stream: None,
            reader: None,
        }
    }

    async fn read_loop(
        mut stream: SplitStream<WsStream>,
        codec: Arc<C>,
        messages: mpsc::Sender<SyncMessage>,
        mut stop: StopSignal,
        client_id: String,
    ) {
        loop {
            let next = tokio::select! {
                () = stop.stopped() => {
                    info!("[{client_id}] Stop signal received. Closing channel");
                    break;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(Message::Text(text))) => match codec.decode(&text) {
                    Ok(Some(message)) => {
                        if messages.send(message).await.is_err() {
                            debug!("[{client_id}] Inbound receiver dropped");
                            break;
                        }
                    }
                    Ok(None) => debug!("[{client_id}] Ignoring frame without room state: {text}"),
                    Err(e) => {
                        error!("[{client_id}] Error while parse frame. Closing channel: {e}");
                        break;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    info!("[{client_id}] Connection closed by relay: {frame:?}");
                    break;
                }
                Some(Ok(Message::Binary(_))) => warn!("[{client_id}] Ignoring binary frame"),
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("[{client_id}] Error while read. Closing channel: {e}");
                    break;
                }
                None => {
                    info!("[{client_id}] Connection ended");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl<C: Codec> SyncChannel for WsChannel<C> {
    async fn connect(&mut self) -> Result<(), App> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| App::Connect(e.to_string()))?;
        let client_id =
            HeaderValue::from_str(&self.client_id).map_err(|e| App::Connect(e.to_string()))?;
        request.headers_mut().insert("X-Client-Id", client_id);

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| App::Connect(format!("{}: {e}", self.url)))?;
        let (mut sink, stream) = ws_stream.split();

        if let Some(join) = self.codec.join_frame()? {
            sink.send(Message::Text(join))
                .await
                .map_err(|e| App::Connect(format!("Error while joining the room: {e}")))?;
            info!("[{}] Joined room", self.client_id);
        }

        self.sink = Some(sink);
        self.stream = Some(stream);
        info!("[{}] Connected to {}", self.client_id, self.url);
        Ok(())
    }

    async fn listen(&mut self, stop: StopSignal) -> Result<mpsc::Receiver<SyncMessage>, App> {
        if self.sink.is_none() {
            self.connect().await?;
        }
        let stream = self
            .stream
            .take()
            .ok_or_else(|| App::Transport("Channel is already being listened to".to_string()))?;

        let (messages, receiver) = mpsc::channel(INBOUND_CAPACITY);
        self.reader = Some(task::spawn(Self::read_loop(
            stream,
            Arc::clone(&self.codec),
            messages,
            stop,
            self.client_id.clone(),
        )));
        Ok(receiver)
    }

    async fn send(&mut self, message: SyncMessage) -> Result<(), App> {
        if self.sink.is_none() {
            self.connect().await?;
        }
        let frame = self.codec.encode(&message)?;
        info!("[{}] Sending message {message:?}", self.client_id);
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| App::Transport("Channel is not connected".to_string()))?;
        sink.send(Message::Text(frame)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.await {
                warn!("[{}] Receive loop ended abnormally: {e}", self.client_id);
            }
        }
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.close().await;
        }
        self.stream = None;
    }
}
