use futures_util::{SinkExt, StreamExt};
use pico_protocol::Message;
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::tungstenite::protocol::Message as WsFrame;

type WsStream = tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum MockPicoClientError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("malformed message: {0}")]
    Decode(#[from] pico_protocol::DecodeError),
    #[error("connection closed by peer")]
    Closed,
}

/// A bare-bones WebSocket client, independent of the real `services/client`
/// driver, used only to exercise `services/server` from integration tests.
pub struct MockPicoClient {
    write: futures_util::stream::SplitSink<WsStream, WsFrame>,
    read: futures_util::stream::SplitStream<WsStream>,
}

impl MockPicoClient {
    pub async fn connect(url: &str) -> Result<Self, MockPicoClientError> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(url).await?;
        let (write, read) = ws_stream.split();
        Ok(Self { write, read })
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), MockPicoClientError> {
        let bytes = pico_protocol::encode(message);
        self.write.send(WsFrame::Binary(bytes.into())).await?;
        Ok(())
    }

    /// Sends a raw binary frame, bypassing `pico_protocol::encode`. Used to
    /// exercise framing edge cases (oversized payloads, malformed JSON) that
    /// a well-behaved encoder would never produce.
    pub async fn send_raw(&mut self, bytes: Vec<u8>) -> Result<(), MockPicoClientError> {
        self.write.send(WsFrame::Binary(bytes.into())).await?;
        Ok(())
    }

    /// Receive the next application message, transparently answering pings
    /// and skipping pongs, the way a real client's read loop would.
    pub async fn recv(&mut self) -> Result<Message, MockPicoClientError> {
        loop {
            match self.read.next().await {
                Some(Ok(WsFrame::Binary(bytes))) => {
                    return Ok(pico_protocol::decode(&bytes)?);
                }
                Some(Ok(WsFrame::Text(text))) => {
                    return Ok(pico_protocol::decode(text.as_bytes())?);
                }
                Some(Ok(WsFrame::Ping(payload))) => {
                    self.write.send(WsFrame::Pong(payload)).await?;
                    continue;
                }
                Some(Ok(WsFrame::Pong(_))) => continue,
                Some(Ok(WsFrame::Close(_))) | None => return Err(MockPicoClientError::Closed),
                Some(Ok(WsFrame::Frame(_))) => continue,
                Some(Err(err)) => return Err(err.into()),
            }
        }
    }

    pub async fn close(&mut self) -> Result<(), MockPicoClientError> {
        self.write.send(WsFrame::Close(None)).await?;
        Ok(())
    }
}
