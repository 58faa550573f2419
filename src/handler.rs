//! WebSocket transport adapter
//!
//! Accepts client connections, enforces the allowed-origin policy during the
//! handshake, and bridges each connection to the matchmaker actor: inbound
//! frames become [`ClientEvent`]s, outbound [`ServerEvent`]s are serialized
//! to JSON text frames by a per-connection writer task.

use crate::error::ClientRequestError;
use crate::protocol::{ClientEvent, PeerId, ServerEvent};
use crate::state::{Matchmaker, MatchmakerHandle};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::str::FromStr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use tracing::{debug, info, warn};

/// Accept connections forever, one matchmaker shared by all of them.
///
/// `allowed_origin` is matched against the `Origin` header of each handshake;
/// `"*"` disables the check. Requests without an `Origin` header (non-browser
/// clients) are always admitted.
pub async fn serve(listener: TcpListener, allowed_origin: String) {
    let handle = Matchmaker::spawn();
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let origin = allowed_origin.clone();
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = accept_connection(stream, addr, origin, handle).await {
                        warn!(%addr, error = %e, "connection ended with error");
                    }
                });
            }
            Err(e) => warn!(error = %e, "failed to accept connection"),
        }
    }
}

/// Drive one client connection from handshake to disconnect.
async fn accept_connection(
    stream: TcpStream,
    addr: SocketAddr,
    allowed_origin: String,
    handle: MatchmakerHandle,
) -> Result<(), ClientRequestError> {
    let check_origin = move |request: &Request, response: Response| {
        match request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok())
        {
            Some(origin) if allowed_origin != "*" && origin != allowed_origin => {
                warn!(%origin, "rejecting handshake from disallowed origin");
                let mut rejection = ErrorResponse::new(Some("origin not allowed".to_string()));
                *rejection.status_mut() = StatusCode::FORBIDDEN;
                Err(rejection)
            }
            _ => Ok(response),
        }
    };
    let websocket = accept_hdr_async(stream, check_origin).await?;

    let peer = PeerId::new();
    info!(%peer, %addr, "endpoint connected");

    let (sink, stream) = websocket.split();
    let (sender, events) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(sink, events));
    handle.connect(peer, sender);

    let result = read_loop(peer, stream, &handle).await;

    // Exactly one disconnect per connection, clean close or not.
    handle.disconnect(peer);
    info!(%peer, "endpoint disconnected");
    result
}

/// Forward client frames to the matchmaker until the connection ends.
///
/// Malformed or unsupported frames are ignored; a transport error ends the
/// loop and is reported to the caller after cleanup.
async fn read_loop(
    peer: PeerId,
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    handle: &MatchmakerHandle,
) -> Result<(), ClientRequestError> {
    while let Some(frame) = stream.next().await {
        match parse_frame(frame?) {
            Ok(Some(event)) => handle.message(peer, event),
            Ok(None) => {}
            Err(ClientRequestError::Close) => break,
            Err(e) => debug!(%peer, error = %e, "ignoring invalid client frame"),
        }
    }
    Ok(())
}

/// Serialize matchmaker events onto the socket until either side goes away.
async fn write_loop(
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = events.recv().await {
        if sink.send(Message::text(event.to_string())).await.is_err() {
            break;
        }
    }
    let _ = sink.close().await;
}

/// Interpret one WebSocket frame. `Ok(None)` means a control frame with
/// nothing to forward.
fn parse_frame(frame: Message) -> Result<Option<ClientEvent>, ClientRequestError> {
    match frame {
        Message::Text(text) => Ok(Some(ClientEvent::from_str(text.as_str())?)),
        Message::Binary(_) => Err(ClientRequestError::UnsupportedType),
        Message::Close(_) => Err(ClientRequestError::Close),
        // Ping/pong are handled by the protocol layer.
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_frames_parse_to_client_events() {
        let frame = Message::text(r#"{"type":"message","text":"hi"}"#);
        let event = parse_frame(frame).unwrap().expect("expected an event");
        assert_eq!(
            event,
            ClientEvent::Message {
                to: None,
                text: "hi".into()
            }
        );
    }

    #[test]
    fn malformed_text_is_a_json_error() {
        let frame = Message::text("not json");
        assert!(matches!(
            parse_frame(frame),
            Err(ClientRequestError::Json(_))
        ));
    }

    #[test]
    fn binary_frames_are_unsupported() {
        let frame = Message::binary(vec![0x01, 0x02]);
        assert!(matches!(
            parse_frame(frame),
            Err(ClientRequestError::UnsupportedType)
        ));
    }

    #[test]
    fn close_frames_end_the_session() {
        assert!(matches!(
            parse_frame(Message::Close(None)),
            Err(ClientRequestError::Close)
        ));
    }

    #[test]
    fn control_frames_are_skipped() {
        assert!(parse_frame(Message::Ping(vec![1u8].into())).unwrap().is_none());
        assert!(parse_frame(Message::Pong(vec![1u8].into())).unwrap().is_none());
    }
}
