//! End-to-end tests driving the server over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Error;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(allowed_origin: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(roulette_signaling::serve(listener, allowed_origin.to_string()));
    format!("ws://{addr}")
}

async fn connect(url: &str) -> Client {
    let (client, _) = connect_async(url).await.expect("handshake failed");
    client
}

async fn send(client: &mut Client, event: Value) {
    client.send(Message::text(event.to_string())).await.unwrap();
}

async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for event")
            .expect("connection closed")
            .expect("websocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("invalid event json");
        }
    }
}

#[tokio::test]
async fn pairs_relays_and_requeues() {
    let url = start_server("*").await;

    // First visitor waits.
    let mut a = connect(&url).await;
    assert_eq!(next_event(&mut a).await, json!({"type": "waiting"}));

    // Second visitor pairs with the first; each learns the other's id.
    let mut b = connect(&url).await;
    let a_paired = next_event(&mut a).await;
    let b_paired = next_event(&mut b).await;
    assert_eq!(a_paired["type"], "paired");
    assert_eq!(b_paired["type"], "paired");
    let b_id = a_paired["partnerId"].as_str().unwrap().to_string();
    let a_id = b_paired["partnerId"].as_str().unwrap().to_string();
    assert_ne!(a_id, b_id);

    // Chat is relayed to the partner, tagged with the sender's id.
    send(&mut a, json!({"type": "message", "text": "hi"})).await;
    assert_eq!(
        next_event(&mut b).await,
        json!({"type": "message", "from": a_id, "text": "hi"})
    );

    // Handshake primitives are relayed verbatim when addressed explicitly.
    let sdp = json!({"type": "offer", "sdp": "v=0"});
    send(&mut a, json!({"type": "offer", "to": b_id, "sdp": sdp})).await;
    let relayed = next_event(&mut b).await;
    assert_eq!(relayed["type"], "offer");
    assert_eq!(relayed["from"], a_id.as_str());
    assert_eq!(relayed["sdp"], sdp);

    // B leaves; A is requeued and matched with the next arrival.
    b.close(None).await.unwrap();
    assert_eq!(next_event(&mut a).await, json!({"type": "waiting"}));

    let mut c = connect(&url).await;
    assert_eq!(next_event(&mut a).await["type"], "paired");
    let c_paired = next_event(&mut c).await;
    assert_eq!(c_paired["type"], "paired");
    assert_eq!(c_paired["partnerId"], a_id.as_str());
}

#[tokio::test]
async fn survivor_pairs_with_waiting_visitor() {
    let url = start_server("*").await;

    let mut a = connect(&url).await;
    assert_eq!(next_event(&mut a).await, json!({"type": "waiting"}));
    let mut b = connect(&url).await;
    assert_eq!(next_event(&mut a).await["type"], "paired");
    assert_eq!(next_event(&mut b).await["type"], "paired");
    let mut c = connect(&url).await;
    assert_eq!(next_event(&mut c).await, json!({"type": "waiting"}));

    // A drops out of the A+B pair; B goes straight to C, no `waiting`.
    a.close(None).await.unwrap();
    assert_eq!(next_event(&mut b).await["type"], "paired");
    assert_eq!(next_event(&mut c).await["type"], "paired");
}

#[tokio::test]
async fn announced_address_reaches_the_partner() {
    let url = start_server("*").await;

    let mut a = connect(&url).await;
    assert_eq!(next_event(&mut a).await, json!({"type": "waiting"}));
    send(&mut a, json!({"type": "peer-id", "id": "pjs-a"})).await;
    // The announce has no acknowledgement; let the server process it before
    // the next visitor arrives.
    sleep(Duration::from_millis(200)).await;

    let mut b = connect(&url).await;
    let b_paired = next_event(&mut b).await;
    assert_eq!(b_paired["partnerId"], "pjs-a");
    assert_eq!(next_event(&mut a).await["type"], "paired");
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let url = start_server("*").await;

    let mut a = connect(&url).await;
    assert_eq!(next_event(&mut a).await, json!({"type": "waiting"}));

    // Garbage must not crash the server or unregister the visitor.
    a.send(Message::text("not json")).await.unwrap();
    a.send(Message::binary(vec![0xde, 0xad])).await.unwrap();
    send(&mut a, json!({"type": "message", "text": "no partner yet"})).await;

    let mut b = connect(&url).await;
    assert_eq!(next_event(&mut a).await["type"], "paired");
    assert_eq!(next_event(&mut b).await["type"], "paired");
}

#[tokio::test]
async fn handshake_enforces_allowed_origin() {
    let url = start_server("http://localhost:3000").await;

    // Mismatched Origin is rejected during the handshake.
    let mut request = url.clone().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://evil.example".parse().unwrap());
    match connect_async(request).await {
        Err(Error::Http(response)) => assert_eq!(response.status(), 403),
        Ok(_) => panic!("handshake should have been rejected"),
        Err(other) => panic!("unexpected handshake error: {other}"),
    }

    // The configured origin is admitted.
    let mut request = url.clone().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", "http://localhost:3000".parse().unwrap());
    let (mut client, _) = connect_async(request).await.expect("handshake failed");
    assert_eq!(next_event(&mut client).await, json!({"type": "waiting"}));
}
