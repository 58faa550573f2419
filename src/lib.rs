//! Pairing and relay signaling server for anonymous one-to-one WebRTC chat
//!
//! Visitors connect over a WebSocket, are paired FIFO with the
//! longest-waiting visitor, and exchange the signaling traffic (WebRTC
//! offer/answer/ICE and chat text) needed to establish a direct peer
//! connection. When a partner disconnects, the survivor goes to the back of
//! the waiting pool and is matched again. Media never passes through this
//! server; sessions are ephemeral and nothing is persisted.
//!
//! # Protocol
//!
//! All frames are JSON text messages with a `type` tag.
//!
//! Client → server:
//! - `{"type":"peer-id","id":"<string>"}` - announce an external addressing
//!   id (e.g. for a separate direct handshake channel)
//! - `{"type":"message","to":"<id>"?,"text":"..."}` - chat text; without
//!   `to`, routed to the current partner
//! - `{"type":"offer","to":"<id>","sdp":...}` - WebRTC offer
//! - `{"type":"answer","to":"<id>","sdp":...}` - WebRTC answer
//! - `{"type":"ice-candidate","to":"<id>","candidate":...}` - ICE candidate
//!
//! Server → client:
//! - `{"type":"waiting"}` - no partner available yet
//! - `{"type":"paired","partnerId":"<id>"}` - partner assigned
//! - `{"type":"message","from":"<uuid>","text":"..."}` - relayed chat
//! - `{"type":"offer"|"answer"|"ice-candidate","from":"<uuid>",...}` -
//!   relayed handshake primitive
//!
//! Relay is best-effort: a message whose target is gone (or whose sender has
//! no partner) is dropped silently.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! roulette-signaling --port 3001 --allowed-origin http://localhost:3000
//!
//! # Tail the pairing decisions
//! RUST_LOG=roulette_signaling=debug roulette-signaling -p 3001 -o '*'
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod handler;
pub mod protocol;
pub mod state;

pub use error::{ClientRequestError, SignalingError};
pub use handler::serve;
pub use protocol::{ClientEvent, PeerId, ServerEvent};
pub use state::{Matchmaker, MatchmakerHandle};
