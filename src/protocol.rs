//! Wire protocol for the signaling connection
//!
//! All frames are JSON text messages tagged with a `type` field. Clients send
//! [`ClientEvent`]s, the server sends [`ServerEvent`]s. SDP and ICE payloads
//! are opaque to the server and relayed verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque endpoint identifier, assigned at connect time and stable until
/// disconnect. Serializes as its UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub Uuid);

impl PeerId {
    /// Generate a fresh random id for a newly connected endpoint.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Events received from clients.
///
/// `to` fields hold either a partner's [`PeerId`] string or an external
/// addressing id previously announced via `peer-id`; the matchmaker resolves
/// both. A `message` without `to` is routed to the sender's current partner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Announce an external addressing id (e.g. a PeerJS id) used by the
    /// partner to open the direct peer connection.
    PeerId { id: String },
    /// Chat text, relayed to the current partner or the explicit `to` target.
    Message {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        text: String,
    },
    /// WebRTC session offer.
    Offer { to: String, sdp: serde_json::Value },
    /// WebRTC session answer.
    Answer { to: String, sdp: serde_json::Value },
    /// Trickled ICE candidate.
    IceCandidate {
        to: String,
        candidate: serde_json::Value,
    },
}

impl FromStr for ClientEvent {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

/// Events sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// No partner currently available; the endpoint is in the waiting pool.
    Waiting,
    /// A partner has been assigned. `partnerId` is the partner's announced
    /// external addressing id, or its [`PeerId`] string if none was announced.
    Paired {
        #[serde(rename = "partnerId")]
        partner_id: String,
    },
    /// Relayed chat text.
    Message { from: PeerId, text: String },
    /// Relayed WebRTC session offer.
    Offer { from: PeerId, sdp: serde_json::Value },
    /// Relayed WebRTC session answer.
    Answer { from: PeerId, sdp: serde_json::Value },
    /// Relayed ICE candidate.
    IceCandidate {
        from: PeerId,
        candidate: serde_json::Value,
    },
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}
