//! Matchmaker state and pairing logic
//!
//! The [`Matchmaker`] owns the connection registry, the FIFO waiting pool and
//! the symmetric pairing table. It is plain synchronous state with explicit
//! `on_connect` / `on_disconnect` / `on_message` methods, so the pairing
//! rules can be unit tested without opening a socket.
//!
//! At runtime a single actor task owns the `Matchmaker` and drains a command
//! channel ([`Matchmaker::spawn`]); connection handlers talk to it through a
//! cloneable [`MatchmakerHandle`]. Commands are processed to completion one
//! at a time, which gives the single-writer discipline the pairing table
//! needs without any locking.

use crate::error::SignalingError;
use crate::protocol::{ClientEvent, PeerId, ServerEvent};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-endpoint record in the connection registry.
struct Client {
    /// Outbound event channel, drained by the connection's writer task.
    sender: mpsc::UnboundedSender<ServerEvent>,
    /// Client-announced addressing id for its direct peer connection channel.
    external_address: Option<String>,
}

/// All matchmaking state: who is connected, who is waiting, who is paired.
///
/// Invariants, maintained by every operation:
/// - a connected endpoint is in the waiting pool or the pairing table,
///   never both;
/// - the pairing table is symmetric and each id keys at most one entry.
#[derive(Default)]
pub struct Matchmaker {
    clients: HashMap<PeerId, Client>,
    waiting: VecDeque<PeerId>,
    pairs: HashMap<PeerId, PeerId>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected endpoint and attempt to pair it.
    ///
    /// Emits exactly one of `paired` (to both sides, if a partner was
    /// waiting) or `waiting` (to the new endpoint alone).
    pub fn on_connect(&mut self, peer: PeerId, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.clients.insert(
            peer,
            Client {
                sender,
                external_address: None,
            },
        );
        self.try_pair(peer);
    }

    /// Remove an endpoint, requeueing its partner if it had one.
    ///
    /// Idempotent: disconnecting an unknown or already-removed endpoint is a
    /// no-op.
    pub fn on_disconnect(&mut self, peer: PeerId) {
        if self.clients.remove(&peer).is_none() {
            return;
        }
        self.waiting.retain(|p| *p != peer);
        if let Some(partner) = self.pairs.remove(&peer) {
            self.pairs.remove(&partner);
            if self.clients.contains_key(&partner) {
                info!(%peer, %partner, "partner disconnected, requeueing survivor");
                self.try_pair(partner);
            }
        }
    }

    /// Handle an application event from a connected endpoint.
    ///
    /// Relayed events are forwarded to the resolved target tagged with the
    /// sender's id. A routing miss (no such target, no partner, target
    /// mid-disconnect) is returned as an error for the caller to log; it is
    /// never surfaced to the sender.
    pub fn on_message(&mut self, from: PeerId, event: ClientEvent) -> Result<(), SignalingError> {
        if !self.clients.contains_key(&from) {
            // Race between disconnect and an in-flight frame.
            return Err(SignalingError::UnknownPeer);
        }
        match event {
            ClientEvent::PeerId { id } => {
                self.set_external_address(from, id);
                Ok(())
            }
            ClientEvent::Message { to, text } => {
                let target = match to {
                    Some(addr) => self.resolve(&addr),
                    None => self.pairs.get(&from).copied(),
                }
                .ok_or(SignalingError::UnknownPeer)?;
                self.send(target, ServerEvent::Message { from, text })
            }
            ClientEvent::Offer { to, sdp } => {
                let target = self.resolve(&to).ok_or(SignalingError::UnknownPeer)?;
                self.send(target, ServerEvent::Offer { from, sdp })
            }
            ClientEvent::Answer { to, sdp } => {
                let target = self.resolve(&to).ok_or(SignalingError::UnknownPeer)?;
                self.send(target, ServerEvent::Answer { from, sdp })
            }
            ClientEvent::IceCandidate { to, candidate } => {
                let target = self.resolve(&to).ok_or(SignalingError::UnknownPeer)?;
                self.send(target, ServerEvent::IceCandidate { from, candidate })
            }
        }
    }

    /// Attach a client-announced external addressing id. Last write wins.
    pub fn set_external_address(&mut self, peer: PeerId, address: String) {
        if let Some(client) = self.clients.get_mut(&peer) {
            debug!(%peer, %address, "external address announced");
            client.external_address = Some(address);
        }
    }

    /// Current partner of `peer`, if paired.
    pub fn partner_of(&self, peer: PeerId) -> Option<PeerId> {
        self.pairs.get(&peer).copied()
    }

    /// Whether `peer` is in the waiting pool.
    pub fn is_waiting(&self, peer: PeerId) -> bool {
        self.waiting.contains(&peer)
    }

    /// Whether `peer` is in the connection registry.
    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.clients.contains_key(&peer)
    }

    /// Pair `peer` with the longest-waiting endpoint, or enqueue it.
    ///
    /// `peer` must be connected and in neither the waiting pool nor the
    /// pairing table. Used both for fresh connects and for requeued
    /// survivors, so a survivor competes fairly with endpoints already
    /// waiting instead of jumping the queue.
    fn try_pair(&mut self, peer: PeerId) {
        if let Some(partner) = self.waiting.pop_front() {
            self.pairs.insert(peer, partner);
            self.pairs.insert(partner, peer);
            info!(%peer, %partner, "paired");
            self.notify(
                peer,
                ServerEvent::Paired {
                    partner_id: self.addressing_id(partner),
                },
            );
            self.notify(
                partner,
                ServerEvent::Paired {
                    partner_id: self.addressing_id(peer),
                },
            );
        } else {
            self.waiting.push_back(peer);
            self.notify(peer, ServerEvent::Waiting);
        }
    }

    /// Resolve a client-supplied target id against the registry: either a
    /// `PeerId` string or an announced external address.
    fn resolve(&self, addr: &str) -> Option<PeerId> {
        if let Ok(id) = Uuid::parse_str(addr) {
            let peer = PeerId(id);
            if self.clients.contains_key(&peer) {
                return Some(peer);
            }
        }
        self.clients
            .iter()
            .find(|(_, client)| client.external_address.as_deref() == Some(addr))
            .map(|(peer, _)| *peer)
    }

    /// The id a partner should use to address `peer`: its announced external
    /// address, falling back to its `PeerId` string.
    fn addressing_id(&self, peer: PeerId) -> String {
        self.clients
            .get(&peer)
            .and_then(|client| client.external_address.clone())
            .unwrap_or_else(|| peer.to_string())
    }

    /// Relay an event to a live endpoint.
    fn send(&self, to: PeerId, event: ServerEvent) -> Result<(), SignalingError> {
        let client = self.clients.get(&to).ok_or(SignalingError::UnknownPeer)?;
        debug!(%to, "forwarding event");
        client
            .sender
            .send(event)
            .map_err(|_| SignalingError::SendError(to))
    }

    /// Fire-and-forget lifecycle notification. A closed channel means the
    /// endpoint is mid-disconnect; its pending disconnect command cleans up.
    fn notify(&self, to: PeerId, event: ServerEvent) {
        if let Err(e) = self.send(to, event) {
            debug!(%to, error = %e, "dropping notification");
        }
    }
}

/// Commands sent from connection handlers to the matchmaker actor.
enum MatchmakerCommand {
    Connect {
        peer: PeerId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    },
    Disconnect {
        peer: PeerId,
    },
    Incoming {
        peer: PeerId,
        event: ClientEvent,
    },
}

/// Cheap-to-clone handle to the matchmaker actor.
///
/// All methods are fire-and-forget; a send failure only happens at process
/// shutdown when the actor task is gone, and is ignored.
#[derive(Clone)]
pub struct MatchmakerHandle {
    commands: mpsc::UnboundedSender<MatchmakerCommand>,
}

impl MatchmakerHandle {
    pub fn connect(&self, peer: PeerId, sender: mpsc::UnboundedSender<ServerEvent>) {
        let _ = self
            .commands
            .send(MatchmakerCommand::Connect { peer, sender });
    }

    pub fn disconnect(&self, peer: PeerId) {
        let _ = self.commands.send(MatchmakerCommand::Disconnect { peer });
    }

    pub fn message(&self, peer: PeerId, event: ClientEvent) {
        let _ = self.commands.send(MatchmakerCommand::Incoming { peer, event });
    }
}

impl Matchmaker {
    /// Spawn the matchmaker actor and return a handle to it.
    ///
    /// The actor owns all state and drains its command channel sequentially,
    /// so every connect/disconnect/message is processed to completion before
    /// the next one is looked at.
    pub fn spawn() -> MatchmakerHandle {
        let (commands, mut rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut state = Matchmaker::new();
            while let Some(command) = rx.recv().await {
                match command {
                    MatchmakerCommand::Connect { peer, sender } => state.on_connect(peer, sender),
                    MatchmakerCommand::Disconnect { peer } => state.on_disconnect(peer),
                    MatchmakerCommand::Incoming { peer, event } => {
                        if let Err(e) = state.on_message(peer, event) {
                            debug!(%peer, error = %e, "dropping unroutable message");
                        }
                    }
                }
            }
        });
        MatchmakerHandle { commands }
    }
}
