//! Peer session: transport seam, inbound pump, and applying remote state
//!
//! One session connects exactly two peers. Sends are fire-and-forget; the
//! receive side runs as a task that only ever writes into the `Mailbox`.
//! A closed link is terminal for the session.

use glam::Vec2;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::mailbox::{Inbox, Mailbox};
use super::protocol::{PeerMessage, PlayerJoin, ProtocolError, RemoteAction};
use crate::sim::combat::fire;
use crate::sim::round::adopt_round;
use crate::sim::{Authority, Control, GameEvent, Player, SimulationState};

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Peer link closed")]
    Closed,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reliable, ordered, point-to-point text channel to the other peer
pub trait PeerLink: Send {
    /// Queue one frame for delivery without waiting
    fn send_text(&self, frame: String) -> Result<(), LinkError>;

    fn is_open(&self) -> bool;
}

/// In-process link over an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<String>,
}

pub type FrameReceiver = mpsc::UnboundedReceiver<String>;

impl PeerLink for ChannelLink {
    fn send_text(&self, frame: String) -> Result<(), LinkError> {
        self.tx.send(frame).map_err(|_| LinkError::Closed)
    }

    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Two cross-wired links: what one side sends, the other receives
pub fn loopback_pair() -> ((ChannelLink, FrameReceiver), (ChannelLink, FrameReceiver)) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    ((ChannelLink { tx: a_tx }, b_rx), (ChannelLink { tx: b_tx }, a_rx))
}

/// Decode inbound frames into the mailbox until the sender goes away
pub async fn pump_inbound(mut rx: FrameReceiver, mailbox: Mailbox) {
    while let Some(frame) = rx.recv().await {
        match PeerMessage::decode(&frame) {
            Ok(message) => {
                log::debug!("Received {}", message.kind());
                mailbox.post(message);
            }
            Err(e) => log::warn!("Dropping malformed peer frame: {}", e),
        }
    }
    log::info!("Peer link closed by remote side");
    mailbox.close();
}

/// What applying one inbox changed
#[derive(Debug, Default)]
pub struct Applied {
    pub joined: Option<PlayerJoin>,
    /// Messages rejected as malformed or invalid
    pub rejected: usize,
    pub closed: bool,
}

/// Live co-op session for one side
pub struct PeerSession {
    role: Authority,
    link: Box<dyn PeerLink>,
    mailbox: Mailbox,
    pump: Option<JoinHandle<()>>,
}

impl PeerSession {
    /// Wrap a link and start pumping its inbound frames
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(role: Authority, link: impl PeerLink + 'static, inbound: FrameReceiver) -> Self {
        let mailbox = Mailbox::new();
        let pump = tokio::spawn(pump_inbound(inbound, mailbox.clone()));
        log::info!("Co-op session started as {:?}", role);
        Self {
            role,
            link: Box::new(link),
            mailbox,
            pump: Some(pump),
        }
    }

    /// Session fed by an externally owned mailbox (no pump task)
    pub fn with_mailbox(role: Authority, link: impl PeerLink + 'static, mailbox: Mailbox) -> Self {
        Self {
            role,
            link: Box::new(link),
            mailbox,
            pump: None,
        }
    }

    pub fn role(&self) -> Authority {
        self.role
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open() && !self.mailbox.is_closed()
    }

    pub fn send(&self, message: &PeerMessage) -> Result<(), LinkError> {
        let frame = message.encode()?;
        self.link.send_text(frame)
    }

    /// Guest handshake after connecting
    pub fn announce(&self, id: &str, name: &str) -> Result<(), LinkError> {
        self.send(&PeerMessage::player_join(id, name))
    }

    /// Send the end-of-tick snapshot and the actions this tick produced
    pub fn broadcast_tick(&self, state: &SimulationState) -> Result<(), LinkError> {
        if let Some(sync) = PeerMessage::state_sync(state) {
            self.send(&sync)?;
        }
        let local_slots: Vec<usize> = state
            .players
            .iter()
            .filter(|p| p.is_local())
            .map(|p| p.slot)
            .collect();
        for event in &state.events {
            match event {
                GameEvent::Shot { slot, vel } if local_slots.contains(slot) => {
                    self.send(&PeerMessage::shoot(*vel))?;
                }
                GameEvent::RoundStarted { round } if self.role == Authority::Host => {
                    self.send(&PeerMessage::next_round(*round))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Everything received since the last call
    pub fn poll(&self) -> Inbox {
        self.mailbox.drain()
    }

    /// Stop the inbound pump; the session is unusable afterwards
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
        self.mailbox.close();
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Apply a drained inbox to the local simulation
///
/// The remote player's mirrored fields are overwritten wholesale. On a guest
/// the host's enemies and platforms replace the local copies; a host ignores
/// any world data a guest might send.
pub fn apply_inbox(state: &mut SimulationState, inbox: Inbox) -> Applied {
    let mut applied = Applied {
        closed: inbox.closed,
        ..Default::default()
    };
    if inbox.dropped > 0 {
        log::warn!("Mailbox overflowed, {} peer messages dropped", inbox.dropped);
    }

    if let Some(sync) = inbox.sync {
        if let Some(remote) = state.remote_player_mut() {
            if let Err(e) = sync.player.apply_to(remote) {
                log::warn!("Rejected remote player snapshot: {}", e);
                applied.rejected += 1;
            }
        }
        if !state.authority.owns_world() {
            match (sync.decode_enemies(), sync.decode_platforms()) {
                (Ok(enemies), Ok(platforms)) => {
                    if let Some(enemies) = enemies {
                        state.enemies = enemies;
                    }
                    if let Some(platforms) = platforms {
                        state.platforms = platforms;
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Rejected host world snapshot: {}", e);
                    applied.rejected += 1;
                }
            }
        }
    }

    for message in inbox.events {
        match message {
            PeerMessage::Action(action) => match action.parse() {
                Ok(RemoteAction::Shoot { vel }) => {
                    let remote_slot = state.players.iter().find(|p| !p.is_local()).map(|p| p.slot);
                    if let Some(slot) = remote_slot {
                        fire(state, slot, Vec2::ZERO, Some(vel));
                    }
                }
                Ok(RemoteAction::NextRound { round }) => {
                    if !state.authority.owns_world() {
                        adopt_round(state, round);
                    }
                }
                Ok(RemoteAction::Unknown(name)) => log::debug!("Ignoring unknown action {}", name),
                Err(e) => {
                    log::warn!("Rejected peer action: {}", e);
                    applied.rejected += 1;
                }
            },
            PeerMessage::PlayerJoin(join) => {
                log::info!("Player {} ({}) joined", join.name, join.id);
                if state.authority == Authority::Host && state.remote_player_mut().is_none() {
                    state.players.push(Player::new(1, Control::Remote));
                }
                applied.joined = Some(join);
            }
            PeerMessage::StateSync(_) => {}
        }
    }
    applied
}
