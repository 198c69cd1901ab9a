//! Co-op peer protocol
//!
//! Two peers, one host and one guest. The host owns enemies, platforms and
//! rounds; each side owns its own player. Inbound frames land in a
//! `Mailbox` that the tick loop drains at the start of every tick.

pub mod mailbox;
pub mod protocol;
pub mod session;

pub use mailbox::{Inbox, Mailbox};
pub use protocol::{PeerMessage, ProtocolError, RemoteAction, StateSync};
pub use session::{
    Applied, ChannelLink, FrameReceiver, LinkError, PeerLink, PeerSession, apply_inbox,
    loopback_pair, pump_inbound,
};
