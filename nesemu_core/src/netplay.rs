//! Two-peer lockstep input exchange.
//!
//! Each peer calls [`NetplaySession::exchange_frame`] before running a frame.
//! Both machines then see the same buttons for both players on every frame,
//! which keeps them in lockstep as long as they started from the same state.

use crate::bus::{Buttons, Player};
use crate::error::Error;
use crate::nes::Nes;
use crossbeam_channel::{Receiver, Sender};
use std::fmt;

const BUTTONS_TAG: &[u8] = b"BUTTONS ";
const RESET_TAG: &[u8] = b"RESET";
const SYNC_TAG: &[u8] = b"SYNC ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerMessage {
    /// the sender's buttons for the next frame
    Buttons(Buttons),
    Reset,
    /// a snapshot the receiver restores
    Sync(Vec<u8>),
}

impl PeerMessage {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PeerMessage::Buttons(b) => {
                let mut data = BUTTONS_TAG.to_vec();
                data.extend_from_slice(b.to_netplay_string().as_bytes());
                data
            }
            PeerMessage::Reset => RESET_TAG.to_vec(),
            PeerMessage::Sync(snapshot) => {
                let mut data = SYNC_TAG.to_vec();
                data.extend_from_slice(snapshot);
                data
            }
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, NetplayError> {
        if let Some(bits) = data.strip_prefix(BUTTONS_TAG) {
            std::str::from_utf8(bits)
                .ok()
                .and_then(Buttons::from_netplay_string)
                .map(PeerMessage::Buttons)
                .ok_or(NetplayError::Malformed)
        } else if data == RESET_TAG {
            Ok(PeerMessage::Reset)
        } else if let Some(snapshot) = data.strip_prefix(SYNC_TAG) {
            Ok(PeerMessage::Sync(snapshot.to_vec()))
        } else {
            Err(NetplayError::Malformed)
        }
    }
}

#[derive(Debug)]
pub enum NetplayError {
    /// the other side hung up
    Disconnected,
    Malformed,
    /// a received snapshot did not apply
    State(Error),
}

impl fmt::Display for NetplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetplayError::Disconnected => write!(f, "peer disconnected"),
            NetplayError::Malformed => write!(f, "malformed peer message"),
            NetplayError::State(e) => write!(f, "peer state rejected: {}", e),
        }
    }
}

impl std::error::Error for NetplayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetplayError::State(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for NetplayError {
    fn from(e: Error) -> Self {
        NetplayError::State(e)
    }
}

/// Ordered, reliable message transport to the other peer.
pub trait PeerChannel {
    fn send(&mut self, msg: PeerMessage) -> Result<(), NetplayError>;

    /// Blocks until the next message arrives.
    fn recv(&mut self) -> Result<PeerMessage, NetplayError>;
}

/// In-process transport, messages travel in their encoded form.
pub struct ChannelPeer {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelPeer {
    pub fn pair() -> (Self, Self) {
        let (tx0, rx0) = crossbeam_channel::unbounded();
        let (tx1, rx1) = crossbeam_channel::unbounded();
        (Self { tx: tx0, rx: rx1 }, Self { tx: tx1, rx: rx0 })
    }
}

impl PeerChannel for ChannelPeer {
    fn send(&mut self, msg: PeerMessage) -> Result<(), NetplayError> {
        self.tx
            .send(msg.encode())
            .map_err(|_| NetplayError::Disconnected)
    }

    fn recv(&mut self) -> Result<PeerMessage, NetplayError> {
        let data = self.rx.recv().map_err(|_| NetplayError::Disconnected)?;
        PeerMessage::decode(&data)
    }
}

/// One side of a two player session. Any error closes the session.
pub struct NetplaySession<C: PeerChannel> {
    channel: C,
    player: Player,
    closed: bool,
}

impl<C: PeerChannel> NetplaySession<C> {
    pub fn new(channel: C, player: Player) -> Self {
        log::info!("netplay session as {:?}", player);
        Self {
            channel,
            player,
            closed: false,
        }
    }

    pub fn player(&self) -> Player {
        self.player
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends this peer's buttons and waits for the other peer's, applying
    /// any reset or sync that arrives first. Both players' buttons are
    /// committed once this returns.
    pub fn exchange_frame(&mut self, nes: &mut Nes) -> Result<(), NetplayError> {
        let local = nes.joypad().local();
        self.send(PeerMessage::Buttons(local))?;

        let remote = loop {
            match self.recv()? {
                PeerMessage::Buttons(b) => break b,
                PeerMessage::Reset => nes.reset(),
                PeerMessage::Sync(snapshot) => {
                    if let Err(e) = nes.restore(&snapshot) {
                        return Err(self.close(e.into()));
                    }
                }
            }
        };

        let joypad = nes.joypad_mut();
        joypad.set_committed(self.player, local);
        joypad.set_committed(self.player.other(), remote);
        Ok(())
    }

    /// Resets both machines before the next frame.
    pub fn send_reset(&mut self, nes: &mut Nes) -> Result<(), NetplayError> {
        self.send(PeerMessage::Reset)?;
        nes.reset();
        Ok(())
    }

    /// Makes the other machine a copy of `nes`.
    pub fn send_sync(&mut self, nes: &Nes) -> Result<(), NetplayError> {
        let snapshot = nes.snapshot().map_err(NetplayError::State)?;
        self.send(PeerMessage::Sync(snapshot))
    }

    fn send(&mut self, msg: PeerMessage) -> Result<(), NetplayError> {
        if self.closed {
            return Err(NetplayError::Disconnected);
        }
        self.channel.send(msg).map_err(|e| self.close(e))
    }

    fn recv(&mut self) -> Result<PeerMessage, NetplayError> {
        if self.closed {
            return Err(NetplayError::Disconnected);
        }
        self.channel.recv().map_err(|e| self.close(e))
    }

    fn close(&mut self, e: NetplayError) -> NetplayError {
        log::warn!("netplay session closed: {}", e);
        self.closed = true;
        e
    }
}
