use log::{info, warn};
use nesemu_core::netplay::{ChannelPeer, NetplaySession};
use nesemu_core::{Buttons, Nes, Player};
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

pub type ControlReceiver = crossbeam_channel::Receiver<ControlEvent>;
pub type ControlSender = crossbeam_channel::Sender<ControlEvent>;
pub type ReportSender = crossbeam_channel::Sender<FrameReport>;
pub type SnapshotSender = crossbeam_channel::Sender<nesemu_core::Result<Vec<u8>>>;

pub enum ControlEvent {
    LoadCart(PathBuf),
    Reset,
    Inputs(Buttons),
    RunFrames(u64, ReportSender),
    Snapshot(SnapshotSender),
    Restore(Vec<u8>),
    Quit,
}

/// Sent back once a `RunFrames` batch is done.
pub struct FrameReport {
    pub frame_count: u64,
    pub cycles: u64,
    pub frame: Vec<u32>,
}

pub struct EmuContext {
    nes: Nes,
    pending: Option<(u64, ReportSender)>,
    quit: bool,
    netplay: Option<NetplaySession<ChannelPeer>>,
    control_events: ControlReceiver,
}

impl EmuContext {
    pub fn new(nes: Nes, control_events: ControlReceiver) -> Self {
        Self {
            nes,
            pending: None,
            quit: false,
            netplay: None,
            control_events,
        }
    }

    /// Plays as player 1 against a copy of this machine on another thread.
    /// The copy presses nothing and keeps running until the session drops.
    pub fn with_loopback(mut self) -> Self {
        let (local, remote) = ChannelPeer::pair();
        let mut partner = self.nes.clone();
        thread::spawn(move || {
            let mut session = NetplaySession::new(remote, Player::Two);
            while session.exchange_frame(&mut partner).is_ok() {
                partner.run_frame();
            }
            info!("loopback peer stopped after {} frames", partner.frame_count());
        });

        self.netplay = Some(NetplaySession::new(local, Player::One));
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || self.run())
    }

    fn run(mut self) {
        while !self.quit {
            if self.pending.is_none() {
                match self.control_events.recv() {
                    Ok(ev) => self.handle(ev),
                    Err(_) => break,
                }
                continue;
            }

            self.poll_events();
            self.frame();
        }
    }

    /// Events only take effect between frames.
    fn poll_events(&mut self) {
        while let Ok(ev) = self.control_events.try_recv() {
            self.handle(ev);
        }
    }

    fn handle(&mut self, ev: ControlEvent) {
        let EmuContext {
            nes,
            pending,
            quit,
            netplay,
            ..
        } = self;

        match ev {
            ControlEvent::LoadCart(path) => {
                if netplay.is_some() {
                    warn!("cannot swap cartridges during netplay");
                } else if let Err(e) = nes.load_cartridge(&path) {
                    warn!("failed to load {}: {}", path.display(), e);
                }
            }
            ControlEvent::Reset => match netplay {
                Some(session) => {
                    if session.send_reset(nes).is_err() {
                        nes.reset();
                    }
                }
                None => nes.reset(),
            },
            ControlEvent::Inputs(buttons) => nes.joypad_mut().set_local(buttons),
            ControlEvent::RunFrames(0, reply) => {
                if reply.send(report(nes)).is_err() {
                    warn!("frame report dropped, nobody is waiting");
                }
            }
            ControlEvent::RunFrames(n, reply) => *pending = Some((n, reply)),
            ControlEvent::Snapshot(reply) => {
                if reply.send(nes.snapshot()).is_err() {
                    warn!("snapshot dropped, nobody is waiting");
                }
            }
            ControlEvent::Restore(data) => match nes.restore(&data) {
                Ok(()) => {
                    info!("restored snapshot at frame {}", nes.frame_count());
                    if let Some(session) = netplay {
                        if let Err(e) = session.send_sync(nes) {
                            warn!("peer not synced after restore: {}", e);
                        }
                    }
                }
                Err(e) => warn!("snapshot rejected: {}", e),
            },
            ControlEvent::Quit => *quit = true,
        }
    }

    fn frame(&mut self) {
        match &mut self.netplay {
            Some(session) if !session.is_closed() => {
                if session.exchange_frame(&mut self.nes).is_err() {
                    self.nes.joypad_mut().commit(Player::One);
                }
            }
            _ => self.nes.joypad_mut().commit(Player::One),
        }
        self.nes.run_frame();

        if let Some((left, reply)) = &mut self.pending {
            *left -= 1;
            if *left == 0 {
                if reply.send(report(&self.nes)).is_err() {
                    warn!("frame report dropped, nobody is waiting");
                }
                self.pending = None;
            }
        }
    }
}

fn report(nes: &Nes) -> FrameReport {
    FrameReport {
        frame_count: nes.frame_count(),
        cycles: nes.cpu().cycles(),
        frame: nes.frame().to_vec(),
    }
}
