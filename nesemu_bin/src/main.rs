use anyhow::{bail, Context};
use clap::Parser;
use log::info;
use nesemu_core::{Buttons, Nes, Palette, CPU_FREQUENCY, HEIGHT, WIDTH};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

mod runner;

use runner::{ControlEvent, ControlSender, EmuContext, FrameReport};

/// Headless NES runner.
#[derive(Parser, Debug)]
#[command(name = "nesemu", version)]
struct Args {
    /// iNES ROM to run
    rom: PathBuf,

    /// Number of frames to run
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Write the last frame as PNG
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Palette file, 64 or 512 RGB triplets
    #[arg(long)]
    palette: Option<PathBuf>,

    /// Log every instruction in nestest format
    #[arg(long)]
    trace: bool,

    /// Start at $C000 like the nestest automation mode
    #[arg(long)]
    nestest: bool,

    /// Hold player 1 buttons over a frame range, e.g. `A+RIGHT@10..40`
    #[arg(long, value_parser = parse_press)]
    press: Vec<Press>,

    /// Reset the console at the start of this frame
    #[arg(long)]
    reset_at: Vec<u64>,

    /// Swap in another ROM at the start of a frame, e.g. `other.nes@120`
    #[arg(long, value_parser = parse_insert)]
    insert: Vec<Insert>,

    /// Restore this snapshot before the first frame
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a snapshot after the last frame
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Play player 1 against a local peer over the netplay protocol
    #[arg(long)]
    loopback: bool,
}

#[derive(Debug, Clone)]
struct Press {
    buttons: Buttons,
    frames: Range<u64>,
}

#[derive(Debug, Clone)]
struct Insert {
    rom: PathBuf,
    frame: u64,
}

fn parse_buttons(s: &str) -> Result<Buttons, String> {
    s.split('+').try_fold(Buttons::empty(), |acc, name| {
        let button = match name.to_ascii_uppercase().as_str() {
            "A" => Buttons::A,
            "B" => Buttons::B,
            "SELECT" => Buttons::SELECT,
            "START" => Buttons::START,
            "UP" => Buttons::UP,
            "DOWN" => Buttons::DOWN,
            "LEFT" => Buttons::LEFT,
            "RIGHT" => Buttons::RIGHT,
            _ => return Err(format!("unknown button {:?}", name)),
        };
        Ok(acc | button)
    })
}

fn parse_frame(s: &str) -> Result<u64, String> {
    s.parse().map_err(|_| format!("invalid frame {:?}", s))
}

fn parse_press(s: &str) -> Result<Press, String> {
    let (buttons, frames) = s
        .split_once('@')
        .ok_or_else(|| "expected BUTTONS@FRAME..FRAME".to_owned())?;
    let frames = match frames.split_once("..") {
        Some((start, end)) => parse_frame(start)?..parse_frame(end)?,
        None => {
            let frame = parse_frame(frames)?;
            frame..frame + 1
        }
    };
    Ok(Press {
        buttons: parse_buttons(buttons)?,
        frames,
    })
}

fn parse_insert(s: &str) -> Result<Insert, String> {
    let (rom, frame) = s
        .rsplit_once('@')
        .ok_or_else(|| "expected ROM@FRAME".to_owned())?;
    Ok(Insert {
        rom: rom.into(),
        frame: parse_frame(frame)?,
    })
}

impl Args {
    fn buttons_at(&self, frame: u64) -> Buttons {
        self.press
            .iter()
            .filter(|p| p.frames.contains(&frame))
            .fold(Buttons::empty(), |acc, p| acc | p.buttons)
    }

    /// Frames where something is sent to the emulation thread.
    fn boundaries(&self) -> Vec<u64> {
        let mut frames: Vec<u64> = self
            .press
            .iter()
            .flat_map(|p| [p.frames.start, p.frames.end])
            .chain(self.reset_at.iter().copied())
            .chain(self.insert.iter().map(|i| i.frame))
            .chain([0, self.frames])
            .filter(|f| *f <= self.frames)
            .collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.trace {
        logger.filter_module("nesemu_core::cpu", log::LevelFilter::Trace);
    }
    logger.init();

    let mut nes =
        Nes::load(&args.rom).with_context(|| format!("loading {}", args.rom.display()))?;
    if let Some(path) = &args.palette {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        nes.set_palette(Palette::from_bytes(&data)?);
    }
    if args.nestest {
        nes.cpu_mut().set_pc(0xc000);
    }

    let (sender, receiver) = crossbeam_channel::unbounded();
    let mut emu = EmuContext::new(nes, receiver);
    if args.loopback {
        emu = emu.with_loopback();
    }
    let handle = emu.spawn();

    if let Some(path) = &args.load_state {
        let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        sender.send(ControlEvent::Restore(data))?;
    }

    let started = Instant::now();
    let report = run(&args, &sender)?;
    let elapsed = started.elapsed().as_secs_f64();

    if let Some(path) = &args.save_state {
        let (tx, rx) = crossbeam_channel::bounded(1);
        sender.send(ControlEvent::Snapshot(tx))?;
        let snapshot = rx.recv().context("emulation thread stopped")??;
        std::fs::write(path, snapshot).with_context(|| format!("writing {}", path.display()))?;
        info!("saved snapshot to {}", path.display());
    }

    sender.send(ControlEvent::Quit)?;
    if handle.join().is_err() {
        bail!("emulation thread panicked");
    }

    let emulated = report.cycles as f64 / CPU_FREQUENCY;
    info!(
        "{} frames, {} cpu cycles, {:.2}s emulated in {:.2}s ({:.1}x)",
        report.frame_count,
        report.cycles,
        emulated,
        elapsed,
        emulated / elapsed.max(f64::EPSILON)
    );

    if let Some(path) = &args.screenshot {
        save_screenshot(path, &report.frame)?;
        info!("saved screenshot to {}", path.display());
    }
    Ok(())
}

/// Feeds the scripted events batch by batch and returns the last report.
fn run(args: &Args, sender: &ControlSender) -> anyhow::Result<FrameReport> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let boundaries = args.boundaries();
    let mut report = None;

    for pair in boundaries.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if args.reset_at.contains(&start) {
            sender.send(ControlEvent::Reset)?;
        }
        for insert in args.insert.iter().filter(|i| i.frame == start) {
            sender.send(ControlEvent::LoadCart(insert.rom.clone()))?;
        }
        sender.send(ControlEvent::Inputs(args.buttons_at(start)))?;
        sender.send(ControlEvent::RunFrames(end - start, tx.clone()))?;
        report = Some(rx.recv().context("emulation thread stopped")?);
    }

    match report {
        Some(report) => Ok(report),
        None => {
            sender.send(ControlEvent::RunFrames(0, tx))?;
            Ok(rx.recv().context("emulation thread stopped")?)
        }
    }
}

fn save_screenshot(path: &Path, frame: &[u32]) -> anyhow::Result<()> {
    let img = image::RgbImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| {
        let c = frame[y as usize * WIDTH + x as usize];
        image::Rgb([(c >> 16) as u8, (c >> 8) as u8, c as u8])
    });
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_press() {
        let p = parse_press("a+Start@10..20").unwrap();
        assert_eq!(p.buttons, Buttons::A | Buttons::START);
        assert_eq!(p.frames, 10..20);

        let p = parse_press("RIGHT@5").unwrap();
        assert_eq!(p.frames, 5..6);

        assert!(parse_press("A").is_err());
        assert!(parse_press("X@1").is_err());
        assert!(parse_press("A@x..2").is_err());
    }

    #[test]
    fn test_boundaries() {
        let args = Args::parse_from([
            "nesemu",
            "game.nes",
            "--frames",
            "100",
            "--press",
            "A@10..20",
            "--press",
            "B@15..200",
            "--reset-at",
            "50",
        ]);
        assert_eq!(args.boundaries(), vec![0, 10, 15, 20, 50, 100]);
        assert_eq!(args.buttons_at(16), Buttons::A | Buttons::B);
        assert_eq!(args.buttons_at(20), Buttons::B);
        assert_eq!(args.buttons_at(9), Buttons::empty());
    }

    #[test]
    fn test_parse_insert() {
        let i = parse_insert("roms/a@b.nes@120").unwrap();
        assert_eq!(i.rom, PathBuf::from("roms/a@b.nes"));
        assert_eq!(i.frame, 120);
    }
}
