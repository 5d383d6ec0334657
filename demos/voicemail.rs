//! Voicemail greeting demo
//!
//! Run with: cargo run --example voicemail [SOUNDS_DIR]
//!
//! Records a two-second tone as a greeting, then plays it back on a console
//! channel whose caller presses `6` (skip forward) and later `#` (stop).
//!
//! This example demonstrates:
//! - Recording signed-linear audio into an A-law file (translated on write)
//! - Resolving and streaming a file onto a channel
//! - Waiting on playback with forward / reverse / break digits
//!
//! # Flow
//!
//! ```text
//!   tone (slin) ──► FileEngine::write_stream ──► vm/greeting.alaw
//!                                                      │
//!   ConsoleChannel ◄── MediaSession ◄── stream_file ◄──┘
//!        │
//!        └── scripted DTMF ──► wait_stream_fr
//! ```

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;

use pbx_media::playback;
use pbx_media::{
    Channel, ChannelEvent, FileConfig, FileEngine, Format, FormatCap, Frame, MediaSession,
    WaitOutcome, WriteOptions,
};

/// Samples per recorded frame (20 ms at 8 kHz)
const FRAME_SAMPLES: usize = 160;

/// A channel that prints what it is sent and replays scripted key presses
struct ConsoleChannel {
    write_format: Format,
    frames: u64,
    bytes: u64,
    script: VecDeque<(Duration, char)>,
    next_at: Option<Instant>,
}

impl ConsoleChannel {
    fn new(script: &[(u64, char)]) -> Self {
        Self {
            write_format: Format::Slin,
            frames: 0,
            bytes: 0,
            script: script
                .iter()
                .map(|(ms, digit)| (Duration::from_millis(*ms), *digit))
                .collect(),
            next_at: None,
        }
    }
}

#[async_trait]
impl Channel for ConsoleChannel {
    fn name(&self) -> &str {
        "Console/dsp"
    }

    fn identity_token(&self) -> u64 {
        1
    }

    fn native_formats(&self) -> FormatCap {
        [Format::Slin, Format::Alaw].into_iter().collect()
    }

    fn write_format(&self) -> Format {
        self.write_format
    }

    fn set_write_format(&mut self, format: Format) -> pbx_media::Result<()> {
        self.write_format = format;
        Ok(())
    }

    fn write(&mut self, frame: Frame) -> pbx_media::Result<()> {
        self.frames += 1;
        self.bytes += frame.datalen() as u64;
        if self.frames % 25 == 0 {
            println!("  ... {} frames ({} bytes) played", self.frames, self.bytes);
        }
        Ok(())
    }

    async fn read(&mut self) -> Option<ChannelEvent> {
        let Some(after) = self.script.front().map(|(after, _)| *after) else {
            return std::future::pending().await;
        };
        let due = *self.next_at.get_or_insert(Instant::now() + after);
        tokio::time::sleep_until(due).await;
        self.next_at = None;
        let (_, digit) = self.script.pop_front()?;
        println!("  caller pressed {digit}");
        Some(ChannelEvent::Dtmf(digit))
    }

    fn language(&self) -> &str {
        "en"
    }
}

/// One 20 ms frame of a 440 Hz tone starting at sample `start`
fn tone_frame(start: usize) -> Frame {
    let mut pcm = Vec::with_capacity(FRAME_SAMPLES * 2);
    for n in start..start + FRAME_SAMPLES {
        let phase = n as f32 * 2.0 * std::f32::consts::PI * 440.0 / 8000.0;
        let sample = (phase.sin() * 6000.0) as i16;
        pcm.extend_from_slice(&sample.to_ne_bytes());
    }
    Frame::new(Format::Slin, Bytes::from(pcm), FRAME_SAMPLES as u32)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pbx_media=debug".parse()?)
                .add_directive("voicemail=debug".parse()?),
        )
        .init();

    let scratch = tempfile::tempdir()?;
    let sounds: PathBuf = match std::env::args().nth(1) {
        Some(dir) => PathBuf::from(dir),
        None => scratch.path().to_path_buf(),
    };
    std::fs::create_dir_all(sounds.join("vm"))?;
    println!("Sounds directory: {}", sounds.display());

    let registry = pbx_media::registry::init();
    let engine = FileEngine::new(registry, FileConfig::with_sounds_dir(&sounds));

    // Record the greeting
    let mut greeting = engine.write_file("vm/greeting", "alaw", None, WriteOptions::default())?;
    for frame in 0..100 {
        engine.write_stream(&mut greeting, &tone_frame(frame * FRAME_SAMPLES))?;
    }
    greeting.close()?;
    println!(
        "Recorded {} frames to {}",
        greeting.stats().frames_written,
        greeting.path().display()
    );
    drop(greeting);

    // Play it back
    let channel = ConsoleChannel::new(&[(300, '6'), (600, '#')]);
    let mut session = MediaSession::new(channel);
    let language = session.channel().language().to_string();
    engine.stream_file(&mut session, "vm/greeting", &language)?;

    let outcome =
        playback::wait_stream_fr(&mut session, "#", "6", "4", Duration::from_millis(500)).await?;
    match outcome {
        WaitOutcome::Digit(digit) => println!("Playback interrupted by {digit}"),
        WaitOutcome::Finished => println!("Playback finished"),
        other => println!("Playback ended: {other:?}"),
    }
    println!("Channel received {} frames", session.channel().frames);

    session.stop_stream();
    pbx_media::registry::shutdown();
    Ok(())
}
