//! Channel media session
//!
//! A [`MediaSession`] pairs one channel with the streams bound to it (at
//! most one audio and one video) and the scheduler that paces them.
//!
//! # Flow
//!
//! ```text
//!   bind(fs) ──► play_stream() ──► deliver ──► task armed
//!                                                  │
//!               run_due(now) ◄─────── next_due() ◄─┘
//!                    │
//!                    ├──► deliver again (rearm / reschedule)
//!                    └──► Ended / Failed ──► slot cleared, stream closed
//! ```
//!
//! Everything runs on the task that owns the session; nothing here spawns.

pub mod channel;
pub mod scheduler;
pub mod state;
pub mod stream;

use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::file::Filestream;
use crate::media::{Format, MediaKind};

pub use channel::{Channel, ExtensionMatcher};
pub use scheduler::{Scheduler, Slot, TaskId};
pub use state::{BoundStream, StreamPhase};
pub use stream::PassOutcome;

/// A channel plus its bound streams and delivery scheduler
pub struct MediaSession<C: Channel> {
    channel: C,
    scheduler: Scheduler,
    audio: Option<BoundStream>,
    video: Option<BoundStream>,

    /// Write format to restore when playback stops
    old_write_format: Option<Format>,
}

impl<C: Channel> MediaSession<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            scheduler: Scheduler::new(),
            audio: None,
            video: None,
            old_write_format: None,
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn slot(&self, slot: Slot) -> Option<&BoundStream> {
        match slot {
            MediaKind::Audio => self.audio.as_ref(),
            MediaKind::Video => self.video.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<BoundStream> {
        match slot {
            MediaKind::Audio => &mut self.audio,
            MediaKind::Video => &mut self.video,
        }
    }

    /// Stream in the audio slot
    pub fn audio_stream(&self) -> Option<&Filestream> {
        self.audio.as_ref().map(|b| &b.fs)
    }

    pub fn audio_stream_mut(&mut self) -> Option<&mut Filestream> {
        self.audio.as_mut().map(|b| &mut b.fs)
    }

    /// Stream in the video slot
    pub fn video_stream(&self) -> Option<&Filestream> {
        self.video.as_ref().map(|b| &b.fs)
    }

    /// Delivery task of a slot
    pub fn task(&self, slot: Slot) -> Option<TaskId> {
        self.slot(slot).and_then(|b| b.task)
    }

    /// Phase of a slot's stream
    pub fn phase(&self, slot: Slot) -> Option<StreamPhase> {
        self.slot(slot).map(|b| b.phase)
    }

    /// Channel identity recorded when a slot's stream was bound
    pub fn owner_token(&self, slot: Slot) -> Option<u64> {
        self.slot(slot).map(|b| b.owner_token)
    }

    /// Whether the audio slot is occupied
    pub fn is_playing(&self) -> bool {
        self.audio.is_some()
    }

    /// Bind a stream into the slot matching its media kind.
    ///
    /// Whatever occupied the slot is closed and its task cancelled first.
    pub fn bind(&mut self, fs: Filestream) {
        let slot = fs.kind();
        self.teardown(slot);

        let token = self.channel.identity_token();
        tracing::debug!(
            channel = %self.channel.name(),
            slot = ?slot,
            format = %fs.def().name(),
            filename = %fs.filename(),
            "Stream bound"
        );
        *self.slot_mut(slot) = Some(BoundStream::new(fs, token));
    }

    /// Cancel a slot's task and close its stream
    fn teardown(&mut self, slot: Slot) {
        let Some(mut bound) = self.slot_mut(slot).take() else {
            return;
        };
        if let Some(task) = bound.task.take() {
            self.scheduler.cancel(task);
        }
        if let Err(e) = bound.fs.close() {
            tracing::warn!(
                channel = %self.channel.name(),
                filename = %bound.fs.filename(),
                error = %e,
                "Error closing stream"
            );
        }
        tracing::debug!(
            channel = %self.channel.name(),
            slot = ?slot,
            phase = ?bound.phase,
            frames = bound.fs.stats().frames_read,
            "Stream torn down"
        );
    }

    /// Remember the write format to restore on [`MediaSession::stop_stream`]
    pub(crate) fn remember_write_format(&mut self, format: Format) {
        self.old_write_format = Some(format);
    }

    /// Stop playback: close both slots and restore the write format
    pub fn stop_stream(&mut self) {
        let had_audio = self.audio.is_some();
        self.teardown(MediaKind::Audio);
        self.teardown(MediaKind::Video);

        if had_audio {
            if let Some(old) = self.old_write_format.take() {
                if let Err(e) = self.channel.set_write_format(old) {
                    tracing::warn!(
                        channel = %self.channel.name(),
                        format = %old,
                        error = %e,
                        "Unable to restore write format"
                    );
                }
            }
        }
    }

    /// Start delivery of every bound stream that has not started yet
    pub fn play_stream(&mut self) -> Result<()> {
        for slot in [MediaKind::Audio, MediaKind::Video] {
            let started = self
                .slot(slot)
                .is_some_and(|b| b.phase != StreamPhase::Idle);
            if self.slot(slot).is_none() || started {
                continue;
            }
            self.run_pass(slot)?;
        }
        Ok(())
    }

    fn run_pass(&mut self, slot: Slot) -> Result<()> {
        let outcome = match self.slot_mut_parts(slot) {
            Some((bound, channel, scheduler)) => stream::deliver(bound, slot, channel, scheduler),
            None => return Ok(()),
        };

        match outcome {
            PassOutcome::Kept | PassOutcome::Rescheduled(_) => Ok(()),
            PassOutcome::Ended => {
                tracing::debug!(channel = %self.channel.name(), slot = ?slot, "Stream ended");
                self.teardown(slot);
                Ok(())
            }
            PassOutcome::Failed(e) => {
                tracing::warn!(
                    channel = %self.channel.name(),
                    slot = ?slot,
                    error = %e,
                    "Stream delivery failed"
                );
                self.teardown(slot);
                Err(e)
            }
        }
    }

    fn slot_mut_parts(&mut self, slot: Slot) -> Option<(&mut BoundStream, &mut C, &mut Scheduler)> {
        let bound = match slot {
            MediaKind::Audio => self.audio.as_mut()?,
            MediaKind::Video => self.video.as_mut()?,
        };
        Some((bound, &mut self.channel, &mut self.scheduler))
    }

    /// Next time a task is due
    pub fn next_due(&self) -> Option<Instant> {
        self.scheduler.next_due()
    }

    /// Run every task due at or before `now`
    ///
    /// Streams that end or fail are cleared from their slot. Only a channel
    /// identity change is reported as an error; other delivery failures end
    /// the stream.
    pub fn run_due(&mut self, now: Instant) -> Result<()> {
        while let Some((id, slot)) = self.scheduler.pop_due(now) {
            if self.task(slot) != Some(id) {
                // stale entry for a stream that is gone
                self.scheduler.cancel(id);
                continue;
            }
            match self.run_pass(slot) {
                Err(Error::IdentityMismatch) => return Err(Error::IdentityMismatch),
                Err(_) | Ok(()) => {}
            }
        }
        Ok(())
    }
}

impl<C: Channel> Drop for MediaSession<C> {
    fn drop(&mut self) {
        self.teardown(MediaKind::Audio);
        self.teardown(MediaKind::Video);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FormatDef, PcmFormat};
    use crate::testing::{open_rw, MockChannel, MockFormat};
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    fn alaw_fs(dir: &Path, name: &str, bytes: usize) -> Filestream {
        let path = dir.join(format!("{name}.alaw"));
        std::fs::write(&path, vec![0xD5u8; bytes]).unwrap();
        let def: Arc<dyn FormatDef> = Arc::new(PcmFormat::alaw());
        Filestream::create_for_read(def, open_rw(&path), &path, name).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = MediaSession::new(MockChannel::new("SIP/alice-0001"));
        session.bind(alaw_fs(dir.path(), "beep", 800));
        session.play_stream().unwrap();
        assert_eq!(session.phase(MediaKind::Audio), Some(StreamPhase::Armed));

        while let Some(due) = session.next_due() {
            tokio::time::sleep_until(due).await;
            session.run_due(Instant::now()).unwrap();
        }

        assert!(!session.is_playing());
        assert_eq!(session.channel().written().len(), 5);
        assert!(session.scheduler().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebind_tears_down_previous() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = MediaSession::new(MockChannel::new("SIP/bob-0002"));

        let path = dir.path().join("first.mock");
        std::fs::write(&path, b"").unwrap();
        let mock = Arc::new(MockFormat::new("mock", &["mock"]).with_frames(100));
        let closes = mock.close_counter();
        let first = Filestream::create_for_read(mock, open_rw(&path), &path, "first").unwrap();

        session.bind(first);
        session.play_stream().unwrap();
        let old_task = session.task(MediaKind::Audio).unwrap();
        assert!(session.scheduler().contains(old_task));
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        session.bind(alaw_fs(dir.path(), "second", 1600));
        // previous stream closed and its task gone before the new one starts
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!session.scheduler().contains(old_task));
        assert!(session.scheduler().is_empty());
        assert_eq!(session.phase(MediaKind::Audio), Some(StreamPhase::Idle));

        session.play_stream().unwrap();
        assert_eq!(session.audio_stream().unwrap().filename(), "second");
        assert_ne!(session.task(MediaKind::Audio), Some(old_task));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_swap_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = MediaSession::new(MockChannel::new("SIP/carol-0003"));
        session.bind(alaw_fs(dir.path(), "long", 16000));
        session.play_stream().unwrap();

        session.channel_mut().swap_identity();
        tokio::time::advance(Duration::from_millis(20)).await;

        let err = session.run_due(Instant::now()).unwrap_err();
        assert!(matches!(err, Error::IdentityMismatch));
        assert!(!session.is_playing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_restores_write_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = MediaSession::new(MockChannel::new("SIP/dave-0004"));
        session.channel_mut().set_write_format(Format::Alaw).unwrap();
        session.remember_write_format(Format::Ulaw);
        session.bind(alaw_fs(dir.path(), "x", 320));

        session.stop_stream();
        assert!(!session.is_playing());
        assert_eq!(session.channel().write_format(), Format::Ulaw);
    }
}
