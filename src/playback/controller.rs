//! Wait loop
//!
//! Each iteration waits for the first of: the external signal, an inbound
//! channel event, or the next scheduled delivery. It handles exactly that one
//! thing and loops until playback ends or something interrupts it.
//!
//! ```text
//!            ┌──────────── select (biased) ─────────────┐
//!            │ external     channel.read()   next_due   │
//!            └────┬──────────────┬───────────────┬──────┘
//!                 ▼              ▼               ▼
//!             External     DTMF / control    run_due()
//!                          voice → sink
//! ```
//!
//! [`Channel::read`] must be cancellation safe: a read that loses the race
//! is dropped and started again on the next iteration.

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use super::options::{ControlEvent, WaitOptions, WaitOutcome};
use crate::error::{Error, Result};
use crate::media::{ChannelEvent, ControlFrame, MediaKind};
use crate::session::{Channel, MediaSession};

enum Wake {
    External,
    Event(Option<ChannelEvent>),
    Timer,
}

async fn wait_external(signal: Option<&Notify>) {
    match signal {
        Some(signal) => signal.notified().await,
        None => std::future::pending().await,
    }
}

/// Supervise the session's audio stream until it ends or is interrupted
///
/// Digits are returned as [`WaitOutcome::Digit`]. Hangups, hangup-like
/// control frames, a failed read, a channel identity change and a pending
/// soft hangup at exit are errors.
pub async fn wait_stream_core<C: Channel>(
    session: &mut MediaSession<C>,
    mut opts: WaitOptions<'_>,
) -> Result<WaitOutcome> {
    if session.is_playing() {
        report(session, &mut opts, ControlEvent::Start);
    }

    while session.is_playing() {
        let owner = session.owner_token(MediaKind::Audio);
        if owner.is_some_and(|owner| owner != session.channel().identity_token()) {
            tracing::debug!(
                channel = %session.channel().name(),
                "Channel swapped during playback"
            );
            session.stop_stream();
            return Err(Error::IdentityMismatch);
        }

        let Some(due) = session.next_due() else {
            // nothing scheduled, so nothing will ever be delivered
            session.stop_stream();
            break;
        };

        let wake = tokio::select! {
            biased;
            _ = wait_external(opts.external) => Wake::External,
            event = session.channel_mut().read() => Wake::Event(event),
            _ = tokio::time::sleep_until(due) => Wake::Timer,
        };

        match wake {
            Wake::External => {
                tracing::debug!(channel = %session.channel().name(), "External signal");
                return Ok(WaitOutcome::External);
            }
            Wake::Event(None) => {
                tracing::debug!(channel = %session.channel().name(), "Channel read failed");
                return Err(Error::Hangup);
            }
            Wake::Event(Some(event)) => {
                if let Some(outcome) = handle_event(session, &mut opts, event)? {
                    return Ok(outcome);
                }
            }
            Wake::Timer => {}
        }

        if let Err(e) = session.run_due(Instant::now()) {
            session.stop_stream();
            return Err(e);
        }
    }

    if session.channel().is_hung_up() {
        return Err(Error::Hangup);
    }
    Ok(WaitOutcome::Finished)
}

fn handle_event<C: Channel>(
    session: &mut MediaSession<C>,
    opts: &mut WaitOptions<'_>,
    event: ChannelEvent,
) -> Result<Option<WaitOutcome>> {
    match event {
        ChannelEvent::Dtmf(digit) => {
            if let Some(matcher) = opts.extension {
                if matcher.matches(digit) {
                    return Ok(Some(WaitOutcome::Digit(digit)));
                }
                return Ok(None);
            }
            if opts.forward.contains(digit) {
                let skip = opts.skip;
                skip_forward(session, opts, skip);
            } else if opts.reverse.contains(digit) {
                let skip = opts.skip;
                skip_back(session, opts, skip);
            } else if opts.break_on.contains(digit) {
                tracing::debug!(channel = %session.channel().name(), digit = %digit, "Break");
                return Ok(Some(WaitOutcome::Digit(digit)));
            }
        }
        ChannelEvent::Control(control) => match control {
            ControlFrame::StreamStop
            | ControlFrame::StreamSuspend
            | ControlFrame::StreamRestart => {
                tracing::debug!(channel = %session.channel().name(), control = ?control, "Break");
                return Ok(Some(WaitOutcome::Stopped(control)));
            }
            ControlFrame::StreamReverse => {
                let skip = opts.control_skip();
                skip_back(session, opts, skip);
            }
            ControlFrame::StreamForward => {
                let skip = opts.control_skip();
                skip_forward(session, opts, skip);
            }
            ControlFrame::Hangup | ControlFrame::Busy | ControlFrame::Congestion => {
                tracing::debug!(
                    channel = %session.channel().name(),
                    control = ?control,
                    "Call ended"
                );
                return Err(Error::Hangup);
            }
            ControlFrame::Other(code) => {
                tracing::warn!(channel = %session.channel().name(), code, "Unexpected control");
            }
            _ => {}
        },
        ChannelEvent::Media(frame) => {
            if frame.kind() == MediaKind::Audio {
                if let Some(sink) = opts.audio_sink.as_mut() {
                    if let Err(e) = sink.write_all(&frame.data) {
                        tracing::warn!(error = %e, "Audio sink write failed");
                    }
                }
            }
        }
        ChannelEvent::Null => {}
    }
    Ok(None)
}

fn skip_forward<C: Channel>(
    session: &mut MediaSession<C>,
    opts: &mut WaitOptions<'_>,
    skip: Duration,
) {
    let ms = skip.as_millis() as u64;
    if let Some(fs) = session.audio_stream_mut() {
        if let Err(e) = fs.fast_forward(ms) {
            tracing::debug!(error = %e, "Fast forward failed");
        }
        // landing on the end would stop playback; go back instead
        if fs.at_end().unwrap_or(false) {
            if let Err(e) = fs.rewind(ms) {
                tracing::debug!(error = %e, "Rewind after fast forward failed");
            }
        }
    }
    report(session, opts, ControlEvent::FastForward);
}

fn skip_back<C: Channel>(
    session: &mut MediaSession<C>,
    opts: &mut WaitOptions<'_>,
    skip: Duration,
) {
    if let Some(fs) = session.audio_stream_mut() {
        if let Err(e) = fs.rewind(skip.as_millis() as u64) {
            tracing::debug!(error = %e, "Rewind failed");
        }
    }
    report(session, opts, ControlEvent::Rewind);
}

fn report<C: Channel>(
    session: &mut MediaSession<C>,
    opts: &mut WaitOptions<'_>,
    event: ControlEvent,
) {
    let position = session.audio_stream_mut().and_then(|fs| {
        let samples = fs.tell().ok()?;
        let per_ms = fs.format().samples_per_ms() as u64;
        Some(Duration::from_millis(samples / per_ms))
    });
    tracing::debug!(
        channel = %session.channel().name(),
        event = ?event,
        position_ms = position.map(|p| p.as_millis() as u64),
        "Playback control"
    );
    if let Some(observer) = opts.on_control.as_mut() {
        observer(event, position);
    }
}
