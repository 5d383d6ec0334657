//! Interactive playback
//!
//! Waits on a playing stream while watching the channel for DTMF, control
//! frames and hangups. [`wait_stream_core`] takes the full set of options;
//! the wrappers below cover the common call shapes.
//!
//! Results:
//! - `Ok(Finished)`: playback ran to the end
//! - `Ok(Digit(d))`: a break digit or accepted extension digit was pressed
//! - `Ok(External)`: the external signal fired; the stream keeps playing
//! - `Ok(Stopped(_))`: a stop / suspend / restart control frame arrived
//!   (only [`wait_stream_core`] and [`wait_stream_fr`] report this; the
//!   other wrappers turn it into `Finished`)
//! - `Err(_)`: the call went away

pub mod controller;
pub mod options;

use std::io::Write;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::Result;
use crate::file::FileEngine;
use crate::session::{Channel, ExtensionMatcher, MediaSession};

pub use controller::wait_stream_core;
pub use options::{ControlEvent, ControlObserver, WaitOptions, WaitOutcome, DEFAULT_SKIP};

/// Wait for playback to end or for one of `break_on` to be pressed
pub async fn wait_stream<C: Channel>(
    session: &mut MediaSession<C>,
    break_on: &str,
) -> Result<WaitOutcome> {
    let outcome = wait_stream_core(session, WaitOptions::breaking_on(break_on)).await?;
    Ok(outcome.sanitized())
}

/// Like [`wait_stream`], with digits that skip forwards and backwards
pub async fn wait_stream_fr<C: Channel>(
    session: &mut MediaSession<C>,
    break_on: &str,
    forward: &str,
    reverse: &str,
    skip: Duration,
) -> Result<WaitOutcome> {
    let opts = WaitOptions::breaking_on(break_on).seeking(forward, reverse, skip);
    wait_stream_core(session, opts).await
}

/// Like [`wait_stream`], copying inbound voice to `audio_sink` and ending
/// early when `external` fires
pub async fn wait_stream_full<'a, C: Channel>(
    session: &mut MediaSession<C>,
    break_on: &'a str,
    audio_sink: Option<&'a mut dyn Write>,
    external: Option<&'a Notify>,
) -> Result<WaitOutcome> {
    let opts = WaitOptions {
        audio_sink,
        external,
        ..WaitOptions::breaking_on(break_on)
    };
    let outcome = wait_stream_core(session, opts).await?;
    Ok(outcome.sanitized())
}

/// Wait until playback ends or a digit `matcher` accepts is pressed
pub async fn wait_stream_exten<C: Channel>(
    session: &mut MediaSession<C>,
    matcher: &dyn ExtensionMatcher,
) -> Result<WaitOutcome> {
    let opts = WaitOptions::default().extension(matcher);
    let outcome = wait_stream_core(session, opts).await?;
    Ok(outcome.sanitized())
}

/// Play `file` in the channel's language and wait on it
///
/// An empty name plays nothing. On failure any playback is stopped.
pub async fn stream_and_wait<C: Channel>(
    engine: &FileEngine,
    session: &mut MediaSession<C>,
    file: &str,
    digits: &str,
) -> Result<WaitOutcome> {
    if file.is_empty() {
        return Ok(WaitOutcome::Finished);
    }

    let language = session.channel().language().to_string();
    let result = match engine.stream_file(session, file, &language) {
        Ok(()) => wait_stream(session, digits).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        session.stop_stream();
    }
    result
}
