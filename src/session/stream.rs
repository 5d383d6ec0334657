//! Delivery pass
//!
//! One pass reads frames from a bound stream and writes them to the channel
//! until the codec reports a non-zero delay, then arms (or keeps) the
//! stream's scheduled task for that delay.

use std::time::Duration;

use super::channel::Channel;
use super::scheduler::{Scheduler, Slot};
use super::state::BoundStream;
use crate::error::Error;

/// Result of a delivery pass
#[derive(Debug)]
pub enum PassOutcome {
    /// Existing task kept with the same interval
    Kept,
    /// Task (re)created with a new interval
    Rescheduled(Duration),
    /// Codec has no more frames
    Ended,
    /// Delivery cannot continue
    Failed(Error),
}

/// Convert a codec sample delta to a timer interval
pub fn delta_to_interval(delta: u32, samples_per_ms: u32) -> Duration {
    let ms = delta / samples_per_ms.max(1);
    Duration::from_millis(ms.max(1) as u64)
}

/// Run one pass for the stream in `slot`
pub fn deliver<C: Channel + ?Sized>(
    bound: &mut BoundStream,
    slot: Slot,
    channel: &mut C,
    scheduler: &mut Scheduler,
) -> PassOutcome {
    bound.begin_pass();

    let mut delta = 0;
    while delta == 0 {
        if channel.identity_token() != bound.owner_token {
            tracing::debug!(
                channel = %channel.name(),
                expected = bound.owner_token,
                actual = channel.identity_token(),
                "Channel identity changed, aborting stream"
            );
            bound.failed();
            return PassOutcome::Failed(Error::IdentityMismatch);
        }

        let read = match bound.fs.read_frame() {
            Ok(Some(read)) => read,
            Ok(None) => {
                bound.ended();
                return PassOutcome::Ended;
            }
            Err(e) => {
                bound.failed();
                return PassOutcome::Failed(e);
            }
        };
        delta = read.next_delta;

        if let Err(e) = channel.write(read.frame) {
            tracing::debug!(channel = %channel.name(), error = %e, "Failed to write frame");
            bound.failed();
            return PassOutcome::Failed(e);
        }
    }

    let outcome = if delta != bound.last_delta || bound.task.is_none() {
        if let Some(old) = bound.task.take() {
            scheduler.cancel(old);
        }
        let interval = delta_to_interval(delta, bound.fs.format().samples_per_ms());
        bound.task = Some(scheduler.add(slot, interval));
        bound.last_delta = delta;
        tracing::debug!(
            channel = %channel.name(),
            slot = ?slot,
            delta,
            interval_ms = interval.as_millis() as u64,
            "Stream rescheduled"
        );
        PassOutcome::Rescheduled(interval)
    } else {
        if let Some(task) = bound.task {
            scheduler.rearm(task);
        }
        PassOutcome::Kept
    };

    bound.armed();
    outcome
}
