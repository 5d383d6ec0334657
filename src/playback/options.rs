//! Wait configuration and results

use std::io::Write;
use std::time::Duration;

use tokio::sync::Notify;

use crate::media::ControlFrame;
use crate::session::ExtensionMatcher;

/// Skip applied by forward / reverse control frames when none is configured
pub const DEFAULT_SKIP: Duration = Duration::from_millis(3000);

/// How a wait ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Playback reached the end
    Finished,
    /// A break digit or matching extension digit was pressed
    Digit(char),
    /// The external signal fired
    External,
    /// A stop / suspend / restart control frame arrived
    Stopped(ControlFrame),
}

impl WaitOutcome {
    /// Report a control-frame stop as a normal finish
    pub fn sanitized(self) -> Self {
        match self {
            WaitOutcome::Stopped(_) => WaitOutcome::Finished,
            other => other,
        }
    }

    /// The digit that interrupted playback, if any
    pub fn digit(&self) -> Option<char> {
        match self {
            WaitOutcome::Digit(d) => Some(*d),
            _ => None,
        }
    }
}

/// Position change reported to the control observer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Waiting started
    Start,
    FastForward,
    Rewind,
}

/// Observer of playback position changes
pub type ControlObserver<'a> = &'a mut (dyn FnMut(ControlEvent, Option<Duration>) + 'a);

/// What interrupts a wait and how digits move the playback position
#[derive(Default)]
pub struct WaitOptions<'a> {
    /// Digits that stop playback and are returned
    pub break_on: &'a str,

    /// Digits that skip forwards
    pub forward: &'a str,

    /// Digits that skip backwards
    pub reverse: &'a str,

    /// Amount each forward / reverse digit skips
    pub skip: Duration,

    /// When set, any digit it accepts stops playback and the digit sets
    /// above are ignored
    pub extension: Option<&'a dyn ExtensionMatcher>,

    /// Signal that ends the wait without touching the stream
    pub external: Option<&'a Notify>,

    /// Receives inbound voice while waiting
    pub audio_sink: Option<&'a mut dyn Write>,

    /// Told the position at start and after every skip
    pub on_control: Option<ControlObserver<'a>>,
}

impl<'a> WaitOptions<'a> {
    /// Stop on any of `digits`
    pub fn breaking_on(digits: &'a str) -> Self {
        Self {
            break_on: digits,
            ..Default::default()
        }
    }

    /// Skip forwards on `forward`, backwards on `reverse`, by `skip` each
    pub fn seeking(mut self, forward: &'a str, reverse: &'a str, skip: Duration) -> Self {
        self.forward = forward;
        self.reverse = reverse;
        self.skip = skip;
        self
    }

    pub fn extension(mut self, matcher: &'a dyn ExtensionMatcher) -> Self {
        self.extension = Some(matcher);
        self
    }

    pub fn external(mut self, signal: &'a Notify) -> Self {
        self.external = Some(signal);
        self
    }

    pub fn audio_sink(mut self, sink: &'a mut dyn Write) -> Self {
        self.audio_sink = Some(sink);
        self
    }

    pub fn on_control(mut self, observer: ControlObserver<'a>) -> Self {
        self.on_control = Some(observer);
        self
    }

    /// Skip used by forward / reverse control frames
    pub(crate) fn control_skip(&self) -> Duration {
        if self.skip.is_zero() {
            DEFAULT_SKIP
        } else {
            self.skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_stop() {
        assert_eq!(
            WaitOutcome::Stopped(ControlFrame::StreamStop).sanitized(),
            WaitOutcome::Finished
        );
        assert_eq!(WaitOutcome::Digit('5').sanitized(), WaitOutcome::Digit('5'));
        assert_eq!(WaitOutcome::Digit('5').digit(), Some('5'));
        assert_eq!(WaitOutcome::External.digit(), None);
    }

    #[test]
    fn test_control_skip_default() {
        assert_eq!(WaitOptions::default().control_skip(), DEFAULT_SKIP);
        let opts = WaitOptions::breaking_on("#").seeking("6", "4", Duration::from_secs(1));
        assert_eq!(opts.control_skip(), Duration::from_secs(1));
    }
}
