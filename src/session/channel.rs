//! Channel collaborator
//!
//! The engine never touches transport. It writes frames to, and reads
//! events from, whatever implements [`Channel`].

use async_trait::async_trait;

use crate::error::Result;
use crate::media::{ChannelEvent, Format, FormatCap, Frame};

/// A live call leg media can be played to and recorded from
#[async_trait]
pub trait Channel: Send {
    /// Channel name, for logging
    fn name(&self) -> &str;

    /// Run-time identity. Changes whenever the channel is swapped out from
    /// under its current user (e.g. during a transfer).
    fn identity_token(&self) -> u64;

    /// Formats the channel can carry without translation
    fn native_formats(&self) -> FormatCap;

    /// Format frames written to the channel are expected in
    fn write_format(&self) -> Format;

    /// Change the write format
    fn set_write_format(&mut self, format: Format) -> Result<()>;

    /// Send a frame to the far end
    fn write(&mut self, frame: Frame) -> Result<()>;

    /// Wait for the next inbound event. `None` means the channel hung up or
    /// could not be read.
    async fn read(&mut self) -> Option<ChannelEvent>;

    /// Whether the channel has been asked to hang up
    fn is_hung_up(&self) -> bool {
        false
    }

    /// Preferred language for prompts
    fn language(&self) -> &str {
        ""
    }
}

/// Decides whether a digit completes a dialable extension
pub trait ExtensionMatcher {
    fn matches(&self, digit: char) -> bool;
}

impl<F> ExtensionMatcher for F
where
    F: Fn(char) -> bool,
{
    fn matches(&self, digit: char) -> bool {
        self(digit)
    }
}
