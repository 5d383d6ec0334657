//! Media primitives
//!
//! This module provides:
//! - Payload formats, media kinds and capability sets
//! - Frames and the events a channel delivers
//! - G.711 companding used by the PCM codecs and the built-in translator

pub mod format;
pub mod frame;
pub mod g711;

pub use format::{Format, FormatCap, MediaKind};
pub use frame::{ChannelEvent, ControlFrame, Frame, FrameOrigin};
