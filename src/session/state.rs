//! Bound stream state machine
//!
//! ```text
//!   Idle ──► Delivering ──► Armed ──► Delivering ──► ...
//!                 │                       │
//!                 ├──► Ended              ├──► Ended
//!                 └──► Failed             └──► Failed
//! ```

use tokio::time::Instant;

use super::scheduler::TaskId;
use crate::file::Filestream;

/// Lifecycle phase of a stream bound to a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// Bound, no delivery attempted yet
    Idle,
    /// Waiting for its scheduled task
    Armed,
    /// Inside a delivery pass
    Delivering,
    /// Codec reported end of stream
    Ended,
    /// Delivery failed or the channel changed identity
    Failed,
}

impl StreamPhase {
    /// Whether the stream will deliver no more frames
    pub fn is_finished(&self) -> bool {
        matches!(self, StreamPhase::Ended | StreamPhase::Failed)
    }
}

/// A filestream occupying a channel's audio or video slot
#[derive(Debug)]
pub struct BoundStream {
    pub fs: Filestream,

    /// Current phase
    pub phase: StreamPhase,

    /// Delivery task, once armed
    pub task: Option<TaskId>,

    /// Sample delta the current task was armed with
    pub last_delta: u32,

    /// Channel identity at bind time
    pub owner_token: u64,

    /// Time the stream was bound
    pub bound_at: Instant,
}

impl BoundStream {
    pub fn new(fs: Filestream, owner_token: u64) -> Self {
        Self {
            fs,
            phase: StreamPhase::Idle,
            task: None,
            last_delta: 0,
            owner_token,
            bound_at: Instant::now(),
        }
    }

    /// Enter a delivery pass
    pub fn begin_pass(&mut self) {
        if !self.phase.is_finished() {
            self.phase = StreamPhase::Delivering;
        }
    }

    /// Pass complete, waiting for the task
    pub fn armed(&mut self) {
        if self.phase == StreamPhase::Delivering {
            self.phase = StreamPhase::Armed;
        }
    }

    pub fn ended(&mut self) {
        self.phase = StreamPhase::Ended;
    }

    pub fn failed(&mut self) {
        self.phase = StreamPhase::Failed;
    }

    /// Time since the stream was bound
    pub fn elapsed(&self) -> std::time::Duration {
        self.bound_at.elapsed()
    }
}
