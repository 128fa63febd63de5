//! Speech output.
//!
//! - `SpeechDevice`: fire-and-forget text-to-speech sink. Results arrive later
//!   through the `CompletionHandle` passed with each utterance.
//! - `SpeechQueue`: keeps exactly one utterance in flight and queues the rest,
//!   without duplicates, in submission order.
//! - `devices`: concrete sinks (log, external command, recording).
//!
//! The frame context calls `SpeechQueue::submit`; device threads complete
//! utterances. Both go through the queue's single lock.

use std::fmt;

use anyhow::Result;

pub mod devices;
mod queue;

pub use devices::{CommandSpeechDevice, LogSpeechDevice, RecordingSpeechDevice};
pub use queue::{CompletionHandle, QueueSnapshot, SpeechQueue, SubmitOutcome};

/// Identifier handed to the device with each utterance. Unique per queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UtteranceId(String);

impl UtteranceId {
    pub(crate) fn from_counter(n: u64) -> Self {
        Self(format!("utterance_{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How an utterance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechOutcome {
    Completed,
    Failed,
}

/// A text-to-speech sink.
///
/// `speak` must not block on playback. The device reports the end of each
/// accepted utterance exactly once by consuming the `CompletionHandle`.
/// Dropping the handle without signalling counts as a failure, so a device
/// that rejects an utterance can simply return an error.
pub trait SpeechDevice: Send + Sync {
    fn name(&self) -> &'static str;

    fn speak(&self, text: &str, utterance_id: &UtteranceId, completion: CompletionHandle)
        -> Result<()>;

    /// Interrupt current playback. Called on session teardown.
    fn stop(&self) {}
}
