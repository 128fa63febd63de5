use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::{anyhow, Result};

use super::{SpeechDevice, SpeechOutcome, UtteranceId};
use crate::warning::Warning;

/// Result of `SpeechQueue::submit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Dispatched to the device right away.
    Spoken(UtteranceId),
    /// Appended to the pending queue (zero-based position at append time).
    Queued { position: usize },
    /// Identical text was already pending; queue order unchanged.
    AlreadyPending,
    /// The queue has been shut down.
    Discarded,
}

/// Point-in-time copy of the queue state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pending: Vec<String>,
    pub speaking: bool,
    pub in_flight: Option<UtteranceId>,
}

struct Utterance {
    id: UtteranceId,
    text: String,
}

#[derive(Default)]
struct QueueState {
    /// Insertion-ordered, no duplicate text.
    pending: VecDeque<Warning>,
    speaking: bool,
    in_flight: Option<UtteranceId>,
    closed: bool,
}

impl QueueState {
    fn enqueue(&mut self, warning: Warning) -> SubmitOutcome {
        if self.pending.iter().any(|w| w.text() == warning.text()) {
            return SubmitOutcome::AlreadyPending;
        }
        self.pending.push_back(warning);
        SubmitOutcome::Queued {
            position: self.pending.len() - 1,
        }
    }

    fn begin(&mut self, warning: Warning, id: UtteranceId) -> Utterance {
        self.speaking = true;
        self.in_flight = Some(id.clone());
        Utterance {
            id,
            text: warning.text().to_string(),
        }
    }
}

struct QueueShared {
    state: Mutex<QueueState>,
    device: Arc<dyn SpeechDevice>,
    next_id: AtomicU64,
}

impl QueueShared {
    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("speech queue lock poisoned"))
    }

    fn next_utterance_id(&self) -> UtteranceId {
        UtteranceId::from_counter(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Pop the head of `pending` if idle. Caller holds the lock.
    fn dequeue_next(&self, state: &mut QueueState) -> Option<Utterance> {
        if state.speaking || state.closed {
            return None;
        }
        let next = state.pending.pop_front()?;
        Some(state.begin(next, self.next_utterance_id()))
    }

    /// Hand an utterance to the device. Called without the lock held, so a
    /// device may complete synchronously from inside `speak`.
    fn dispatch(self: &Arc<Self>, utterance: Utterance) {
        log::debug!(
            "speech: dispatching {} to {}: {}",
            utterance.id,
            self.device.name(),
            utterance.text
        );
        let completion = CompletionHandle::new(Arc::downgrade(self), utterance.id.clone());
        if let Err(e) = self.device.speak(&utterance.text, &utterance.id, completion) {
            // The handle was consumed by `speak`; its drop reports the failure.
            log::warn!(
                "speech device {} rejected {}: {:#}",
                self.device.name(),
                utterance.id,
                e
            );
        }
    }

    fn finish(self: &Arc<Self>, id: &UtteranceId, outcome: SpeechOutcome) -> Result<()> {
        let next = {
            let mut state = self.lock()?;
            if state.in_flight.as_ref() != Some(id) {
                log::debug!("speech: ignoring {:?} for stale utterance {}", outcome, id);
                return Ok(());
            }
            match outcome {
                SpeechOutcome::Completed => log::debug!("speech: {} completed", id),
                SpeechOutcome::Failed => log::warn!("speech: {} failed, moving on", id),
            }
            state.speaking = false;
            state.in_flight = None;
            self.dequeue_next(&mut state)
        };
        if let Some(utterance) = next {
            self.dispatch(utterance);
        }
        Ok(())
    }
}

/// Serializes warnings onto a speech device, one utterance at a time.
///
/// Clones share the same queue. `submit` runs on the frame context; the
/// completion callbacks run wherever the device signals from. Every
/// read-modify-write of the queue state happens under one mutex, and the
/// device is only ever called with that mutex released.
#[derive(Clone)]
pub struct SpeechQueue {
    shared: Arc<QueueShared>,
}

impl SpeechQueue {
    pub fn new(device: Arc<dyn SpeechDevice>) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState::default()),
                device,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Speak now if idle with nothing waiting, otherwise queue (deduplicated).
    pub fn submit(&self, warning: Warning) -> Result<SubmitOutcome> {
        let (outcome, dispatch) = {
            let mut state = self.shared.lock()?;
            if state.closed {
                (SubmitOutcome::Discarded, None)
            } else if state.speaking {
                (state.enqueue(warning), None)
            } else if !state.pending.is_empty() {
                let outcome = state.enqueue(warning);
                (outcome, self.shared.dequeue_next(&mut state))
            } else {
                let id = self.shared.next_utterance_id();
                let utterance = state.begin(warning, id.clone());
                (SubmitOutcome::Spoken(id), Some(utterance))
            }
        };
        if let Some(utterance) = dispatch {
            self.shared.dispatch(utterance);
        }
        Ok(outcome)
    }

    /// Drain the head of the pending queue if nothing is in flight.
    pub fn dequeue_next(&self) -> Result<Option<UtteranceId>> {
        let next = {
            let mut state = self.shared.lock()?;
            self.shared.dequeue_next(&mut state)
        };
        Ok(next.map(|utterance| {
            let id = utterance.id.clone();
            self.shared.dispatch(utterance);
            id
        }))
    }

    /// Device finished `id` normally.
    pub fn on_speech_completed(&self, id: &UtteranceId) -> Result<()> {
        self.shared.finish(id, SpeechOutcome::Completed)
    }

    /// Device failed `id`. Same progression as completion; no retry.
    pub fn on_speech_error(&self, id: &UtteranceId) -> Result<()> {
        self.shared.finish(id, SpeechOutcome::Failed)
    }

    pub fn snapshot(&self) -> Result<QueueSnapshot> {
        let state = self.shared.lock()?;
        Ok(QueueSnapshot {
            pending: state.pending.iter().map(|w| w.text().to_string()).collect(),
            speaking: state.speaking,
            in_flight: state.in_flight.clone(),
        })
    }

    pub fn device_name(&self) -> &'static str {
        self.shared.device.name()
    }

    /// Discard pending warnings, refuse new ones, and stop the device.
    pub fn shutdown(&self) -> Result<()> {
        let discarded = {
            let mut state = self.shared.lock()?;
            state.closed = true;
            let n = state.pending.len();
            state.pending.clear();
            n
        };
        if discarded > 0 {
            log::info!("speech: discarded {} pending warning(s) on shutdown", discarded);
        }
        self.shared.device.stop();
        Ok(())
    }
}

/// One-shot completion signal for a dispatched utterance.
///
/// Consumed by `completed` or `failed`. Dropping it unsignalled reports a
/// failure. It holds the queue weakly, so a torn-down queue is not kept
/// alive by a device thread still holding a handle.
pub struct CompletionHandle {
    queue: Weak<QueueShared>,
    utterance_id: UtteranceId,
    signaled: bool,
}

impl CompletionHandle {
    fn new(queue: Weak<QueueShared>, utterance_id: UtteranceId) -> Self {
        Self {
            queue,
            utterance_id,
            signaled: false,
        }
    }

    pub fn utterance_id(&self) -> &UtteranceId {
        &self.utterance_id
    }

    pub fn completed(mut self) {
        self.signal(SpeechOutcome::Completed);
    }

    pub fn failed(mut self) {
        self.signal(SpeechOutcome::Failed);
    }

    fn signal(&mut self, outcome: SpeechOutcome) {
        self.signaled = true;
        let Some(queue) = self.queue.upgrade() else {
            return;
        };
        if let Err(e) = queue.finish(&self.utterance_id, outcome) {
            log::error!("speech: could not record {:?} for {}: {:#}", outcome, self.utterance_id, e);
        }
    }
}

impl Drop for CompletionHandle {
    fn drop(&mut self) {
        if !self.signaled {
            log::debug!("speech: {} dropped without a result", self.utterance_id);
            self.signal(SpeechOutcome::Failed);
        }
    }
}
