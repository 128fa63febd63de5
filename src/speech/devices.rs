//! Concrete speech devices.

use std::collections::VecDeque;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use super::{CompletionHandle, SpeechDevice, UtteranceId};

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 170;

const MIN_UTTERANCE_MS: u64 = 250;
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Speaks into the log. Each utterance "lasts" as long as it would take to
/// read aloud at `words_per_minute`, then completes from a worker thread.
pub struct LogSpeechDevice {
    words_per_minute: u32,
}

impl LogSpeechDevice {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
        }
    }

    pub fn estimated_duration(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count() as u64;
        let ms = words * 60_000 / self.words_per_minute as u64;
        Duration::from_millis(ms.max(MIN_UTTERANCE_MS))
    }
}

impl Default for LogSpeechDevice {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS_PER_MINUTE)
    }
}

impl SpeechDevice for LogSpeechDevice {
    fn name(&self) -> &'static str {
        "log"
    }

    fn speak(&self, text: &str, utterance_id: &UtteranceId, completion: CompletionHandle) -> Result<()> {
        log::info!("SPEAK [{}] {}", utterance_id, text);
        let duration = self.estimated_duration(text);
        thread::Builder::new()
            .name("speech-log".to_string())
            .spawn(move || {
                thread::sleep(duration);
                completion.completed();
            })
            .context("failed to spawn speech thread")?;
        Ok(())
    }
}

/// Runs an external TTS program once per utterance, e.g. `espeak-ng`.
///
/// The text is appended as the last argument. Exit status 0 completes the
/// utterance; anything else, including a kill from `stop`, fails it.
pub struct CommandSpeechDevice {
    program: String,
    args: Vec<String>,
    current: Arc<Mutex<Option<Child>>>,
}

impl CommandSpeechDevice {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl SpeechDevice for CommandSpeechDevice {
    fn name(&self) -> &'static str {
        "command"
    }

    fn speak(&self, text: &str, utterance_id: &UtteranceId, completion: CompletionHandle) -> Result<()> {
        let sanitized: String = text.chars().filter(|c| !c.is_control()).collect();
        {
            let mut current = self
                .current
                .lock()
                .map_err(|_| anyhow!("speech child lock poisoned"))?;
            if current.is_some() {
                return Err(anyhow!("{} is still speaking", self.program));
            }
            let child = Command::new(&self.program)
                .args(&self.args)
                .arg(&sanitized)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("failed to run {}", self.program))?;
            *current = Some(child);
        }
        log::debug!("{} speaking {}", self.program, utterance_id);

        let current = Arc::clone(&self.current);
        let program = self.program.clone();
        let spawned = thread::Builder::new()
            .name("speech-command".to_string())
            .spawn(move || wait_for_child(&current, &program, completion));
        if let Err(e) = spawned {
            abandon_child(&self.current, &self.program);
            return Err(e).context("failed to spawn speech wait thread");
        }
        Ok(())
    }

    fn stop(&self) {
        match self.current.lock() {
            Ok(mut current) => {
                if let Some(child) = current.as_mut() {
                    if let Err(e) = child.kill() {
                        log::debug!("{} already exited: {}", self.program, e);
                    }
                }
            }
            Err(_) => log::error!("speech child lock poisoned during stop"),
        }
    }
}

/// Kill and reap the current child, leaving the device free to speak again.
fn abandon_child(current: &Mutex<Option<Child>>, program: &str) {
    let child = match current.lock() {
        Ok(mut guard) => guard.take(),
        Err(_) => {
            log::error!("speech child lock poisoned");
            return;
        }
    };
    if let Some(mut child) = child {
        if let Err(e) = child.kill() {
            log::debug!("{} already exited: {}", program, e);
        }
        if let Err(e) = child.wait() {
            log::warn!("failed to reap {}: {}", program, e);
        }
    }
}

enum ChildState {
    Running,
    Exited(std::process::ExitStatus),
    WaitFailed(std::io::Error),
    Gone,
}

/// Poll the child so `stop` can take the lock and kill it meanwhile.
///
/// The lock is always released before `completion` is signalled: signalling
/// may dispatch the next utterance straight back into `speak`.
fn wait_for_child(current: &Mutex<Option<Child>>, program: &str, completion: CompletionHandle) {
    loop {
        let state = match current.lock() {
            Ok(mut guard) => match guard.as_mut().map(|child| child.try_wait()) {
                None => ChildState::Gone,
                Some(Ok(None)) => ChildState::Running,
                Some(Ok(Some(status))) => {
                    *guard = None;
                    ChildState::Exited(status)
                }
                Some(Err(e)) => {
                    *guard = None;
                    ChildState::WaitFailed(e)
                }
            },
            Err(_) => {
                log::error!("speech child lock poisoned");
                ChildState::Gone
            }
        };

        match state {
            ChildState::Running => thread::sleep(CHILD_POLL_INTERVAL),
            ChildState::Exited(status) if status.success() => {
                completion.completed();
                return;
            }
            ChildState::Exited(status) => {
                log::warn!("{} exited with {}", program, status);
                completion.failed();
                return;
            }
            ChildState::WaitFailed(e) => {
                log::warn!("failed waiting on {}: {}", program, e);
                completion.failed();
                return;
            }
            ChildState::Gone => {
                completion.failed();
                return;
            }
        }
    }
}

#[derive(Default)]
struct RecordingState {
    spoken: Vec<(UtteranceId, String)>,
    outstanding: VecDeque<CompletionHandle>,
}

/// Records utterances and leaves completion to the caller.
///
/// Handy for tests and dry runs: nothing completes until `complete_next` or
/// `fail_next` is called.
#[derive(Default)]
pub struct RecordingSpeechDevice {
    state: Mutex<RecordingState>,
    reject_next: AtomicBool,
    stopped: AtomicBool,
}

impl RecordingSpeechDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `speak` call fail synchronously.
    pub fn reject_next_speak(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    pub fn spoken(&self) -> Vec<(UtteranceId, String)> {
        self.state
            .lock()
            .map(|state| state.spoken.clone())
            .unwrap_or_default()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|(_, text)| text).collect()
    }

    /// Utterances accepted but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.outstanding.len())
            .unwrap_or_default()
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Complete the oldest outstanding utterance. Returns false if none.
    pub fn complete_next(&self) -> Result<bool> {
        Ok(match self.take_next()? {
            Some(handle) => {
                handle.completed();
                true
            }
            None => false,
        })
    }

    /// Fail the oldest outstanding utterance. Returns false if none.
    pub fn fail_next(&self) -> Result<bool> {
        Ok(match self.take_next()? {
            Some(handle) => {
                handle.failed();
                true
            }
            None => false,
        })
    }

    // The lock is released before the handle is signalled: signalling may
    // dispatch the next utterance straight back into `speak`.
    fn take_next(&self) -> Result<Option<CompletionHandle>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("recording device lock poisoned"))?;
        Ok(state.outstanding.pop_front())
    }
}

impl SpeechDevice for RecordingSpeechDevice {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn speak(&self, text: &str, utterance_id: &UtteranceId, completion: CompletionHandle) -> Result<()> {
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(anyhow!("recording device rejected {}", utterance_id));
        }
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("recording device lock poisoned"))?;
        state.spoken.push((utterance_id.clone(), text.to_string()));
        state.outstanding.push_back(completion);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::SpeechQueue;
    use crate::warning::{Direction, Severity, Warning};
    use std::time::Instant;

    #[test]
    fn log_device_estimates_duration_from_words() {
        let device = LogSpeechDevice::new(120);
        // 4 words at 120 wpm = 2 s.
        assert_eq!(
            device.estimated_duration("Step back! chair ahead"),
            Duration::from_millis(2000)
        );
        assert_eq!(
            device.estimated_duration(""),
            Duration::from_millis(MIN_UTTERANCE_MS)
        );
    }

    #[test]
    fn log_device_completes_asynchronously() {
        let queue = SpeechQueue::new(Arc::new(LogSpeechDevice::new(60_000)));
        queue
            .submit(Warning::new(Severity::Stop, Direction::Center, "person"))
            .unwrap();
        assert!(queue.snapshot().unwrap().speaking);

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.snapshot().unwrap().speaking {
            assert!(Instant::now() < deadline, "log device never completed");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn missing_program_fails_and_queue_recovers() {
        let device = Arc::new(CommandSpeechDevice::new(
            "/nonexistent/sightsense-tts",
            Vec::new(),
        ));
        let queue = SpeechQueue::new(device);
        queue
            .submit(Warning::new(Severity::Stop, Direction::Center, "person"))
            .unwrap();
        // Spawn failure is reported synchronously, so the queue is idle again.
        assert!(!queue.snapshot().unwrap().speaking);
    }

    #[cfg(unix)]
    #[test]
    fn command_device_reports_exit_status() {
        let queue = SpeechQueue::new(Arc::new(CommandSpeechDevice::new("true", Vec::new())));
        queue
            .submit(Warning::new(Severity::Caution, Direction::Left, "cat"))
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.snapshot().unwrap().speaking {
            assert!(Instant::now() < deadline, "command never completed");
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn recording_device_tracks_outstanding() {
        let device = RecordingSpeechDevice::new();
        assert!(!device.complete_next().unwrap());
        assert_eq!(device.outstanding(), 0);
        device.stop();
        assert!(device.stopped());
    }

    /// Locks the same slot `wait_for_child` polls, as `CommandSpeechDevice` does.
    struct SlotDevice {
        slot: Arc<Mutex<Option<Child>>>,
        handles: Mutex<Vec<CompletionHandle>>,
        contended: AtomicBool,
    }

    impl SpeechDevice for SlotDevice {
        fn name(&self) -> &'static str {
            "slot"
        }

        fn speak(&self, _text: &str, _id: &UtteranceId, completion: CompletionHandle) -> Result<()> {
            if self.slot.try_lock().is_err() {
                self.contended.store(true, Ordering::SeqCst);
            }
            self.handles.lock().unwrap().push(completion);
            Ok(())
        }
    }

    #[test]
    fn vanished_child_releases_slot_before_signalling() {
        let slot = Arc::new(Mutex::new(None));
        let device = Arc::new(SlotDevice {
            slot: Arc::clone(&slot),
            handles: Mutex::new(Vec::new()),
            contended: AtomicBool::new(false),
        });
        let queue = SpeechQueue::new(device.clone());
        queue
            .submit(Warning::new(Severity::Stop, Direction::Center, "person"))
            .unwrap();
        queue
            .submit(Warning::new(Severity::Caution, Direction::Left, "cat"))
            .unwrap();

        let first = device.handles.lock().unwrap().remove(0);
        // Slot is empty: the waiter fails the utterance, which dispatches "cat".
        wait_for_child(&slot, "tts", first);

        assert!(!device.contended.load(Ordering::SeqCst));
        assert_eq!(device.handles.lock().unwrap().len(), 1);
        let snapshot = queue.snapshot().unwrap();
        assert!(snapshot.speaking);
        assert!(snapshot.pending.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn abandoned_child_is_reaped_and_device_speaks_again() {
        let device = Arc::new(CommandSpeechDevice::new("true", Vec::new()));
        let stuck = Command::new("sleep").arg("5").spawn().unwrap();
        *device.current.lock().unwrap() = Some(stuck);

        let queue = SpeechQueue::new(device.clone());
        queue
            .submit(Warning::new(Severity::Stop, Direction::Center, "person"))
            .unwrap();
        // The leftover child blocks speaking.
        assert!(!queue.snapshot().unwrap().speaking);

        abandon_child(&device.current, device.program());
        assert!(device.current.lock().unwrap().is_none());

        queue
            .submit(Warning::new(Severity::Caution, Direction::Left, "cat"))
            .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while queue.snapshot().unwrap().speaking {
            assert!(Instant::now() < deadline, "command never completed");
            thread::sleep(Duration::from_millis(10));
        }
        assert!(device.current.lock().unwrap().is_none());
    }
}
