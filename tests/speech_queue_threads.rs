use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sightsense::{
    Direction, RecordingSpeechDevice, Severity, SpeechQueue, SubmitOutcome, Warning,
};

fn labelled(i: usize) -> Warning {
    Warning::new(Severity::Stop, Direction::Center, &format!("object {}", i))
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) {
    let start = Instant::now();
    while !done() {
        assert!(start.elapsed() < deadline, "timed out");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn queued_warnings_drain_in_submission_order() {
    let device = Arc::new(RecordingSpeechDevice::new());
    let queue = SpeechQueue::new(device.clone());

    assert!(matches!(
        queue.submit(labelled(0)).unwrap(),
        SubmitOutcome::Spoken(_)
    ));
    for i in 1..=5 {
        assert_eq!(
            queue.submit(labelled(i)).unwrap(),
            SubmitOutcome::Queued { position: i - 1 }
        );
    }

    for _ in 0..5 {
        assert!(device.complete_next().unwrap());
    }
    let expected: Vec<String> = (0..=5).map(|i| labelled(i).text().to_string()).collect();
    assert_eq!(device.spoken_texts(), expected);
}

#[test]
fn completions_from_device_thread_race_with_submits() {
    let device = Arc::new(RecordingSpeechDevice::new());
    let queue = SpeechQueue::new(device.clone());
    let stop = Arc::new(AtomicBool::new(false));

    // Device side: finishes whatever is outstanding as fast as it can.
    let completer = {
        let device = device.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                if !device.complete_next().unwrap() {
                    thread::yield_now();
                }
            }
        })
    };

    // Frame side: submits a small rotating set of warnings.
    let observer = {
        let queue = queue.clone();
        thread::spawn(move || {
            for round in 0..2_000 {
                queue.submit(labelled(round % 4)).unwrap();
                let snapshot = queue.snapshot().unwrap();
                let unique: HashSet<&String> = snapshot.pending.iter().collect();
                assert_eq!(unique.len(), snapshot.pending.len(), "duplicate pending text");
                assert_eq!(snapshot.speaking, snapshot.in_flight.is_some());
            }
        })
    };
    observer.join().unwrap();

    wait_until(Duration::from_secs(5), || {
        let snapshot = queue.snapshot().unwrap();
        !snapshot.speaking && snapshot.pending.is_empty()
    });
    stop.store(true, Ordering::SeqCst);
    completer.join().unwrap();

    // One utterance in flight at a time: ids are never reused.
    let spoken = device.spoken();
    let ids: HashSet<_> = spoken.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(ids.len(), spoken.len());
    assert_eq!(device.outstanding(), 0);
}

#[test]
fn stale_and_duplicate_completions_are_ignored() {
    let device = Arc::new(RecordingSpeechDevice::new());
    let queue = SpeechQueue::new(device.clone());

    let SubmitOutcome::Spoken(first) = queue.submit(labelled(0)).unwrap() else {
        panic!("first submit should speak");
    };
    queue.submit(labelled(1)).unwrap();

    queue.on_speech_completed(&first).unwrap();
    let in_flight = queue.snapshot().unwrap().in_flight.expect("second in flight");
    assert_ne!(in_flight, first);

    // A late second signal for the first utterance must not end the second.
    queue.on_speech_error(&first).unwrap();
    let snapshot = queue.snapshot().unwrap();
    assert!(snapshot.speaking);
    assert_eq!(snapshot.in_flight, Some(in_flight));
}

#[test]
fn rejected_speak_moves_to_next_warning() {
    let device = Arc::new(RecordingSpeechDevice::new());
    let queue = SpeechQueue::new(device.clone());

    queue.submit(labelled(0)).unwrap();
    queue.submit(labelled(1)).unwrap();
    device.reject_next_speak();

    // Completing the first dispatches the second, which the device rejects.
    assert!(device.complete_next().unwrap());
    let snapshot = queue.snapshot().unwrap();
    assert!(!snapshot.speaking);
    assert!(snapshot.pending.is_empty());

    assert!(matches!(
        queue.submit(labelled(2)).unwrap(),
        SubmitOutcome::Spoken(_)
    ));
}
