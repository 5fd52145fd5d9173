//! Device notification tests
//!
//! Finish and error notifications arrive after the command that caused them
//! and must be reconciled with whatever the deck is doing by then.

mod common;

use audiodeck::audio::DeviceFault;
use audiodeck::deck::{DeckEvent, DeckPhase};
use common::{MockDevice, Rig};

/// Test: Record, meter, stop, finish
/// Given a recording that succeeded to start
/// When three ticks occur, recording stops and the device reports success
/// Then three amplitude-only samples are followed by exactly one recorded
/// event, and nothing is sampled again until play
#[test]
fn test_record_scenario() {
    let mut rig = Rig::new();
    let started = rig.deck.start_recording().unwrap();

    for _ in 0..3 {
        rig.deck.tick();
    }
    rig.deck.stop_recording();
    rig.device.recorder_notifier().record_finished(true);
    rig.deck.pump();

    rig.deck.tick();
    rig.deck.tick();

    let amplitude = DeckEvent::Amplitude { decibels: -12.0 };
    assert_eq!(
        rig.events.take(),
        vec![
            amplitude.clone(),
            amplitude.clone(),
            amplitude.clone(),
            DeckEvent::Recorded {
                path: started.path.clone(),
                duration: 2.5,
            },
        ]
    );

    rig.deck.play();
    rig.deck.tick();
    assert_eq!(
        rig.events.take(),
        vec![amplitude, DeckEvent::PlaybackLocation { time: 0.0 }]
    );
}

/// Test: A finished recording is loaded for playback
/// Given a stopped recording
/// When the device reports it finished successfully
/// Then the file is opened paused and its URL is the recorder's destination
#[test]
fn test_record_finished_loads_take() {
    let mut rig = Rig::new();
    rig.device.set(|s| s.duration = 4.75);
    let started = rig.deck.start_recording().unwrap();
    rig.deck.stop_recording();

    rig.device.recorder_notifier().record_finished(true);
    rig.deck.pump();

    assert_eq!(rig.deck.phase(), DeckPhase::Paused);
    assert_eq!(rig.deck.file_url(), Some(started.path.as_path()));
    assert_eq!(rig.deck.file_duration(), Some(4.75));
    assert_eq!(rig.device.get(|s| s.opened.clone()), vec![started.path.clone()]);
    assert_eq!(rig.device.live_sessions(), 1);
    assert_eq!(
        rig.events.snapshot(),
        vec![DeckEvent::Recorded {
            path: started.path,
            duration: 4.75,
        }]
    );
}

/// Test: A failed recording is dropped silently
/// Given a stopped recording
/// When the device reports failure
/// Then the deck is idle, holds no session and emits nothing
#[test]
fn test_record_finished_failure() {
    let mut rig = Rig::new();
    rig.deck.start_recording().unwrap();
    rig.deck.stop_recording();

    rig.device.recorder_notifier().record_finished(false);
    rig.deck.pump();

    assert_eq!(rig.deck.phase(), DeckPhase::Idle);
    assert_eq!(rig.deck.file_url(), None);
    assert_eq!(rig.device.live_sessions(), 0);
    assert_eq!(rig.device.player_opens(), 0);
    assert!(rig.events.is_empty());
}

/// Test: The recorder may finish on its own
/// Given a recording that was never stopped
/// When the device reports it finished
/// Then sampling stops and the take is loaded as usual
#[test]
fn test_record_finished_while_recording() {
    let mut rig = Rig::new();
    let started = rig.deck.start_recording().unwrap();

    rig.device.recorder_notifier().record_finished(true);
    rig.deck.pump();

    assert!(!rig.deck.is_ticking());
    assert_eq!(rig.deck.phase(), DeckPhase::Paused);
    assert_eq!(rig.deck.file_url(), Some(started.path.as_path()));
    assert_eq!(rig.events.len(), 1);
}

/// Test: A take that cannot be reopened is reported
/// Given a stopped recording and a device that cannot open players
/// When the recorder finishes successfully
/// Then the deck is idle and a decode error is emitted instead of recorded
#[test]
fn test_record_finished_but_player_fails() {
    let mut rig = Rig::new();
    rig.deck.start_recording().unwrap();
    rig.deck.stop_recording();
    rig.device.set(|s| s.fail_open_player = true);

    rig.device.recorder_notifier().record_finished(true);
    rig.deck.pump();

    assert_eq!(rig.deck.phase(), DeckPhase::Idle);
    assert_eq!(rig.device.live_sessions(), 0);
    let events = rig.events.take();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        DeckEvent::Error {
            fault: DeviceFault::Decode(_)
        }
    ));
}

/// Test: End of file
/// Given an opened file that is playing
/// When the device reports end of file
/// Then one final amplitude and position sample precede the finished event,
/// and the ticker is stopped
#[test]
fn test_play_finished_scenario() {
    let mut rig = Rig::new();
    rig.open_file("a.caf");
    rig.deck.play();
    rig.deck.scrub(2.5);

    rig.device.player_notifier().play_finished(true);
    rig.deck.pump();

    assert_eq!(
        rig.events.take(),
        vec![
            DeckEvent::Amplitude { decibels: -12.0 },
            DeckEvent::PlaybackLocation { time: 2.5 },
            DeckEvent::FinishedPlaying,
        ]
    );
    assert!(!rig.deck.is_ticking());
    assert_eq!(rig.deck.phase(), DeckPhase::Paused);

    rig.deck.tick();
    assert!(rig.events.is_empty());
}

/// Test: A failed end of playback still reports the finish
/// Given an opened file that is playing at 1.5s
/// When the device reports the end of playback with success = false
/// Then the final amplitude and position sample and the finished event are
/// emitted as for a clean finish, and the ticker is stopped
#[test]
fn test_play_finished_unsuccessfully() {
    let mut rig = Rig::new();
    rig.open_file("a.wav");
    rig.deck.play();
    rig.deck.scrub(1.5);

    rig.device.player_notifier().play_finished(false);
    rig.deck.pump();

    assert_eq!(
        rig.events.take(),
        vec![
            DeckEvent::Amplitude { decibels: -12.0 },
            DeckEvent::PlaybackLocation { time: 1.5 },
            DeckEvent::FinishedPlaying,
        ]
    );
    assert!(!rig.deck.is_ticking());
    assert_eq!(rig.deck.phase(), DeckPhase::Paused);
}

/// Test: Finishing while paused only reports the finish
#[test]
fn test_play_finished_while_paused() {
    let mut rig = Rig::new();
    rig.open_file("a.wav");

    rig.device.player_notifier().play_finished(true);
    rig.deck.pump();

    assert_eq!(rig.events.take(), vec![DeckEvent::FinishedPlaying]);
    assert_eq!(rig.deck.phase(), DeckPhase::Paused);
}

/// Test: A finished file can be played again
#[test]
fn test_replay_after_finish() {
    let mut rig = Rig::new();
    rig.open_file("a.wav");
    rig.deck.play();
    rig.device.player_notifier().play_finished(true);
    rig.deck.pump();

    rig.deck.play();

    assert!(rig.deck.is_playing());
    assert!(rig.deck.is_ticking());
    assert_eq!(rig.device.player_opens(), 1);
}

/// Test: Notifications from closed sessions are ignored
/// Given a file whose player was replaced by another file
/// When the first player reports end of file
/// Then the deck keeps playing the second file and emits nothing
#[test]
fn test_stale_session_notification_ignored() {
    let mut rig = Rig::new();
    rig.open_file("a.wav");
    let stale = rig.device.player_notifier();

    rig.open_file("b.wav");
    rig.deck.play();
    stale.play_finished(true);
    stale.decode_error("late");
    rig.deck.pump();

    assert!(rig.deck.is_playing());
    assert!(rig.events.is_empty());
}

/// Test: A second finish for the same recording is ignored
#[test]
fn test_duplicate_record_finished_ignored() {
    let mut rig = Rig::new();
    rig.record_take();
    rig.events.take();

    rig.device.recorder_notifier().record_finished(true);
    rig.deck.pump();

    assert!(rig.events.is_empty());
    assert_eq!(rig.device.player_opens(), 1);
}

/// Test: Encode errors are surfaced without changing state
/// Given a recording in progress
/// When the recorder reports an encode error
/// Then the observer sees the error and recording continues
#[test]
fn test_encode_error_surfaced() {
    let mut rig = Rig::new();
    rig.deck.start_recording().unwrap();

    rig.device.recorder_notifier().encode_error("disk full");
    rig.deck.pump();

    assert!(rig.deck.is_recording());
    assert!(rig.deck.is_ticking());
    assert_eq!(
        rig.events.take(),
        vec![DeckEvent::Error {
            fault: DeviceFault::Encode("disk full".into())
        }]
    );
}

/// Test: Decode errors are surfaced without changing state
#[test]
fn test_decode_error_surfaced() {
    let mut rig = Rig::new();
    rig.open_file("a.wav");
    rig.deck.play();

    rig.device.player_notifier().decode_error("truncated");
    rig.deck.pump();

    assert!(rig.deck.is_playing());
    assert_eq!(
        rig.events.take(),
        vec![DeckEvent::Error {
            fault: DeviceFault::Decode("truncated".into())
        }]
    );
}

/// Test: Notifications arriving after the deck is gone are harmless
#[test]
fn test_notification_after_deck_dropped() {
    let device = MockDevice::new();
    let mut rig = Rig::with_device(device.clone());
    rig.deck.start_recording().unwrap();
    let notifier = device.recorder_notifier();

    drop(rig);
    notifier.record_finished(true);

    assert_eq!(device.live_sessions(), 0);
}
