//! Tests for Dispatcher module

use super::*;
use crate::state::StateReport;
use parking_lot::Mutex;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

fn make_dispatcher() -> Dispatcher {
    Dispatcher::new(Arc::new(StateStore::new()))
}

fn state_of(dispatcher: &Dispatcher) -> (i64, bool) {
    let store = dispatcher.store();
    (store.get_brightness().unwrap(), store.get_output().unwrap())
}

/// Collects formatted log output so tests can inspect what was emitted
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn capture_logs(f: impl FnOnce()) -> String {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = capture.0.lock().clone();
    String::from_utf8(bytes).unwrap()
}

#[test]
fn test_full_scenario() {
    let dispatcher = make_dispatcher();
    assert_eq!(state_of(&dispatcher), (0, false));

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"event","action":"rotate_right"}"#);
    assert_eq!(
        outcome,
        DispatchOutcome::Brightness {
            action: KnobAction::RotateRight,
            step: 10,
            brightness: 10
        }
    );
    assert_eq!(state_of(&dispatcher), (10, false));

    dispatcher.dispatch(
        br#"{"operation_mode":"command","action":"brightness_step_up","action_step_size":95}"#,
    );
    assert_eq!(state_of(&dispatcher), (100, false));

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"event","action":"single"}"#);
    assert_eq!(
        outcome,
        DispatchOutcome::Output {
            action: KnobAction::SinglePress,
            output: true
        }
    );

    let expected = StateReport {
        brightness: 100,
        output: true,
    };
    let store = dispatcher.store();
    assert_eq!(store.report().unwrap(), expected);
    assert!(!store.is_dirty().unwrap());
    assert_eq!(store.report().unwrap(), expected);
    assert!(!store.is_dirty().unwrap());
}

#[test]
fn test_brightness_step_commands_default_to_zero() {
    let dispatcher = make_dispatcher();
    dispatcher.store().set_brightness(40).unwrap();

    let outcome =
        dispatcher.dispatch(br#"{"operation_mode":"command","action":"brightness_step_up"}"#);
    assert_eq!(
        outcome,
        DispatchOutcome::Brightness {
            action: KnobAction::BrightnessStepUp,
            step: 0,
            brightness: 40
        }
    );

    dispatcher.dispatch(br#"{"operation_mode":"command","action":"brightness_step_down"}"#);
    assert_eq!(state_of(&dispatcher), (40, false));
}

#[test]
fn test_brightness_step_down_clamps_low() {
    let dispatcher = make_dispatcher();
    dispatcher.store().set_brightness(15).unwrap();

    dispatcher.dispatch(
        br#"{"operation_mode":"command","action":"brightness_step_down","action_step_size":40}"#,
    );
    assert_eq!(state_of(&dispatcher), (0, false));
}

#[test]
fn test_rotate_left_default_step() {
    let dispatcher = make_dispatcher();
    dispatcher.store().set_brightness(25).unwrap();

    dispatcher.dispatch(br#"{"operation_mode":"event","action":"rotate_left"}"#);
    assert_eq!(state_of(&dispatcher), (15, false));

    dispatcher.dispatch(br#"{"operation_mode":"event","action":"rotate_left"}"#);
    dispatcher.dispatch(br#"{"operation_mode":"event","action":"rotate_left"}"#);
    assert_eq!(state_of(&dispatcher), (0, false));
}

#[test]
fn test_toggle_command_flips_output() {
    let dispatcher = make_dispatcher();

    dispatcher.dispatch(br#"{"operation_mode":"command","action":"toggle"}"#);
    assert_eq!(state_of(&dispatcher), (0, true));

    dispatcher.dispatch(br#"{"operation_mode":"command","action":"toggle"}"#);
    assert_eq!(state_of(&dispatcher), (0, false));
}

#[test]
fn test_log_only_actions_leave_state_clean() {
    let dispatcher = make_dispatcher();

    for payload in [
        br#"{"operation_mode":"command","action":"color_temperature_step_up","action_step_size":5}"#
            .as_slice(),
        br#"{"operation_mode":"command","action":"color_temperature_step_down"}"#.as_slice(),
        br#"{"operation_mode":"event","action":"double"}"#.as_slice(),
    ] {
        let outcome = dispatcher.dispatch(payload);
        assert!(matches!(outcome, DispatchOutcome::LogOnly { .. }));
    }

    assert_eq!(state_of(&dispatcher), (0, false));
    assert!(!dispatcher.store().is_dirty().unwrap());
}

#[test]
fn test_unknown_operation_mode_is_dropped() {
    let dispatcher = make_dispatcher();
    dispatcher.store().set_brightness(50).unwrap();
    dispatcher.store().report().unwrap();

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"diagnostic","action":"toggle"}"#);
    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::UnknownOperationMode));

    let outcome = dispatcher.dispatch(br#"{"action":"rotate_right"}"#);
    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::UnknownOperationMode));

    assert_eq!(state_of(&dispatcher), (50, false));
    assert!(!dispatcher.store().is_dirty().unwrap());
}

#[test]
fn test_unhandled_action_is_dropped() {
    let dispatcher = make_dispatcher();

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"event","action":"hold"}"#);
    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::UnhandledAction));

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"command"}"#);
    assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::UnhandledAction));

    assert_eq!(state_of(&dispatcher), (0, false));
}

#[test]
fn test_malformed_payload_logs_one_error() {
    let dispatcher = make_dispatcher();

    let mut outcome = None;
    let logs = capture_logs(|| {
        outcome = Some(dispatcher.dispatch(b"not json"));
    });

    assert_eq!(outcome, Some(DispatchOutcome::Dropped(DropReason::Decode)));
    assert_eq!(logs.lines().filter(|l| l.contains("ERROR")).count(), 1);
    assert!(logs.contains("Invalid JSON payload"));
    assert_eq!(state_of(&dispatcher), (0, false));
    assert!(!dispatcher.store().is_dirty().unwrap());
}

#[test]
fn test_applied_action_is_logged_with_result() {
    let dispatcher = make_dispatcher();

    let logs = capture_logs(|| {
        dispatcher.dispatch(br#"{"operation_mode":"event","action":"rotate_right","action_step_size":30}"#);
    });

    assert!(logs.contains("Knob rotated right by 30. New brightness: 30"));
}

#[test]
fn test_unhandled_action_is_logged() {
    let dispatcher = make_dispatcher();

    let logs = capture_logs(|| {
        dispatcher.dispatch(br#"{"operation_mode":"event","action":"hold"}"#);
        dispatcher.dispatch(br#"{"operation_mode":"diagnostic"}"#);
    });

    assert!(logs.contains("Unhandled event action: hold"));
    assert!(logs.contains("Unknown operation mode: diagnostic"));
}

#[test]
fn test_lock_timeout_drops_event() {
    let store = Arc::new(StateStore::with_lock_timeout(Duration::from_millis(20)));
    let dispatcher = Dispatcher::new(Arc::clone(&store));

    {
        let _held = store.hold_lock();
        let outcome = dispatcher.dispatch(br#"{"operation_mode":"command","action":"toggle"}"#);
        assert_eq!(outcome, DispatchOutcome::Dropped(DropReason::LockTimeout));
    }

    assert_eq!(state_of(&dispatcher), (0, false));
    assert!(!store.is_dirty().unwrap());

    let outcome = dispatcher.dispatch(br#"{"operation_mode":"command","action":"toggle"}"#);
    assert!(!outcome.is_dropped());
}

#[test]
fn test_try_dispatch_surfaces_errors() {
    let dispatcher = make_dispatcher();

    assert!(matches!(
        dispatcher.try_dispatch(b"{").unwrap_err(),
        KnobError::Decode(_)
    ));
    assert!(matches!(
        dispatcher
            .try_dispatch(br#"{"operation_mode":"event","action":"hold"}"#)
            .unwrap_err(),
        KnobError::UnhandledAction { .. }
    ));
}

#[test]
fn test_concurrent_step_up_loses_no_updates() {
    let dispatcher = make_dispatcher();
    let payload =
        br#"{"operation_mode":"command","action":"brightness_step_up","action_step_size":1}"#;

    std::thread::scope(|scope| {
        for _ in 0..40 {
            let dispatcher = dispatcher.clone();
            scope.spawn(move || {
                dispatcher.dispatch(payload);
            });
        }
    });
    assert_eq!(state_of(&dispatcher), (40, false));

    std::thread::scope(|scope| {
        for _ in 0..80 {
            let dispatcher = dispatcher.clone();
            scope.spawn(move || {
                dispatcher.dispatch(payload);
            });
        }
    });
    assert_eq!(state_of(&dispatcher), (100, false));
}
