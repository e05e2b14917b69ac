//! Debounced input: settle timing, callback slots, attach/detach, rebind.

use gesture_io::app::ports::{LineId, Trigger};
use gesture_io::config::{InputConfig, PinMode, ServiceConfig};
use gesture_io::irq::IrqSource;
use gesture_io::{Error, InputId, Resource};

use crate::mock_hw::{EventLog, Rig, count, counter};

const PIN: LineId = LineId::Native(4);

fn active_low(debounce_ms: u32) -> InputConfig {
    InputConfig {
        mode: PinMode::InputPullUp,
        active_level: false,
        debounce_ms,
    }
}

fn attached_input(rig: &mut Rig, debounce_ms: u32, log: &EventLog) -> InputId {
    let id = rig.svc.add_input(PIN, &active_low(debounce_ms)).unwrap();
    let input = rig.svc.input_mut(id).unwrap();
    input.on_active(log.recorder("active"), false);
    input.on_inactive(log.recorder("inactive"), false);
    input.on_change(log.recorder("change"), false);
    rig.svc.attach_interrupt(id).unwrap();
    id
}

#[test]
fn initial_level_is_read_at_construction() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(50)).unwrap();
    let input = rig.svc.input_mut(id).unwrap();
    assert!(input.last_level());
    assert!(!input.is_active());
    assert_eq!(input.state_label(), "NONE");
}

#[test]
fn settles_once_after_last_bounce() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = attached_input(&mut rig, 50, &log);

    rig.run_for(10);
    rig.drive(PIN, false);
    rig.run_for(5);
    rig.drive(PIN, true);
    rig.run_for(5);
    rig.drive(PIN, false);

    rig.run_until(69);
    assert!(log.entries().is_empty());

    rig.run_until(70);
    assert_eq!(log.take(), ["active", "change"]);
    assert!(!rig.svc.input(id).unwrap().last_level());

    rig.run_for(200);
    assert!(log.entries().is_empty());
}

#[test]
fn bounce_back_to_stable_level_is_ignored() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    attached_input(&mut rig, 50, &log);

    rig.run_for(10);
    rig.drive(PIN, false);
    rig.run_for(20);
    rig.drive(PIN, true);
    rig.run_for(200);
    assert!(log.entries().is_empty());
}

#[test]
fn release_fires_inactive_then_change() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    attached_input(&mut rig, 20, &log);

    rig.drive(PIN, false);
    rig.run_for(100);
    log.take();
    rig.drive(PIN, true);
    rig.run_for(100);
    assert_eq!(log.take(), ["inactive", "change"]);
}

#[test]
fn zero_debounce_settles_in_the_same_pump() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    attached_input(&mut rig, 0, &log);

    rig.run_for(5);
    rig.drive(PIN, false);
    rig.pump();
    assert_eq!(log.take(), ["active", "change"]);
}

#[test]
fn last_registration_wins_per_slot() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(0)).unwrap();
    let (first, first_fn) = counter();
    let (second, second_fn) = counter();
    {
        let input = rig.svc.input_mut(id).unwrap();
        input.on_change(first_fn, false);
        input.on_change(second_fn, false);
    }
    rig.svc.attach_interrupt(id).unwrap();

    rig.drive(PIN, false);
    rig.pump();
    assert_eq!(count(&first), 0);
    assert_eq!(count(&second), 1);
}

#[test]
fn deferred_callback_runs_in_scheduler_drain() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(0)).unwrap();
    let (hits, hit) = counter();
    rig.svc.input_mut(id).unwrap().on_active(hit, true);
    rig.svc.attach_interrupt(id).unwrap();

    rig.drive(PIN, false);
    assert_eq!(rig.pump(), 1);
    assert_eq!(count(&hits), 1);
}

#[test]
fn unattached_input_never_settles() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(0)).unwrap();
    let (hits, hit) = counter();
    rig.svc.input_mut(id).unwrap().on_change(hit, false);

    rig.drive(PIN, false);
    rig.run_for(100);
    assert_eq!(count(&hits), 0);
    assert!(rig.pins.binding(4).is_none());
}

#[test]
fn attach_binds_change_interrupt_once() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(50)).unwrap();
    rig.svc.attach_interrupt(id).unwrap();
    rig.svc.attach_interrupt(id).unwrap();

    let (trigger, source) = rig.pins.binding(4).unwrap();
    assert_eq!(trigger, Trigger::Change);
    assert!(matches!(source, IrqSource::Line(_)));
    assert_eq!(rig.svc.timers_in_use(), 1);
}

#[test]
fn detach_cancels_pending_settle_and_releases_timer() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = attached_input(&mut rig, 50, &log);

    rig.drive(PIN, false);
    rig.run_for(10);
    rig.svc.detach_interrupt(id).unwrap();
    rig.svc.detach_interrupt(id).unwrap();
    rig.run_for(200);

    assert!(log.entries().is_empty());
    assert_eq!(rig.svc.timers_in_use(), 0);
    assert!(rig.pins.binding(4).is_none());
}

#[test]
fn interrupt_failure_releases_the_timer() {
    let mut rig = Rig::new();
    rig.pins.fail_attach(4);
    let id = rig.svc.add_input(PIN, &active_low(50)).unwrap();
    assert_eq!(rig.svc.attach_interrupt(id), Err(Error::InterruptUnavailable(4)));
    assert_eq!(rig.svc.timers_in_use(), 0);
    assert!(!rig.svc.input(id).unwrap().is_attached());
}

#[test]
fn timer_exhaustion_leaves_input_undebounced() {
    let mut rig = Rig::with_config(ServiceConfig {
        timer_capacity: 1,
        ..ServiceConfig::default()
    });
    let a = rig.svc.add_input(PIN, &active_low(0)).unwrap();
    let b = rig.svc.add_input(LineId::Native(5), &active_low(0)).unwrap();
    rig.svc.attach_interrupt(a).unwrap();
    assert_eq!(
        rig.svc.attach_interrupt(b),
        Err(Error::ResourceExhausted(Resource::Timer))
    );
    assert!(!rig.svc.input(b).unwrap().is_attached());
}

#[test]
fn rebind_moves_the_interrupt_and_keeps_callbacks() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = attached_input(&mut rig, 0, &log);
    let new_line = LineId::Native(5);

    rig.svc.rebind(id, new_line).unwrap();
    assert!(rig.pins.binding(4).is_none());
    assert!(rig.pins.binding(5).is_some());
    assert_eq!(rig.svc.input(id).unwrap().line(), new_line);

    rig.drive(PIN, false);
    rig.pump();
    assert!(log.entries().is_empty());

    rig.drive(new_line, false);
    rig.pump();
    assert_eq!(log.take(), ["active", "change"]);
}

#[test]
fn custom_state_labels_follow_direct_read() {
    let mut rig = Rig::new();
    let id = rig.svc.add_input(PIN, &active_low(50)).unwrap();
    let input = rig.svc.input_mut(id).unwrap();
    input.set_state_labels("OPEN", "CLOSED");
    assert_eq!(input.state_label(), "CLOSED");
    rig.pins.set_level(PIN, false);
    let input = rig.svc.input_mut(id).unwrap();
    assert!(input.is_active());
    assert_eq!(input.state_label(), "OPEN");
}

#[test]
fn line_arena_is_bounded() {
    let mut rig = Rig::new();
    for pin in 0..gesture_io::irq::MAX_LINES as u8 {
        rig.svc.add_input(LineId::Native(pin), &InputConfig::default()).unwrap();
    }
    assert_eq!(
        rig.svc.add_input(LineId::Native(99), &InputConfig::default()).err(),
        Some(Error::ResourceExhausted(Resource::LineSlots))
    );
}
