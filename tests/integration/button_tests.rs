//! Button gestures driven through the service with a manual clock.
//!
//! Debounce is zero in most tests so press/release times are exactly the
//! times the line was driven.

use gesture_io::app::ports::LineId;
use gesture_io::config::{ButtonTiming, InputConfig, PinMode, ServiceConfig};
use gesture_io::drivers::button::{ButtonState, Gesture};
use gesture_io::{ButtonId, Error, Resource};

use crate::mock_hw::{EventLog, Rig, count, counter};

const PIN: LineId = LineId::Native(0);

fn config(debounce_ms: u32) -> InputConfig {
    InputConfig {
        mode: PinMode::InputPullUp,
        active_level: false,
        debounce_ms,
    }
}

fn button(rig: &mut Rig, debounce_ms: u32) -> ButtonId {
    let id = rig
        .svc
        .add_button(PIN, &config(debounce_ms), ButtonTiming::default())
        .unwrap();
    rig.svc.attach_interrupt(id).unwrap();
    id
}

fn press_at(rig: &mut Rig, t: u32) {
    rig.run_until(t);
    rig.drive(PIN, false);
}

fn release_at(rig: &mut Rig, t: u32) {
    rig.run_until(t);
    rig.drive(PIN, true);
}

fn click_listeners(rig: &mut Rig, id: ButtonId, log: &EventLog) {
    let b = rig.svc.button_mut(id).unwrap();
    b.on_click(log.recorder("click"), false);
    b.on_double_click(log.recorder("double"), false);
    for n in 1..=4 {
        b.on_click_count(n, log.recorder(&format!("count{n}")), false);
    }
}

#[test]
fn single_click_resolves_after_click_wait() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);

    press_at(&mut rig, 10);
    release_at(&mut rig, 110);
    rig.run_until(409);
    assert!(log.entries().is_empty());
    assert_eq!(rig.svc.button(id).unwrap().click_count(), 1);

    rig.run_until(410);
    assert_eq!(log.take(), ["click", "count1"]);
    assert_eq!(rig.svc.button(id).unwrap().click_count(), 0);
}

#[test]
fn double_click_fires_double_and_count_two_only() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);

    press_at(&mut rig, 10);
    release_at(&mut rig, 60);
    press_at(&mut rig, 200);
    release_at(&mut rig, 250);
    rig.run_until(549);
    assert!(log.entries().is_empty());
    rig.run_until(550);
    assert_eq!(log.take(), ["double", "count2"]);
}

#[test]
fn triple_click_fires_count_three_only() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);

    for (p, r) in [(10, 60), (150, 200), (290, 340)] {
        press_at(&mut rig, p);
        release_at(&mut rig, r);
    }
    rig.run_until(1000);
    assert_eq!(log.take(), ["count3"]);
}

#[test]
fn press_outside_window_restarts_count() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);

    press_at(&mut rig, 10);
    release_at(&mut rig, 60);
    rig.run_until(360);
    assert_eq!(log.take(), ["click", "count1"]);

    // After resolution but before idle: a fresh single click.
    press_at(&mut rig, 400);
    rig.pump();
    assert_eq!(rig.svc.button(id).unwrap().click_count(), 1);
    release_at(&mut rig, 450);
    rig.run_until(750);
    assert_eq!(log.take(), ["click", "count1"]);
}

#[test]
fn long_hold_fires_long_click_once_and_suppresses_click() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);
    rig.svc.button_mut(id).unwrap().on_long_click(log.recorder("long"), false);

    press_at(&mut rig, 10);
    rig.run_until(3009);
    assert!(log.entries().is_empty());
    rig.run_until(3010);
    assert_eq!(log.take(), ["long"]);

    rig.run_until(4000);
    assert!(log.entries().is_empty());
    release_at(&mut rig, 4000);
    rig.run_until(5000);
    assert!(log.entries().is_empty());
    assert_eq!(rig.svc.button(id).unwrap().state(), ButtonState::Idle);
}

#[test]
fn hold_poll_follows_constructor_timing() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let timing = ButtonTiming {
        click_wait_ms: 300,
        idle_ms: 500,
        hold_ms: 3050,
    };
    let id = rig.svc.add_button(PIN, &config(0), timing).unwrap();
    rig.svc.attach_interrupt(id).unwrap();
    click_listeners(&mut rig, id, &log);
    rig.svc.button_mut(id).unwrap().on_long_click(log.recorder("long"), false);
    assert_eq!(rig.svc.button(id).unwrap().hold_poll_ms(), 3050);

    press_at(&mut rig, 100);
    rig.run_until(3149);
    assert!(log.entries().is_empty());
    rig.run_until(3150);
    assert_eq!(log.take(), ["long"]);

    release_at(&mut rig, 3170);
    rig.run_until(4000);
    assert!(log.entries().is_empty());
}

#[test]
fn release_exactly_at_hold_threshold_is_a_long_click() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);
    rig.svc.button_mut(id).unwrap().on_long_click(log.recorder("long"), false);

    press_at(&mut rig, 100);
    rig.edge_at(PIN, true, 3100);
    rig.run_until(4000);
    assert_eq!(log.take(), ["long"]);
    assert_eq!(rig.svc.button(id).unwrap().state(), ButtonState::Idle);
}

#[test]
fn release_just_before_hold_threshold_is_a_click() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);
    rig.svc.button_mut(id).unwrap().on_long_click(log.recorder("long"), false);

    press_at(&mut rig, 100);
    rig.edge_at(PIN, true, 3099);
    rig.run_until(4000);
    assert_eq!(log.take(), ["click", "count1"]);
}

#[test]
fn press_at_click_window_end_resolves_previous_click() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    click_listeners(&mut rig, id, &log);

    press_at(&mut rig, 10);
    release_at(&mut rig, 60);
    rig.edge_at(PIN, false, 360);
    assert_eq!(log.take(), ["click", "count1"]);
    assert_eq!(rig.svc.button(id).unwrap().click_count(), 1);

    release_at(&mut rig, 410);
    rig.run_until(1500);
    assert_eq!(log.take(), ["click", "count1"]);
}

#[test]
fn press_hold_thresholds_fire_independently() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    {
        let b = rig.svc.button_mut(id).unwrap();
        b.on_press_hold(500, log.recorder("hold500"), false);
        b.on_press_hold(1200, log.recorder("hold1200"), false);
        assert_eq!(b.hold_poll_ms(), 100);
    }

    press_at(&mut rig, 10);
    rig.run_until(509);
    assert!(log.entries().is_empty());
    rig.run_until(510);
    assert_eq!(log.take(), ["hold500"]);
    rig.run_until(1210);
    assert_eq!(log.take(), ["hold1200"]);
    release_at(&mut rig, 1500);
    rig.run_until(2500);
    assert!(log.entries().is_empty());

    // Re-armed by the next press.
    press_at(&mut rig, 3000);
    rig.run_until(3500);
    assert_eq!(log.take(), ["hold500"]);
}

#[test]
fn hold_poll_period_tracks_gcd_of_thresholds() {
    let mut rig = Rig::new();
    let id = button(&mut rig, 0);
    let b = rig.svc.button_mut(id).unwrap();
    assert_eq!(b.hold_poll_ms(), 3000);
    b.on_press_hold(1000, || {}, false);
    assert_eq!(b.hold_poll_ms(), 1000);
    b.on_press_hold(1500, || {}, false);
    assert_eq!(b.hold_poll_ms(), 500);
    b.on_press_hold(1001, || {}, false);
    assert_eq!(b.hold_poll_ms(), 50);
}

#[test]
fn idle_resets_session_and_fires_once() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    {
        let b = rig.svc.button_mut(id).unwrap();
        b.on_idle(log.recorder("idle"), false);
        b.on_change(log.recorder("change"), false);
        b.on_press(log.recorder("press"), false);
        b.on_release(log.recorder("release"), false);
    }

    press_at(&mut rig, 10);
    release_at(&mut rig, 60);
    rig.run_until(559);
    assert_eq!(log.take(), ["change", "press", "change", "release"]);
    assert_eq!(rig.svc.button(id).unwrap().state(), ButtonState::Released);

    rig.run_until(560);
    assert_eq!(log.take(), ["idle", "change"]);
    let b = rig.svc.button(id).unwrap();
    assert_eq!(b.state(), ButtonState::Idle);
    assert_eq!(b.state_label(), "idle");
    assert_eq!(b.click_count(), 0);
    assert_eq!(b.pressed_at(), None);
    assert_eq!(b.released_at(), None);

    rig.run_until(3000);
    assert!(log.entries().is_empty());
}

#[test]
fn every_listener_for_a_gesture_fires_in_order() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 0);
    {
        let b = rig.svc.button_mut(id).unwrap();
        b.on_press(log.recorder("a"), false);
        b.on_event(Gesture::Pressed, log.recorder("b"), false);
    }
    press_at(&mut rig, 10);
    rig.pump();
    assert_eq!(log.take(), ["a", "b"]);
}

#[test]
fn pressed_fires_once_per_press() {
    let mut rig = Rig::new();
    let id = button(&mut rig, 0);
    let (presses, on_press) = counter();
    rig.svc.button_mut(id).unwrap().on_press(on_press, false);

    for (p, r) in [(10, 60), (150, 200), (1000, 1050)] {
        press_at(&mut rig, p);
        release_at(&mut rig, r);
    }
    rig.run_until(2000);
    assert_eq!(count(&presses), 3);
}

#[test]
fn bouncy_press_counts_as_one_click() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let id = button(&mut rig, 30);
    click_listeners(&mut rig, id, &log);

    press_at(&mut rig, 10);
    rig.run_for(3);
    rig.drive(PIN, true);
    rig.run_for(3);
    rig.drive(PIN, false);
    release_at(&mut rig, 200);
    rig.run_for(2);
    rig.drive(PIN, false);
    rig.run_for(2);
    rig.drive(PIN, true);

    rig.run_until(1000);
    assert_eq!(log.take(), ["click", "count1"]);
    let b = rig.svc.button(id).unwrap();
    assert_eq!(b.state(), ButtonState::Idle);
}

#[test]
fn timing_setters_keep_invariants() {
    let mut rig = Rig::new();
    let id = button(&mut rig, 0);
    let b = rig.svc.button_mut(id).unwrap();

    b.set_hold_ms(500);
    assert_eq!(b.hold_ms(), 600);
    assert_eq!(b.hold_poll_ms(), 600);

    b.set_idle_ms(200);
    assert_eq!(b.idle_ms(), 500);

    b.set_click_wait_ms(1000);
    assert!(b.idle_ms() > b.click_wait_ms());
    assert!(b.hold_ms() >= 2 * b.click_wait_ms());
}

#[test]
fn deferred_click_runs_from_the_scheduler() {
    let mut rig = Rig::new();
    let id = button(&mut rig, 0);
    let (clicks, on_click) = counter();
    rig.svc.button_mut(id).unwrap().on_click(on_click, true);

    press_at(&mut rig, 10);
    release_at(&mut rig, 60);
    rig.run_until(359);
    assert_eq!(count(&clicks), 0);
    rig.run_until(360);
    assert_eq!(count(&clicks), 1);
}

#[test]
fn button_needs_two_timers() {
    let mut rig = Rig::with_config(ServiceConfig {
        timer_capacity: 1,
        ..ServiceConfig::default()
    });
    let id = rig
        .svc
        .add_button(PIN, &config(0), ButtonTiming::default())
        .unwrap();
    assert_eq!(
        rig.svc.attach_interrupt(id),
        Err(Error::ResourceExhausted(Resource::Timer))
    );
    assert_eq!(rig.svc.timers_in_use(), 0);
}
