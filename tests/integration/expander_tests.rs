//! Shared expander interrupt: group membership and re-poll fan-out.

use gesture_io::app::ports::{ExpanderId, LineId, Trigger};
use gesture_io::config::{InputConfig, PinMode};
use gesture_io::irq::IrqSource;
use gesture_io::InputId;

use crate::mock_hw::{EventLog, Rig};

const EXP: ExpanderId = ExpanderId(0x20);
const BOARD_PIN: u8 = 15;

fn exp_line(pin: u8) -> LineId {
    LineId::Expander { expander: EXP, pin }
}

fn config(debounce_ms: u32) -> InputConfig {
    InputConfig {
        mode: PinMode::InputPullUp,
        active_level: false,
        debounce_ms,
    }
}

fn member(rig: &mut Rig, pin: u8, debounce_ms: u32, log: &EventLog) -> InputId {
    let id = rig.svc.add_input(exp_line(pin), &config(debounce_ms)).unwrap();
    rig.svc
        .input_mut(id)
        .unwrap()
        .on_change(log.recorder(&format!("change{pin}")), false);
    rig.svc.attach_interrupt(id).unwrap();
    id
}

#[test]
fn board_pin_gets_falling_edge_binding() {
    let mut rig = Rig::new();
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();
    assert_eq!(
        rig.pins.binding(BOARD_PIN),
        Some((Trigger::Falling, IrqSource::Expander(EXP)))
    );
}

#[test]
fn expander_members_join_group_without_pin_binding() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let a = member(&mut rig, 1, 20, &log);
    let b = member(&mut rig, 2, 20, &log);

    let members = rig.svc.expander_groups().members(EXP);
    assert_eq!(members.len(), 2);
    assert!(members.contains(&a.into()));
    assert!(members.contains(&b.into()));
    assert!(rig.pins.binding(1).is_none());
}

#[test]
fn shared_irq_repolls_only_changed_members() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    member(&mut rig, 1, 20, &log);
    member(&mut rig, 2, 20, &log);
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();

    rig.run_for(10);
    rig.pins.set_level(exp_line(1), false);
    assert!(rig.fire_irq(BOARD_PIN));
    // Re-polled by the pump at t=11, so the quiet period ends at 31.
    rig.run_until(30);
    assert!(log.entries().is_empty());
    rig.run_until(31);
    assert_eq!(log.take(), ["change1"]);
    rig.run_for(100);
    assert!(log.entries().is_empty());
}

#[test]
fn zero_debounce_member_settles_in_the_same_pump() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    member(&mut rig, 3, 0, &log);
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();

    rig.pins.set_level(exp_line(3), false);
    rig.fire_irq(BOARD_PIN);
    rig.pump();
    assert_eq!(log.take(), ["change3"]);
}

#[test]
fn detached_member_is_not_polled() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    let a = member(&mut rig, 1, 0, &log);
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();
    rig.svc.detach_interrupt(a).unwrap();
    assert!(rig.svc.expander_groups().members(EXP).is_empty());

    rig.pins.set_level(exp_line(1), false);
    rig.fire_irq(BOARD_PIN);
    rig.run_for(50);
    assert!(log.entries().is_empty());
}

#[test]
fn queue_overflow_is_counted_and_later_irqs_still_work() {
    let mut rig = Rig::new();
    let log = EventLog::new();
    member(&mut rig, 1, 0, &log);
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();

    for _ in 0..9 {
        rig.fire_irq(BOARD_PIN);
    }
    assert_eq!(rig.svc.irq().dropped(), 1);
    rig.pump();
    assert!(log.entries().is_empty());

    rig.pins.set_level(exp_line(1), false);
    rig.fire_irq(BOARD_PIN);
    rig.pump();
    assert_eq!(log.take(), ["change1"]);
}

#[test]
fn rebinding_board_pin_moves_the_interrupt() {
    let mut rig = Rig::new();
    rig.svc.attach_expander_interrupt(EXP, BOARD_PIN).unwrap();
    rig.svc.attach_expander_interrupt(EXP, 16).unwrap();
    assert!(rig.pins.binding(BOARD_PIN).is_none());
    assert!(rig.pins.binding(16).is_some());
    assert_eq!(
        rig.svc.expander_groups().get(EXP).and_then(|g| g.board_pin),
        Some(16)
    );
}
