//! GPIO service: registry and main-loop driver.
//!
//! [`GpioService`] owns every input, button, and output, the timer pool,
//! and the expander groups. Interrupt handlers only touch [`IrqShared`];
//! all state machines run inside [`GpioService::pump`], called from the
//! main loop.
//!
//! ```text
//!  PinPort/IrqPort ──▶ ┌──────────────────────────┐ ──▶ Scheduler
//!                      │       GpioService        │
//!  IrqShared (ISR) ──▶ │ Inputs · Buttons · Outs  │ ──▶ Actuators
//!                      └──────────────────────────┘
//! ```
//!
//! Inputs and buttons live in an arena; their index is the [`IrqHandle`]
//! passed to the platform ISR, so nothing in interrupt context holds a
//! pointer into the registry.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::adapters::time::Clock;
use crate::config::{ButtonTiming, InputConfig, OutputConfig, ServiceConfig};
use crate::drivers::button::Button;
use crate::drivers::expander::ExpanderGroups;
use crate::drivers::input::Input;
use crate::drivers::output::{Actuator, Output, PinActuator};
use crate::drivers::timer::TimerPool;
use crate::error::{Error, Resource, Result};
use crate::irq::{IrqHandle, IrqShared, IrqSource, MAX_LINES};
use crate::scheduler::Scheduler;

use super::ports::{ExpanderId, IrqPort, LineId, PinPort, Trigger};

// ───────────────────────────────────────────────────────────────
// Handles
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InputId(IrqHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ButtonId(IrqHandle);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputId(u16);

impl From<InputId> for IrqHandle {
    fn from(id: InputId) -> Self {
        id.0
    }
}

impl From<ButtonId> for IrqHandle {
    fn from(id: ButtonId) -> Self {
        id.0
    }
}

// ───────────────────────────────────────────────────────────────
// Line arena
// ───────────────────────────────────────────────────────────────

enum LineSlot<P> {
    Input(Input<P>),
    Button(Button<P>),
}

impl<P: PinPort> LineSlot<P> {
    fn line(&self) -> LineId {
        match self {
            Self::Input(i) => i.line(),
            Self::Button(b) => b.line(),
        }
    }

    fn is_attached(&self) -> bool {
        match self {
            Self::Input(i) => i.is_attached(),
            Self::Button(b) => b.is_attached(),
        }
    }

    /// Lease the timers this line needs: one for an input, two for a button.
    fn lease_timers(&mut self, pool: &mut TimerPool) -> Result<()> {
        match self {
            Self::Input(i) => i.attach(pool.acquire()?),
            Self::Button(b) => {
                let debounce = pool.acquire()?;
                let gesture = match pool.acquire() {
                    Ok(lease) => lease,
                    Err(e) => {
                        pool.release(debounce);
                        return Err(e);
                    }
                };
                b.attach(debounce, gesture);
            }
        }
        Ok(())
    }

    fn release_timers(&mut self, pool: &mut TimerPool) {
        match self {
            Self::Input(i) => {
                if let Some(lease) = i.detach() {
                    pool.release(lease);
                }
            }
            Self::Button(b) => {
                for lease in b.detach().into_iter().flatten() {
                    pool.release(lease);
                }
            }
        }
    }

    fn rebind(&mut self, line: LineId) {
        match self {
            Self::Input(i) => i.rebind(line),
            Self::Button(b) => b.rebind(line),
        }
    }

    fn note_edge(&mut self, edge_ms: u32) {
        match self {
            Self::Input(i) => i.note_edge(edge_ms),
            Self::Button(b) => b.note_edge(edge_ms),
        }
    }

    fn repoll(&mut self, now_ms: u32) -> bool {
        match self {
            Self::Input(i) => i.repoll(now_ms),
            Self::Button(b) => b.repoll(now_ms),
        }
    }

    fn service(&mut self, now_ms: u32) {
        match self {
            Self::Input(i) => i.service(now_ms),
            Self::Button(b) => b.service(now_ms),
        }
    }
}

struct LineEntry<P> {
    slot: LineSlot<P>,
    /// Native pin whose interrupt is routed to this entry.
    bound_pin: Option<u8>,
}

// ───────────────────────────────────────────────────────────────
// GpioService
// ───────────────────────────────────────────────────────────────

pub struct GpioService<P: PinPort + IrqPort + Clone> {
    io: P,
    clock: Arc<dyn Clock + Send + Sync>,
    scheduler: Arc<Scheduler>,
    irq: Arc<IrqShared>,
    timers: TimerPool,
    max_outputs: usize,
    lines: Vec<LineEntry<P>>,
    outputs: Vec<Output>,
    groups: ExpanderGroups,
    shut_down: bool,
}

impl<P: PinPort + IrqPort + Clone> GpioService<P> {
    pub fn new(io: P, clock: Arc<dyn Clock + Send + Sync>, scheduler: Arc<Scheduler>, config: ServiceConfig) -> Self {
        Self::with_irq(io, clock, scheduler, Arc::new(IrqShared::new()), config)
    }

    /// Use an existing [`IrqShared`], e.g. one the platform ISR trampoline
    /// was already given.
    pub fn with_irq(
        io: P,
        clock: Arc<dyn Clock + Send + Sync>,
        scheduler: Arc<Scheduler>,
        irq: Arc<IrqShared>,
        config: ServiceConfig,
    ) -> Self {
        info!(
            "GpioService: {} timers, {} lines, {} outputs",
            config.timer_capacity, MAX_LINES, config.max_outputs
        );
        Self {
            io,
            clock,
            scheduler,
            irq,
            timers: TimerPool::new(config.timer_capacity),
            max_outputs: config.max_outputs,
            lines: Vec::new(),
            outputs: Vec::new(),
            groups: ExpanderGroups::new(),
            shut_down: false,
        }
    }

    // ── Registration ──────────────────────────────────────────

    fn push_line(&mut self, slot: LineSlot<P>) -> Result<IrqHandle> {
        if self.lines.len() >= MAX_LINES {
            return Err(Resource::LineSlots.into());
        }
        let handle = IrqHandle(self.lines.len() as u16);
        self.lines.push(LineEntry { slot, bound_pin: None });
        Ok(handle)
    }

    /// Register a debounced input. Call [`attach_interrupt`](Self::attach_interrupt)
    /// to start receiving events.
    pub fn add_input(&mut self, line: LineId, config: &InputConfig) -> Result<InputId> {
        let input = Input::new(self.io.clone(), line, config, self.scheduler.clone());
        let handle = self.push_line(LineSlot::Input(input))?;
        info!("input {:?} registered as #{}", line, handle.index());
        Ok(InputId(handle))
    }

    pub fn add_button(&mut self, line: LineId, config: &InputConfig, timing: ButtonTiming) -> Result<ButtonId> {
        let button = Button::new(self.io.clone(), line, config, timing, self.scheduler.clone());
        let handle = self.push_line(LineSlot::Button(button))?;
        info!("button {:?} registered as #{}", line, handle.index());
        Ok(ButtonId(handle))
    }

    /// Register an output. Leases one timer; fails if none is left.
    pub fn add_output(&mut self, actuator: impl Actuator + Send + 'static, config: &OutputConfig) -> Result<OutputId> {
        if self.outputs.len() >= self.max_outputs {
            return Err(Resource::OutputSlots.into());
        }
        let lease = self.timers.acquire().inspect_err(|e| {
            warn!("output {}: {}", actuator.state_key(), e);
        })?;
        let output = Output::new(Box::new(actuator), config, self.clock.clone(), self.scheduler.clone(), lease);
        let id = OutputId(self.outputs.len() as u16);
        info!("output {} registered as #{}", output.state_key(), id.0);
        self.outputs.push(output);
        Ok(id)
    }

    /// Register an output that drives `line` through this service's pin port.
    pub fn add_pin_output(&mut self, line: LineId, active_level: bool, config: &OutputConfig) -> Result<OutputId>
    where
        P: Send + 'static,
    {
        let actuator = PinActuator::new(self.io.clone(), line, active_level);
        self.add_output(actuator, config)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn input(&self, id: InputId) -> Result<&Input<P>> {
        match self.lines.get(id.0.index()).map(|e| &e.slot) {
            Some(LineSlot::Input(i)) => Ok(i),
            _ => Err(Error::UnknownHandle),
        }
    }

    pub fn input_mut(&mut self, id: InputId) -> Result<&mut Input<P>> {
        match self.lines.get_mut(id.0.index()).map(|e| &mut e.slot) {
            Some(LineSlot::Input(i)) => Ok(i),
            _ => Err(Error::UnknownHandle),
        }
    }

    pub fn button(&self, id: ButtonId) -> Result<&Button<P>> {
        match self.lines.get(id.0.index()).map(|e| &e.slot) {
            Some(LineSlot::Button(b)) => Ok(b),
            _ => Err(Error::UnknownHandle),
        }
    }

    pub fn button_mut(&mut self, id: ButtonId) -> Result<&mut Button<P>> {
        match self.lines.get_mut(id.0.index()).map(|e| &mut e.slot) {
            Some(LineSlot::Button(b)) => Ok(b),
            _ => Err(Error::UnknownHandle),
        }
    }

    pub fn output(&self, id: OutputId) -> Result<&Output> {
        self.outputs.get(id.0 as usize).ok_or(Error::UnknownHandle)
    }

    pub fn output_mut(&mut self, id: OutputId) -> Result<&mut Output> {
        self.outputs.get_mut(id.0 as usize).ok_or(Error::UnknownHandle)
    }

    /// Handle for platform ISRs.
    pub fn irq(&self) -> Arc<IrqShared> {
        self.irq.clone()
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        self.scheduler.clone()
    }

    pub fn timers_in_use(&self) -> usize {
        self.timers.in_use()
    }

    pub fn expander_groups(&self) -> &ExpanderGroups {
        &self.groups
    }

    // ── Interrupt routing ─────────────────────────────────────

    /// Start debouncing a registered input or button.
    ///
    /// Native lines get a change interrupt; expander lines join their
    /// expander's group and are re-polled when its shared IRQ fires.
    /// Attaching an attached line is a no-op.
    pub fn attach_interrupt(&mut self, handle: impl Into<IrqHandle>) -> Result<()> {
        let handle = handle.into();
        let entry = self.lines.get_mut(handle.index()).ok_or(Error::UnknownHandle)?;
        if entry.slot.is_attached() {
            return Ok(());
        }
        let line = entry.slot.line();
        entry.slot.lease_timers(&mut self.timers).inspect_err(|e| {
            warn!("{:?}: not debounced: {}", line, e);
        })?;

        let routed = match line {
            LineId::Native(pin) => self
                .io
                .attach(pin, Trigger::Change, IrqSource::Line(handle))
                .map(|()| entry.bound_pin = Some(pin)),
            LineId::Expander { expander, .. } => self.groups.join(expander, handle),
        };
        if let Err(e) = routed {
            entry.slot.release_timers(&mut self.timers);
            warn!("{:?}: attach failed: {}", line, e);
            return Err(e);
        }

        // Edges latched while detached are stale.
        self.irq.clear_edge(handle);
        info!("{:?}: interrupt attached", line);
        Ok(())
    }

    /// Stop debouncing. Pending settles are cancelled. Idempotent.
    pub fn detach_interrupt(&mut self, handle: impl Into<IrqHandle>) -> Result<()> {
        let handle = handle.into();
        let entry = self.lines.get_mut(handle.index()).ok_or(Error::UnknownHandle)?;
        if !entry.slot.is_attached() {
            return Ok(());
        }
        if let Some(pin) = entry.bound_pin.take() {
            self.io.detach(pin);
        }
        self.groups.leave(handle);
        entry.slot.release_timers(&mut self.timers);
        self.irq.clear_edge(handle);
        info!("{:?}: interrupt detached", entry.slot.line());
        Ok(())
    }

    /// Route the shared IRQ of `expander` from `board_pin`. Rebinding moves
    /// the interrupt to the new pin.
    pub fn attach_expander_interrupt(&mut self, expander: ExpanderId, board_pin: u8) -> Result<()> {
        if let Some(prev) = self.groups.set_board_pin(expander, Some(board_pin))? {
            self.io.detach(prev);
        }
        if let Err(e) = self.io.attach(board_pin, Trigger::Falling, IrqSource::Expander(expander)) {
            self.groups.set_board_pin(expander, None)?;
            warn!("expander {:#04x}: IRQ on pin {} failed: {}", expander.0, board_pin, e);
            return Err(e);
        }
        info!("expander {:#04x}: shared IRQ on pin {}", expander.0, board_pin);
        Ok(())
    }

    /// Move a registered input or button to another line, keeping its
    /// callbacks and settings. Re-attaches if it was attached.
    pub fn rebind(&mut self, handle: impl Into<IrqHandle>, line: LineId) -> Result<()> {
        let handle = handle.into();
        let was_attached = self
            .lines
            .get(handle.index())
            .ok_or(Error::UnknownHandle)?
            .slot
            .is_attached();
        self.detach_interrupt(handle)?;
        if let Some(entry) = self.lines.get_mut(handle.index()) {
            entry.slot.rebind(line);
        }
        info!("#{} rebound to {:?}", handle.index(), line);
        if was_attached {
            self.attach_interrupt(handle)?;
        }
        Ok(())
    }

    // ── Main loop ─────────────────────────────────────────────

    /// Run one service cycle. Call from the main loop.
    ///
    /// 1. Re-poll every member of each expander that raised its IRQ.
    /// 2. Feed latched edges to each line and run its due timers.
    /// 3. Run due output timers (first call applies startup states).
    /// 4. Drain the deferred-callback queue.
    ///
    /// Returns the number of deferred callbacks run.
    pub fn pump(&mut self) -> usize {
        let now = self.clock.now_ms();
        while let Some(expander) = self.irq.take_expander() {
            for handle in self.groups.members(expander) {
                if let Some(entry) = self.lines.get_mut(handle.index()) {
                    if entry.slot.repoll(now) {
                        debug!("expander {:#04x}: #{} changed", expander.0, handle.index());
                    }
                }
            }
        }

        for (idx, entry) in self.lines.iter_mut().enumerate() {
            if let Some(edge_ms) = self.irq.take_edge(IrqHandle(idx as u16)) {
                entry.slot.note_edge(edge_ms);
            }
            // Read after taking the edge so the edge is never in the future.
            let now = self.clock.now_ms();
            entry.slot.service(now);
        }

        let now = self.clock.now_ms();
        for output in &mut self.outputs {
            if !output.is_started() {
                output.begin();
            }
            output.service(now);
        }

        self.scheduler.pump()
    }

    /// Detach every interrupt and release every timer.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for idx in 0..self.lines.len() {
            // Indices come from the arena, so this cannot fail.
            let _ = self.detach_interrupt(IrqHandle(idx as u16));
        }
        for output in &mut self.outputs {
            if let Some(lease) = output.release() {
                self.timers.release(lease);
            }
        }
        let pins: Vec<(ExpanderId, u8)> = self
            .groups
            .iter()
            .filter_map(|g| g.board_pin.map(|p| (g.expander, p)))
            .collect();
        for (expander, pin) in pins {
            self.io.detach(pin);
            let _ = self.groups.set_board_pin(expander, None);
        }
        info!("GpioService: shut down ({} timers still leased)", self.timers.in_use());
    }
}

impl<P: PinPort + IrqPort + Clone> Drop for GpioService<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
