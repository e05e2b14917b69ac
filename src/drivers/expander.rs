//! Fan-out of one shared expander interrupt line to its member inputs.
//!
//! An I/O expander raises a single open-drain IRQ for any of its pins. The
//! ISR only queues the expander id; the pump then re-polls every member of
//! the group. One group exists per expander ever registered and groups are
//! never removed, so ids queued by an ISR always resolve.

use heapless::Vec;
use log::info;

use crate::app::ports::ExpanderId;
use crate::error::{Resource, Result};
use crate::irq::IrqHandle;

/// Distinct expanders.
pub const MAX_EXPANDERS: usize = 8;

/// Inputs per expander.
pub const MAX_GROUP_MEMBERS: usize = 16;

#[derive(Debug)]
pub struct ExpanderGroup {
    pub expander: ExpanderId,
    /// Board pin carrying the shared IRQ, once bound.
    pub board_pin: Option<u8>,
    members: Vec<IrqHandle, MAX_GROUP_MEMBERS>,
}

impl ExpanderGroup {
    pub fn members(&self) -> &[IrqHandle] {
        &self.members
    }
}

#[derive(Debug, Default)]
pub struct ExpanderGroups {
    groups: Vec<ExpanderGroup, MAX_EXPANDERS>,
}

impl ExpanderGroups {
    pub fn new() -> Self {
        Self::default()
    }

    fn group_mut(&mut self, expander: ExpanderId) -> Result<&mut ExpanderGroup> {
        let idx = match self.groups.iter().position(|g| g.expander == expander) {
            Some(i) => i,
            None => {
                self.groups
                    .push(ExpanderGroup {
                        expander,
                        board_pin: None,
                        members: Vec::new(),
                    })
                    .map_err(|_| Resource::ExpanderGroups)?;
                info!("expander {:#04x}: group created", expander.0);
                self.groups.len() - 1
            }
        };
        Ok(&mut self.groups[idx])
    }

    /// Add `handle` to the group. Joining twice is a no-op.
    pub fn join(&mut self, expander: ExpanderId, handle: IrqHandle) -> Result<()> {
        let group = self.group_mut(expander)?;
        if group.members.contains(&handle) {
            return Ok(());
        }
        group.members.push(handle).map_err(|_| Resource::GroupMembers)?;
        Ok(())
    }

    /// Remove `handle` from whichever group holds it. Order of the remaining
    /// members is kept.
    pub fn leave(&mut self, handle: IrqHandle) {
        for group in self.groups.iter_mut() {
            if let Some(pos) = group.members.iter().position(|h| *h == handle) {
                group.members.remove(pos);
            }
        }
    }

    /// Record (or clear) the board pin for the group's shared IRQ. Returns
    /// the pin previously bound, if any.
    pub fn set_board_pin(&mut self, expander: ExpanderId, pin: Option<u8>) -> Result<Option<u8>> {
        let group = self.group_mut(expander)?;
        Ok(core::mem::replace(&mut group.board_pin, pin))
    }

    pub fn members(&self, expander: ExpanderId) -> &[IrqHandle] {
        self.get(expander).map(|g| g.members()).unwrap_or(&[])
    }

    pub fn get(&self, expander: ExpanderId) -> Option<&ExpanderGroup> {
        self.groups.iter().find(|g| g.expander == expander)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExpanderGroup> {
        self.groups.iter()
    }
}
