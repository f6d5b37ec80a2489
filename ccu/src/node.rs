// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use crate::{
    config::Timing,
    descriptor::ClockDescriptor,
    error::Error,
    regs::{RegisterWindow, Regs},
};

/// A clock bound to its register window.
///
/// Created once at bring-up. The descriptor's register offsets are
/// fixed; the window they're relative to is the shared [`Regs`].
#[derive(Debug)]
pub struct ClockNode<W> {
    desc: ClockDescriptor,
    regs: Regs<W>,
    timing: Timing,
    /// Node index of each parent, by mux value. `None` for parents
    /// the tree doesn't know.
    parents: Vec<Option<usize>>,
}

impl<W: RegisterWindow> ClockNode<W> {
    pub(crate) fn new(
        desc: ClockDescriptor,
        regs: Regs<W>,
        timing: Timing,
        parents: Vec<Option<usize>>,
    ) -> Self {
        Self {
            desc,
            regs,
            timing,
            parents,
        }
    }

    pub fn name(&self) -> &'static str {
        self.desc.name
    }

    pub fn descriptor(&self) -> &ClockDescriptor {
        &self.desc
    }

    pub(crate) fn timing(&self) -> &Timing {
        &self.timing
    }

    pub(crate) fn regs(&self) -> &Regs<W> {
        &self.regs
    }

    pub(crate) fn parent_slots(&self) -> &[Option<usize>] {
        &self.parents
    }

    /// Read the control register.
    pub(crate) fn read(&self) -> Result<u32, Error> {
        self.regs.read(self.desc.reg)
    }

    /// Atomically update `mask` of `reg` to `value`.
    pub(crate) fn set_field(&self, reg: u16, mask: u32, value: u32) -> Result<(), Error> {
        let written = self.regs.apply(reg, mask, value)?;
        log::debug!("{} set {reg:03x} {written:08x}", self.desc.name);
        Ok(())
    }

    /// The mux value, or 0 without a mux.
    pub(crate) fn parent_index(&self) -> Result<usize, Error> {
        match self.desc.mux {
            Some(mux) => Ok(mux.get(self.read()?) as usize),
            None => Ok(0),
        }
    }

    /// Select the parent at `index`.
    pub(crate) fn set_parent_index(&self, index: usize) -> Result<(), Error> {
        if index >= self.desc.parents.len() {
            return Err(Error::InvalidParent {
                clock: self.desc.name,
                index,
            });
        }
        match self.desc.mux {
            Some(mux) => self.set_field(self.desc.reg, mux.mask(), mux.set(index as u32)),
            None => Ok(()),
        }
    }
}
