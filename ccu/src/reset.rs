// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Reset lines.
//!
//! Reset bits are active low: a set bit releases the module.

use crate::{
    descriptor::RegBit,
    error::Error,
    regs::{RegisterWindow, Regs},
};

/// A public reset line identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResetId(pub usize);

impl std::fmt::Display for ResetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Reset lines, indexed by [`ResetId`].
///
/// A line at register 0 is a hole in the numbering; operating it does
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetMap(pub &'static [RegBit]);

impl ResetMap {
    pub const EMPTY: Self = Self(&[]);

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The line's register bit. `Ok(None)` for a hole.
    pub fn line(&self, id: ResetId) -> Result<Option<RegBit>, Error> {
        match self.0.get(id.0) {
            None => Err(Error::UnknownReset(id.0)),
            Some(line) if line.reg == 0 => Ok(None),
            Some(line) => Ok(Some(*line)),
        }
    }
}

/// Asserts and deasserts the reset lines of one CCU.
#[derive(Debug)]
pub struct ResetController<W> {
    regs: Regs<W>,
    map: ResetMap,
}

impl<W: RegisterWindow> ResetController<W> {
    pub(crate) fn new(regs: Regs<W>, map: ResetMap) -> Self {
        Self { regs, map }
    }

    pub fn map(&self) -> &ResetMap {
        &self.map
    }

    /// Hold the module in reset.
    pub fn assert(&self, id: ResetId) -> Result<(), Error> {
        self.update(id, false)
    }

    /// Release the module from reset.
    pub fn deassert(&self, id: ResetId) -> Result<(), Error> {
        self.update(id, true)
    }

    fn update(&self, id: ResetId, release: bool) -> Result<(), Error> {
        let Some(line) = self.map.line(id)? else {
            log::trace!("reset {id} is unmapped");
            return Ok(());
        };
        let value = if release { line.mask() } else { 0 };
        let written = self.regs.apply(line.reg, line.mask(), value)?;
        log::debug!(
            "reset {id} {} {:03x} {written:08x}",
            if release { "deassert" } else { "assert" },
            line.reg
        );
        Ok(())
    }
}
