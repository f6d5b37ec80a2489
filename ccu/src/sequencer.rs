// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Clock enable and disable ordering.
//!
//! A module comes out of reset before its bus clock runs, and its bus
//! clock runs before its own clock. Disabling is the mirror image.

use crate::{
    descriptor::ClockKind,
    error::Error,
    node::ClockNode,
    regs::RegisterWindow,
};

pub(crate) fn enable<W: RegisterWindow>(node: &ClockNode<W>) -> Result<(), Error> {
    let desc = node.descriptor();
    log::debug!("{} enable", desc.name);

    if let ClockKind::FixedFactor {
        preset: Some(preset),
        ..
    } = desc.kind
    {
        node.set_field(preset.reg, preset.field.mask(), preset.field.set(preset.raw))?;
    }
    if let Some(reset) = desc.reset {
        node.set_field(reset.reg, reset.mask(), reset.mask())?;
    }
    if let Some(bus) = desc.bus_gate {
        node.set_field(bus.reg, bus.mask(), bus.mask())?;
    }
    if let Some(bit) = desc.gate {
        node.set_field(desc.reg, 1 << bit, 1 << bit)?;
    }
    Ok(())
}

/// Critical clocks stay on.
pub(crate) fn disable<W: RegisterWindow>(node: &ClockNode<W>) -> Result<(), Error> {
    let desc = node.descriptor();
    if desc.flags.critical {
        log::debug!("{} is critical; not disabling", desc.name);
        return Ok(());
    }
    log::debug!("{} disable", desc.name);

    if let Some(bit) = desc.gate {
        node.set_field(desc.reg, 1 << bit, 0)?;
    }
    if let Some(bus) = desc.bus_gate {
        node.set_field(bus.reg, bus.mask(), 0)?;
    }
    if let Some(reset) = desc.reset {
        node.set_field(reset.reg, reset.mask(), 0)?;
    }
    Ok(())
}
