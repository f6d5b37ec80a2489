// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Control the clock control unit (CCU) of your Allwinner SoC.
//!
//! A CCU is a block of registers holding PLL factors, peripheral
//! dividers, muxes, gates, and reset lines. This library describes
//! those registers with static tables, and drives them from rate,
//! gate, phase, and reset requests.
//!
//! The registers are reached through a [`RegisterWindow`]. Use a
//! [`ProbeWindow`] to control a live target through a debug probe, or
//! a [`MemoryWindow`] to simulate one. If you're looking for the
//! command line tool, that's provided in a separate package.
//!
//! ```
//! use ccu::{sun8i, Ccu, MemoryWindow, ProviderTable, Timing};
//!
//! let mut providers = ProviderTable::new();
//! let ccu = Ccu::bring_up(&sun8i::H3, MemoryWindow::new(), Timing::default(), &mut providers)?;
//!
//! let osc = ccu.clocks().lookup("osc24M")?;
//! assert_eq!(ccu.clocks().rate(osc)?, 24_000_000);
//! # Ok::<(), ccu::Error>(())
//! ```

pub mod descriptor;
pub mod pll;
pub mod periph;
pub mod phase;
pub mod rational;
pub mod sun8i;

mod config;
mod error;
mod node;
mod provider;
mod regs;
mod reset;
mod sequencer;
mod tree;

use std::collections::BTreeSet;

pub use config::Timing;
pub use descriptor::{ClockDescriptor, ClockId};
pub use error::Error;
pub use node::ClockNode;
pub use provider::{ProvidedClock, Provider, ProviderTable, Registry, Rejected};
pub use regs::{MemoryWindow, ProbeWindow, RegisterWindow, Regs};
pub use reset::{ResetController, ResetId, ResetMap};
pub use tree::{Clock, ClockTree};

use descriptor::ClockKind;

/// An Allwinner SoC's CCU.
///
/// These are exposed as `static`s in [`sun8i`].
#[derive(Debug)]
pub struct Chip {
    /// A human-readable name.
    pub name: &'static str,
    /// The firmware node that providers register under.
    pub compatible: &'static str,
    /// Physical address of the CCU register block.
    pub base: u64,
    /// Oscillators, supplied from outside of the CCU.
    pub roots: &'static [ClockDescriptor],
    pub clocks: &'static [ClockDescriptor],
    pub resets: ResetMap,
}

impl Chip {
    /// Every clock descriptor, roots first.
    pub fn descriptors(&self) -> impl Iterator<Item = &'static ClockDescriptor> {
        self.roots.iter().chain(self.clocks)
    }

    /// Every register offset that the clocks and resets use.
    pub fn registers(&self) -> BTreeSet<u16> {
        let mut registers = BTreeSet::new();
        for desc in self.clocks {
            match desc.kind {
                ClockKind::Fixed { .. } => {}
                ClockKind::FixedFactor { preset, .. } => {
                    registers.extend(preset.map(|preset| preset.reg));
                    if desc.gate.is_some() {
                        registers.insert(desc.reg);
                    }
                }
                ClockKind::Pll(pll) => {
                    registers.insert(desc.reg);
                    registers.extend(pll.lock.map(|lock| lock.reg));
                }
                ClockKind::Periph(_) | ClockKind::Phase { .. } => {
                    registers.insert(desc.reg);
                }
            }
            registers.extend(desc.reset.map(|reset| reset.reg));
            registers.extend(desc.bus_gate.map(|bus| bus.reg));
        }
        registers.extend(
            self.resets
                .0
                .iter()
                .filter(|line| line.reg != 0)
                .map(|line| line.reg),
        );
        registers
    }
}

/// A CCU that's ready for use.
#[derive(Debug)]
pub struct Ccu<W> {
    chip: &'static Chip,
    regs: Regs<W>,
    clocks: ClockTree<W>,
    resets: ResetController<W>,
}

impl<W: RegisterWindow> Ccu<W> {
    /// Bring up the CCU behind `window`.
    ///
    /// Builds the clock tree, turns on the critical clocks, and then
    /// publishes the clock and reset providers in `registry`. If any
    /// step fails, nothing is published.
    pub fn bring_up(
        chip: &'static Chip,
        window: W,
        timing: Timing,
        registry: &mut impl Registry,
    ) -> Result<Self, Error> {
        let regs = Regs::new(window);
        regs.read(0).map_err(|source| Error::Mapping {
            node: chip.compatible.into(),
            source: Box::new(source),
        })?;

        let descriptors: Vec<_> = chip.descriptors().copied().collect();
        let clocks = ClockTree::build(chip.compatible, &descriptors, &regs, timing)?;
        clocks.enable_critical()?;
        let resets = ResetController::new(regs.clone(), chip.resets);

        let provider = Provider {
            node: chip.compatible.into(),
            clocks: chip
                .descriptors()
                .map(|desc| ProvidedClock {
                    name: desc.name,
                    id: desc.id,
                })
                .collect(),
            resets: chip.resets.len(),
        };
        registry.register(provider).map_err(|rejected| {
            log::warn!("{}: {rejected}", chip.compatible);
            Error::Registration {
                node: chip.compatible.into(),
                reason: rejected.0,
            }
        })?;

        log::info!(
            "{}: {} clocks, {} reset lines",
            chip.name,
            descriptors.len(),
            chip.resets.len()
        );
        Ok(Self {
            chip,
            regs,
            clocks,
            resets,
        })
    }

    pub fn chip(&self) -> &'static Chip {
        self.chip
    }

    pub fn clocks(&self) -> &ClockTree<W> {
        &self.clocks
    }

    pub fn resets(&self) -> &ResetController<W> {
        &self.resets
    }

    /// Run `f` with exclusive access to the register window.
    pub fn with_window<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        self.regs.with(f)
    }
}
