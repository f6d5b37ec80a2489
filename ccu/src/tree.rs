// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The clock tree.
//!
//! Rates are never cached. Every query walks up the tree and decodes
//! the registers, so the answer reflects the hardware even when
//! something else changed it.
//!
//! A rate change is two steps: negotiate (no writes), then commit.
//! Nothing locks the tree between the two. A concurrent change of a
//! shared parent may leave a child's dividers computed against the
//! parent's previous rate.

use std::collections::BTreeMap;

use crate::{
    config::Timing,
    descriptor::{ClockDescriptor, ClockId, ClockKind, Field},
    error::Error,
    node::ClockNode,
    periph,
    phase::{self, Ancestors},
    pll,
    regs::{RegisterWindow, Regs},
    sequencer,
};

/// A handle to one clock of a [`ClockTree`].
///
/// Only meaningful for the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clock(usize);

/// Normalize a clock name for lookup.
///
/// Case doesn't matter, and `_` matches `-`.
pub(crate) fn normalize(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

/// A negotiated rate.
#[derive(Debug, Clone, Copy)]
struct Negotiated {
    rate: u64,
    /// Parent mux value, parent, and the rate the parent should run at.
    parent: Option<(usize, Clock, u64)>,
}

/// Every clock of one CCU.
#[derive(Debug)]
pub struct ClockTree<W> {
    nodes: Vec<ClockNode<W>>,
    by_name: BTreeMap<String, usize>,
    by_id: BTreeMap<ClockId, usize>,
}

impl<W: RegisterWindow> ClockTree<W> {
    /// Bind every descriptor to `regs`, and resolve parents by name.
    ///
    /// Names and identifiers must be unique. Parents that aren't in
    /// `descriptors` are left unresolved; such a parent never has a
    /// rate.
    pub(crate) fn build(
        node: &str,
        descriptors: &[ClockDescriptor],
        regs: &Regs<W>,
        timing: Timing,
    ) -> Result<Self, Error> {
        let duplicate = |what: &str, name: &str| Error::Registration {
            node: node.into(),
            reason: format!("duplicate {what} '{name}'"),
        };

        let mut by_name = BTreeMap::new();
        let mut by_id = BTreeMap::new();
        for (index, desc) in descriptors.iter().enumerate() {
            if by_name.insert(normalize(desc.name), index).is_some() {
                return Err(duplicate("clock name", desc.name));
            }
            if let Some(id) = desc.id {
                if by_id.insert(id, index).is_some() {
                    return Err(duplicate("clock id", &id.to_string()));
                }
            }
        }

        let nodes = descriptors
            .iter()
            .map(|desc| {
                let parents = desc
                    .parents
                    .iter()
                    .map(|parent| {
                        let index = by_name.get(&normalize(parent)).copied();
                        if index.is_none() {
                            log::trace!("{}: parent {parent} is not provided", desc.name);
                        }
                        index
                    })
                    .collect();
                ClockNode::new(*desc, regs.clone(), timing, parents)
            })
            .collect();

        Ok(Self {
            nodes,
            by_name,
            by_id,
        })
    }

    /// Find a clock by name.
    pub fn lookup(&self, name: &str) -> Result<Clock, Error> {
        self.by_name
            .get(&normalize(name))
            .map(|index| Clock(*index))
            .ok_or_else(|| Error::UnknownClock(name.into()))
    }

    /// Find a clock by its public identifier.
    pub fn get(&self, id: ClockId) -> Result<Clock, Error> {
        self.by_id
            .get(&id)
            .map(|index| Clock(*index))
            .ok_or_else(|| Error::UnknownClock(id.to_string()))
    }

    /// Every clock, in table order.
    pub fn clocks(&self) -> impl Iterator<Item = Clock> + '_ {
        (0..self.nodes.len()).map(Clock)
    }

    pub fn node(&self, clock: Clock) -> Result<&ClockNode<W>, Error> {
        self.nodes
            .get(clock.0)
            .ok_or_else(|| Error::UnknownClock(format!("#{}", clock.0)))
    }

    pub fn descriptor(&self, clock: Clock) -> Result<&ClockDescriptor, Error> {
        self.node(clock).map(ClockNode::descriptor)
    }

    /// The currently selected parent.
    ///
    /// `None` for roots, and for parents the tree doesn't provide.
    pub fn parent(&self, clock: Clock) -> Result<Option<Clock>, Error> {
        let node = self.node(clock)?;
        if node.parent_slots().is_empty() {
            return Ok(None);
        }
        let index = node.parent_index()?;
        Ok(node.parent_slots().get(index).copied().flatten().map(Clock))
    }

    /// Select the parent at mux value `index`.
    pub fn set_parent(&self, clock: Clock, index: usize) -> Result<(), Error> {
        let node = self.node(clock)?;
        log::debug!("{} parent {index}", node.name());
        node.set_parent_index(index)
    }

    /// The clock's current rate, in Hz.
    pub fn rate(&self, clock: Clock) -> Result<u64, Error> {
        let node = self.node(clock)?;
        let parent = match self.parent(clock)? {
            Some(parent) => self.rate(parent)?,
            None => 0,
        };
        let desc = node.descriptor();
        match desc.kind {
            ClockKind::Fixed { rate } => Ok(rate),
            ClockKind::Pll(pll) => Ok(pll::recalc(
                &pll,
                desc.extra.as_ref(),
                node.read()?,
                parent,
            )),
            ClockKind::Periph(periph) => Ok(periph::recalc(desc, &periph, node.read()?, parent)),
            ClockKind::FixedFactor { mul, div, .. } => {
                Ok(parent / u64::from(div.max(1)) * u64::from(mul))
            }
            ClockKind::Phase { .. } => Ok(parent),
        }
    }

    /// The rate that [`set_rate`](Self::set_rate) would produce.
    ///
    /// Nothing is written.
    pub fn round_rate(&self, clock: Clock, rate: u64) -> Result<u64, Error> {
        self.negotiate(clock, rate).map(|negotiated| negotiated.rate)
    }

    fn negotiate(&self, clock: Clock, rate: u64) -> Result<Negotiated, Error> {
        let node = self.node(clock)?;
        let desc = node.descriptor();
        match desc.kind {
            ClockKind::Fixed { rate } => Ok(Negotiated { rate, parent: None }),
            ClockKind::Pll(pll) => {
                let parent = self.parent_rate(clock)?;
                Ok(Negotiated {
                    rate: pll::determine_rate(&pll, desc.extra.as_ref(), rate, parent),
                    parent: None,
                })
            }
            ClockKind::Periph(periph) => {
                let parents = node
                    .parent_slots()
                    .iter()
                    .map(|slot| slot.map(|index| self.rate(Clock(index))).transpose())
                    .collect::<Result<Vec<_>, _>>()?;
                let choice = periph::choose(desc, &periph, node.read()?, rate, &parents)?;
                let parent = node
                    .parent_slots()
                    .get(choice.index)
                    .copied()
                    .flatten()
                    .map(|index| (choice.index, Clock(index), choice.parent_rate));
                Ok(Negotiated {
                    rate: choice.rate,
                    parent,
                })
            }
            ClockKind::FixedFactor { mul, div, .. } => {
                let parent = self.parent(clock)?.ok_or(Error::MissingAncestor {
                    clock: desc.name,
                    ancestor: "parent",
                })?;
                let (mul, div) = (u64::from(mul.max(1)), u64::from(div.max(1)));
                let parent_rate = if desc.flags.set_rate_parent {
                    self.round_rate(parent, rate / mul * div)?
                } else {
                    self.rate(parent)?
                };
                Ok(Negotiated {
                    rate: parent_rate / div * mul,
                    parent: Some((0, parent, parent_rate)),
                })
            }
            ClockKind::Phase { .. } => Ok(Negotiated {
                rate: self.parent_rate(clock)?,
                parent: None,
            }),
        }
    }

    fn parent_rate(&self, clock: Clock) -> Result<u64, Error> {
        match self.parent(clock)? {
            Some(parent) => self.rate(parent),
            None => Ok(0),
        }
    }

    /// Change the clock's rate to the closest achievable one.
    ///
    /// Returns the new rate, read back from the registers.
    pub fn set_rate(&self, clock: Clock, rate: u64) -> Result<u64, Error> {
        let node = self.node(clock)?;
        let desc = node.descriptor();
        let negotiated = self.negotiate(clock, rate)?;
        if negotiated.rate == 0 {
            return Err(Error::UnachievableRate {
                clock: desc.name,
                rate,
            });
        }
        log::debug!("{} rate {rate}Hz, settling on {}Hz", desc.name, negotiated.rate);

        match desc.kind {
            ClockKind::Fixed { .. } | ClockKind::Phase { .. } => {}
            ClockKind::Pll(pll) => {
                let parent = self.parent_rate(clock)?;
                pll::set_rate(node, &pll, negotiated.rate, parent)?;
            }
            ClockKind::Periph(periph) => {
                if let Some((index, parent, _)) = negotiated.parent {
                    if desc.mux.is_some() && node.parent_index()? != index {
                        node.set_parent_index(index)?;
                    }
                    let parent = self.rate(parent)?;
                    periph::set_rate(node, &periph, negotiated.rate, parent)?;
                }
            }
            ClockKind::FixedFactor { .. } => {
                if let (true, Some((_, parent, parent_rate))) =
                    (desc.flags.set_rate_parent, negotiated.parent)
                {
                    if self.rate(parent)? != parent_rate {
                        self.set_rate(parent, parent_rate)?;
                    }
                }
            }
        }

        self.rate(clock)
    }

    /// Release the clock's reset, then open its gates.
    pub fn enable(&self, clock: Clock) -> Result<(), Error> {
        sequencer::enable(self.node(clock)?)
    }

    /// Close the clock's gates, then assert its reset.
    ///
    /// Critical clocks are left on.
    pub fn disable(&self, clock: Clock) -> Result<(), Error> {
        sequencer::disable(self.node(clock)?)
    }

    /// The delay between a phase clock and its parent, in degrees.
    pub fn phase(&self, clock: Clock) -> Result<u32, Error> {
        let (node, delay) = self.phase_node(clock)?;
        let raw = delay.get(node.read()?);
        phase::degrees(node.name(), raw, || self.ancestors(clock))
    }

    /// Shift a phase clock to the step closest to `degrees`.
    pub fn set_phase(&self, clock: Clock, degrees: u32) -> Result<(), Error> {
        let (node, delay) = self.phase_node(clock)?;
        let raw = phase::delay(node.name(), delay, degrees, || self.ancestors(clock))?;
        log::debug!("{} phase {degrees} degrees, delay {raw}", node.name());
        node.set_field(node.descriptor().reg, delay.mask(), delay.set(raw))
    }

    fn phase_node(&self, clock: Clock) -> Result<(&ClockNode<W>, Field), Error> {
        let node = self.node(clock)?;
        match node.descriptor().kind {
            ClockKind::Phase { delay } => Ok((node, delay)),
            _ => Err(Error::Unsupported {
                clock: node.name(),
                operation: "phase",
            }),
        }
    }

    fn ancestors(&self, clock: Clock) -> Result<Ancestors, Error> {
        let name = self.node(clock)?.name();
        let missing = |ancestor| Error::MissingAncestor {
            clock: name,
            ancestor,
        };
        let parent = self.parent(clock)?.ok_or_else(|| missing("parent"))?;
        let grandparent = self
            .parent(parent)?
            .ok_or_else(|| missing("grandparent"))?;
        Ok(Ancestors {
            parent: self.rate(parent)?,
            grandparent: self.rate(grandparent)?,
        })
    }

    /// Enable every critical clock.
    pub(crate) fn enable_critical(&self) -> Result<(), Error> {
        for node in self.nodes.iter().filter(|node| node.descriptor().flags.critical) {
            sequencer::enable(node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{Periph, Pll},
        regs::MemoryWindow,
    };

    const MHZ: u64 = 1_000_000;

    static CLOCKS: &[ClockDescriptor] = &[
        ClockDescriptor::fixed("osc24M", 24 * MHZ),
        ClockDescriptor::pll(
            "pll-periph0",
            &["osc24M"],
            0x028,
            Pll::new().lock(0x028, 28).n(8, 5).k(4, 2),
        )
        .gate(31)
        .id(11),
        ClockDescriptor::fixed_factor("pll-periph0-2x", &["pll-periph0"], 2, 1),
        ClockDescriptor::periph(
            "mmc0",
            &["osc24M", "pll-periph0", "pll-periph1"],
            0x088,
            Periph::new().m(0, 4).p(16, 2),
        )
        .mux(24, 2)
        .gate(31)
        .id(71),
        ClockDescriptor::phase("mmc0_sample", &["mmc0"], 0x088, Field::new(20, 3)).id(72),
    ];

    fn tree(registers: &[(u16, u32)]) -> (ClockTree<MemoryWindow>, Regs<MemoryWindow>) {
        let regs = Regs::new(MemoryWindow::with_registers(registers.iter().copied()));
        let tree = ClockTree::build("ccu", CLOCKS, &regs, Timing::default()).unwrap();
        (tree, regs)
    }

    #[test]
    fn lookup_by_name_and_id() {
        let (tree, _) = tree(&[]);
        assert_eq!(tree.lookup("MMC0").unwrap(), tree.get(ClockId(71)).unwrap());
        assert_eq!(
            tree.lookup("mmc0-sample").unwrap(),
            tree.get(ClockId(72)).unwrap()
        );
        assert!(matches!(tree.lookup("mmc9"), Err(Error::UnknownClock(_))));
        assert!(matches!(tree.get(ClockId(3)), Err(Error::UnknownClock(_))));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        static TWICE: &[ClockDescriptor] = &[
            ClockDescriptor::fixed("osc24M", 24 * MHZ),
            ClockDescriptor::fixed("OSC24M", 24 * MHZ),
        ];
        let regs = Regs::new(MemoryWindow::new());
        assert!(matches!(
            ClockTree::build("ccu", TWICE, &regs, Timing::default()),
            Err(Error::Registration { .. })
        ));
    }

    #[test]
    fn rates_follow_the_registers() {
        // N = 25, K = 2: 1200MHz
        let (tree, _) = tree(&[(0x028, (24 << 8) | (1 << 4)), (0x088, (1 << 24) | 5)]);
        let pll = tree.lookup("pll-periph0").unwrap();
        assert_eq!(tree.rate(pll).unwrap(), 1200 * MHZ);
        assert_eq!(tree.rate(tree.lookup("pll-periph0-2x").unwrap()).unwrap(), 2400 * MHZ);

        let mmc = tree.lookup("mmc0").unwrap();
        assert_eq!(tree.parent(mmc).unwrap(), Some(pll));
        assert_eq!(tree.rate(mmc).unwrap(), 200 * MHZ);
    }

    #[test]
    fn unresolved_parents_have_no_rate() {
        let (tree, _) = tree(&[(0x088, 2 << 24)]);
        let mmc = tree.lookup("mmc0").unwrap();
        assert_eq!(tree.parent(mmc).unwrap(), None);
        assert_eq!(tree.rate(mmc).unwrap(), 0);
    }

    #[test]
    fn set_rate_switches_to_the_exact_parent() {
        let (tree, regs) = tree(&[(0x028, (24 << 8) | (1 << 4) | (1 << 28))]);
        let mmc = tree.lookup("mmc0").unwrap();
        assert_eq!(tree.round_rate(mmc, 50 * MHZ).unwrap(), 50 * MHZ);
        regs.with(|window| assert!(window.writes().is_empty()));

        assert_eq!(tree.set_rate(mmc, 50 * MHZ).unwrap(), 50 * MHZ);
        assert_eq!(tree.parent(mmc).unwrap(), Some(tree.lookup("pll-periph0").unwrap()));
    }

    #[test]
    fn set_rate_programs_a_pll() {
        // Lock bit already set; the poll passes immediately.
        let (tree, regs) = tree(&[(0x028, 1 << 28)]);
        let pll = tree.lookup("pll-periph0").unwrap();
        assert_eq!(tree.set_rate(pll, 600 * MHZ).unwrap(), 600 * MHZ);
        let reg = regs.read(0x028).unwrap();
        let factors = pll::PllFactors::decode(&Pll::new().n(8, 5).k(4, 2), reg);
        assert_eq!(factors.rate(24 * MHZ), 600 * MHZ);
    }

    #[test]
    fn lock_timeout_is_reported() {
        let regs = Regs::new(MemoryWindow::new());
        let timing = Timing::default().with_lock_timeout(std::time::Duration::from_millis(1));
        let tree = ClockTree::build("ccu", CLOCKS, &regs, timing).unwrap();
        let pll = tree.lookup("pll-periph0").unwrap();
        assert!(matches!(
            tree.set_rate(pll, 600 * MHZ),
            Err(Error::LockTimeout { .. })
        ));
    }

    #[test]
    fn phase_from_ancestors() {
        // mmc0 = 1200MHz / 4, delay 2.
        let (tree, _) = tree(&[
            (0x028, (24 << 8) | (1 << 4)),
            (0x088, (1 << 24) | 3 | (2 << 20)),
        ]);
        let sample = tree.lookup("mmc0_sample").unwrap();
        assert_eq!(tree.phase(sample).unwrap(), 180);

        tree.set_phase(sample, 270).unwrap();
        assert_eq!(tree.phase(sample).unwrap(), 270);
    }

    #[test]
    fn half_cycle_phase_without_ancestors() {
        // mmc0 muxed to pll-periph1, which this tree doesn't have.
        let (tree, regs) = tree(&[(0x088, 2 << 24)]);
        let sample = tree.lookup("mmc0_sample").unwrap();
        assert_eq!(tree.phase(sample).unwrap(), 180);

        regs.apply(0x088, 0b111 << 20, 2 << 20).unwrap();
        tree.set_phase(sample, 180).unwrap();
        assert_eq!(regs.read(0x088).unwrap() >> 20 & 0b111, 0);
        assert_eq!(tree.phase(sample).unwrap(), 180);

        assert!(matches!(
            tree.set_phase(sample, 90),
            Err(Error::MissingAncestor {
                ancestor: "grandparent",
                ..
            })
        ));
    }

    #[test]
    fn phase_needs_a_phase_clock() {
        let (tree, _) = tree(&[]);
        assert!(matches!(
            tree.phase(tree.lookup("mmc0").unwrap()),
            Err(Error::Unsupported { .. })
        ));
    }
}
