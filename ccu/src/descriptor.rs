// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Declarative clock descriptions.
//!
//! A [`ClockDescriptor`] says where each control value of one clock
//! lives inside the CCU's registers. Descriptors are plain data and
//! are usually written as `static` tables; see [`crate::sun8i`].
//!
//! ```
//! use ccu::descriptor::{ClockDescriptor, Pll};
//!
//! // rate = 24MHz * n / m
//! static PLL_VIDEO: ClockDescriptor = ClockDescriptor::pll(
//!     "pll-video",
//!     &["osc24M"],
//!     0x010,
//!     Pll::new().lock(0x010, 28).n(8, 7).m(0, 4),
//! )
//! .gate(31);
//! # assert_eq!(PLL_VIDEO.reg, 0x010);
//! ```

/// A public clock identifier.
///
/// These are the numbers other drivers use to name a clock (for
/// instance, in a device tree). They're independent of the clock's
/// position in its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockId(pub u32);

impl std::fmt::Display for ClockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A bit range within a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub shift: u8,
    pub width: u8,
}

impl Field {
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// The field's bits, in place.
    pub const fn mask(self) -> u32 {
        (((1u64 << self.width) - 1) as u32) << self.shift
    }

    /// The largest raw value the field holds.
    pub const fn max_raw(self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    /// Extract the field from a register value.
    pub const fn get(self, reg: u32) -> u32 {
        (reg >> self.shift) & self.max_raw()
    }

    /// Position `raw` in the field. Bits that don't fit are dropped.
    pub const fn set(self, raw: u32) -> u32 {
        (raw << self.shift) & self.mask()
    }
}

/// Number of values an optional field encodes, or 1 when absent.
pub(crate) fn span(field: Option<Field>) -> u32 {
    field.map_or(1, |field| field.max_raw() + 1)
}

/// Mask of an optional field, or 0 when absent.
pub(crate) fn mask(field: Option<Field>) -> u32 {
    field.map_or(0, Field::mask)
}

/// A single bit in some register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegBit {
    pub reg: u16,
    pub bit: u8,
}

impl RegBit {
    pub const fn new(reg: u16, bit: u8) -> Self {
        Self { reg, bit }
    }

    pub const fn mask(self) -> u32 {
        1 << self.bit
    }
}

/// A rate reached through a fractional PLL mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FracRate {
    pub rate: u64,
    /// Register bits that identify the mode.
    pub mask: u32,
    pub value: u32,
}

/// Fractional rates and the bits that select integer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FracTable {
    /// Checked in order, before the arithmetic path.
    pub rates: &'static [FracRate],
    /// Written with every arithmetic (integer mode) rate.
    pub integer_mask: u32,
    pub integer_value: u32,
}

impl FracTable {
    /// The fractional entry producing exactly `rate`.
    pub fn for_rate(&self, rate: u64) -> Option<&FracRate> {
        self.rates.iter().find(|frac| frac.rate == rate)
    }

    /// The fractional entry the register currently selects.
    pub fn for_register(&self, reg: u32) -> Option<&FracRate> {
        self.rates
            .iter()
            .find(|frac| reg & frac.mask == frac.value)
    }
}

/// Per-instance data that only some clocks need.
///
/// Never mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extra {
    /// PLL fractional rates.
    Frac(FracTable),
    /// The PLL output passes through a constant divider.
    PostDiv(u32),
    /// A constant divider applied to a parent, by parent index.
    ///
    /// A zero entry (or a missing one) means no divider.
    FixedPrediv(&'static [u32]),
    /// A register field divides the parent at `index`.
    ///
    /// The divider is `field + 1`.
    VariablePrediv { index: usize, field: Field },
    /// At `rate`, switch the consumer to its alternate timing mode.
    ///
    /// The alternate mode halves the divider output.
    ModeSelect { rate: u64, bit: u8 },
    /// The M field indexes this table of dividers.
    ///
    /// A zero entry ends the table.
    MTable(&'static [u32]),
}

/// How the N field encodes N.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NEncoding {
    /// The field holds N - 1.
    MinusOne,
    /// The field holds N.
    Exact,
}

/// PLL factor fields.
///
/// `rate = parent / D1 * N / M * K >> P`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pll {
    pub n: Option<Field>,
    pub n_min: u32,
    pub n_encoding: NEncoding,
    /// Halving input divider.
    pub d1: Option<Field>,
    pub k: Option<Field>,
    pub m: Option<Field>,
    /// Power-of-two output divider. Also used for a 1-bit "D2".
    pub p: Option<Field>,
    pub lock: Option<RegBit>,
    /// Bit that commits a new configuration.
    pub update: Option<u8>,
    /// Change M and P monotonically, waiting for lock in between.
    pub flat_factors: bool,
}

impl Pll {
    pub const fn new() -> Self {
        Self {
            n: None,
            n_min: 0,
            n_encoding: NEncoding::MinusOne,
            d1: None,
            k: None,
            m: None,
            p: None,
            lock: None,
            update: None,
            flat_factors: false,
        }
    }

    pub const fn n(mut self, shift: u8, width: u8) -> Self {
        self.n = Some(Field::new(shift, width));
        self
    }

    pub const fn n_min(mut self, n_min: u32) -> Self {
        self.n_min = n_min;
        self
    }

    /// The N field holds N rather than N - 1.
    pub const fn n_exact(mut self) -> Self {
        self.n_encoding = NEncoding::Exact;
        self
    }

    pub const fn d1(mut self, shift: u8, width: u8) -> Self {
        self.d1 = Some(Field::new(shift, width));
        self
    }

    /// A second halving divider, treated as P.
    pub const fn d2(self, shift: u8, width: u8) -> Self {
        self.p(shift, width)
    }

    pub const fn k(mut self, shift: u8, width: u8) -> Self {
        self.k = Some(Field::new(shift, width));
        self
    }

    pub const fn m(mut self, shift: u8, width: u8) -> Self {
        self.m = Some(Field::new(shift, width));
        self
    }

    pub const fn p(mut self, shift: u8, width: u8) -> Self {
        self.p = Some(Field::new(shift, width));
        self
    }

    pub const fn lock(mut self, reg: u16, bit: u8) -> Self {
        self.lock = Some(RegBit::new(reg, bit));
        self
    }

    pub const fn update(mut self, bit: u8) -> Self {
        self.update = Some(bit);
        self
    }

    pub const fn flat_factors(mut self) -> Self {
        self.flat_factors = true;
        self
    }

    /// All factor fields.
    pub(crate) fn factor_mask(&self) -> u32 {
        mask(self.n) | mask(self.d1) | mask(self.k) | mask(self.m) | mask(self.p)
    }
}

impl Default for Pll {
    fn default() -> Self {
        Self::new()
    }
}

/// Peripheral divider fields.
///
/// `rate = parent / prediv / M >> P`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periph {
    pub m: Option<Field>,
    pub p: Option<Field>,
    /// Bit that commits a new configuration.
    pub update: Option<u8>,
    /// Drop the gate while the dividers change.
    pub gate_during_rate_change: bool,
}

impl Periph {
    pub const fn new() -> Self {
        Self {
            m: None,
            p: None,
            update: None,
            gate_during_rate_change: false,
        }
    }

    pub const fn m(mut self, shift: u8, width: u8) -> Self {
        self.m = Some(Field::new(shift, width));
        self
    }

    pub const fn p(mut self, shift: u8, width: u8) -> Self {
        self.p = Some(Field::new(shift, width));
        self
    }

    pub const fn update(mut self, bit: u8) -> Self {
        self.update = Some(bit);
        self
    }

    pub const fn gate_during_rate_change(mut self) -> Self {
        self.gate_during_rate_change = true;
        self
    }
}

impl Default for Periph {
    fn default() -> Self {
        Self::new()
    }
}

/// A field of some register forced to a value when a clock is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub reg: u16,
    pub field: Field,
    pub raw: u32,
}

/// What kind of clock this is, and its kind-specific fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockKind {
    /// A rate supplied from outside of the CCU.
    Fixed { rate: u64 },
    /// A PLL.
    Pll(Pll),
    /// A gate, mux, and/or divider.
    Periph(Periph),
    /// `parent / div * mul`
    FixedFactor {
        mul: u32,
        div: u32,
        preset: Option<Preset>,
    },
    /// A phase shift, relative to the parent.
    Phase { delay: Field },
}

/// Behavior flags that the clock tree, not the hardware, cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockFlags {
    /// Always on. Enabled at bring-up, never disabled.
    pub critical: bool,
    /// Rate requests propagate to the parent.
    pub set_rate_parent: bool,
}

/// One clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockDescriptor {
    pub name: &'static str,
    /// Public identifier, if other drivers may use the clock.
    pub id: Option<ClockId>,
    /// Parent names, indexed by mux value.
    pub parents: &'static [&'static str],
    /// The control register.
    pub reg: u16,
    /// Self gate bit, in the control register.
    pub gate: Option<u8>,
    pub mux: Option<Field>,
    pub reset: Option<RegBit>,
    pub bus_gate: Option<RegBit>,
    pub flags: ClockFlags,
    pub extra: Option<Extra>,
    pub kind: ClockKind,
}

impl ClockDescriptor {
    const fn with_kind(
        name: &'static str,
        parents: &'static [&'static str],
        reg: u16,
        kind: ClockKind,
    ) -> Self {
        Self {
            name,
            id: None,
            parents,
            reg,
            gate: None,
            mux: None,
            reset: None,
            bus_gate: None,
            flags: ClockFlags {
                critical: false,
                set_rate_parent: false,
            },
            extra: None,
            kind,
        }
    }

    /// An external, fixed-rate clock.
    pub const fn fixed(name: &'static str, rate: u64) -> Self {
        Self::with_kind(name, &[], 0, ClockKind::Fixed { rate })
    }

    pub const fn pll(
        name: &'static str,
        parents: &'static [&'static str],
        reg: u16,
        pll: Pll,
    ) -> Self {
        Self::with_kind(name, parents, reg, ClockKind::Pll(pll))
    }

    pub const fn periph(
        name: &'static str,
        parents: &'static [&'static str],
        reg: u16,
        periph: Periph,
    ) -> Self {
        Self::with_kind(name, parents, reg, ClockKind::Periph(periph))
    }

    /// A gate with no dividers; the bus gates.
    pub const fn gate_only(
        name: &'static str,
        parents: &'static [&'static str],
        reg: u16,
        bit: u8,
    ) -> Self {
        Self::with_kind(name, parents, reg, ClockKind::Periph(Periph::new())).gate(bit)
    }

    pub const fn fixed_factor(
        name: &'static str,
        parents: &'static [&'static str],
        mul: u32,
        div: u32,
    ) -> Self {
        Self::with_kind(
            name,
            parents,
            0,
            ClockKind::FixedFactor {
                mul,
                div,
                preset: None,
            },
        )
    }

    pub const fn phase(
        name: &'static str,
        parents: &'static [&'static str],
        reg: u16,
        delay: Field,
    ) -> Self {
        Self::with_kind(name, parents, reg, ClockKind::Phase { delay })
    }

    /// Move the control register; for fixed factors with a gate.
    pub const fn reg(mut self, reg: u16) -> Self {
        self.reg = reg;
        self
    }

    pub const fn id(mut self, id: u32) -> Self {
        self.id = Some(ClockId(id));
        self
    }

    pub const fn gate(mut self, bit: u8) -> Self {
        self.gate = Some(bit);
        self
    }

    pub const fn mux(mut self, shift: u8, width: u8) -> Self {
        self.mux = Some(Field::new(shift, width));
        self
    }

    pub const fn reset(mut self, reg: u16, bit: u8) -> Self {
        self.reset = Some(RegBit::new(reg, bit));
        self
    }

    pub const fn bus_gate(mut self, reg: u16, bit: u8) -> Self {
        self.bus_gate = Some(RegBit::new(reg, bit));
        self
    }

    pub const fn extra(mut self, extra: Extra) -> Self {
        self.extra = Some(extra);
        self
    }

    pub const fn critical(mut self) -> Self {
        self.flags.critical = true;
        self
    }

    pub const fn set_rate_parent(mut self) -> Self {
        self.flags.set_rate_parent = true;
        self
    }

    /// Force `field` of `reg` to `raw` when enabling this fixed factor.
    pub const fn preset(mut self, reg: u16, field: Field, raw: u32) -> Self {
        if let ClockKind::FixedFactor { mul, div, .. } = self.kind {
            self.kind = ClockKind::FixedFactor {
                mul,
                div,
                preset: Some(Preset { reg, field, raw }),
            };
        }
        self
    }

    /// The self gate's mask, or 0 when there's no gate.
    pub(crate) fn gate_mask(&self) -> u32 {
        self.gate.map_or(0, |bit| 1 << bit)
    }
}
