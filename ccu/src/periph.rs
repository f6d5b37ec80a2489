// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Peripheral dividers, muxes, and pre-dividers.
//!
//! `rate = parent / prediv / M >> P`

use crate::{
    descriptor::{mask, ClockDescriptor, Extra, Periph},
    error::Error,
    node::ClockNode,
    regs::RegisterWindow,
};

/// Divider values for one rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeriphFactors {
    /// The raw M field value.
    pub m_raw: u32,
    /// Raw (and actual) P exponent.
    pub p: u32,
}

impl PeriphFactors {
    fn encode(&self, periph: &Periph) -> u32 {
        let m = periph.m.map_or(0, |field| field.set(self.m_raw));
        let p = periph.p.map_or(0, |field| field.set(self.p));
        m | p
    }
}

fn m_table(extra: Option<&Extra>) -> Option<&'static [u32]> {
    match extra {
        Some(Extra::MTable(table)) => Some(*table),
        _ => None,
    }
}

/// The divider that the M field value `raw` selects.
fn m_divider(extra: Option<&Extra>, raw: u32) -> u64 {
    match m_table(extra) {
        Some(table) => table
            .get(raw as usize)
            .map_or(1, |div| u64::from((*div).max(1))),
        None => u64::from(raw) + 1,
    }
}

/// P only: the smallest shift that brings the parent at or below `rate`.
fn best_p(periph: &Periph, rate: u64, parent: u64) -> (u64, PeriphFactors) {
    let p_max = periph.p.map_or(0, |field| field.max_raw());
    let p = (0..=p_max)
        .find(|p| parent >> p <= rate)
        .unwrap_or(p_max);
    (parent >> p, PeriphFactors { m_raw: 0, p })
}

/// M (maybe with P): the closest rate over every P.
fn best_mp(periph: &Periph, extra: Option<&Extra>, rate: u64, parent: u64) -> (u64, PeriphFactors) {
    let p_max = periph.p.map_or(0, |field| field.max_raw());
    let mut best: Option<(u64, u64, PeriphFactors)> = None;
    let mut offer = |found: u64, factors: PeriphFactors| {
        let delta = rate.abs_diff(found);
        match best {
            Some((best_delta, _, _)) if best_delta <= delta => {}
            _ => best = Some((delta, found, factors)),
        }
    };

    if let Some(table) = m_table(extra) {
        for p in (0..=p_max).rev() {
            for (raw, div) in table.iter().take_while(|div| **div != 0).enumerate() {
                let found = parent / u64::from(*div) >> p;
                offer(found, PeriphFactors { m_raw: raw as u32, p });
            }
        }
    } else {
        let m_max = periph.m.map_or(1, |field| u64::from(field.max_raw()) + 1);
        for p in (0..=p_max).rev() {
            let div = match rate << p {
                0 => m_max,
                shifted => (parent / shifted).clamp(1, m_max),
            };
            for m in [div, div + 1] {
                if m > m_max {
                    break;
                }
                let found = parent / m >> p;
                offer(found, PeriphFactors { m_raw: (m - 1) as u32, p });
            }
        }
    }

    best.map_or((0, PeriphFactors::default()), |(_, found, factors)| (found, factors))
}

/// Search the dividers closest to `rate` from `parent`.
///
/// `None` when the clock has no dividers.
pub fn find_best(
    periph: &Periph,
    extra: Option<&Extra>,
    rate: u64,
    parent: u64,
) -> Option<(u64, PeriphFactors)> {
    match (periph.m, periph.p) {
        (None, None) => None,
        (None, Some(_)) => Some(best_p(periph, rate, parent)),
        (Some(_), _) => Some(best_mp(periph, extra, rate, parent)),
    }
}

/// The pre-divider applied to the parent at `index`.
///
/// `reg` is the control register's value.
pub fn prediv(desc: &ClockDescriptor, reg: u32, index: usize) -> u64 {
    match desc.extra {
        Some(Extra::FixedPrediv(table)) => table
            .get(index)
            .map_or(1, |div| u64::from((*div).max(1))),
        Some(Extra::VariablePrediv {
            index: prediv_index,
            field,
        }) if prediv_index == index => u64::from(field.get(reg)) + 1,
        _ => 1,
    }
}

/// The rate to search for, and whether it uses the alternate mode.
fn mode_request(extra: Option<&Extra>, rate: u64) -> (u64, bool) {
    match extra {
        Some(Extra::ModeSelect { rate: mode_rate, .. }) if *mode_rate == rate => {
            (rate.saturating_mul(2), true)
        }
        _ => (rate, false),
    }
}

/// The rate `reg` programs, given the selected parent's rate.
pub fn recalc(desc: &ClockDescriptor, periph: &Periph, reg: u32, parent: u64) -> u64 {
    let index = desc.mux.map_or(0, |mux| mux.get(reg) as usize);
    let extra = desc.extra.as_ref();
    let parent = parent / prediv(desc, reg, index);

    let m = periph
        .m
        .map_or(1, |field| m_divider(extra, field.get(reg)));
    let p = periph.p.map_or(0, |field| field.get(reg));
    let rate = (parent / m).checked_shr(p).unwrap_or(0);

    match extra {
        Some(Extra::ModeSelect { bit, .. }) if reg & (1 << bit) != 0 => rate / 2,
        _ => rate,
    }
}

/// Where a rate request lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Choice {
    /// The parent's mux value.
    pub index: usize,
    /// The parent's own rate, before any pre-divider.
    pub parent_rate: u64,
    pub rate: u64,
}

/// Pick the parent and dividers that best approximate `rate`.
///
/// `parents[i]` is the rate of the parent at mux value `i`, or `None`
/// when that parent isn't available. Unavailable and stopped parents
/// are skipped. An exact match ends the search.
pub fn choose(
    desc: &ClockDescriptor,
    periph: &Periph,
    reg: u32,
    rate: u64,
    parents: &[Option<u64>],
) -> Result<Choice, Error> {
    let extra = desc.extra.as_ref();
    let (request, alternate) = mode_request(extra, rate);
    let mut best: Option<(u64, Choice)> = None;

    for (index, parent_rate) in parents.iter().enumerate() {
        let Some(parent_rate) = *parent_rate else {
            continue;
        };
        if parent_rate == 0 {
            continue;
        }
        let adjusted = parent_rate / prediv(desc, reg, index);
        let found = match find_best(periph, extra, request, adjusted) {
            Some((found, _)) => found,
            None => adjusted,
        };
        let found = if alternate { found / 2 } else { found };
        if found == 0 {
            continue;
        }

        let choice = Choice {
            index,
            parent_rate,
            rate: found,
        };
        let delta = rate.abs_diff(found);
        if delta == 0 {
            return Ok(choice);
        }
        match best {
            Some((best_delta, _)) if best_delta <= delta => {}
            _ => best = Some((delta, choice)),
        }
    }

    best.map(|(_, choice)| choice)
        .ok_or(Error::NoUsableParent {
            clock: desc.name,
            rate,
        })
}

/// Program the dividers of `node` for `rate`.
///
/// `parent` is the selected parent's rate, before any pre-divider.
pub(crate) fn set_rate<W: RegisterWindow>(
    node: &ClockNode<W>,
    periph: &Periph,
    rate: u64,
    parent: u64,
) -> Result<(), Error> {
    let desc = node.descriptor();
    let extra = desc.extra.as_ref();
    let current = node.read()?;
    let index = desc.mux.map_or(0, |mux| mux.get(current) as usize);
    let parent = parent / prediv(desc, current, index);

    let (request, alternate) = mode_request(extra, rate);
    let (mut field_mask, mut value) = (0, 0);
    if let Some(Extra::ModeSelect { bit, .. }) = extra {
        field_mask |= 1 << bit;
        if alternate {
            value |= 1 << bit;
        }
    }

    let Some((found, factors)) = find_best(periph, extra, request, parent) else {
        // Nothing to divide. Only the mode bit may change.
        return match field_mask {
            0 => Ok(()),
            _ => node.set_field(desc.reg, field_mask, value),
        };
    };
    if found == 0 {
        return Err(Error::UnachievableRate {
            clock: desc.name,
            rate,
        });
    }
    log::trace!("{} {rate}Hz from {parent}Hz: {factors:?}", desc.name);

    field_mask |= mask(periph.m) | mask(periph.p);
    value |= factors.encode(periph);
    if let Some(bit) = periph.update {
        field_mask |= 1 << bit;
        value |= 1 << bit;
    }

    let gate = desc.gate_mask();
    if periph.gate_during_rate_change && gate != 0 {
        let gated = current & gate;
        node.set_field(desc.reg, gate, 0)?;
        node.set_field(desc.reg, field_mask, value)?;
        node.set_field(desc.reg, gate, gated)
    } else {
        node.set_field(desc.reg, field_mask, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Field;

    const MHZ: u64 = 1_000_000;

    static MMC: ClockDescriptor = ClockDescriptor::periph(
        "mmc0",
        &["osc24M", "pll-periph0-2x", "pll-periph1-2x"],
        0x088,
        Periph::new().m(0, 4).p(16, 2),
    )
    .mux(24, 2)
    .gate(31);

    #[test]
    fn mp_exact() {
        let periph = Periph::new().m(0, 4).p(16, 2);
        let (rate, factors) = find_best(&periph, None, 100 * MHZ, 600 * MHZ).unwrap();
        assert_eq!(rate, 100 * MHZ);
        let m = u64::from(factors.m_raw) + 1;
        assert_eq!(600 * MHZ / m >> factors.p, 100 * MHZ);
    }

    #[test]
    fn mp_never_overshoots_m() {
        let periph = Periph::new().m(0, 4);
        let (rate, factors) = find_best(&periph, None, 1 * MHZ, 600 * MHZ).unwrap();
        assert_eq!(factors.m_raw, 15);
        assert_eq!(rate, 600 * MHZ / 16);
    }

    #[test]
    fn p_only_picks_first_shift_at_or_below() {
        let periph = Periph::new().p(4, 2);
        let (rate, factors) = find_best(&periph, None, 100 * MHZ, 600 * MHZ).unwrap();
        assert_eq!(factors.p, 3);
        assert_eq!(rate, 75 * MHZ);

        // Saturates at P max.
        let (rate, factors) = find_best(&periph, None, 1, 600 * MHZ).unwrap();
        assert_eq!(factors.p, 3);
        assert_eq!(rate, 75 * MHZ);
    }

    #[test]
    fn m_table_indexes_dividers() {
        static DIVS: &[u32] = &[1, 2, 4, 8, 0, 99];
        let periph = Periph::new().m(0, 3);
        let extra = Extra::MTable(DIVS);
        let (rate, factors) = find_best(&periph, Some(&extra), 150 * MHZ, 600 * MHZ).unwrap();
        assert_eq!(rate, 150 * MHZ);
        assert_eq!(factors.m_raw, 2);

        // Entries after the terminator are never used.
        let (rate, factors) = find_best(&periph, Some(&extra), 6 * MHZ, 600 * MHZ).unwrap();
        assert_eq!(factors.m_raw, 3);
        assert_eq!(rate, 75 * MHZ);
    }

    #[test]
    fn no_dividers() {
        assert_eq!(find_best(&Periph::new(), None, 1, 2), None);
    }

    #[test]
    fn choose_picks_exact_parent() {
        let parents = [Some(24 * MHZ), Some(1200 * MHZ), Some(1100 * MHZ)];
        let choice = choose(&MMC, &Periph::new().m(0, 4).p(16, 2), 0, 50 * MHZ, &parents).unwrap();
        assert_eq!(choice.index, 1);
        assert_eq!(choice.rate, 50 * MHZ);
    }

    #[test]
    fn choose_skips_stopped_and_missing_parents() {
        let periph = Periph::new().m(0, 4).p(16, 2);
        let parents = [None, Some(0), Some(1100 * MHZ)];
        let choice = choose(&MMC, &periph, 0, 50 * MHZ, &parents).unwrap();
        assert_eq!(choice.index, 2);

        let err = choose(&MMC, &periph, 0, 50 * MHZ, &[None, Some(0)]).unwrap_err();
        assert!(matches!(err, Error::NoUsableParent { .. }));
    }

    #[test]
    fn mux_only_picks_closest_parent() {
        static MUX: ClockDescriptor =
            ClockDescriptor::periph("ahb1", &["osc32k", "osc24M"], 0x054, Periph::new())
                .mux(12, 2);
        let parents = [Some(32_768), Some(24 * MHZ)];
        let choice = choose(&MUX, &Periph::new(), 0, 20 * MHZ, &parents).unwrap();
        assert_eq!(choice.index, 1);
        assert_eq!(choice.rate, 24 * MHZ);
    }

    #[test]
    fn predividers() {
        static AHB1: ClockDescriptor = ClockDescriptor::periph(
            "ahb1",
            &["osc32k", "osc24M", "axi", "pll-periph0"],
            0x054,
            Periph::new().p(4, 2),
        )
        .mux(12, 2)
        .extra(Extra::VariablePrediv {
            index: 3,
            field: Field::new(6, 2),
        });
        // prediv field = 2: pll-periph0 / 3
        let reg = (3 << 12) | (2 << 6);
        assert_eq!(prediv(&AHB1, reg, 3), 3);
        assert_eq!(prediv(&AHB1, reg, 1), 1);

        static FIXED: ClockDescriptor = ClockDescriptor::periph(
            "ahb2",
            &["ahb1", "pll-periph0"],
            0x05c,
            Periph::new(),
        )
        .mux(0, 2)
        .extra(Extra::FixedPrediv(&[0, 2]));
        assert_eq!(prediv(&FIXED, 0, 0), 1);
        assert_eq!(prediv(&FIXED, 0, 1), 2);
        assert_eq!(recalc(&FIXED, &Periph::new(), 1, 600 * MHZ), 300 * MHZ);
    }

    #[test]
    fn recalc_reads_dividers() {
        let periph = Periph::new().m(0, 4).p(16, 2);
        let reg = (1 << 24) | (1 << 16) | 2;
        assert_eq!(recalc(&MMC, &periph, reg, 1200 * MHZ), 200 * MHZ);
    }

    #[test]
    fn mode_select_doubles_the_search() {
        static MODE: ClockDescriptor = ClockDescriptor::periph(
            "mmc2",
            &["osc24M", "pll-periph"],
            0x090,
            Periph::new().m(0, 4).p(16, 2),
        )
        .mux(24, 2)
        .extra(Extra::ModeSelect {
            rate: 50 * MHZ,
            bit: 30,
        });
        let periph = Periph::new().m(0, 4).p(16, 2);
        let choice = choose(&MODE, &periph, 0, 50 * MHZ, &[None, Some(600 * MHZ)]).unwrap();
        assert_eq!(choice.rate, 50 * MHZ);

        // M = 6, alternate mode on.
        let reg = (1 << 30) | (1 << 24) | 5;
        assert_eq!(recalc(&MODE, &periph, reg, 600 * MHZ), 50 * MHZ);
    }
}
