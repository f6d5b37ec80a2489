// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! PLL factor search and programming.
//!
//! A PLL's rate is `parent / D1 * N / M * K >> P`. Which of the factors
//! exist differs per PLL, and the search adapts to the set of present
//! fields:
//!
//! - no dividers (neither M nor P): walk K, derive N from the ratio.
//! - one divisor ratio (no K): rational approximation of the ratio,
//!   folding D1 into the power-of-two divider.
//! - everything else: walk P and K, approximate N / M.

use std::time::Instant;

use crate::{
    descriptor::{mask, span, Extra, Field, NEncoding, Pll},
    error::Error,
    node::ClockNode,
    rational::best_approximation,
    regs::RegisterWindow,
};

/// Decoded PLL factors.
///
/// These are divider and multiplier values, not raw field values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllFactors {
    pub n: u32,
    pub d1: u32,
    pub k: u32,
    pub m: u32,
    pub p: u32,
}

impl Default for PllFactors {
    fn default() -> Self {
        Self {
            n: 1,
            d1: 1,
            k: 1,
            m: 1,
            p: 0,
        }
    }
}

impl PllFactors {
    /// The output rate for `parent`.
    ///
    /// Evaluated in the same order as the hardware counts, so a
    /// decoded register reproduces the rate the search found.
    pub fn rate(&self, parent: u64) -> u64 {
        if self.d1 == 0 || self.m == 0 {
            return 0;
        }
        let rate = parent / u64::from(self.d1) * u64::from(self.n) / u64::from(self.m)
            * u64::from(self.k);
        rate.checked_shr(self.p).unwrap_or(0)
    }

    /// Decode the factors that `reg` holds.
    pub fn decode(pll: &Pll, reg: u32) -> Self {
        let plus_one = |field: Option<Field>| field.map_or(1, |field| field.get(reg) + 1);
        let n = match (pll.n, pll.n_encoding) {
            (None, _) => 1,
            (Some(field), NEncoding::MinusOne) => field.get(reg) + 1,
            (Some(field), NEncoding::Exact) => field.get(reg),
        };
        Self {
            n,
            d1: plus_one(pll.d1),
            k: plus_one(pll.k),
            m: plus_one(pll.m),
            p: pll.p.map_or(0, |field| field.get(reg)),
        }
    }

    /// Encode the factors for the fields of `pll`.
    pub fn encode(&self, pll: &Pll) -> u32 {
        let mut reg = 0;
        if let Some(field) = pll.n {
            reg |= field.set(match pll.n_encoding {
                NEncoding::MinusOne => self.n.saturating_sub(1),
                NEncoding::Exact => self.n,
            });
        }
        if let Some(field) = pll.d1 {
            reg |= field.set(self.d1.saturating_sub(1));
        }
        if let Some(field) = pll.k {
            reg |= field.set(self.k.saturating_sub(1));
        }
        if let Some(field) = pll.m {
            reg |= field.set(self.m.saturating_sub(1));
        }
        if let Some(field) = pll.p {
            reg |= field.set(self.p);
        }
        reg
    }
}

/// Factor ranges of one PLL.
#[derive(Debug, Clone, Copy)]
struct Limits {
    n_min: u64,
    n_max: u64,
    k_max: u64,
    m_max: u64,
    p_max: u32,
}

impl Limits {
    fn new(pll: &Pll) -> Self {
        let n_max = match (pll.n, pll.n_encoding) {
            (None, _) => 1,
            (Some(_), NEncoding::MinusOne) => u64::from(span(pll.n)),
            (Some(_), NEncoding::Exact) => u64::from(span(pll.n) - 1),
        };
        Self {
            n_min: u64::from(pll.n_min.max(1)),
            n_max,
            k_max: u64::from(span(pll.k)),
            m_max: u64::from(span(pll.m)),
            p_max: pll.p.map_or(0, |field| field.max_raw()),
        }
    }

    /// `n` clamped into the legal range.
    fn clamp_n(&self, n: u64) -> u64 {
        n.clamp(self.n_min, self.n_max)
    }

    /// Scale `n / m` so that N reaches the floor.
    ///
    /// `None` when the pair is unusable or scaling overflows a field.
    fn floor(&self, n: u64, m: u64) -> Option<(u64, u64)> {
        if n == 0 || m == 0 {
            return None;
        }
        if n >= self.n_min {
            return Some((n, m));
        }
        let scale = self.n_min.div_ceil(n);
        let (n, m) = (n * scale, m * scale);
        (n <= self.n_max && m <= self.m_max).then_some((n, m))
    }
}

/// Best candidate seen so far.
#[derive(Debug, Default)]
struct Search {
    best: Option<(u64, u64, PllFactors)>,
}

impl Search {
    /// Record a candidate. Only a strictly closer rate replaces the
    /// current best. Returns true on an exact match.
    fn offer(&mut self, target: u64, rate: u64, factors: PllFactors) -> bool {
        let delta = target.abs_diff(rate);
        match self.best {
            Some((best, _, _)) if best <= delta => {}
            _ => self.best = Some((delta, rate, factors)),
        }
        delta == 0
    }

    fn finish(self) -> (u64, PllFactors) {
        self.best
            .map_or((0, PllFactors::default()), |(_, rate, factors)| (rate, factors))
    }
}

/// Search the factors closest to `rate`.
///
/// Returns the achieved rate and its factors. The rate is 0 when no
/// legal combination exists.
pub fn find_best(pll: &Pll, rate: u64, parent: u64) -> (u64, PllFactors) {
    let limits = Limits::new(pll);
    if parent == 0 || rate == 0 || limits.n_min > limits.n_max {
        return (0, PllFactors::default());
    }
    if pll.m.is_none() && pll.p.is_none() {
        no_divider(&limits, rate, parent)
    } else if pll.k.is_none() {
        single_ratio(pll, &limits, rate, parent)
    } else {
        general(pll, &limits, rate, parent)
    }
}

fn no_divider(limits: &Limits, rate: u64, parent: u64) -> (u64, PllFactors) {
    let mut search = Search::default();
    for k in (1..=limits.k_max).rev() {
        let mul = rate / parent / k;
        for n in [mul, mul + 1] {
            let factors = PllFactors {
                n: limits.clamp_n(n) as u32,
                k: k as u32,
                ..PllFactors::default()
            };
            if search.offer(rate, factors.rate(parent), factors) {
                return search.finish();
            }
        }
    }
    search.finish()
}

fn single_ratio(pll: &Pll, limits: &Limits, rate: u64, parent: u64) -> (u64, PllFactors) {
    let mut search = Search::default();
    let folds_d1 = u32::from(pll.d1.is_some());
    for shift in 0..=limits.p_max + folds_d1 {
        let (d1, p) = if shift > limits.p_max {
            (2, shift - 1)
        } else {
            (1, shift)
        };
        let Some(target) = rate.checked_shl(shift) else {
            break;
        };
        let candidates = if pll.m.is_some() {
            let (n, m) = best_approximation(target, parent, limits.n_max, limits.m_max);
            [limits.floor(n, m), None]
        } else {
            let n = target / parent;
            [
                Some((limits.clamp_n(n), 1)),
                Some((limits.clamp_n(n + 1), 1)),
            ]
        };
        for (n, m) in candidates.into_iter().flatten() {
            let factors = PllFactors {
                n: n as u32,
                d1,
                m: m as u32,
                p,
                ..PllFactors::default()
            };
            if search.offer(rate, factors.rate(parent), factors) {
                return search.finish();
            }
        }
    }
    search.finish()
}

fn general(pll: &Pll, limits: &Limits, rate: u64, parent: u64) -> (u64, PllFactors) {
    let mut search = Search::default();
    for p in 0..=limits.p_max {
        let Some(target) = rate.checked_shl(p) else {
            break;
        };
        for k in (1..=limits.k_max).rev() {
            let denominator = parent * k;
            let candidates = if pll.m.is_some() {
                let (n, m) = best_approximation(target, denominator, limits.n_max, limits.m_max);
                [limits.floor(n, m), None]
            } else {
                let n = target / denominator;
                [
                    Some((limits.clamp_n(n), 1)),
                    Some((limits.clamp_n(n + 1), 1)),
                ]
            };
            for (n, m) in candidates.into_iter().flatten() {
                let factors = PllFactors {
                    n: n as u32,
                    k: k as u32,
                    m: m as u32,
                    p,
                    ..PllFactors::default()
                };
                if search.offer(rate, factors.rate(parent), factors) {
                    return (rate, renormalize(limits, factors, rate, parent));
                }
            }
        }
    }
    search.finish()
}

/// Reduce K / M of an exact match, keeping the rate.
fn renormalize(limits: &Limits, factors: PllFactors, rate: u64, parent: u64) -> PllFactors {
    let (k, m) = best_approximation(
        u64::from(factors.k),
        u64::from(factors.m),
        limits.k_max,
        limits.m_max,
    );
    if k == 0 || m == 0 {
        return factors;
    }
    let reduced = PllFactors {
        k: k as u32,
        m: m as u32,
        ..factors
    };
    if reduced.rate(parent) == rate {
        reduced
    } else {
        factors
    }
}

fn post_div(extra: Option<&Extra>) -> u64 {
    match extra {
        Some(Extra::PostDiv(div)) => u64::from((*div).max(1)),
        _ => 1,
    }
}

/// The rate `reg` programs, given the parent's rate.
pub fn recalc(pll: &Pll, extra: Option<&Extra>, reg: u32, parent: u64) -> u64 {
    if let Some(Extra::Frac(table)) = extra {
        if let Some(frac) = table.for_register(reg) {
            return frac.rate;
        }
    }
    PllFactors::decode(pll, reg).rate(parent) / post_div(extra)
}

/// The closest rate this PLL can produce. 0 when none.
pub fn determine_rate(pll: &Pll, extra: Option<&Extra>, rate: u64, parent: u64) -> u64 {
    if let Some(Extra::Frac(table)) = extra {
        if table.for_rate(rate).is_some() {
            return rate;
        }
    }
    let post = post_div(extra);
    let (best, _) = find_best(pll, rate.saturating_mul(post), parent);
    best / post
}

/// Program the PLL of `node` for `rate`, then wait until it's stable.
pub(crate) fn set_rate<W: RegisterWindow>(
    node: &ClockNode<W>,
    pll: &Pll,
    rate: u64,
    parent: u64,
) -> Result<(), Error> {
    let desc = node.descriptor();
    let extra = desc.extra.as_ref();

    let (mut field_mask, mut value) = (0, 0);
    if let Some(Extra::Frac(table)) = extra {
        if let Some(frac) = table.for_rate(rate) {
            log::debug!("{} fractional mode for {rate}Hz", desc.name);
            node.set_field(desc.reg, frac.mask, frac.value)?;
            return wait_stable(node, pll);
        }
        field_mask |= table.integer_mask;
        value |= table.integer_value;
    }

    let (best, factors) = find_best(pll, rate.saturating_mul(post_div(extra)), parent);
    if best == 0 {
        return Err(Error::UnachievableRate {
            clock: desc.name,
            rate,
        });
    }
    log::trace!("{} {rate}Hz from {parent}Hz: {factors:?}", desc.name);

    field_mask |= pll.factor_mask();
    value |= factors.encode(pll);
    if let Some(bit) = pll.update {
        field_mask |= 1 << bit;
        value |= 1 << bit;
    }

    if pll.flat_factors {
        write_flat(node, pll, field_mask, value)
    } else {
        node.set_field(desc.reg, field_mask, value)?;
        wait_stable(node, pll)
    }
}

/// Write the factors so that M and P only ever change in the direction
/// that keeps the output below both the old and the new rate.
fn write_flat<W: RegisterWindow>(
    node: &ClockNode<W>,
    pll: &Pll,
    field_mask: u32,
    value: u32,
) -> Result<(), Error> {
    let reg = node.descriptor().reg;
    let settle = node.timing().settle();
    let (m_mask, p_mask) = (mask(pll.m), mask(pll.p));

    let current = node.read()?;
    let (m_old, p_old) = (current & m_mask, current & p_mask);
    let (m_new, p_new) = (value & m_mask, value & p_mask);

    if p_old < p_new {
        node.set_field(reg, p_mask, p_new)?;
        std::thread::sleep(settle);
    }
    if m_old < m_new {
        node.set_field(reg, m_mask, m_new)?;
        std::thread::sleep(settle);
    }

    let others = field_mask & !(m_mask | p_mask);
    node.set_field(reg, others, value & others)?;

    if m_old > m_new {
        node.set_field(reg, m_mask, m_new)?;
        std::thread::sleep(settle);
    }
    wait_stable(node, pll)?;
    if p_old > p_new {
        node.set_field(reg, p_mask, p_new)?;
        std::thread::sleep(settle);
    }
    Ok(())
}

/// Poll the lock bit, or wait a fixed time when there's none.
fn wait_stable<W: RegisterWindow>(node: &ClockNode<W>, pll: &Pll) -> Result<(), Error> {
    let timing = node.timing();
    let Some(lock) = pll.lock else {
        std::thread::sleep(timing.unlocked_settle());
        return Ok(());
    };

    let start = Instant::now();
    loop {
        if node.regs().read(lock.reg)? & lock.mask() != 0 {
            log::trace!("{} locked after {:?}", node.name(), start.elapsed());
            return Ok(());
        }
        if start.elapsed() >= timing.lock_timeout() {
            log::warn!("{} did not lock within {:?}", node.name(), timing.lock_timeout());
            return Err(Error::LockTimeout {
                clock: node.name(),
                timeout: timing.lock_timeout(),
            });
        }
        std::thread::sleep(timing.lock_poll());
    }
}
