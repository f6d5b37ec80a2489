// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Phase delay arithmetic.
//!
//! A phase clock delays its parent by a count of the grandparent's
//! cycles. With the parent dividing the grandparent by `ratio`, one
//! delay step is `360 / ratio` degrees, rounded.

use crate::{descriptor::Field, error::Error};

/// Rates of the two ancestors the delay is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ancestors {
    pub parent: u64,
    pub grandparent: u64,
}

/// Degrees per delay step.
fn step(clock: &'static str, ancestors: Ancestors) -> Result<u32, Error> {
    if ancestors.parent == 0 {
        return Err(Error::MissingAncestor {
            clock,
            ancestor: "parent",
        });
    }
    if ancestors.grandparent == 0 {
        return Err(Error::MissingAncestor {
            clock,
            ancestor: "grandparent",
        });
    }
    let ratio = ancestors.grandparent / ancestors.parent;
    let step = match ratio {
        0 => 0,
        ratio => (360 + ratio / 2) / ratio,
    };
    match u32::try_from(step) {
        Ok(step) if step != 0 => Ok(step),
        _ => Err(Error::Unsupported {
            clock,
            operation: "phase at this parent ratio",
        }),
    }
}

/// The phase, in degrees, that a raw `delay` gives.
///
/// A zero delay reads as 180 degrees. `ancestors` is only called for
/// other delays.
pub fn degrees(
    clock: &'static str,
    delay: u32,
    ancestors: impl FnOnce() -> Result<Ancestors, Error>,
) -> Result<u32, Error> {
    if delay == 0 {
        return Ok(180);
    }
    Ok(delay * step(clock, ancestors()?)?)
}

/// The raw delay closest to `degrees`.
///
/// 180 degrees is a zero delay, whatever the ancestors run at.
pub fn delay(
    clock: &'static str,
    field: Field,
    degrees: u32,
    ancestors: impl FnOnce() -> Result<Ancestors, Error>,
) -> Result<u32, Error> {
    if degrees >= 360 {
        return Err(Error::InvalidPhase { clock, degrees });
    }
    if degrees == 180 {
        return Ok(0);
    }
    let step = step(clock, ancestors()?)?;
    let delay = (degrees + step / 2) / step;
    if delay > field.max_raw() {
        return Err(Error::InvalidPhase { clock, degrees });
    }
    Ok(delay)
}
