// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! sun8i CCUs.
//!
//! Each chip is a `static` [`Chip`](crate::Chip). Clock IDs and reset
//! IDs follow the chip's device tree bindings.

pub mod a83t;
pub mod h3;

pub use a83t::A83T;
pub use h3::H3;

use crate::descriptor::ClockDescriptor;

const OSC24M: &str = "osc24M";
const OSC32K: &str = "osc32k";

/// Marks a mux input that has no clock behind it.
const NO_PARENT: &str = "";

/// The board oscillators feeding every sun8i CCU.
static ROOTS: [ClockDescriptor; 2] = [
    ClockDescriptor::fixed(OSC24M, 24_000_000),
    ClockDescriptor::fixed(OSC32K, 32_768),
];
