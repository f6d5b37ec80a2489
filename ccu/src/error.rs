// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use std::time::Duration;

/// An error from the clock engine.
///
/// Register access failures carry the backend's error as their
/// [`source`](std::error::Error::source). Everything else describes
/// why a clock operation could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No factor combination fits the descriptor's field widths.
    #[error("{clock}: no factor combination produces {rate} Hz")]
    UnachievableRate { clock: &'static str, rate: u64 },
    /// Every candidate parent yields a zero rate.
    #[error("{clock}: no usable parent for {rate} Hz")]
    NoUsableParent { clock: &'static str, rate: u64 },
    /// An ancestor's rate is zero or the ancestor doesn't exist.
    #[error("{clock}: the {ancestor} rate is unknown")]
    MissingAncestor {
        clock: &'static str,
        ancestor: &'static str,
    },
    /// The PLL did not report lock before the timeout.
    ///
    /// The factors were already written. Assume the clock is unstable.
    #[error("{clock}: PLL not stable after {timeout:?}")]
    LockTimeout {
        clock: &'static str,
        timeout: Duration,
    },
    /// The parent index doesn't name one of the clock's parents.
    #[error("{clock}: no parent at index {index}")]
    InvalidParent { clock: &'static str, index: usize },
    /// The requested phase doesn't fit the delay field.
    #[error("{clock}: cannot shift the phase by {degrees} degrees")]
    InvalidPhase { clock: &'static str, degrees: u32 },
    /// The clock kind doesn't implement the operation.
    #[error("{clock} does not support {operation}")]
    Unsupported {
        clock: &'static str,
        operation: &'static str,
    },
    /// No clock has this name or identifier.
    #[error("unknown clock '{0}'")]
    UnknownClock(String),
    /// The reset line is outside of the reset map.
    #[error("unknown reset line {0}")]
    UnknownReset(usize),
    /// The register window can't be used.
    #[error("{node}: clock mapping failed")]
    Mapping {
        node: String,
        #[source]
        source: Box<Error>,
    },
    /// The host rejected the clock and reset providers.
    #[error("{node}: provider registration failed: {reason}")]
    Registration { node: String, reason: String },
    /// A register read or write failed.
    #[error("{what}")]
    Register {
        what: &'static str,
        #[source]
        source: Box<dyn std::error::Error>,
    },
}

/// Wrap a backend error with a short description of what we were doing.
pub(crate) fn context<E: std::error::Error + 'static>(
    what: &'static str,
) -> impl FnOnce(E) -> Error {
    move |source| Error::Register {
        what,
        source: Box::new(source),
    }
}
