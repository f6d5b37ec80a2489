// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Register windows and the shared field updater.
//!
//! A CCU is one contiguous block of 32-bit registers. Sibling clocks
//! often share a register for unrelated bit ranges (for instance, a
//! word of bus gates). [`Regs`] is the one place that mutates the
//! window, and it serializes every read-modify-write so that no update
//! clobbers another.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use probe_rs::MemoryInterface;

use crate::error::{context, Error};

/// Access to a CCU's register block.
///
/// Offsets are relative to the start of the block.
pub trait RegisterWindow {
    /// Read the register at `offset`.
    fn read(&mut self, offset: u16) -> Result<u32, Error>;
    /// Write `value` to the register at `offset`.
    fn write(&mut self, offset: u16, value: u32) -> Result<(), Error>;
}

/// The shared handle to one register window.
///
/// Every clock node and the reset controller hold a clone of the same
/// handle. All updates through any clone are serialized.
#[derive(Debug)]
pub struct Regs<W> {
    window: Arc<Mutex<W>>,
}

impl<W> Clone for Regs<W> {
    fn clone(&self) -> Self {
        Self {
            window: Arc::clone(&self.window),
        }
    }
}

impl<W: RegisterWindow> Regs<W> {
    /// Take ownership of the window.
    pub fn new(window: W) -> Self {
        Self {
            window: Arc::new(Mutex::new(window)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        // The register state lives in hardware; a panicking holder
        // can't leave anything half-updated in here.
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a register.
    pub fn read(&self, offset: u16) -> Result<u32, Error> {
        self.lock().read(offset)
    }

    /// Clear `mask` in the register, then OR in `value`.
    ///
    /// The read and the write happen under one lock acquisition. Bits
    /// of `value` outside of `mask` are written too; callers build
    /// `value` from the same fields as `mask`.
    ///
    /// Returns the value written.
    pub fn apply(&self, offset: u16, mask: u32, value: u32) -> Result<u32, Error> {
        let mut window = self.lock();
        let reg = (window.read(offset)? & !mask) | value;
        window.write(offset, reg)?;
        Ok(reg)
    }

    /// Run `f` with exclusive access to the window.
    pub fn with<R>(&self, f: impl FnOnce(&mut W) -> R) -> R {
        f(&mut self.lock())
    }
}

/// A register window backed by memory.
///
/// Unset registers read as zero. Every write is recorded, so tests
/// and dry runs can inspect the exact write sequence.
#[derive(Debug, Default, Clone)]
pub struct MemoryWindow {
    registers: BTreeMap<u16, u32>,
    writes: Vec<(u16, u32)>,
}

impl MemoryWindow {
    /// An all-zero window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload register values, without recording writes.
    pub fn with_registers(registers: impl IntoIterator<Item = (u16, u32)>) -> Self {
        Self {
            registers: registers.into_iter().collect(),
            writes: Vec::new(),
        }
    }

    /// Set a register without recording a write.
    pub fn poke(&mut self, offset: u16, value: u32) {
        self.registers.insert(offset, value);
    }

    /// Read a register without going through the trait.
    pub fn peek(&self, offset: u16) -> u32 {
        self.registers.get(&offset).copied().unwrap_or(0)
    }

    /// Every write so far, oldest first.
    pub fn writes(&self) -> &[(u16, u32)] {
        &self.writes
    }

    /// Forget the recorded writes.
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// The non-zero registers.
    pub fn registers(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.registers
            .iter()
            .filter(|(_, value)| **value != 0)
            .map(|(offset, value)| (*offset, *value))
    }
}

impl RegisterWindow for MemoryWindow {
    fn read(&mut self, offset: u16) -> Result<u32, Error> {
        Ok(self.peek(offset))
    }

    fn write(&mut self, offset: u16, value: u32) -> Result<(), Error> {
        self.registers.insert(offset, value);
        self.writes.push((offset, value));
        Ok(())
    }
}

/// A register window reached through a debug probe.
///
/// `base` is the CCU's physical address. Each write is flushed to the
/// target before returning, so delays measured after a write start
/// once the write landed.
#[derive(Debug)]
pub struct ProbeWindow<M> {
    mem: M,
    base: u64,
}

impl<M: MemoryInterface> ProbeWindow<M> {
    /// Access the CCU at `base` through `mem`.
    pub fn new(mem: M, base: u64) -> Self {
        Self { mem, base }
    }

    /// Release the memory interface.
    pub fn release(self) -> M {
        self.mem
    }

    fn address(&self, offset: u16) -> u64 {
        self.base + u64::from(offset)
    }
}

impl<M: MemoryInterface> RegisterWindow for ProbeWindow<M> {
    fn read(&mut self, offset: u16) -> Result<u32, Error> {
        let address = self.address(offset);
        self.mem
            .read_word_32(address)
            .map_err(context("reading a CCU register"))
    }

    fn write(&mut self, offset: u16, value: u32) -> Result<(), Error> {
        let address = self.address(offset);
        self.mem
            .write_word_32(address, value)
            .map_err(context("writing a CCU register"))?;
        self.mem
            .flush()
            .map_err(context("flushing a CCU register write"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_clears_mask_then_sets_value() {
        let regs = Regs::new(MemoryWindow::with_registers([(0x60, 0xffff_0000)]));
        let written = regs.apply(0x60, 0x00ff_00ff, 0x0000_0042).unwrap();
        assert_eq!(written, 0xff00_0042);
        assert_eq!(regs.read(0x60).unwrap(), 0xff00_0042);
    }

    #[test]
    fn apply_records_one_write() {
        let regs = Regs::new(MemoryWindow::new());
        regs.apply(0x2c0, 1 << 8, 1 << 8).unwrap();
        regs.with(|window| assert_eq!(window.writes(), &[(0x2c0, 1 << 8)]));
    }

    #[test]
    fn concurrent_disjoint_updates_are_not_lost() {
        let regs = Regs::new(MemoryWindow::new());
        let threads: Vec<_> = (0..4u32)
            .map(|lane| {
                let regs = regs.clone();
                std::thread::spawn(move || {
                    let shift = lane * 8;
                    for round in 0..500u32 {
                        let value = (round & 0xff) << shift;
                        regs.apply(0x60, 0xff << shift, value).unwrap();
                    }
                    regs.apply(0x60, 0xff << shift, (lane + 1) << shift).unwrap();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(regs.read(0x60).unwrap(), 0x0403_0201);
    }
}
