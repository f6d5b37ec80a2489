// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! Bring-up and clock operations on simulated sun8i CCUs.

use std::time::Duration;

use ccu::{
    sun8i, Ccu, ClockId, Error, MemoryWindow, Provider, ProviderTable, RegisterWindow, Registry,
    Rejected, ResetId, Timing,
};

const MHZ: u64 = 1_000_000;
const LOCKED: u32 = 1 << 28;

/// pll-periph0 at 600MHz (n = 25, k = 2), ahb1 from it divided by 3.
fn h3_registers() -> MemoryWindow {
    MemoryWindow::with_registers([
        (0x008, LOCKED),
        (0x018, LOCKED),
        (0x028, 1 << 31 | LOCKED | 24 << 8 | 1 << 4),
        (0x044, LOCKED),
        (0x054, 3 << 12 | 2 << 6),
    ])
}

fn h3() -> Ccu<MemoryWindow> {
    let mut providers = ProviderTable::new();
    Ccu::bring_up(&sun8i::H3, h3_registers(), Timing::default(), &mut providers).unwrap()
}

#[test]
fn bring_up_publishes_providers() {
    let mut providers = ProviderTable::new();
    Ccu::bring_up(&sun8i::H3, MemoryWindow::new(), Timing::default(), &mut providers).unwrap();

    let node = "allwinner,sun8i-h3-ccu";
    assert_eq!(
        providers.clock(node, "bus-emac").and_then(|clock| clock.id),
        Some(ClockId(70))
    );
    assert_eq!(
        providers.clock(node, "BUS-EPHY").and_then(|clock| clock.id),
        Some(ClockId(89))
    );
    assert_eq!(providers.reset(node, 47), Some(ResetId(47)));
    assert_eq!(providers.reset(node, 48), None);

    // Both chips live side by side.
    Ccu::bring_up(&sun8i::A83T, MemoryWindow::new(), Timing::default(), &mut providers).unwrap();
    assert!(providers.provider("allwinner,sun8i-a83t-ccu").is_some());
}

#[test]
fn bring_up_enables_critical_clocks() {
    let ccu = h3();
    let mbus = ccu.with_window(|window| window.peek(0x15c));
    assert_eq!(mbus & 1 << 31, 1 << 31);

    // Critical clocks ignore disable requests.
    let clocks = ccu.clocks();
    clocks.disable(clocks.lookup("mbus").unwrap()).unwrap();
    let mbus = ccu.with_window(|window| window.peek(0x15c));
    assert_eq!(mbus & 1 << 31, 1 << 31);
}

#[test]
fn second_registration_is_rejected() {
    let mut providers = ProviderTable::new();
    Ccu::bring_up(&sun8i::H3, MemoryWindow::new(), Timing::default(), &mut providers).unwrap();
    let again = Ccu::bring_up(&sun8i::H3, MemoryWindow::new(), Timing::default(), &mut providers);
    assert!(matches!(again, Err(Error::Registration { .. })));
}

struct Refuse;

impl Registry for Refuse {
    fn register(&mut self, _: Provider) -> Result<(), Rejected> {
        Err(Rejected("no clock framework".into()))
    }
}

#[test]
fn rejected_registration_is_an_error() {
    let result = Ccu::bring_up(&sun8i::H3, MemoryWindow::new(), Timing::default(), &mut Refuse);
    match result {
        Err(Error::Registration { reason, .. }) => assert_eq!(reason, "no clock framework"),
        other => panic!("{other:?}"),
    }
}

#[derive(Debug)]
struct Unmapped;

impl RegisterWindow for Unmapped {
    fn read(&mut self, _: u16) -> Result<u32, Error> {
        Err(Error::Register {
            what: "reading a CCU register",
            source: Box::new(std::io::Error::other("bus fault")),
        })
    }

    fn write(&mut self, _: u16, _: u32) -> Result<(), Error> {
        Err(Error::Register {
            what: "writing a CCU register",
            source: Box::new(std::io::Error::other("bus fault")),
        })
    }
}

#[test]
fn unmapped_window_fails_before_registration() {
    let mut providers = ProviderTable::new();
    let result = Ccu::bring_up(&sun8i::H3, Unmapped, Timing::default(), &mut providers);
    assert!(matches!(result, Err(Error::Mapping { .. })));
    assert!(providers.provider("allwinner,sun8i-h3-ccu").is_none());
}

#[test]
fn rates_follow_the_registers() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let rate = |name| clocks.rate(clocks.lookup(name).unwrap()).unwrap();

    assert_eq!(rate("osc24M"), 24 * MHZ);
    assert_eq!(rate("pll-periph0"), 600 * MHZ);
    assert_eq!(rate("pll-periph0-2x"), 1200 * MHZ);
    assert_eq!(rate("ahb1"), 200 * MHZ);
    assert_eq!(rate("apb1"), 100 * MHZ);
    assert_eq!(rate("bus-mmc0"), 200 * MHZ);
    // Integer mode isn't selected, so the PLL reads as fractional.
    assert_eq!(rate("pll-ve"), 270 * MHZ);
}

#[test]
fn lookup_by_id_and_name() {
    let ccu = h3();
    let clocks = ccu.clocks();
    assert_eq!(
        clocks.get(ClockId(23)).unwrap(),
        clocks.lookup("MMC0").unwrap()
    );
    assert_eq!(
        clocks.lookup("mmc0-sample").unwrap(),
        clocks.lookup("mmc0_sample").unwrap()
    );
    assert!(matches!(
        clocks.lookup("mmc3"),
        Err(Error::UnknownClock(_))
    ));
}

#[test]
fn mmc_rate_picks_a_parent_then_a_phase() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let mmc0 = clocks.lookup("mmc0").unwrap();

    assert_eq!(clocks.round_rate(mmc0, 50 * MHZ).unwrap(), 50 * MHZ);
    assert_eq!(clocks.set_rate(mmc0, 50 * MHZ).unwrap(), 50 * MHZ);
    assert_eq!(
        clocks.parent(mmc0).unwrap(),
        Some(clocks.lookup("pll-periph0").unwrap())
    );

    // 600MHz / 50MHz: 30 degree steps.
    let sample = clocks.lookup("mmc0_sample").unwrap();
    clocks.set_phase(sample, 90).unwrap();
    assert_eq!(clocks.phase(sample).unwrap(), 90);
    let raw = ccu.with_window(|window| window.peek(0x088));
    assert_eq!(raw >> 20 & 0b111, 3);
}

#[test]
fn mmc_dividers_change_behind_a_closed_gate() {
    let ccu = h3();
    let clocks = ccu.clocks();
    ccu.with_window(|window| {
        window.poke(0x088, 1 << 31);
        window.clear_writes();
    });
    clocks.set_rate(clocks.lookup("mmc0").unwrap(), 50 * MHZ).unwrap();

    let writes = ccu.with_window(|window| window.writes().to_vec());
    assert!(writes.iter().all(|(offset, _)| *offset == 0x088), "{writes:x?}");
    let values: Vec<_> = writes.iter().map(|(_, value)| *value).collect();
    assert_eq!(values.len(), 4, "{values:x?}");
    // Parent first, then gate off, dividers, and the gate back on.
    assert_eq!(values[0], 1 << 31 | 1 << 24);
    assert_eq!(values[1], 1 << 24);
    assert_eq!(values[2] & 1 << 31, 0);
    assert_ne!(values[2] & (0b11 << 16 | 0xf), 0);
    assert_eq!(values[3], values[2] | 1 << 31);
}

#[test]
fn mmc_mode_select_at_100mhz() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let mmc1 = clocks.lookup("mmc1").unwrap();

    assert_eq!(clocks.set_rate(mmc1, 100 * MHZ).unwrap(), 100 * MHZ);
    let reg = ccu.with_window(|window| window.peek(0x08c));
    assert_eq!(reg & 1 << 30, 1 << 30);

    assert_eq!(clocks.set_rate(mmc1, 50 * MHZ).unwrap(), 50 * MHZ);
    let reg = ccu.with_window(|window| window.peek(0x08c));
    assert_eq!(reg & 1 << 30, 0);
}

#[test]
fn enabling_mmc_releases_reset_first() {
    let ccu = h3();
    let clocks = ccu.clocks();
    ccu.with_window(MemoryWindow::clear_writes);
    clocks.enable(clocks.lookup("mmc1").unwrap()).unwrap();
    let writes = ccu.with_window(|window| window.writes().to_vec());
    let offsets: Vec<_> = writes.iter().map(|(offset, _)| *offset).collect();
    assert_eq!(offsets, [0x2c0, 0x060, 0x08c]);
}

#[test]
fn pll_rate_changes_wait_for_lock() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let periph1 = clocks.lookup("pll-periph1").unwrap();
    assert_eq!(clocks.set_rate(periph1, 600 * MHZ).unwrap(), 600 * MHZ);

    let ve = clocks.lookup("pll-ve").unwrap();
    assert_eq!(clocks.set_rate(ve, 297 * MHZ).unwrap(), 297 * MHZ);
}

#[test]
fn cpux_lowers_p_only_after_lock() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let cpux = clocks.lookup("pll-cpux").unwrap();
    ccu.with_window(|window| {
        window.poke(0x000, LOCKED | 3 << 16);
        window.clear_writes();
    });

    // N = 21, K = 2. P stays at /8 until the PLL locks.
    assert_eq!(clocks.set_rate(cpux, 1008 * MHZ).unwrap(), 1008 * MHZ);
    let writes = ccu.with_window(|window| window.writes().to_vec());
    assert_eq!(writes, [(0x000, 0x1003_1410), (0x000, 0x1000_1410)]);
}

#[test]
fn cpux_raises_m_before_the_other_factors() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let cpux = clocks.lookup("pll-cpux").unwrap();
    ccu.with_window(|window| {
        window.poke(0x000, LOCKED | 3 << 16);
        window.clear_writes();
    });

    // 24MHz / 3: M goes from 1 to 3, P from /8 to /1.
    assert_eq!(clocks.set_rate(cpux, 8 * MHZ).unwrap(), 8 * MHZ);
    let writes = ccu.with_window(|window| window.writes().to_vec());
    assert_eq!(
        writes,
        [
            (0x000, LOCKED | 3 << 16 | 2),
            (0x000, LOCKED | 3 << 16 | 2),
            (0x000, LOCKED | 2),
        ]
    );
}

#[test]
fn audio_requests_reach_the_base_pll() {
    let ccu = h3();
    let clocks = ccu.clocks();
    let audio = clocks.lookup("pll-audio").unwrap();
    let base = clocks.lookup("pll-audio-base").unwrap();

    let rounded = clocks.round_rate(audio, 24_576_000).unwrap();
    assert_eq!(clocks.set_rate(audio, 24_576_000).unwrap(), rounded);
    assert_eq!(clocks.rate(base).unwrap() / 4, rounded);

    clocks.enable(audio).unwrap();
    let base_reg = ccu.with_window(|window| window.peek(0x008));
    assert_eq!(base_reg >> 16 & 0xf, 3);
}

#[test]
fn reset_lines_follow_the_bindings() {
    let ccu = h3();
    let uart0 = ResetId(7);
    ccu.resets().deassert(uart0).unwrap();
    assert_eq!(ccu.with_window(|window| window.peek(0x2d4)), 1 << 16);
    ccu.resets().assert(uart0).unwrap();
    assert_eq!(ccu.with_window(|window| window.peek(0x2d4)), 0);
    assert!(matches!(
        ccu.resets().deassert(ResetId(48)),
        Err(Error::UnknownReset(48))
    ));
}

fn a83t(window: MemoryWindow, timing: Timing) -> Ccu<MemoryWindow> {
    let mut providers = ProviderTable::new();
    Ccu::bring_up(&sun8i::A83T, window, timing, &mut providers).unwrap()
}

#[test]
fn a83t_plls_lock_through_the_status_register() {
    let ccu = a83t(
        MemoryWindow::with_registers([(0x20c, 0x7ff)]),
        Timing::default(),
    );
    let clocks = ccu.clocks();
    let periph = clocks.lookup("pll-periph").unwrap();
    assert_eq!(clocks.set_rate(periph, 1200 * MHZ).unwrap(), 1200 * MHZ);
    assert_eq!(
        clocks.rate(clocks.lookup("ahb2").unwrap()).unwrap(),
        600 * MHZ
    );
}

#[test]
fn a83t_lock_timeout() {
    let timing = Timing::default().with_lock_timeout(Duration::from_millis(1));
    let ccu = a83t(MemoryWindow::new(), timing);
    let clocks = ccu.clocks();
    let gpu = clocks.lookup("pll-gpu").unwrap();
    assert!(matches!(
        clocks.set_rate(gpu, 480 * MHZ),
        Err(Error::LockTimeout {
            clock: "pll-gpu",
            ..
        })
    ));
}

#[test]
fn a83t_osc12m_is_gated() {
    let ccu = a83t(MemoryWindow::new(), Timing::default());
    let clocks = ccu.clocks();
    let osc12m = clocks.lookup("osc12M").unwrap();
    assert_eq!(clocks.rate(osc12m).unwrap(), 12 * MHZ);

    clocks.enable(osc12m).unwrap();
    assert_eq!(ccu.with_window(|window| window.peek(0x0cc)), 1 << 11);
    clocks.disable(osc12m).unwrap();
    assert_eq!(ccu.with_window(|window| window.peek(0x0cc)), 0);
}

#[test]
fn a83t_unprovided_mux_inputs() {
    let ccu = a83t(
        MemoryWindow::with_registers([(0x134, 1 << 24)]),
        Timing::default(),
    );
    let clocks = ccu.clocks();
    let sclk = clocks.lookup("csi-sclk").unwrap();
    assert_eq!(clocks.parent(sclk).unwrap(), None);
    assert_eq!(clocks.rate(sclk).unwrap(), 0);
}
