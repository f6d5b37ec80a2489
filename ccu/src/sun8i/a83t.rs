// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The A83T CCU.
//!
//! All PLLs report lock in one status register. Most PLLs hold N
//! directly, with N at least 12.

use super::{NO_PARENT, OSC24M, OSC32K, ROOTS};
use crate::{
    descriptor::{ClockDescriptor as Clk, Extra, Field, Periph, Pll, RegBit},
    reset::ResetMap,
    Chip,
};

pub static A83T: Chip = Chip {
    name: "A83T",
    compatible: "allwinner,sun8i-a83t-ccu",
    base: 0x01c2_0000,
    roots: &ROOTS,
    clocks: CLOCKS,
    resets: ResetMap(RESETS),
};

const PLL_LOCK: u16 = 0x20c;

/// The common N field, locking at `bit` of the status register.
const fn pll(lock: u8) -> Pll {
    Pll::new()
        .lock(PLL_LOCK, lock)
        .n(8, 8)
        .n_min(12)
        .n_exact()
}

/// rate = 24MHz * n / d1 / d2
const fn halving_pll(name: &'static str, reg: u16, lock: u8) -> Clk {
    Clk::pll(name, &[OSC24M], reg, pll(lock).d1(16, 1).d2(18, 1)).gate(31)
}

/// rate = 24MHz * n / d1 >> p
const fn video_pll(name: &'static str, reg: u16, lock: u8) -> Clk {
    Clk::pll(name, &[OSC24M], reg, pll(lock).d1(16, 1).p(0, 2)).gate(31)
}

const MMC_PARENTS: &[&str] = &[OSC24M, "pll-periph"];

const fn module(name: &'static str, reg: u16) -> Clk {
    Clk::periph(name, MMC_PARENTS, reg, Periph::new().m(0, 4).p(16, 2))
        .mux(24, 2)
        .gate(31)
}

const fn mmc(name: &'static str, reg: u16, index: u8) -> Clk {
    Clk::periph(
        name,
        MMC_PARENTS,
        reg,
        Periph::new().m(0, 4).p(16, 2).gate_during_rate_change(),
    )
    .mux(24, 2)
    .gate(31)
    .reset(0x2c0, 8 + index)
    .bus_gate(0x060, 8 + index)
}

const fn audio(name: &'static str, reg: u16, bus: u8) -> Clk {
    Clk::periph(name, &["pll-audio"], reg, Periph::new().m(0, 4))
        .gate(31)
        .bus_gate(0x068, bus)
}

const CLOCKS: &[Clk] = &[
    // PLLs
    Clk::pll("pll-c0cpux", &[OSC24M], 0x000, pll(0).p(16, 1))
        .id(48)
        .gate(31),
    Clk::pll("pll-c1cpux", &[OSC24M], 0x004, pll(1).p(16, 1))
        .id(49)
        .gate(31),
    Clk::pll(
        "pll-audio",
        &[OSC24M],
        0x008,
        pll(2).d1(16, 1).d2(18, 1).m(0, 6),
    )
    .id(30)
    .gate(31),
    video_pll("pll-video0", 0x010, 3).id(36),
    halving_pll("pll-ve", 0x018, 4).id(35),
    Clk::pll(
        "pll-ddr",
        &[OSC24M],
        0x020,
        Pll::new()
            .lock(PLL_LOCK, 5)
            .n(8, 6)
            .n_min(12)
            .d1(16, 1)
            .d2(18, 1)
            .update(30),
    )
    .id(50)
    .gate(31),
    halving_pll("pll-periph", 0x028, 6).id(34),
    halving_pll("pll-gpu", 0x038, 7).id(32),
    halving_pll("pll-hsic", 0x044, 8).id(33),
    halving_pll("pll-de", 0x048, 9)
        .id(31)
        .reset(0x2c4, 12)
        .bus_gate(0x064, 12),
    video_pll("pll-video1", 0x04c, 10).id(37),
    // CPU clusters and buses
    Clk::periph("c0cpux", &[OSC24M, "pll-c0cpux"], 0x050, Periph::new())
        .id(51)
        .mux(12, 1)
        .critical(),
    Clk::periph("axi0", &["c0cpux"], 0x050, Periph::new().m(0, 2)).id(52),
    Clk::periph("c1cpux", &[OSC24M, "pll-c1cpux"], 0x050, Periph::new())
        .id(53)
        .mux(28, 1)
        .critical(),
    Clk::periph("axi1", &["c1cpux"], 0x050, Periph::new().m(16, 2)).id(54),
    Clk::periph(
        "ahb1",
        &[OSC32K, OSC24M, "pll-periph"],
        0x054,
        Periph::new().p(4, 2),
    )
    .id(55)
    .mux(12, 2)
    .extra(Extra::VariablePrediv {
        index: 2,
        field: Field::new(6, 2),
    }),
    Clk::periph("apb1", &["ahb1"], 0x054, Periph::new().m(8, 2)).id(56),
    Clk::periph(
        "apb2",
        &[OSC32K, OSC24M, "pll-periph", "pll-periph"],
        0x058,
        Periph::new().m(0, 5).p(16, 2),
    )
    .id(57)
    .mux(24, 2),
    Clk::fixed_factor("ahb2", &["pll-periph"], 1, 2).id(58),
    // Bus gates
    Clk::gate_only("bus-mipi-dsi", &["ahb1"], 0x060, 1).id(59),
    Clk::gate_only("bus-ss", &["ahb1"], 0x060, 5).id(60),
    Clk::gate_only("bus-dma", &["ahb1"], 0x060, 6).id(0),
    Clk::periph("bus-mmc0", &["ahb1"], 0, Periph::new()).id(3),
    Clk::periph("bus-mmc1", &["ahb1"], 0, Periph::new()).id(4),
    Clk::periph("bus-mmc2", &["ahb1"], 0, Periph::new()).id(5),
    Clk::gate_only("bus-nand", &["ahb1"], 0x060, 13).id(61),
    Clk::gate_only("bus-dram", &["ahb1"], 0x060, 14).id(62),
    Clk::gate_only("bus-emac", &["ahb1"], 0x060, 17).id(63),
    Clk::gate_only("bus-hstimer", &["ahb1"], 0x060, 19).id(64),
    Clk::gate_only("bus-spi0", &["ahb1"], 0x060, 20).id(65),
    Clk::gate_only("bus-spi1", &["ahb1"], 0x060, 21).id(66),
    Clk::gate_only("bus-usbdrd", &["ahb2"], 0x060, 24).id(13),
    Clk::gate_only("bus-ehci0", &["ahb2"], 0x060, 26).id(1),
    Clk::gate_only("bus-ehci1", &["ahb2"], 0x060, 27).id(2),
    Clk::gate_only("bus-ohci0", &["ahb2"], 0x060, 29).id(6),
    Clk::gate_only("bus-ve", &["ahb1"], 0x064, 0).id(67),
    Clk::gate_only("bus-csi", &["ahb1"], 0x064, 8).id(68),
    Clk::gate_only("bus-gpu", &["ahb1"], 0x064, 20).id(69),
    Clk::gate_only("bus-msgbox", &["ahb1"], 0x064, 21).id(70),
    Clk::gate_only("bus-spinlock", &["ahb1"], 0x064, 22).id(71),
    Clk::gate_only("bus-spdif", &["apb1"], 0x068, 1).id(72),
    Clk::gate_only("bus-pio", &["apb1"], 0x068, 5).id(7),
    Clk::gate_only("bus-i2c0", &["apb2"], 0x06c, 0).id(73),
    Clk::gate_only("bus-i2c1", &["apb2"], 0x06c, 1).id(74),
    Clk::gate_only("bus-i2c2", &["apb2"], 0x06c, 2).id(75),
    Clk::gate_only("bus-uart0", &["apb2"], 0x06c, 16).id(8),
    Clk::gate_only("bus-uart1", &["apb2"], 0x06c, 17).id(9),
    Clk::gate_only("bus-uart2", &["apb2"], 0x06c, 18).id(10),
    Clk::gate_only("bus-uart3", &["apb2"], 0x06c, 19).id(11),
    Clk::gate_only("bus-uart4", &["apb2"], 0x06c, 20).id(12),
    // Module clocks
    Clk::periph(
        "cci400",
        &[OSC24M, "pll-periph", "pll-hsic"],
        0x078,
        Periph::new().m(0, 2),
    )
    .id(76)
    .mux(24, 2),
    module("nand", 0x080).id(77),
    mmc("mmc0", 0x088, 0).id(19),
    Clk::phase("mmc0_sample", &["mmc0"], 0x088, Field::new(20, 3)).id(20),
    Clk::phase("mmc0_output", &["mmc0"], 0x088, Field::new(8, 3)).id(21),
    mmc("mmc1", 0x08c, 1).id(22),
    Clk::phase("mmc1_sample", &["mmc1"], 0x08c, Field::new(20, 3)).id(23),
    Clk::phase("mmc1_output", &["mmc1"], 0x08c, Field::new(8, 3)).id(24),
    mmc("mmc2", 0x090, 2).id(25).extra(Extra::ModeSelect {
        rate: 100_000_000,
        bit: 30,
    }),
    Clk::phase("mmc2_sample", &["mmc2"], 0x090, Field::new(20, 3)).id(26),
    Clk::phase("mmc2_output", &["mmc2"], 0x090, Field::new(8, 3)).id(27),
    module("ss", 0x09c).id(78),
    module("spi0", 0x0a0).id(39),
    module("spi1", 0x0a4).id(40),
    audio("daudio0", 0x0b0, 12).id(14),
    audio("daudio1", 0x0b4, 13).id(15),
    audio("daudio2", 0x0b8, 14).id(16),
    audio("tdm", 0x0bc, 15).id(43),
    Clk::periph("spdif", &["pll-audio"], 0x0c0, Periph::new().m(0, 4))
        .id(38)
        .gate(31),
    Clk::gate_only("usb-phy0", &[OSC24M], 0x0cc, 8).id(44),
    Clk::gate_only("usb-phy1", &[OSC24M], 0x0cc, 9).id(45),
    Clk::gate_only("usb-hsic", &[OSC24M], 0x0cc, 10).id(46),
    Clk::fixed_factor("osc12M", &[OSC24M], 1, 2)
        .id(29)
        .reg(0x0cc)
        .gate(11),
    Clk::gate_only("ohci0", &[OSC24M], 0x0cc, 16).id(28),
    Clk::periph("dram", &["pll-ddr"], 0x0f4, Periph::new().m(0, 4).update(16)).id(79),
    Clk::gate_only("dram-ve", &["dram"], 0x100, 0).id(80),
    Clk::gate_only("dram-csi", &["dram"], 0x100, 1).id(81),
    Clk::periph("tcon0", &["pll-video0"], 0x118, Periph::new())
        .id(41)
        .gate(31)
        .reset(0x2c4, 4)
        .bus_gate(0x064, 4),
    Clk::periph("tcon1", &["pll-video1"], 0x11c, Periph::new().m(0, 4))
        .id(42)
        .gate(31)
        .reset(0x2c4, 5)
        .bus_gate(0x064, 5),
    Clk::gate_only("csi-misc", &[OSC24M], 0x130, 16).id(82),
    Clk::gate_only("mipi-csi", &[OSC24M], 0x130, 31).id(83),
    Clk::periph(
        "csi-sclk",
        &["pll-periph", NO_PARENT, NO_PARENT, NO_PARENT, NO_PARENT, "pll-ve"],
        0x134,
        Periph::new().m(16, 4),
    )
    .id(84)
    .mux(24, 3)
    .gate(31),
    Clk::periph(
        "csi-mclk",
        &[NO_PARENT, NO_PARENT, NO_PARENT, "pll-periph", NO_PARENT, OSC24M],
        0x134,
        Periph::new().m(0, 5),
    )
    .id(85)
    .mux(8, 3)
    .gate(15),
    Clk::periph("ve", &["pll-ve"], 0x13c, Periph::new().m(16, 3))
        .id(47)
        .gate(31),
    Clk::gate_only("avs", &[OSC24M], 0x144, 31).id(86),
    Clk::periph("hdmi", &["pll-video1"], 0x150, Periph::new().m(0, 4))
        .id(17)
        .gate(31)
        .bus_gate(0x064, 11),
    Clk::gate_only("hdmi-ddc", &[OSC24M], 0x154, 31).id(18),
    Clk::periph(
        "mbus",
        &[OSC24M, "pll-periph", "pll-ddr"],
        0x15c,
        Periph::new().m(0, 3),
    )
    .id(87)
    .mux(24, 2)
    .gate(31)
    .critical(),
    Clk::periph("mipi-dsi0", &["pll-video0"], 0x168, Periph::new().m(0, 4))
        .id(88)
        .gate(31),
    Clk::periph(
        "mipi-dsi1",
        &[
            OSC24M,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            NO_PARENT,
            "pll-video0",
        ],
        0x16c,
        Periph::new().m(0, 4),
    )
    .id(89)
    .mux(24, 4)
    .gate(31),
    Clk::periph("gpu-core", &["pll-gpu"], 0x1a0, Periph::new().m(0, 3))
        .id(90)
        .gate(31),
    Clk::periph(
        "gpu-mem",
        &["pll-gpu", "pll-periph"],
        0x1a4,
        Periph::new().m(0, 3),
    )
    .id(91)
    .mux(24, 1)
    .gate(31),
    Clk::periph("gpu-hyd", &["pll-gpu"], 0x1a8, Periph::new().m(0, 3))
        .id(92)
        .gate(31),
];

const RESETS: &[RegBit] = &[
    RegBit::new(0x0cc, 0),  // usb-phy0
    RegBit::new(0x0cc, 1),  // usb-phy1
    RegBit::new(0x0cc, 2),  // usb-hsic
    RegBit::new(0x0f4, 31), // dram-ctr
    RegBit::new(0x0fc, 31), // mbus
    RegBit::new(0x2c0, 1),  // mipi-dsi
    RegBit::new(0x2c0, 5),  // ce
    RegBit::new(0x2c0, 6),  // dma
    RegBit::new(0x2c0, 13), // nand
    RegBit::new(0x2c0, 14), // dram
    RegBit::new(0x2c0, 17), // emac
    RegBit::new(0x2c0, 19), // hstimer
    RegBit::new(0x2c0, 20), // spi0
    RegBit::new(0x2c0, 21), // spi1
    RegBit::new(0x2c0, 24), // usbdrd
    RegBit::new(0x2c0, 26), // ehci0
    RegBit::new(0x2c0, 27), // ehci1
    RegBit::new(0x2c0, 29), // ohci0
    RegBit::new(0x2c4, 0),  // ve
    RegBit::new(0x2c4, 8),  // csi
    RegBit::new(0x2c4, 10), // hdmi0
    RegBit::new(0x2c4, 11), // hdmi1
    RegBit::new(0x2c4, 20), // gpu
    RegBit::new(0x2c4, 21), // msgbox
    RegBit::new(0x2c4, 22), // spinlock
    RegBit::new(0x2c8, 0),  // lvds
    RegBit::new(0x2d0, 1),  // spdif
    RegBit::new(0x2d0, 12), // daudio0
    RegBit::new(0x2d0, 13), // daudio1
    RegBit::new(0x2d0, 14), // daudio2
    RegBit::new(0x2d0, 15), // tdm
    RegBit::new(0x2d8, 0),  // i2c0
    RegBit::new(0x2d8, 1),  // i2c1
    RegBit::new(0x2d8, 2),  // i2c2
    RegBit::new(0x2d8, 16), // uart0
    RegBit::new(0x2d8, 17), // uart1
    RegBit::new(0x2d8, 18), // uart2
    RegBit::new(0x2d8, 19), // uart3
    RegBit::new(0x2d8, 20), // uart4
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        descriptor::{ClockKind, NEncoding},
        pll::{self, PllFactors},
        tree::normalize,
    };
    use std::collections::BTreeSet;

    fn pll_of(name: &str) -> Pll {
        match CLOCKS.iter().find(|desc| desc.name == name).map(|desc| desc.kind) {
            Some(ClockKind::Pll(pll)) => pll,
            _ => panic!("{name} is not a PLL"),
        }
    }

    #[test]
    fn names_and_ids_are_unique() {
        let mut names = BTreeSet::new();
        let mut ids = BTreeSet::new();
        for desc in A83T.descriptors() {
            assert!(names.insert(normalize(desc.name)), "{}", desc.name);
            if let Some(id) = desc.id {
                assert!(ids.insert(id), "{id}");
            }
        }
        assert_eq!(ids.len(), 93);
    }

    #[test]
    fn parents_are_provided_or_empty() {
        let names: BTreeSet<_> = A83T.descriptors().map(|desc| normalize(desc.name)).collect();
        for desc in A83T.descriptors() {
            for parent in desc.parents {
                assert!(
                    parent.is_empty() || names.contains(&normalize(parent)),
                    "{} <- {parent}",
                    desc.name
                );
            }
        }
    }

    #[test]
    fn only_ddr_encodes_n_minus_one() {
        for desc in CLOCKS {
            if let ClockKind::Pll(pll) = desc.kind {
                let expected = if desc.name == "pll-ddr" {
                    NEncoding::MinusOne
                } else {
                    NEncoding::Exact
                };
                assert_eq!(pll.n_encoding, expected, "{}", desc.name);
                assert_eq!(pll.n_min, 12, "{}", desc.name);
            }
        }
    }

    #[test]
    fn periph_pll_at_1200mhz() {
        let (rate, factors) = pll::find_best(&pll_of("pll-periph"), 1_200_000_000, 24_000_000);
        assert_eq!(rate, 1_200_000_000);
        assert_eq!(factors.n, 50);
        assert_eq!(factors.d1, 1);
        assert_eq!(factors.p, 0);
    }

    #[test]
    fn cluster_pll_encodes_n_directly() {
        let pll = pll_of("pll-c0cpux");
        let factors = PllFactors {
            n: 42,
            ..PllFactors::default()
        };
        assert_eq!(Field::new(8, 8).get(factors.encode(&pll)), 42);
        assert_eq!(factors.rate(24_000_000), 1_008_000_000);
    }

    #[test]
    fn thirty_nine_resets() {
        assert_eq!(A83T.resets.len(), 39);
        assert_eq!(
            A83T.resets.line(crate::ResetId(3)).unwrap(),
            Some(RegBit::new(0x0f4, 31))
        );
    }
}
