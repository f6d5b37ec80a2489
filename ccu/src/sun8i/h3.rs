// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

//! The H3 CCU.

use super::{OSC24M, OSC32K, ROOTS};
use crate::{
    descriptor::{ClockDescriptor as Clk, Extra, Field, FracRate, FracTable, Periph, Pll, RegBit},
    reset::ResetMap,
    Chip,
};

pub static H3: Chip = Chip {
    name: "H3",
    compatible: "allwinner,sun8i-h3-ccu",
    base: 0x01c2_0000,
    roots: &ROOTS,
    clocks: CLOCKS,
    resets: ResetMap(RESETS),
};

const M_0_3: u32 = 0xf;
const FRAC_MODE: u32 = 1 << 24 | 1 << 25;

/// 270MHz and 297MHz, bypassing N and M.
const VIDEO_FRAC: Extra = Extra::Frac(FracTable {
    rates: &[
        FracRate {
            rate: 270_000_000,
            mask: M_0_3 | FRAC_MODE,
            value: 0,
        },
        FracRate {
            rate: 297_000_000,
            mask: M_0_3 | FRAC_MODE,
            value: 1 << 25,
        },
    ],
    integer_mask: FRAC_MODE,
    integer_value: 1 << 24,
});

/// rate = 24MHz * n / m
const fn video_pll(name: &'static str, reg: u16) -> Clk {
    Clk::pll(name, &[OSC24M], reg, Pll::new().lock(reg, 28).n(8, 7).m(0, 4))
        .gate(31)
        .extra(VIDEO_FRAC)
}

/// rate = 24MHz * n * k / 2
const fn periph_pll(name: &'static str, reg: u16) -> Clk {
    Clk::pll(name, &[OSC24M], reg, Pll::new().lock(reg, 28).n(8, 5).k(4, 2))
        .gate(31)
        .extra(Extra::PostDiv(2))
}

const AUDIO_BASE: &[&str] = &["pll-audio-base"];

const MMC_PARENTS: &[&str] = &[OSC24M, "pll-periph0", "pll-periph1"];
const PERIPH_0_1: &[&str] = &["pll-periph0", "pll-periph1"];
const I2S_PARENTS: &[&str] = &["pll-audio-8x", "pll-audio-4x", "pll-audio-2x", "pll-audio"];

/// A gate-plus-dividers module clock with the common layout.
const fn module(name: &'static str, parents: &'static [&'static str], reg: u16) -> Clk {
    Clk::periph(name, parents, reg, Periph::new().m(0, 4).p(16, 2))
        .mux(24, 2)
        .gate(31)
}

const MMC_MODE: Extra = Extra::ModeSelect {
    rate: 100_000_000,
    bit: 30,
};

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

const fn i2s(name: &'static str, reg: u16, bus: u8) -> Clk {
    Clk::periph(name, I2S_PARENTS, reg, Periph::new())
        .mux(16, 2)
        .gate(31)
        .bus_gate(0x068, bus)
}

/// A clock that only passes through its parent.
const fn pass(name: &'static str, parents: &'static [&'static str]) -> Clk {
    Clk::periph(name, parents, 0, Periph::new())
}

const CLOCKS: &[Clk] = &[
    // PLLs
    Clk::pll(
        "pll-cpux",
        &[OSC24M],
        0x000,
        Pll::new()
            .lock(0x000, 28)
            .n(8, 5)
            .k(4, 2)
            .m(0, 2)
            .p(16, 2)
            .flat_factors(),
    )
    .id(54)
    .gate(31),
    Clk::pll(
        "pll-audio-base",
        &[OSC24M],
        0x008,
        Pll::new().lock(0x008, 28).n(8, 7).m(0, 5),
    )
    .id(55)
    .gate(31),
    Clk::fixed_factor("pll-audio", AUDIO_BASE, 1, 4)
        .id(32)
        .set_rate_parent()
        .preset(0x008, Field::new(16, 4), 3),
    Clk::fixed_factor("pll-audio-2x", AUDIO_BASE, 1, 2)
        .id(56)
        .set_rate_parent(),
    Clk::fixed_factor("pll-audio-4x", AUDIO_BASE, 1, 1)
        .id(57)
        .set_rate_parent(),
    Clk::fixed_factor("pll-audio-8x", AUDIO_BASE, 2, 1)
        .id(58)
        .set_rate_parent(),
    video_pll("pll-video", 0x010).id(38),
    video_pll("pll-ve", 0x018).id(37),
    Clk::pll(
        "pll-ddr",
        &[OSC24M],
        0x020,
        Pll::new()
            .lock(0x020, 28)
            .n(8, 5)
            .k(4, 2)
            .m(0, 2)
            .update(20),
    )
    .id(60)
    .gate(31),
    periph_pll("pll-periph0", 0x028).id(35),
    Clk::fixed_factor("pll-periph0-2x", &["pll-periph0"], 2, 1).id(59),
    video_pll("pll-gpu", 0x038).id(34),
    periph_pll("pll-periph1", 0x044).id(36),
    video_pll("pll-de", 0x048).id(33),
    // CPU and buses
    Clk::periph(
        "cpux",
        &[OSC32K, OSC24M, "pll-cpux", "pll-cpux"],
        0x050,
        Periph::new(),
    )
    .id(61)
    .mux(16, 2)
    .critical(),
    Clk::periph("axi", &["cpux"], 0x050, Periph::new().m(0, 2)).id(62),
    Clk::periph(
        "ahb1",
        &[OSC32K, OSC24M, "axi", "pll-periph0"],
        0x054,
        Periph::new().p(4, 2),
    )
    .id(63)
    .mux(12, 2)
    .extra(Extra::VariablePrediv {
        index: 3,
        field: Field::new(6, 2),
    }),
    Clk::periph("apb1", &["ahb1"], 0x054, Periph::new().m(8, 2))
        .id(64)
        .extra(Extra::MTable(&[2, 2, 4, 8])),
    Clk::periph(
        "apb2",
        &[OSC32K, OSC24M, "pll-periph0", "pll-periph0"],
        0x058,
        Periph::new().m(0, 5).p(16, 2),
    )
    .id(65)
    .mux(24, 2),
    Clk::periph("ahb2", &["ahb1", "pll-periph0"], 0x05c, Periph::new())
        .id(66)
        .mux(0, 2)
        .extra(Extra::FixedPrediv(&[1, 2])),
    // Bus gates
    Clk::gate_only("bus-ce", &["ahb1"], 0x060, 5).id(67),
    Clk::gate_only("bus-dma", &["ahb1"], 0x060, 6).id(0),
    // MMC bus gates are driven through the module clocks.
    pass("bus-mmc0", &["ahb1"]).id(5),
    pass("bus-mmc1", &["ahb1"]).id(6),
    pass("bus-mmc2", &["ahb1"]).id(7),
    Clk::gate_only("bus-nand", &["ahb1"], 0x060, 13).id(68),
    Clk::gate_only("bus-dram", &["ahb1"], 0x060, 14).id(69),
    Clk::gate_only("bus-emac", &["ahb2"], 0x060, 17).id(70),
    Clk::gate_only("bus-ts", &["ahb1"], 0x060, 18).id(71),
    Clk::gate_only("bus-hstimer", &["ahb1"], 0x060, 19).id(72),
    Clk::gate_only("bus-spi0", &["ahb1"], 0x060, 20).id(73),
    Clk::gate_only("bus-spi1", &["ahb1"], 0x060, 21).id(74),
    Clk::gate_only("bus-otg", &["ahb1"], 0x060, 23).id(75),
    Clk::gate_only("bus-ehci0", &["ahb1"], 0x060, 24).id(1),
    Clk::gate_only("bus-ehci1", &["ahb1"], 0x060, 25).id(2),
    Clk::gate_only("bus-ehci2", &["ahb2"], 0x060, 26).id(3),
    Clk::gate_only("bus-ehci3", &["ahb2"], 0x060, 27).id(4),
    Clk::gate_only("bus-ohci0", &["ahb1"], 0x060, 28).id(8),
    Clk::gate_only("bus-ohci1", &["ahb2"], 0x060, 29).id(9),
    Clk::gate_only("bus-ohci2", &["ahb2"], 0x060, 30).id(10),
    Clk::gate_only("bus-ohci3", &["ahb2"], 0x060, 31).id(11),
    Clk::gate_only("bus-ve", &["ahb1"], 0x064, 0).id(76),
    Clk::gate_only("bus-deinterlace", &["ahb1"], 0x064, 5).id(77),
    Clk::gate_only("bus-csi", &["ahb1"], 0x064, 8).id(78),
    Clk::gate_only("bus-tve", &["ahb1"], 0x064, 9).id(79),
    Clk::gate_only("bus-gpu", &["ahb1"], 0x064, 20).id(80),
    Clk::gate_only("bus-msgbox", &["ahb1"], 0x064, 21).id(81),
    Clk::gate_only("bus-spinlock", &["ahb1"], 0x064, 22).id(82),
    Clk::gate_only("bus-codec", &["apb1"], 0x068, 0).id(83),
    Clk::gate_only("bus-spdif", &["apb1"], 0x068, 1).id(84),
    Clk::gate_only("bus-pio", &["apb1"], 0x068, 5).id(12),
    Clk::gate_only("bus-i2c0", &["apb2"], 0x06c, 0).id(85),
    Clk::gate_only("bus-i2c1", &["apb2"], 0x06c, 1).id(86),
    Clk::gate_only("bus-i2c2", &["apb2"], 0x06c, 2).id(87),
    Clk::gate_only("bus-uart0", &["apb2"], 0x06c, 16).id(13),
    Clk::gate_only("bus-uart1", &["apb2"], 0x06c, 17).id(14),
    Clk::gate_only("bus-uart2", &["apb2"], 0x06c, 18).id(15),
    Clk::gate_only("bus-uart3", &["apb2"], 0x06c, 19).id(16),
    Clk::gate_only("bus-scr", &["apb2"], 0x06c, 20).id(88),
    Clk::gate_only("bus-ephy", &["ahb1"], 0x070, 0).id(89),
    Clk::gate_only("bus-dbg", &["ahb1"], 0x070, 7).id(90),
    // Module clocks
    Clk::periph("ths", &[OSC24M], 0x074, Periph::new().m(0, 2))
        .id(43)
        .gate(31)
        .bus_gate(0x068, 8)
        .extra(Extra::MTable(&[1, 2, 4, 6])),
    module("nand", MMC_PARENTS, 0x080).id(91),
    mmc("mmc0", 0x088, 0).id(23),
    Clk::phase("mmc0_sample", &["mmc0"], 0x088, Field::new(20, 3)).id(24),
    Clk::phase("mmc0_output", &["mmc0"], 0x088, Field::new(8, 3)).id(25),
    mmc("mmc1", 0x08c, 1).id(26).extra(MMC_MODE),
    Clk::phase("mmc1_sample", &["mmc1"], 0x08c, Field::new(20, 3)).id(27),
    Clk::phase("mmc1_output", &["mmc1"], 0x08c, Field::new(8, 3)).id(28),
    mmc("mmc2", 0x090, 2).id(29).extra(MMC_MODE),
    Clk::phase("mmc2_sample", &["mmc2"], 0x090, Field::new(20, 3)).id(30),
    Clk::phase("mmc2_output", &["mmc2"], 0x090, Field::new(8, 3)).id(31),
    module("ts", &[OSC24M, "pll-periph0"], 0x098).id(92),
    module("ce", MMC_PARENTS, 0x09c).id(93),
    module("spi0", MMC_PARENTS, 0x0a0).id(40),
    module("spi1", MMC_PARENTS, 0x0a4).id(41),
    i2s("i2s0", 0x0b0, 12).id(20),
    i2s("i2s1", 0x0b4, 13).id(21),
    i2s("i2s2", 0x0b8, 14).id(22),
    Clk::periph("spdif", &["pll-audio"], 0x0c0, Periph::new().m(0, 4))
        .id(39)
        .gate(31),
    Clk::gate_only("usb-phy0", &[OSC24M], 0x0cc, 8).id(49),
    Clk::gate_only("usb-phy1", &[OSC24M], 0x0cc, 9).id(50),
    Clk::gate_only("usb-phy2", &[OSC24M], 0x0cc, 10).id(51),
    Clk::gate_only("usb-phy3", &[OSC24M], 0x0cc, 11).id(52),
    Clk::gate_only("usb-ohci0", &[OSC24M], 0x0cc, 16).id(45),
    Clk::gate_only("usb-ohci1", &[OSC24M], 0x0cc, 17).id(46),
    Clk::gate_only("usb-ohci2", &[OSC24M], 0x0cc, 18).id(47),
    Clk::gate_only("usb-ohci3", &[OSC24M], 0x0cc, 19).id(48),
    Clk::periph("dram", &["pll-ddr"], 0x0f4, Periph::new().m(0, 4).update(16))
        .id(94)
        .critical(),
    Clk::gate_only("dram-ve", &["dram"], 0x100, 0).id(95),
    Clk::gate_only("dram-csi", &["dram"], 0x100, 1).id(96),
    Clk::gate_only("dram-deinterlace", &["dram"], 0x100, 2).id(97),
    Clk::gate_only("dram-ts", &["dram"], 0x100, 3).id(98),
    Clk::periph(
        "de",
        &["pll-periph0-2x", "pll-de"],
        0x104,
        Periph::new().m(0, 4),
    )
    .id(17)
    .mux(24, 3)
    .gate(31)
    .reset(0x2c4, 12)
    .bus_gate(0x064, 12),
    Clk::periph("tcon0", &["pll-video"], 0x118, Periph::new().m(0, 4))
        .id(42)
        .gate(31)
        .reset(0x2c4, 3)
        .bus_gate(0x064, 3),
    Clk::periph("tve", &["pll-de", "pll-periph1"], 0x120, Periph::new().m(0, 4))
        .id(44)
        .mux(24, 3)
        .gate(31),
    Clk::periph("deinterlace", PERIPH_0_1, 0x124, Periph::new().m(0, 4))
        .id(99)
        .mux(24, 3)
        .gate(31),
    Clk::gate_only("csi-misc", &[OSC24M], 0x130, 16).id(100),
    Clk::periph("csi-sclk", PERIPH_0_1, 0x134, Periph::new().m(16, 4))
        .id(101)
        .mux(24, 3)
        .gate(31),
    Clk::periph(
        "csi-mclk",
        &[OSC24M, "pll-video", "pll-periph0"],
        0x134,
        Periph::new().m(0, 5),
    )
    .id(102)
    .mux(8, 3)
    .gate(15),
    Clk::periph("ve", &["pll-ve"], 0x13c, Periph::new().m(16, 3))
        .id(53)
        .gate(31),
    Clk::gate_only("ac-dig", &["pll-audio"], 0x140, 31).id(103),
    Clk::gate_only("avs", &[OSC24M], 0x144, 31).id(104),
    Clk::periph("hdmi", &["pll-video"], 0x150, Periph::new().m(0, 4))
        .id(18)
        .gate(31)
        .bus_gate(0x064, 11),
    Clk::gate_only("hdmi-ddc", &[OSC24M], 0x154, 31).id(19),
    Clk::periph(
        "mbus",
        &[OSC24M, "pll-periph0-2x", "pll-ddr"],
        0x15c,
        Periph::new().m(0, 3),
    )
    .id(105)
    .mux(24, 2)
    .gate(31)
    .critical(),
    Clk::periph("gpu", &["pll-gpu"], 0x1a0, Periph::new().m(0, 3))
        .id(106)
        .gate(31),
];

const RESETS: &[RegBit] = &[
    RegBit::new(0x0cc, 0),  // usb-phy0
    RegBit::new(0x0cc, 1),  // usb-phy1
    RegBit::new(0x0cc, 2),  // usb-phy2
    RegBit::new(0x0cc, 3),  // usb-phy3
    RegBit::new(0x0fc, 31), // mbus
    RegBit::new(0x2c0, 5),  // ce
    RegBit::new(0x2c0, 6),  // dma
    RegBit::new(0x2d4, 16), // uart0
    RegBit::new(0x2d4, 17), // uart1
    RegBit::new(0x2d4, 18), // uart2
    RegBit::new(0x2c0, 13), // nand
    RegBit::new(0x2c0, 14), // dram
    RegBit::new(0x2c0, 17), // emac
    RegBit::new(0x2c0, 18), // ts
    RegBit::new(0x2c0, 19), // hstimer
    RegBit::new(0x2c0, 20), // spi0
    RegBit::new(0x2c0, 21), // spi1
    RegBit::new(0x2c0, 23), // otg
    RegBit::new(0x2c0, 24), // ehci0
    RegBit::new(0x2c0, 25), // ehci1
    RegBit::new(0x2c0, 26), // ehci2
    RegBit::new(0x2c0, 27), // ehci3
    RegBit::new(0x2c0, 28), // ohci0
    RegBit::new(0x2c0, 29), // ohci1
    RegBit::new(0x2c0, 30), // ohci2
    RegBit::new(0x2c0, 31), // ohci3
    RegBit::new(0x2c4, 0),  // ve
    RegBit::new(0x2c4, 5),  // deinterlace
    RegBit::new(0x2c4, 8),  // csi
    RegBit::new(0x2c4, 9),  // tve
    RegBit::new(0x2c4, 10), // hdmi0
    RegBit::new(0x2c4, 11), // hdmi1
    RegBit::new(0x2c4, 20), // gpu
    RegBit::new(0x2c4, 21), // msgbox
    RegBit::new(0x2c4, 22), // spinlock
    RegBit::new(0x2c4, 31), // dbg
    RegBit::new(0x2c8, 2),  // ephy
    RegBit::new(0x2d0, 0),  // codec
    RegBit::new(0x2d0, 1),  // spdif
    RegBit::new(0x2d0, 8),  // ths
    RegBit::new(0x2d0, 12), // i2s0
    RegBit::new(0x2d0, 13), // i2s1
    RegBit::new(0x2d0, 14), // i2s2
    RegBit::new(0x2d4, 0),  // i2c0
    RegBit::new(0x2d4, 1),  // i2c1
    RegBit::new(0x2d4, 2),  // i2c2
    RegBit::new(0x2d4, 19), // uart3
    RegBit::new(0x2d4, 20), // scr
];
