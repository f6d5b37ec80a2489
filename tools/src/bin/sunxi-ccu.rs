// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: Copyright 2024 Ian McIntyre

use std::time::Duration;

use ccu::{
    sun8i, Ccu, Chip, Clock, MemoryWindow, ProbeWindow, ProviderTable, RegisterWindow, ResetId,
    Timing,
};
use clap::{error::ErrorKind, ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use env_logger::{Builder, Env};
use log::LevelFilter;
use probe_rs::Permissions;

/// Inspect and drive the clock control unit of an Allwinner SoC
#[derive(Parser)]
#[command(version, about, long_about)]
struct Cli {
    /// The Allwinner SoC
    #[arg(ignore_case = true)]
    soc: Soc,

    /// The probe-rs target name, if it differs from the SoC name.
    #[arg(long)]
    target: Option<String>,

    /// Log more. Repeat for even more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// How long (ms) to wait for a PLL to lock.
    #[arg(long, default_value = "70")]
    lock_timeout_ms: u64,

    /// Simulate against a snapshot of the registers.
    ///
    /// The CCU registers are read once, and the command runs against
    /// that copy. Writes are printed instead of reaching the target.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List all known clocks and their IDs, then exit.
    List,
    /// Show clock rates.
    ///
    /// If empty, show all clocks. This is case insensitive.
    Rates { clocks: Vec<String> },
    /// Show the rate a clock would settle on, without changing it.
    Round { clock: String, rate: u64 },
    /// Change a clock's rate.
    SetRate { clock: String, rate: u64 },
    /// Enable clocks.
    Enable { clocks: Vec<String> },
    /// Disable clocks. Critical clocks stay on.
    Disable { clocks: Vec<String> },
    /// Show a clock's parent.
    Parent { clock: String },
    /// Select a clock's parent by mux index.
    SetParent { clock: String, index: usize },
    /// Show a phase clock's delay, in degrees.
    Phase { clock: String },
    /// Change a phase clock's delay, in degrees.
    SetPhase { clock: String, degrees: u32 },
    /// Hold a module in reset.
    Assert { reset: usize },
    /// Release a module from reset.
    Deassert { reset: usize },
}

#[derive(Clone, ValueEnum)]
#[value(rename_all = "UPPER")]
enum Soc {
    H3,
    A83t,
}

impl Soc {
    fn selection(&self) -> &'static Chip {
        match self {
            Self::H3 => &sun8i::H3,
            Self::A83t => &sun8i::A83T,
        }
    }
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn fail(kind: ErrorKind, message: impl std::fmt::Display) -> ! {
    Cli::command().error(kind, message).exit()
}

fn rate_to_str(rate: Result<u64, ccu::Error>) -> String {
    rate.map(|rate| rate.to_string())
        .unwrap_or_else(|_| String::from("???"))
}

fn lookup<W: RegisterWindow>(ccu: &Ccu<W>, name: &str) -> Clock {
    ccu.clocks().lookup(name).unwrap_or_else(|_| {
        fail(
            ErrorKind::InvalidValue,
            format!("Clock named '{name}' isn't known to this SoC."),
        )
    })
}

fn clock_name<W: RegisterWindow>(ccu: &Ccu<W>, clock: Clock) -> &'static str {
    ccu.clocks()
        .descriptor(clock)
        .map_or("???", |desc| desc.name)
}

fn run<W: RegisterWindow>(ccu: &Ccu<W>, command: &Command) -> Result<(), ccu::Error> {
    let clocks = ccu.clocks();
    match command {
        Command::List => {}
        Command::Rates { clocks: names } => {
            let selected: Vec<_> = if names.is_empty() {
                clocks.clocks().collect()
            } else {
                names.iter().map(|name| lookup(ccu, name)).collect()
            };

            println!("{:>20} | {:>12} | {:>20}", "Name", "Rate (Hz)", "Parent");
            let line: String = "-".repeat(20 + (3 * 2) + 12 + 20);
            println!("{line}");
            for clock in selected {
                let parent = match clocks.parent(clock)? {
                    Some(parent) => clock_name(ccu, parent),
                    None => "-",
                };
                println!(
                    "{:>20} | {:>12} | {:>20}",
                    clock_name(ccu, clock),
                    rate_to_str(clocks.rate(clock)),
                    parent
                );
            }
        }
        Command::Round { clock, rate } => {
            println!("{}", clocks.round_rate(lookup(ccu, clock), *rate)?);
        }
        Command::SetRate { clock, rate } => {
            println!("{}", clocks.set_rate(lookup(ccu, clock), *rate)?);
        }
        Command::Enable { clocks: names } => {
            for name in names {
                clocks.enable(lookup(ccu, name))?;
            }
        }
        Command::Disable { clocks: names } => {
            for name in names {
                clocks.disable(lookup(ccu, name))?;
            }
        }
        Command::Parent { clock } => match clocks.parent(lookup(ccu, clock))? {
            Some(parent) => println!("{}", clock_name(ccu, parent)),
            None => println!("-"),
        },
        Command::SetParent { clock, index } => {
            clocks.set_parent(lookup(ccu, clock), *index)?;
        }
        Command::Phase { clock } => {
            println!("{}", clocks.phase(lookup(ccu, clock))?);
        }
        Command::SetPhase { clock, degrees } => {
            clocks.set_phase(lookup(ccu, clock), *degrees)?;
        }
        Command::Assert { reset } => ccu.resets().assert(ResetId(*reset))?,
        Command::Deassert { reset } => ccu.resets().deassert(ResetId(*reset))?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    Builder::from_env(Env::default().default_filter_or(cli.log_level().as_str()))
        .format_target(false)
        .init();

    let chip = cli.soc.selection();

    if let Command::List = cli.command {
        for desc in chip.descriptors() {
            match desc.id {
                Some(id) => println!("{:>4} {}", id, desc.name),
                None => println!("{:>4} {}", "", desc.name),
            }
        }
        return;
    }

    let target = cli.target.as_deref().unwrap_or(chip.name);
    let mut session = match probe_rs::Session::auto_attach(target, Permissions::default()) {
        Ok(session) => session,
        Err(err) => fail(
            ErrorKind::Io,
            format!("{err} {err:?}\nIs your SoC connected to your debugger?"),
        ),
    };
    let core = session
        .core(0)
        .unwrap_or_else(|err| fail(ErrorKind::Io, err));
    let mut window = ProbeWindow::new(core, chip.base);

    let timing =
        Timing::default().with_lock_timeout(Duration::from_millis(cli.lock_timeout_ms));
    let mut providers = ProviderTable::new();

    let result = if cli.dry_run {
        let mut snapshot = Vec::new();
        for offset in chip.registers() {
            match window.read(offset) {
                Ok(value) => snapshot.push((offset, value)),
                Err(err) => fail(ErrorKind::Io, err),
            }
        }
        Ccu::bring_up(
            chip,
            MemoryWindow::with_registers(snapshot),
            timing,
            &mut providers,
        )
        .and_then(|ccu| {
            ccu.with_window(MemoryWindow::clear_writes);
            let result = run(&ccu, &cli.command);
            ccu.with_window(|window| {
                for (offset, value) in window.writes() {
                    println!("{:#010x} <- {value:#010x}", chip.base + u64::from(*offset));
                }
            });
            result
        })
    } else {
        Ccu::bring_up(chip, window, timing, &mut providers).and_then(|ccu| run(&ccu, &cli.command))
    };

    if let Err(err) = result {
        fail(ErrorKind::InvalidValue, err);
    }
}
