//! tgbprog - SPI flash programmer for FPGA cartridge boards
//!
//! Writes gateware and ROM images to the W25Q80DV flash on the cartridge
//! board while the FPGA is held in reset, optionally erasing first and
//! verifying each image afterwards.
//!
//! The programming engine lives in `tgbprog-core`. Programmer backends are
//! separate crates behind cargo features:
//! - **ftdi** - FT2232H and friends through the MPSSE engine, reset on a GPIOL pin
//! - **dummy** - In-memory flash for dry runs

mod cli;
mod commands;
mod manifest;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};
use commands::ProgramArgs;
use programmers::open_programmer;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli.command) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Program {
            programmer,
            files,
            offsets,
            erase,
            verify,
            manifest,
            capacity,
            flash,
        } => {
            let args = ProgramArgs {
                files,
                offsets,
                erase,
                verify,
                manifest,
                capacity,
                flash,
            };
            commands::run_program(&programmer, &args)
        }
        Commands::Identify { programmer, flash } => {
            let mut handle = open_programmer(&programmer)?;
            commands::run_identify(&mut handle, &flash)
        }
        Commands::Read {
            programmer,
            offset,
            size,
            output,
            flash,
        } => {
            let mut handle = open_programmer(&programmer)?;
            commands::run_read(&mut handle, offset, size, &output, &flash)
        }
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    }
}
