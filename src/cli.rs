//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tgbprog_core::chip::JedecId;
use tgbprog_core::flash::{ChunkPlan, FlashConfig};
use tgbprog_core::protocol::{PollPolicy, DEFAULT_POLL_ATTEMPTS};

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size like "4096", "0x1000", "64K" or "1M"
pub fn parse_size(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let (num, multiplier) = if let Some(n) = lower
        .strip_suffix("mib")
        .or_else(|| lower.strip_suffix('m'))
    {
        (n, 1024 * 1024)
    } else if let Some(n) = lower
        .strip_suffix("kib")
        .or_else(|| lower.strip_suffix('k'))
    {
        (n, 1024)
    } else {
        return parse_hex_u32(s);
    };

    let n = parse_hex_u32(num)?;
    n.checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", s))
}

/// Parse a JEDEC ID such as "EF4014" or "EF 40 14"
fn parse_jedec_id(s: &str) -> Result<JedecId, String> {
    JedecId::parse(s).ok_or_else(|| format!("Invalid JEDEC ID '{}': expected 3 hex bytes", s))
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "tgbprog")]
#[command(author, version, about = "SPI flash programmer for FPGA cartridge boards", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flash access options shared across commands
#[derive(clap::Args, Debug, Clone)]
pub struct FlashArgs {
    /// JEDEC ID the flash must report (default: EF 40 14, W25Q80DV)
    #[arg(long, value_parser = parse_jedec_id)]
    pub expected_id: Option<JedecId>,

    /// Status polls before giving up on a busy flash
    #[arg(long, default_value_t = DEFAULT_POLL_ATTEMPTS)]
    pub poll_attempts: u32,

    /// Delay between busy polls, in microseconds
    #[arg(long, default_value_t = 0)]
    pub poll_delay_us: u32,

    /// Split payloads like older tools (one extra chunk on 256-byte multiples)
    #[arg(long)]
    pub legacy_chunks: bool,
}

impl FlashArgs {
    /// Polling and chunking settings for the flash engine
    pub fn flash_config(&self) -> FlashConfig {
        FlashConfig {
            poll: PollPolicy {
                max_attempts: self.poll_attempts,
                delay_us: self.poll_delay_us,
            },
            chunking: if self.legacy_chunks {
                ChunkPlan::Legacy
            } else {
                ChunkPlan::Exact
            },
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write one or more images to flash
    Program {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Image file (repeat for several images)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,

        /// Flash offset of each image, in the same order as --file
        #[arg(long = "offset", value_parser = parse_hex_u32)]
        offsets: Vec<u32>,

        /// Erase the whole chip before programming
        #[arg(short, long)]
        erase: bool,

        /// Read every image back after programming it
        #[arg(long)]
        verify: bool,

        /// Session manifest (TOML) listing images and flags
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Flash size in bytes (e.g. 1M); images must fit below it
        #[arg(long, value_parser = parse_size)]
        capacity: Option<u32>,

        #[command(flatten)]
        flash: FlashArgs,
    },

    /// Read and check the flash JEDEC ID
    Identify {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        #[command(flatten)]
        flash: FlashArgs,
    },

    /// Read a flash region to a file
    Read {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// First address to read
        #[arg(long, value_parser = parse_hex_u32, default_value = "0")]
        offset: u32,

        /// Number of bytes to read (e.g. 0x20000, 64K, 1M)
        #[arg(long, value_parser = parse_size)]
        size: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        flash: FlashArgs,
    },

    /// List supported programmers
    ListProgrammers,
}
