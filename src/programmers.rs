//! Programmer registration and dispatch
//!
//! This module provides a centralized registry for all programmers, with support
//! for feature-gated inclusion and dynamic help text generation.

use std::collections::HashMap;
use tgbprog_core::programmer::{Programmer, ProgrammerInfo};

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory flash emulator for dry runs (size=<N>,busy=<polls>,id=<hex>)",
    });

    #[cfg(feature = "ftdi")]
    programmers.push(ProgrammerInfo {
        name: "ftdi",
        aliases: &["ft2232_spi", "ft4232_spi"],
        description: "FTDI MPSSE programmer (type=<dev>,port=<A-D>,divisor=<N>,reset=gpiol<0-3>)",
    });

    programmers
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Parsed programmer parameters
#[derive(Debug)]
pub struct ProgrammerParams {
    /// Programmer name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

/// Parse a programmer string into name and parameters
///
/// Format: `name[:key=value[,key=value...]]`
pub fn parse_programmer_params(s: &str) -> Result<ProgrammerParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(ProgrammerParams {
        name: name.to_string(),
        params,
    })
}

/// An opened programmer together with the line that resets the board
pub struct ProgrammerHandle {
    /// Canonical programmer name
    pub name: &'static str,
    /// Output line wired to the board reset
    pub reset_line: u8,
    programmer: Box<dyn Programmer>,
}

impl ProgrammerHandle {
    fn new(name: &'static str, reset_line: u8, programmer: Box<dyn Programmer>) -> Self {
        Self {
            name,
            reset_line,
            programmer,
        }
    }

    /// The transport
    pub fn programmer(&mut self) -> &mut dyn Programmer {
        self.programmer.as_mut()
    }
}

/// Open a programmer by its CLI specification
///
/// Examples: `dummy`, `dummy:size=1M,busy=3`, `ftdi:type=2232h,port=A`.
pub fn open_programmer(programmer: &str) -> Result<ProgrammerHandle, Box<dyn std::error::Error>> {
    let params = parse_programmer_params(programmer)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        #[cfg(feature = "ftdi")]
        "ftdi" | "ft2232_spi" | "ft4232_spi" => open_ftdi(&params),

        _ => Err(format!(
            "Unknown programmer: {} (available: {})",
            params.name,
            programmer_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "dummy")]
fn dummy_config(
    params: &ProgrammerParams,
) -> Result<tgbprog_dummy::DummyConfig, Box<dyn std::error::Error>> {
    use tgbprog_core::chip::{JedecId, PAGE_SIZE};

    let mut config = tgbprog_dummy::DummyConfig::default();
    for (key, value) in &params.params {
        match key.as_str() {
            "size" => {
                let size = crate::cli::parse_size(value)? as usize;
                if size == 0 || size % PAGE_SIZE != 0 {
                    return Err(format!(
                        "Invalid dummy size '{}': must be a non-zero multiple of {} bytes",
                        value, PAGE_SIZE
                    )
                    .into());
                }
                config.size = size;
            }
            "busy" => {
                config.busy_polls = value
                    .parse()
                    .map_err(|_| format!("Invalid busy poll count '{}'", value))?;
            }
            "id" => {
                config.jedec = JedecId::parse(value)
                    .ok_or_else(|| format!("Invalid JEDEC ID '{}'", value))?;
            }
            _ => log::warn!("Unknown dummy option: {}={}", key, value),
        }
    }
    Ok(config)
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &ProgrammerParams) -> Result<ProgrammerHandle, Box<dyn std::error::Error>> {
    let config = dummy_config(params)?;
    log::info!(
        "Opening dummy programmer ({} bytes, {})",
        config.size,
        config.jedec
    );

    let master = tgbprog_dummy::DummyFlash::new(config);
    Ok(ProgrammerHandle::new(
        "dummy",
        tgbprog_core::session::DEFAULT_RESET_LINE,
        Box::new(master),
    ))
}

#[cfg(feature = "ftdi")]
fn open_ftdi(params: &ProgrammerParams) -> Result<ProgrammerHandle, Box<dyn std::error::Error>> {
    use tgbprog_ftdi::{parse_options, Ftdi};

    log::info!("Opening FTDI programmer...");

    // Convert HashMap to Vec<(&str, &str)> for parse_options
    let options: Vec<(&str, &str)> = params
        .params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let config = parse_options(&options).map_err(|e| format!("Invalid FTDI parameters: {}", e))?;

    let master = Ftdi::open(&config).map_err(|e| {
        format!(
            "Failed to open FTDI device: {}\n\
             Make sure the device is connected and you have permissions.\n\
             You may need to unbind the kernel ftdi_sio driver:\n\
             echo -n '<bus>-<port>' | sudo tee /sys/bus/usb/drivers/ftdi_sio/unbind",
            e
        )
    })?;

    let reset_line = master.reset_line();
    Ok(ProgrammerHandle::new("ftdi", reset_line, Box::new(master)))
}
