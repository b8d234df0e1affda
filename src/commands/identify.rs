//! Identify command implementation

use crate::cli::FlashArgs;
use crate::programmers::ProgrammerHandle;
use tgbprog_core::chip::{JedecId, W25Q80DV};
use tgbprog_core::error::Error;
use tgbprog_core::flash::SpiFlash;
use tgbprog_core::session::ResetHold;

/// Read the JEDEC ID with the board held in reset
fn read_id(handle: &mut ProgrammerHandle, flash: &FlashArgs) -> Result<JedecId, Error> {
    let line = handle.reset_line;
    let mut hold = ResetHold::assert(handle.programmer(), line)?;
    let id = SpiFlash::new(&mut *hold, flash.flash_config()).read_id();
    hold.release()?;
    id
}

/// Run the identify command
pub fn run_identify(
    handle: &mut ProgrammerHandle,
    flash: &FlashArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let expected = flash.expected_id.unwrap_or(W25Q80DV.id);
    let found = read_id(handle, flash)?;

    println!(
        "JEDEC ID: {:02X} {:02X} {:02X}",
        found.manufacturer, found.device, found.unique
    );

    if found == expected {
        if expected == W25Q80DV.id {
            println!("Found {} ({} KiB)", W25Q80DV.name, W25Q80DV.total_size / 1024);
        } else {
            println!("Matches expected ID");
        }
        Ok(())
    } else {
        Err(Error::IdentityMismatch { expected, found }.into())
    }
}
