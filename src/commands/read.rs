//! Read command implementation

use super::progress::byte_bar;
use crate::cli::FlashArgs;
use crate::programmers::ProgrammerHandle;
use std::path::Path;
use tgbprog_core::chip::W25Q80DV;
use tgbprog_core::error::Error;
use tgbprog_core::flash::SpiFlash;
use tgbprog_core::session::ResetHold;

/// Read `size` bytes at `offset` with the board held in reset
fn read_region(
    handle: &mut ProgrammerHandle,
    offset: u32,
    size: u32,
    flash: &FlashArgs,
) -> Result<Vec<u8>, Error> {
    let expected = flash.expected_id.unwrap_or(W25Q80DV.id);
    let line = handle.reset_line;
    let mut hold = ResetHold::assert(handle.programmer(), line)?;

    let data = {
        let mut dev = SpiFlash::new(&mut *hold, flash.flash_config());
        dev.check_id(expected).and_then(|_| {
            let pb = byte_bar(None, size as u64, "Reading");
            let data = dev.read_data_with(offset, size as usize, |done| pb.set_position(done as u64));
            match &data {
                Ok(_) => pb.finish_with_message("done"),
                Err(_) => pb.abandon(),
            }
            data
        })
    };

    hold.release()?;
    data
}

/// Run the read command
pub fn run_read(
    handle: &mut ProgrammerHandle,
    offset: u32,
    size: u32,
    output: &Path,
    flash: &FlashArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    log::info!(
        "Read: 0x{:06X} - 0x{:06X} -> {}",
        offset,
        (offset as u64 + size as u64).saturating_sub(1),
        output.display()
    );

    let data = read_region(handle, offset, size, flash)?;
    std::fs::write(output, &data)
        .map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;

    println!("Read {} bytes to {}", data.len(), output.display());
    Ok(())
}
