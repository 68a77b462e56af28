//! Read command implementation

use std::fs;
use std::path::Path;

use dflash_core::Error;

use super::{create_progress_bar_with_phase, Session};
use crate::config::{CliError, Target};

/// Read `length` bytes from `start` into `output`
pub fn run_read(
    target: &Target,
    output: &Path,
    start: u32,
    length: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(target)?;
    let flash = session.flash();
    let geometry = *flash.geometry();

    if start >= geometry.size {
        return Err(CliError::Flash(Error::InvalidAddress).into());
    }
    let available = geometry.size - start;
    let length = match length {
        Some(len) if len > available => {
            log::warn!(
                "Read clamped at the end of the array: {} of {} bytes",
                available,
                len
            );
            available
        }
        Some(len) => len,
        None => available,
    };

    let mut data = vec![0u8; length as usize];
    let pb = create_progress_bar_with_phase(length as u64, "Reading")?;

    let mut done = 0usize;
    for chunk in data.chunks_mut(geometry.block_size as usize) {
        done += flash.read_range(start + done as u32, chunk)?;
        pb.set_position(done as u64);
    }
    pb.finish_and_clear();

    fs::write(output, &data).map_err(|e| CliError::io(output, e))?;
    println!(
        "Read {} bytes from 0x{:08X} to {}",
        data.len(),
        start,
        output.display()
    );
    Ok(())
}
