//! Write command implementation

use std::fs;
use std::path::Path;

use dflash_core::{DataFlash, Delay, Mmio};

use super::{create_block_bar, create_progress_bar_with_phase, Flash, Session};
use crate::config::{CliError, Target};

/// Write `input` at `start`, erasing the affected blocks first
pub fn run_write(
    target: &Target,
    input: &Path,
    start: u32,
    erase: bool,
    verify: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input).map_err(|e| CliError::io(input, e))?;
    println!("Read {} bytes from {}", data.len(), input.display());
    if data.is_empty() {
        println!("Nothing to write");
        return Ok(());
    }

    let mut session = Session::open(target)?;
    let flash = session.flash();
    let geometry = *flash.geometry();

    if !geometry.is_valid_range(start, data.len()) {
        return Err(CliError::OutOfRange {
            start,
            len: data.len(),
            size: geometry.size,
        }
        .into());
    }

    if erase {
        erase_range(flash, start, data.len() as u32)?;
    }

    let pb = create_progress_bar_with_phase(data.len() as u64, "Writing")?;
    write_by_block(flash, start, &data, |done| pb.set_position(done as u64))?;
    pb.finish_and_clear();

    if verify {
        verify_range(flash, start, &data)?;
        println!("Verified {} bytes", data.len());
    }

    session.save()?;
    println!("Wrote {} bytes at 0x{:08X}", data.len(), start);
    Ok(())
}

/// Write `data` at `start` one block at a time
///
/// Chunks end on block boundaries, so no program unit is shared between two
/// chunks and each unit is programmed exactly once.
fn write_by_block<B: Mmio, D: Delay>(
    flash: &mut DataFlash<B, D>,
    start: u32,
    data: &[u8],
    mut progress: impl FnMut(usize),
) -> Result<(), dflash_core::Error> {
    let geometry = *flash.geometry();
    let mut done = 0usize;
    while done < data.len() {
        let addr = start + done as u32;
        let block_end = geometry.block_address(geometry.block_of(addr) + 1);
        let len = ((block_end - addr) as usize).min(data.len() - done);

        flash.write(addr, &data[done..done + len])?;
        done += len;
        progress(done);
    }
    Ok(())
}

/// Erase every block touched by `[start, start + len)`
fn erase_range(flash: &mut Flash, start: u32, len: u32) -> Result<(), Box<dyn std::error::Error>> {
    let first = flash.block_of(start);
    let last = flash.block_of(start + len - 1);

    let pb = create_block_bar((last - first + 1) as u64, "Erasing")?;
    for block in first..=last {
        flash.erase(block)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    log::info!("Erased blocks {}..={}", first, last);
    Ok(())
}

/// Read back and compare
fn verify_range(flash: &mut Flash, start: u32, expected: &[u8]) -> Result<(), CliError> {
    let mut actual = vec![0u8; expected.len()];
    flash.read_range(start, &mut actual)?;

    match actual.iter().zip(expected).position(|(a, e)| a != e) {
        Some(i) => Err(CliError::VerifyFailed(start + i as u32)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dflash_core::family::FlashFamily;
    use dflash_core::FlashConfig;
    use dflash_sim::{SimDelay, SimFlash};

    fn started(family: FlashFamily) -> DataFlash<SimFlash, SimDelay> {
        let fclk = family.fclk_max_hz;
        let sim = SimFlash::new(family.clone());
        let mut flash = DataFlash::new(sim, SimDelay::new(), family, FlashConfig::new(fclk));
        flash.start().unwrap();
        flash
    }

    #[test]
    fn test_unaligned_write_programs_each_unit_once() {
        let mut flash = started(FlashFamily::rx62n());
        let data: Vec<u8> = (0..2049u32).map(|i| i as u8).collect();

        let before = flash.bus().commands_executed();
        let mut steps = Vec::new();
        write_by_block(&mut flash, 1, &data, |done| steps.push(done)).unwrap();

        // Bytes 1..2050 span units 0..1025 of two bytes each
        assert_eq!(flash.bus().commands_executed() - before, 1025);
        assert_eq!(steps, [2047, 2049]);

        let mut back = vec![0u8; data.len()];
        flash.read_range(1, &mut back).unwrap();
        assert_eq!(back, data);
        assert_eq!(flash.read(0), Ok(0xFF));
    }

    #[test]
    fn test_aligned_write_uses_whole_blocks() {
        let mut flash = started(FlashFamily::rx62n());
        let data = vec![0x5A; 4096];

        let mut steps = Vec::new();
        write_by_block(&mut flash, 2048, &data, |done| steps.push(done)).unwrap();
        assert_eq!(steps, [2048, 4096]);
    }
}
