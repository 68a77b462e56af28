//! Decomposition of arbitrary byte ranges into aligned program units
//!
//! The FCU only programs whole, aligned units of `program_unit` bytes. A
//! write that starts or ends inside a unit is padded with the erased value,
//! which leaves the neighbouring bytes untouched under AND-programming.

use crate::family::{ERASED_BYTE, MAX_PROGRAM_UNIT};

/// One aligned program unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramUnit {
    /// Array offset of the unit, aligned to the unit size
    pub addr: u32,
    buf: [u8; MAX_PROGRAM_UNIT],
    len: usize,
}

impl ProgramUnit {
    /// Bytes to program, padding included
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Iterator over the program units covering `[dest, dest + src.len())`
#[derive(Debug, Clone)]
pub struct PendingWrite<'a> {
    src: &'a [u8],
    dest: u32,
    unit: u32,
    next: u32,
    end: u32,
}

impl<'a> PendingWrite<'a> {
    /// Stage `src` for programming at array offset `dest`
    ///
    /// `unit` must be 1, 2 or 4 and `dest + src.len()` must fit in `u32`.
    pub fn new(dest: u32, src: &'a [u8], unit: u32) -> Self {
        debug_assert!(matches!(unit, 1 | 2 | 4));
        let unit = unit.clamp(1, MAX_PROGRAM_UNIT as u32);
        Self {
            src,
            dest,
            unit,
            next: dest - dest % unit,
            end: dest + src.len() as u32,
        }
    }

    /// Number of units left
    pub fn remaining(&self) -> usize {
        if self.next >= self.end {
            0
        } else {
            (self.end - self.next).div_ceil(self.unit) as usize
        }
    }
}

impl Iterator for PendingWrite<'_> {
    type Item = ProgramUnit;

    fn next(&mut self) -> Option<ProgramUnit> {
        if self.next >= self.end {
            return None;
        }

        let addr = self.next;
        let mut buf = [ERASED_BYTE; MAX_PROGRAM_UNIT];
        for (i, byte) in buf.iter_mut().take(self.unit as usize).enumerate() {
            let a = addr + i as u32;
            if a >= self.dest && a < self.end {
                *byte = self.src[(a - self.dest) as usize];
            }
        }

        self.next += self.unit;
        Some(ProgramUnit {
            addr,
            buf,
            len: self.unit as usize,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for PendingWrite<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;
    use std::vec::Vec;

    fn units(dest: u32, src: &[u8], unit: u32) -> Vec<(u32, Vec<u8>)> {
        PendingWrite::new(dest, src, unit)
            .map(|u| (u.addr, u.bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_aligned() {
        assert_eq!(
            units(0, &[0xDE, 0xAD, 0xBE, 0xEF], 2),
            [(0, vec![0xDE, 0xAD]), (2, vec![0xBE, 0xEF])]
        );
    }

    #[test]
    fn test_odd_single_byte() {
        assert_eq!(units(1, &[0x99], 2), [(0, vec![0xFF, 0x99])]);
    }

    #[test]
    fn test_both_ends_padded() {
        assert_eq!(
            units(3, &[1, 2, 3, 4, 5, 6], 4),
            [(0, vec![0xFF, 0xFF, 0xFF, 1]), (4, vec![2, 3, 4, 5]), (8, vec![6, 0xFF, 0xFF, 0xFF])]
        );
    }

    #[test]
    fn test_byte_units() {
        assert_eq!(units(5, &[7, 8], 1), [(5, vec![7]), (6, vec![8])]);
    }

    #[test]
    fn test_empty() {
        assert!(units(4, &[], 2).is_empty());
        assert_eq!(PendingWrite::new(4, &[], 2).len(), 0);
    }

    #[test]
    fn test_len() {
        assert_eq!(PendingWrite::new(1, &[0; 4], 2).len(), 3);
        assert_eq!(PendingWrite::new(0, &[0; 4], 4).len(), 1);
    }
}
