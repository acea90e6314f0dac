//! Address range resolution against the detected chip.
use std::fmt;

use crate::{Chip, error::RangeError};

/// Contiguous `[address, address + length)` interval on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Range {
    pub address: usize,
    pub length: usize,
}

impl Range {
    pub const fn new(address: usize, length: usize) -> Self {
        Range { address, length }
    }

    pub const fn end(&self) -> usize {
        self.address + self.length
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "addr = 0x{:016X}, len = 0x{:016X}", self.address, self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    /// Length must be a whole number of blocks
    Erase,
    /// Read or write, any length
    Transfer,
}

/// Turns the user's `address`/`length` into a range that fits `chip`.
///
/// A zero `length` means "up to the end of the device"; with a zero address
/// that is the whole chip.
pub fn resolve(
    address: usize,
    length: usize,
    chip: &Chip,
    kind: RangeKind,
) -> Result<Range, RangeError> {
    let out_of_bounds = RangeError::OutOfBounds {
        address,
        length,
        size: chip.size,
    };
    if address > chip.size {
        return Err(out_of_bounds);
    }
    let length = if length == 0 {
        if address == 0 {
            log::info!("Defaulting to the whole chip");
        }
        chip.size - address
    } else {
        length
    };
    match address.checked_add(length) {
        Some(end) if end <= chip.size => {}
        _ => return Err(out_of_bounds),
    }

    if kind == RangeKind::Erase && chip.block_size != 0 && length % chip.block_size != 0 {
        return Err(RangeError::Misaligned {
            length,
            block_size: chip.block_size,
        });
    }
    Ok(Range { address, length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ChipKind;

    fn chip() -> Chip {
        Chip::new("TEST1M", ChipKind::Nor, 1048576, 4096)
    }

    #[test]
    fn test_full_device_default() {
        let range = resolve(0, 0, &chip(), RangeKind::Transfer).unwrap();
        assert_eq!(range, Range::new(0, 1048576));

        let range = resolve(0, 0, &chip(), RangeKind::Erase).unwrap();
        assert_eq!(range, Range::new(0, 1048576));
    }

    #[test]
    fn test_address_without_length_runs_to_end() {
        for address in [1, 4096, 0x8000, 1048575, 1048576] {
            let range = resolve(address, 0, &chip(), RangeKind::Transfer).unwrap();
            assert_eq!(range.length, 1048576 - address);
            assert_eq!(range.end(), 1048576);
        }
    }

    #[test]
    fn test_explicit_range_kept() {
        let range = resolve(0x100, 0x20, &chip(), RangeKind::Transfer).unwrap();
        assert_eq!(range, Range::new(0x100, 0x20));
        let range = resolve(0, 100, &chip(), RangeKind::Transfer).unwrap();
        assert_eq!(range, Range::new(0, 100));
    }

    #[test]
    fn test_erase_alignment() {
        assert_eq!(
            resolve(0, 5000, &chip(), RangeKind::Erase),
            Err(RangeError::Misaligned {
                length: 5000,
                block_size: 4096
            })
        );
        // 1048576 - 100 is not a multiple of 4096 either
        assert!(matches!(
            resolve(100, 0, &chip(), RangeKind::Erase),
            Err(RangeError::Misaligned { .. })
        ));
        assert_eq!(
            resolve(0x1000, 0x2000, &chip(), RangeKind::Erase),
            Ok(Range::new(0x1000, 0x2000))
        );
        // transfers have no alignment constraint
        assert!(resolve(0, 5000, &chip(), RangeKind::Transfer).is_ok());
    }

    #[test]
    fn test_out_of_bounds() {
        assert!(matches!(
            resolve(1048577, 0, &chip(), RangeKind::Transfer),
            Err(RangeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            resolve(1048576 - 10, 11, &chip(), RangeKind::Transfer),
            Err(RangeError::OutOfBounds { .. })
        ));
        assert!(matches!(
            resolve(usize::MAX, 2, &chip(), RangeKind::Transfer),
            Err(RangeError::OutOfBounds { .. })
        ));
        assert!(resolve(1048576 - 10, 10, &chip(), RangeKind::Transfer).is_ok());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Range::new(0x10, 0x200).to_string(),
            "addr = 0x0000000000000010, len = 0x0000000000000200"
        );
    }
}
