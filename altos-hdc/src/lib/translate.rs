use std::error::Error;
use std::fmt::{self, Display, Formatter};

use crate::geometry::{DriveSlot, SECTOR_BYTES};

/// Reasons a CHS address can't be resolved. All of them surface to the host
/// as the record-not-found status bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateError {
    DriveNotPresent { drive: usize },
    SectorSize { bytes: u16 },
    HeadOutOfRange { head: u8, heads: u16 },
    SectorOutOfRange { sector: u8, sectors: u16 },
    Unaddressable { cylinder: u32, head: u8, sector: u8 },
}

impl Display for TranslateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            TranslateError::DriveNotPresent { drive } =>
                write!(f, "drive {} not present", drive),
            TranslateError::SectorSize { bytes } =>
                write!(f, "expected {} bytes per sector, got {}", SECTOR_BYTES, bytes),
            TranslateError::HeadOutOfRange { head, heads } =>
                write!(f, "head {} not present in drive that has {} heads", head, heads),
            TranslateError::SectorOutOfRange { sector, sectors } =>
                write!(f, "sector {} not present in drive that has {} sectors per track",
                       sector, sectors),
            TranslateError::Unaddressable { cylinder, head, sector } =>
                write!(f, "CHS={}/{}/{} is past the largest block address", cylinder, head, sector),
        }
    }
}

impl Error for TranslateError {}

/// Resolve the given head and sector on the given drive's current cylinder
/// to a linear block address.
pub fn translate(drives: &[DriveSlot], drive: usize, head: u8, sector: u8)
        -> Result<u32, TranslateError> {
    let slot = drives.get(drive)
        .ok_or(TranslateError::DriveNotPresent { drive })?;
    let geometry = slot.geometry
        .ok_or(TranslateError::DriveNotPresent { drive })?;

    if geometry.bytes_per_sector as usize != SECTOR_BYTES {
        return Err(TranslateError::SectorSize { bytes: geometry.bytes_per_sector });
    }
    // The head select register accepts a head equal to the head count, so
    // translation does too.
    if head as u16 > geometry.heads {
        return Err(TranslateError::HeadOutOfRange { head, heads: geometry.heads });
    }
    if sector as u16 >= geometry.sectors_per_track {
        return Err(TranslateError::SectorOutOfRange {
            sector,
            sectors: geometry.sectors_per_track,
        });
    }

    let cylinder = slot.current_cylinder;
    let track = cylinder as u64 * geometry.heads as u64 + head as u64;
    let lba = track * geometry.sectors_per_track as u64 + sector as u64;
    u32::try_from(lba).map_err(|_| TranslateError::Unaddressable { cylinder, head, sector })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn drives(cylinder: u32) -> [DriveSlot; 2] {
        let mut slot = DriveSlot::capture(Some(Geometry::native(4, 306)));
        slot.current_cylinder = cylinder;
        [slot, DriveSlot::capture(None)]
    }

    #[test]
    fn test_known_address() {
        assert_eq!(translate(&drives(10), 0, 2, 5), Ok(677));
        assert_eq!(translate(&drives(0), 0, 0, 0), Ok(0));
    }

    #[test]
    fn test_chs_order() {
        // Every step in cylinder, head, sector order must produce a strictly
        // increasing address.
        let mut last = None;
        for cylinder in 0..3 {
            let slots = drives(cylinder);
            for head in 0..4 {
                for sector in 0..16 {
                    let lba = translate(&slots, 0, head, sector).unwrap();
                    if let Some(last) = last {
                        assert!(lba > last, "{} after {} at {}/{}/{}",
                                lba, last, cylinder, head, sector);
                    }
                    last = Some(lba);
                }
            }
        }
        assert_eq!(last, Some(3 * 4 * 16 - 1));
    }

    #[test]
    fn test_absent_drive() {
        assert_eq!(translate(&drives(0), 1, 0, 0),
                   Err(TranslateError::DriveNotPresent { drive: 1 }));
        assert_eq!(translate(&drives(0), 7, 0, 0),
                   Err(TranslateError::DriveNotPresent { drive: 7 }));
    }

    #[test]
    fn test_sector_size() {
        let mut slots = drives(0);
        slots[0].geometry = Some(Geometry { bytes_per_sector: 256, ..Geometry::native(4, 306) });
        assert_eq!(translate(&slots, 0, 0, 0),
                   Err(TranslateError::SectorSize { bytes: 256 }));
    }

    #[test]
    fn test_bounds() {
        let slots = drives(0);
        assert!(translate(&slots, 0, 4, 0).is_ok());
        assert_eq!(translate(&slots, 0, 5, 0),
                   Err(TranslateError::HeadOutOfRange { head: 5, heads: 4 }));
        assert!(translate(&slots, 0, 0, 15).is_ok());
        assert_eq!(translate(&slots, 0, 0, 16),
                   Err(TranslateError::SectorOutOfRange { sector: 16, sectors: 16 }));
    }

    #[test]
    fn test_unaddressable() {
        let geometry = Geometry {
            sectors_per_track: u16::MAX,
            ..Geometry::native(16, u16::MAX)
        };
        let mut slots = drives(0);
        slots[0].geometry = Some(geometry);
        slots[0].current_cylinder = 4000;
        assert_eq!(translate(&slots, 0, 16, 200), Ok((4000 * 16 + 16) * 65535 + 200));
        slots[0].current_cylinder = 65535;
        assert_eq!(translate(&slots, 0, 16, 0),
                   Err(TranslateError::Unaddressable { cylinder: 65535, head: 16, sector: 0 }));
    }
}
