use std::fmt::{self, Display, Formatter};

/// The only sector size the controller's track format supports.
pub const SECTOR_BYTES: usize = 512;
/// The controller formats every track with 16 sectors.
pub const SECTORS_PER_TRACK: u16 = 16;
/// The head select register has a 4-bit head field.
pub const MAX_HEADS: u16 = 16;

/// The shape of a drive, as reported by its storage device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub heads: u16,
    pub cylinders: u16,
    pub sectors_per_track: u16,
    pub bytes_per_sector: u16,
}

impl Geometry {
    /// A geometry in the controller's native format: 16 sectors of 512 bytes.
    pub const fn native(heads: u16, cylinders: u16) -> Self {
        Geometry {
            heads,
            cylinders,
            sectors_per_track: SECTORS_PER_TRACK,
            bytes_per_sector: SECTOR_BYTES as u16,
        }
    }

    /// Total number of addressable sectors.
    pub fn total_sectors(&self) -> u64 {
        self.heads as u64 * self.cylinders as u64 * self.sectors_per_track as u64
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> u64 {
        self.total_sectors() * self.bytes_per_sector as u64
    }
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "c:{} h:{} s:{} ({} bytes/sector, {:.1} MB)",
               self.cylinders, self.heads, self.sectors_per_track,
               self.bytes_per_sector, self.capacity() as f64 / 1_000_000.0)
    }
}

/// A drive model supported by the machine's diagnostics and operating system.
#[derive(Debug)]
pub struct DriveModel {
    pub name: &'static str,
    pub heads: u16,
    pub cylinders: u16,
}

pub static DRIVE_MODELS: [DriveModel; 5] = [
    DriveModel { name: "ACS586-10", heads: 4, cylinders: 306 },
    DriveModel { name: "ACS586-20", heads: 6, cylinders: 306 },
    DriveModel { name: "ACS586-30", heads: 6, cylinders: 512 },
    DriveModel { name: "ACS586-40", heads: 8, cylinders: 512 },
    DriveModel { name: "HH-20MB", heads: 4, cylinders: 612 },
];

impl DriveModel {
    /// Look up a model by name, ignoring case.
    pub fn by_name(name: &str) -> Option<&'static DriveModel> {
        DRIVE_MODELS.iter().find(|model| model.name.eq_ignore_ascii_case(name))
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::native(self.heads, self.cylinders)
    }
}

/// One of the controller's drive positions. The geometry is captured from
/// the storage device at reset; `None` means no drive is attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveSlot {
    pub geometry: Option<Geometry>,
    pub current_cylinder: u32,
}

impl DriveSlot {
    /// A freshly reset slot for whatever media is currently attached.
    pub fn capture(geometry: Option<Geometry>) -> Self {
        DriveSlot {
            geometry,
            current_cylinder: 0,
        }
    }

    pub fn is_present(&self) -> bool {
        self.geometry.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_lookup() {
        let model = DriveModel::by_name("acs586-20").unwrap();
        assert_eq!(model.heads, 6);
        assert_eq!(model.cylinders, 306);
        assert!(DriveModel::by_name("ACS586-50").is_none());
    }

    #[test]
    fn test_capacity() {
        let geometry = DriveModel::by_name("ACS586-10").unwrap().geometry();
        assert_eq!(geometry.total_sectors(), 306 * 4 * 16);
        assert_eq!(geometry.capacity(), 306 * 4 * 16 * 512);
        assert_eq!(geometry.to_string(), "c:306 h:4 s:16 (512 bytes/sector, 10.0 MB)");

        let huge = Geometry {
            heads: u16::MAX,
            cylinders: u16::MAX,
            sectors_per_track: u16::MAX,
            bytes_per_sector: u16::MAX,
        };
        assert_eq!(huge.total_sectors(), 65535 * 65535 * 65535);
        assert_eq!(huge.capacity(), 65535 * 65535 * 65535 * 65535);
    }

    #[test]
    fn test_capture_resets_cylinder() {
        let slot = DriveSlot::capture(Some(Geometry::native(4, 306)));
        assert!(slot.is_present());
        assert_eq!(slot.current_cylinder, 0);
        assert!(!DriveSlot::capture(None).is_present());
    }
}
