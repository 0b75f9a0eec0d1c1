use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::geometry::{Geometry, SECTOR_BYTES};

/// A sector's worth of data.
pub type Sector = [u8; SECTOR_BYTES];

/// Failure of a storage device transfer.
#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    NoMedia,
    OutOfRange { lba: u32, sectors: u64 },
    SectorSize(u16),
    BadImage(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "IO error: {}", e),
            StorageError::NoMedia => write!(f, "no media attached"),
            StorageError::OutOfRange { lba, sectors } =>
                write!(f, "block {} is past the end of a {}-sector device", lba, sectors),
            StorageError::SectorSize(bytes) =>
                write!(f, "can't transfer {}-byte sectors", bytes),
            StorageError::BadImage(desc) => write!(f, "bad disk image: {}", desc),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// A block device attached to one of the controller's drive positions.
/// Transfers are synchronous, one sector at a time.
pub trait Storage {
    /// The geometry of the attached media, or `None` if there is none.
    fn geometry(&self) -> Option<Geometry>;
    fn read(&mut self, lba: u32, buf: &mut Sector) -> StorageResult<()>;
    fn write(&mut self, lba: u32, buf: &Sector) -> StorageResult<()>;
}

/// A drive position that may be empty.
impl<T: Storage> Storage for Option<T> {
    fn geometry(&self) -> Option<Geometry> {
        self.as_ref().and_then(|storage| storage.geometry())
    }

    fn read(&mut self, lba: u32, buf: &mut Sector) -> StorageResult<()> {
        match self {
            Some(storage) => storage.read(lba, buf),
            None => Err(StorageError::NoMedia),
        }
    }

    fn write(&mut self, lba: u32, buf: &Sector) -> StorageResult<()> {
        match self {
            Some(storage) => storage.write(lba, buf),
            None => Err(StorageError::NoMedia),
        }
    }
}

/// Check a transfer against the device bounds, returning the byte offset of
/// the block.
pub(super) fn block_offset(geometry: &Geometry, lba: u32) -> StorageResult<u64> {
    if geometry.bytes_per_sector as usize != SECTOR_BYTES {
        return Err(StorageError::SectorSize(geometry.bytes_per_sector));
    }
    let sectors = geometry.total_sectors();
    if lba as u64 >= sectors {
        return Err(StorageError::OutOfRange { lba, sectors });
    }
    Ok(lba as u64 * SECTOR_BYTES as u64)
}
