use super::storage_interface::*;
use crate::geometry::{Geometry, SECTOR_BYTES};

/// A MemoryDisk is backed by memory instead of a real file.
pub struct MemoryDisk {
    geometry: Geometry,
    data: Vec<u8>,
}

impl MemoryDisk {
    /// A zero-filled disk of the given shape.
    pub fn new(geometry: Geometry) -> Self {
        MemoryDisk {
            geometry,
            data: vec![0; geometry.capacity() as usize],
        }
    }

    /// Direct access to a block of any size, bypassing the transfer checks.
    /// `None` past the end of the disk.
    pub fn block(&self, lba: u32) -> Option<&[u8]> {
        let bytes = self.geometry.bytes_per_sector as usize;
        let start = lba as usize * bytes;
        self.data.get(start..start + bytes)
    }
}

impl Storage for MemoryDisk {
    fn geometry(&self) -> Option<Geometry> {
        Some(self.geometry)
    }

    fn read(&mut self, lba: u32, buf: &mut Sector) -> StorageResult<()> {
        let start = block_offset(&self.geometry, lba)? as usize;
        buf.copy_from_slice(&self.data[start..start + SECTOR_BYTES]);
        Ok(())
    }

    fn write(&mut self, lba: u32, buf: &Sector) -> StorageResult<()> {
        let start = block_offset(&self.geometry, lba)? as usize;
        self.data[start..start + SECTOR_BYTES].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut disk = MemoryDisk::new(Geometry::native(2, 3));
        let mut block = [0; SECTOR_BYTES];
        block.iter_mut().enumerate().for_each(|(i, b)| *b = i as u8);
        disk.write(95, &block).unwrap();

        let mut readback = [0xFF; SECTOR_BYTES];
        disk.read(95, &mut readback).unwrap();
        assert_eq!(readback, block);
        disk.read(94, &mut readback).unwrap();
        assert_eq!(readback, [0; SECTOR_BYTES]);
        assert_eq!(disk.block(95), Some(&block[..]));
    }

    #[test]
    fn test_out_of_range() {
        let mut disk = MemoryDisk::new(Geometry::native(2, 3));
        let mut block = [0; SECTOR_BYTES];
        assert!(matches!(disk.read(96, &mut block),
                         Err(StorageError::OutOfRange { lba: 96, sectors: 96 })));
        assert!(matches!(disk.write(1000, &block),
                         Err(StorageError::OutOfRange { lba: 1000, .. })));
        assert_eq!(disk.block(95).map(<[u8]>::len), Some(SECTOR_BYTES));
        assert!(disk.block(96).is_none());
        assert!(disk.block(u32::MAX).is_none());
    }

    #[test]
    fn test_wrong_sector_size() {
        let geometry = Geometry { bytes_per_sector: 256, ..Geometry::native(1, 1) };
        let mut disk = MemoryDisk::new(geometry);
        let block = [0; SECTOR_BYTES];
        assert!(matches!(disk.write(0, &block), Err(StorageError::SectorSize(256))));
        let unused: [u8; 256] = disk.block(0).unwrap().try_into().unwrap();
        assert_eq!(unused, [0; 256]);
    }
}
