use altos_utils::be_io::{ReadBE, WriteBE};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::storage_interface::*;
use crate::geometry::{Geometry, MAX_HEADS};

/// Magic number at the start of every image file.
pub const IMAGE_MAGIC: [u8; 4] = *b"A586";
/// Header layout: magic, heads, cylinders, sectors per track, bytes per
/// sector, then four reserved bytes. All integers are big-endian.
pub const IMAGE_HEADER_BYTES: u64 = 16;

/// A disk image on the host filesystem: a small geometry header followed by
/// the raw sectors in LBA order.
pub struct ImageFile {
    path: PathBuf,
    file: File,
    geometry: Geometry,
}

impl ImageFile {
    /// Create a new zero-filled image. Fails if the file already exists.
    pub fn create(path: impl Into<PathBuf>, geometry: Geometry) -> StorageResult<Self> {
        let path = path.into();
        check_geometry(&geometry)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        write_header(&mut file, &geometry)?;
        file.set_len(IMAGE_HEADER_BYTES + geometry.capacity())?;
        info!("Created disk image '{}': {}", path.display(), geometry);
        Ok(ImageFile { path, file, geometry })
    }

    /// Open an existing image for reading and writing.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        let geometry = read_header(&mut file)?;

        let expected = IMAGE_HEADER_BYTES + geometry.capacity();
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(StorageError::BadImage(format!(
                "expected {} bytes for {}, found {}", expected, geometry, actual)));
        }
        info!("Opened disk image '{}': {}", path.display(), geometry);
        Ok(ImageFile { path, file, geometry })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for ImageFile {
    fn geometry(&self) -> Option<Geometry> {
        Some(self.geometry)
    }

    fn read(&mut self, lba: u32, buf: &mut Sector) -> StorageResult<()> {
        let offset = block_offset(&self.geometry, lba)?;
        self.file.seek(SeekFrom::Start(IMAGE_HEADER_BYTES + offset))?;
        self.file.read_exact(buf)?;
        debug!("Read block {} from '{}'", lba, self.path.display());
        Ok(())
    }

    fn write(&mut self, lba: u32, buf: &Sector) -> StorageResult<()> {
        let offset = block_offset(&self.geometry, lba)?;
        self.file.seek(SeekFrom::Start(IMAGE_HEADER_BYTES + offset))?;
        self.file.write_all(buf)?;
        debug!("Wrote block {} to '{}'", lba, self.path.display());
        Ok(())
    }
}

fn check_geometry(geometry: &Geometry) -> StorageResult<()> {
    if geometry.total_sectors() == 0 || geometry.bytes_per_sector == 0 {
        return Err(StorageError::BadImage(format!("empty geometry {}", geometry)));
    }
    if geometry.heads > MAX_HEADS {
        return Err(StorageError::BadImage(format!(
            "{} heads, the controller can only select {}", geometry.heads, MAX_HEADS)));
    }
    Ok(())
}

fn write_header(out: &mut impl Write, geometry: &Geometry) -> io::Result<()> {
    out.write_all(&IMAGE_MAGIC)?;
    out.write_be_u16(geometry.heads)?;
    out.write_be_u16(geometry.cylinders)?;
    out.write_be_u16(geometry.sectors_per_track)?;
    out.write_be_u16(geometry.bytes_per_sector)?;
    out.write_be_u32(0)
}

fn read_header(input: &mut impl Read) -> StorageResult<Geometry> {
    // A short read here means the file is too small to be an image at all.
    fn truncated(e: io::Error) -> StorageError {
        match e.kind() {
            io::ErrorKind::UnexpectedEof =>
                StorageError::BadImage("truncated header".to_string()),
            _ => StorageError::Io(e),
        }
    }

    let magic: [u8; 4] = input.read_tag().map_err(truncated)?;
    if magic != IMAGE_MAGIC {
        return Err(StorageError::BadImage(format!("bad magic {:02X?}", magic)));
    }
    let geometry = Geometry {
        heads: input.read_be_u16().map_err(truncated)?,
        cylinders: input.read_be_u16().map_err(truncated)?,
        sectors_per_track: input.read_be_u16().map_err(truncated)?,
        bytes_per_sector: input.read_be_u16().map_err(truncated)?,
    };
    let _reserved = input.read_be_u32().map_err(truncated)?;
    check_geometry(&geometry)?;
    Ok(geometry)
}
