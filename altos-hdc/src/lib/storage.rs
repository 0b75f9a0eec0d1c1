mod storage_image;
mod storage_interface;
mod storage_memory;

pub use storage_image::ImageFile;
pub use storage_interface::*;
pub use storage_memory::MemoryDisk;
