use log::trace;

use crate::controller::Controller;
use crate::host::{HostBusError, HostIoMap, HostMemory, HostPort};
use crate::iop::IoProcessor;
use crate::iospace::IoSpace;
use crate::storage::Storage;

/// The whole controller board as wired into the machine: the I/O
/// processor's I/O space on one side, the host's I/O space and memory on the
/// other.
pub struct Board<S, P, M> {
    io_space: IoSpace<S, P>,
    host_io: HostIoMap,
    memory: M,
}

impl<S: Storage, P: IoProcessor, M: HostMemory> Board<S, P, M> {
    /// Build the board and attach its controller to a fresh host bus.
    pub fn new(controller: Controller<S, P>, memory: M) -> Result<Self, HostBusError> {
        let mut host_io = HostIoMap::new();
        controller.attach(&mut host_io)?;
        Ok(Board {
            io_space: IoSpace::new(controller),
            host_io,
            memory,
        })
    }

    pub fn controller(&self) -> &Controller<S, P> {
        self.io_space.controller()
    }

    pub fn controller_mut(&mut self) -> &mut Controller<S, P> {
        self.io_space.controller_mut()
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    /// A write from the host processor to its I/O space. Returns whether
    /// anything on the board claimed it.
    pub fn host_write(&mut self, address: u32, value: u16) -> bool {
        match self.host_io.decode(address) {
            Some(HostPort::ChannelAttention) => {
                self.io_space.controller_mut().attention_w(value);
                true
            }
            None => {
                trace!("Host I/O write to {:#06X} not for us", address);
                false
            }
        }
    }

    pub fn iop_load_io(&mut self, address: u32) -> u16 {
        self.io_space.load_io(address)
    }

    pub fn iop_store_io(&mut self, address: u32, value: u16) {
        self.io_space.store_io(address, value)
    }

    /// The I/O processor's memory bus is a window onto host memory, one word
    /// per offset.
    pub fn iop_load_mem(&self, offset: u32) -> u16 {
        self.memory.read_word(offset << 1)
    }

    pub fn iop_store_mem(&mut self, offset: u32, value: u16) {
        self.memory.write_word(offset << 1, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::{self, Receiver};

    use crate::controller::ATTENTION_PORT;
    use crate::geometry::Geometry;
    use crate::host::VecMemory;
    use crate::init_test_logging;
    use crate::iop::{ChannelIop, IopSignal};
    use crate::storage::MemoryDisk;

    type TestBoard = Board<Option<MemoryDisk>, ChannelIop, VecMemory>;

    fn board() -> (TestBoard, Receiver<IopSignal>) {
        init_test_logging();
        let (tx, rx) = mpsc::channel();
        let controller = Controller::new(
            ChannelIop::new(tx), Some(MemoryDisk::new(Geometry::native(6, 306))), None);
        assert_eq!(rx.try_recv(), Ok(IopSignal::DataRequest(false)));
        (Board::new(controller, VecMemory::new(0x1000)).unwrap(), rx)
    }

    #[test]
    fn test_attention() {
        let (mut board, rx) = board();
        assert!(board.host_write(*ATTENTION_PORT.start(), 0));
        assert!(board.host_write(*ATTENTION_PORT.end(), 0xFFFF));
        assert!(!board.host_write(0xFF02, 0));
        assert!(!board.host_write(0x0000, 0));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(),
                   vec![IopSignal::ChannelAttention, IopSignal::ChannelAttention]);
    }

    #[test]
    fn test_memory_window() {
        let (mut board, _rx) = board();
        board.iop_store_mem(0x10, 0xCAFE);
        assert_eq!(board.memory().read_word(0x20), 0xCAFE);
        assert_eq!(board.iop_load_mem(0x10), 0xCAFE);
        assert_eq!(board.iop_load_mem(0x11), 0);
        assert_eq!(board.iop_load_mem(0x800), 0xFFFF);
    }

    #[test]
    fn test_io_passthrough() {
        let (mut board, _rx) = board();
        board.iop_store_io(0xFFD2, 0x15);
        assert_eq!(board.controller().selected_head(), 5);
        assert_eq!(board.iop_load_io(0xFFD6), 0x80);
        board.iop_store_io(0x0040, 0x0102);
        assert_eq!(board.iop_load_io(0x0040), 0x0102);
    }
}
