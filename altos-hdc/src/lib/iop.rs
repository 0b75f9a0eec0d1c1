use log::warn;
use std::sync::mpsc::Sender;

/// Signals the controller drives into the I/O processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IopSignal {
    /// The data request line changed to the given level.
    DataRequest(bool),
    /// A pulse on the channel attention input.
    ChannelAttention,
}

/// The I/O processor that runs the controller's channel programs. The
/// controller only ever drives its inputs.
pub trait IoProcessor {
    fn set_data_request(&mut self, asserted: bool);
    fn channel_attention(&mut self);
}

/// An I/O processor at the other end of a channel.
pub struct ChannelIop {
    signal_tx: Sender<IopSignal>,
}

impl ChannelIop {
    pub fn new(signal_tx: Sender<IopSignal>) -> Self {
        ChannelIop { signal_tx }
    }

    fn send(&self, signal: IopSignal) {
        if self.signal_tx.send(signal).is_err() {
            warn!("I/O processor disconnected, dropping {:?}", signal);
        }
    }
}

impl IoProcessor for ChannelIop {
    fn set_data_request(&mut self, asserted: bool) {
        self.send(IopSignal::DataRequest(asserted));
    }

    fn channel_attention(&mut self) {
        self.send(IopSignal::ChannelAttention);
    }
}
