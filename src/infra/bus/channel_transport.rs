use crate::core::bus::{BusError, BusTransport};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Bus transport over an in-process channel.
///
/// The receiving half is handed to whatever forwards frames to the other clusters.
/// A single-process deployment loops it straight back into the sync handler.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: UnboundedSender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl BusTransport for ChannelTransport {
    fn send(&self, frame: Vec<u8>) -> Result<(), BusError> {
        self.tx.send(frame).map_err(|_| BusError::Closed)
    }
}
