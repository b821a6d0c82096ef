//! In-memory transport double.
//!
//! Used by the controller integration tests and by the daemon's loopback
//! peripheral. The harness half plays the device: it injects notify frames
//! and observes what the controller wrote.

use std::collections::HashMap;

use tokio::sync::{mpsc, watch};

use crate::{Attribute, Transport, TransportError};

const CHANNEL_DEPTH: usize = 16;

const ALL_ATTRIBUTES: [Attribute; 4] = [
    Attribute::DesiredPercentage,
    Attribute::ReleasePercentage,
    Attribute::ReleaseReady,
    Attribute::DeviceLog,
];

/// Controller-side half: implements [`Transport`] over in-process channels.
pub struct MockTransport {
    inbound: HashMap<Attribute, mpsc::Receiver<Vec<u8>>>,
    writes: mpsc::UnboundedSender<(Attribute, Vec<u8>)>,
    disconnected: watch::Receiver<bool>,
}

/// Device-side half: injects frames, records writes, drops the link.
pub struct MockHarness {
    inbound: HashMap<Attribute, mpsc::Sender<Vec<u8>>>,
    writes: mpsc::UnboundedReceiver<(Attribute, Vec<u8>)>,
    disconnect: watch::Sender<bool>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHarness) {
        let mut receivers = HashMap::new();
        let mut senders = HashMap::new();
        for attribute in ALL_ATTRIBUTES {
            let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
            senders.insert(attribute, tx);
            receivers.insert(attribute, rx);
        }
        let (writes_tx, writes_rx) = mpsc::unbounded_channel();
        let (disconnect_tx, disconnect_rx) = watch::channel(false);
        (
            Self {
                inbound: receivers,
                writes: writes_tx,
                disconnected: disconnect_rx,
            },
            MockHarness {
                inbound: senders,
                writes: writes_rx,
                disconnect: disconnect_tx,
            },
        )
    }
}

impl Transport for MockTransport {
    fn subscribe(
        &mut self,
        attribute: Attribute,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        self.inbound
            .remove(&attribute)
            .ok_or(TransportError::Subscribe(attribute))
    }

    async fn write(
        &mut self,
        attribute: Attribute,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.writes
            .send((attribute, payload))
            .map_err(|e| TransportError::Write(attribute, e.to_string()))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnected.clone()
    }
}

impl MockHarness {
    /// Deliver a notify frame on an inbound attribute.
    pub async fn notify(&self, attribute: Attribute, payload: Vec<u8>) {
        self.inbound[&attribute]
            .send(payload)
            .await
            .expect("transport half dropped");
    }

    /// Next write the controller performed, in order.
    pub async fn next_write(&mut self) -> (Attribute, Vec<u8>) {
        self.writes.recv().await.expect("transport half dropped")
    }

    /// Non-blocking variant of [`next_write`](Self::next_write).
    pub fn try_next_write(&mut self) -> Option<(Attribute, Vec<u8>)> {
        self.writes.try_recv().ok()
    }

    /// Simulate the peripheral dropping the link.
    pub fn drop_link(&self) {
        let _ = self.disconnect.send(true);
    }
}
