//! In-process peripheral: a [`Transport`] backed by the real feedback
//! runner instead of a radio link.
//!
//! The loopback owns a [`FeedbackRunner`] task with tracing-backed LEDs and
//! pumps its quantized button symbols into the controller-side
//! desired-percentage stream, framed the way the device console frames its
//! diagnostic lines. Everything the controller sees over a real link it sees
//! here, minus discovery and pairing.

use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::debug;

use canarypress_device::{feedback_runner, DeviceChannels, DeviceWrite, LedChannel, Leds, DEBOUNCE};
use canarypress_transport::{Attribute, Transport, TransportError};

const CHANNEL_DEPTH: usize = 16;

/// LED surface that renders channel changes as debug log lines.
struct TraceLeds;

impl Leds for TraceLeds {
    fn set(&mut self, channel: LedChannel, on: bool) {
        debug!(?channel, on, "led");
    }
}

/// Controller-facing half of the loopback link.
pub struct LoopbackPeripheral {
    writes: mpsc::Sender<DeviceWrite>,
    desired: Option<mpsc::Receiver<Vec<u8>>>,
    device_log: Option<mpsc::Receiver<Vec<u8>>>,
    disconnected: watch::Receiver<bool>,
}

/// Embedder-facing half: button presses and link control.
///
/// Dropping the handle closes the button channel and stops the runner, so
/// the embedder must keep it alive for the lifetime of the link.
pub struct LoopbackHandle {
    button: mpsc::Sender<()>,
    link: watch::Sender<bool>,
    last_press: Option<Instant>,
}

impl LoopbackHandle {
    /// One button edge. Edges inside the debounce window are swallowed.
    pub async fn press(&mut self) -> anyhow::Result<()> {
        let now = Instant::now();
        if let Some(last) = self.last_press {
            if now.duration_since(last) < DEBOUNCE {
                debug!("press inside the debounce window, ignored");
                return Ok(());
            }
        }
        self.last_press = Some(now);
        self.button
            .send(())
            .await
            .map_err(|_| anyhow::anyhow!("feedback runner is gone"))
    }

    /// Simulate the peripheral dropping the link.
    pub fn drop_link(&self) {
        let _ = self.link.send(true);
    }
}

/// Build the loopback link and spawn its runner and pump tasks.
pub fn loopback(shutdown: watch::Receiver<bool>) -> (LoopbackPeripheral, LoopbackHandle) {
    let (link_tx, link_rx) = watch::channel(false);
    let (runner, channels) = feedback_runner(TraceLeds, link_rx.clone(), shutdown);
    tokio::spawn(runner.run());

    let DeviceChannels {
        writes,
        button,
        symbols,
    } = channels;

    let (desired_tx, desired_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (log_tx, log_rx) = mpsc::channel(CHANNEL_DEPTH);
    tokio::spawn(pump_symbols(symbols, desired_tx, log_tx));

    (
        LoopbackPeripheral {
            writes,
            desired: Some(desired_rx),
            device_log: Some(log_rx),
            disconnected: link_rx,
        },
        LoopbackHandle {
            button,
            link: link_tx,
            last_press: None,
        },
    )
}

/// Forward runner symbols as single-byte frames, echoing each press on the
/// diagnostic stream with the console framing a real device produces.
async fn pump_symbols(
    mut symbols: mpsc::Receiver<u8>,
    desired: mpsc::Sender<Vec<u8>>,
    log: mpsc::Sender<Vec<u8>>,
) {
    while let Some(byte) = symbols.recv().await {
        let line = format!("> pressed, sent {}\n>", char::from(byte));
        if log.send(line.into_bytes()).await.is_err() {
            break;
        }
        if desired.send(vec![byte]).await.is_err() {
            break;
        }
    }
}

impl Transport for LoopbackPeripheral {
    fn subscribe(
        &mut self,
        attribute: Attribute,
    ) -> Result<mpsc::Receiver<Vec<u8>>, TransportError> {
        let stream = match attribute {
            Attribute::DesiredPercentage => self.desired.take(),
            Attribute::DeviceLog => self.device_log.take(),
            _ => None,
        };
        stream.ok_or(TransportError::Subscribe(attribute))
    }

    async fn write(&mut self, attribute: Attribute, payload: Vec<u8>) -> Result<(), TransportError> {
        let Some(&byte) = payload.first() else {
            return Err(TransportError::Write(attribute, "empty payload".into()));
        };
        let write = match attribute {
            Attribute::ReleasePercentage => DeviceWrite::Percentage(byte),
            Attribute::ReleaseReady => DeviceWrite::Ready(byte != 0),
            _ => {
                return Err(TransportError::Write(
                    attribute,
                    "attribute is not writable".into(),
                ));
            }
        };
        self.writes
            .send(write)
            .await
            .map_err(|e| TransportError::Write(attribute, e.to_string()))
    }

    fn disconnected(&self) -> watch::Receiver<bool> {
        self.disconnected.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn press_arrives_as_a_quantized_frame() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut peripheral, mut handle) = loopback(shutdown_rx);
        let mut desired = peripheral.subscribe(Attribute::DesiredPercentage).unwrap();
        let mut log = peripheral.subscribe(Attribute::DeviceLog).unwrap();

        handle.press().await.unwrap();
        assert_eq!(desired.recv().await, Some(vec![b'2']));
        let line = String::from_utf8(log.recv().await.unwrap()).unwrap();
        assert_eq!(
            canarypress_transport::strip_log_framing(&line),
            "pressed, sent 2"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn bouncing_presses_collapse_to_one_edge() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut peripheral, mut handle) = loopback(shutdown_rx);
        let mut desired = peripheral.subscribe(Attribute::DesiredPercentage).unwrap();

        handle.press().await.unwrap();
        handle.press().await.unwrap();
        assert_eq!(desired.recv().await, Some(vec![b'2']));

        tokio::time::sleep(DEBOUNCE * 2).await;
        handle.press().await.unwrap();
        assert_eq!(desired.recv().await, Some(vec![b'4']));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_is_take_once() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut peripheral, _handle) = loopback(shutdown_rx);
        assert!(peripheral.subscribe(Attribute::DesiredPercentage).is_ok());
        assert!(matches!(
            peripheral.subscribe(Attribute::DesiredPercentage),
            Err(TransportError::Subscribe(Attribute::DesiredPercentage))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_reach_the_runner() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mut peripheral, _handle) = loopback(shutdown_rx);
        peripheral
            .write(Attribute::ReleasePercentage, vec![40])
            .await
            .unwrap();
        peripheral
            .write(Attribute::ReleaseReady, vec![1])
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn drop_link_flips_the_watch() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let (peripheral, handle) = loopback(shutdown_rx);
        let mut disconnected = peripheral.disconnected();
        handle.drop_link();
        disconnected.changed().await.unwrap();
        assert!(*disconnected.borrow());
    }
}
