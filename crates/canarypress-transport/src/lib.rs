//! Device channel abstraction.
//!
//! The peripheral exposes four logical attributes: an inbound notify stream
//! for the desired percentage, outbound writes for the release percentage and
//! readiness flag, and a pass-through diagnostic log stream. Discovery,
//! pairing, and characteristic subscription live outside this crate; the
//! [`Transport`] trait is the seam the controller programs against, and
//! [`mock::MockTransport`] is the in-memory double used by tests.

use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub mod mock;

/// Logical attributes on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Inbound, notify: quantized desired-percentage character.
    DesiredPercentage,
    /// Outbound, write: raw release percentage byte.
    ReleasePercentage,
    /// Outbound, write: readiness flag byte.
    ReleaseReady,
    /// Inbound, notify: free-text diagnostic lines from the device console.
    DeviceLog,
}

impl Attribute {
    /// Characteristic id fragment the attribute maps to on the wire.
    pub fn characteristic(self) -> &'static str {
        match self {
            Attribute::DesiredPercentage => "abce",
            Attribute::ReleasePercentage => "abcf",
            Attribute::ReleaseReady => "abcd",
            Attribute::DeviceLog => "6e400003",
        }
    }
}

/// Transport failures. Connect and subscribe failures are fatal to the
/// controller process; there is no reconnect logic at this layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to peripheral: {0}")]
    Connect(String),
    #[error("failed to subscribe to {0:?}")]
    Subscribe(Attribute),
    #[error("write to {0:?} failed: {1}")]
    Write(Attribute, String),
}

/// Byte-level channel to the peripheral.
///
/// `subscribe` hands out the notify stream for an attribute at most once;
/// asking twice is a caller bug and surfaces as [`TransportError::Subscribe`].
pub trait Transport: Send {
    /// Take the inbound notify stream for an attribute.
    fn subscribe(&mut self, attribute: Attribute)
    -> Result<mpsc::Receiver<Vec<u8>>, TransportError>;

    /// Write a payload to an outbound attribute.
    fn write(
        &mut self,
        attribute: Attribute,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Watch channel that flips to `true` when the peripheral drops the link.
    fn disconnected(&self) -> watch::Receiver<bool>;
}

/// Strip the console framing from a device log line.
///
/// The device console echoes lines wrapped in a `"> "` prefix and a trailing
/// `"\n>"` prompt; both must go before the line is shown to a human.
pub fn strip_log_framing(raw: &str) -> &str {
    let s = raw.strip_prefix("> ").unwrap_or(raw);
    s.strip_suffix("\n>").unwrap_or(s)
}
