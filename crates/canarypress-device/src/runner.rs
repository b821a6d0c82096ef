//! Async shell around the feedback machine.
//!
//! One task owns the LED hardware and serializes every write to it. The
//! release animation, readiness pulse, and wrap-up choreography stay
//! independent chains, but they can no longer interleave mid-write: within
//! this task the last write wins deterministically.

use std::collections::VecDeque;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::debug;

use crate::animation::{LedChannel, LedSet, TimedFrame, PULSE_TICK, RELEASE_TICK};
use crate::machine::{FeedbackMachine, Reaction, ReleaseWrite};

const CHANNEL_DEPTH: usize = 16;

/// LED hardware seam. Implementations set one channel at a time, matching
/// the peripheral driver surface.
pub trait Leds {
    fn set(&mut self, channel: LedChannel, on: bool);
}

/// Inbound writes from the controller, already decoded to bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceWrite {
    Percentage(u8),
    Ready(bool),
}

/// Handles the embedding code uses to talk to a running [`FeedbackRunner`].
pub struct DeviceChannels {
    /// Inbound percentage/readiness writes.
    pub writes: mpsc::Sender<DeviceWrite>,
    /// Debounced button edges.
    pub button: mpsc::Sender<()>,
    /// Outbound quantized desired-percentage bytes.
    pub symbols: mpsc::Receiver<u8>,
}

/// Owns the machine, the LED resource, and all animation timing.
pub struct FeedbackRunner<L: Leds> {
    machine: FeedbackMachine,
    leds: L,
    writes: mpsc::Receiver<DeviceWrite>,
    button: mpsc::Receiver<()>,
    symbols: mpsc::Sender<u8>,
    disconnected: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
}

/// Build a runner and the channel handles for its embedder.
pub fn feedback_runner<L: Leds>(
    leds: L,
    disconnected: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
) -> (FeedbackRunner<L>, DeviceChannels) {
    let (writes_tx, writes_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (button_tx, button_rx) = mpsc::channel(CHANNEL_DEPTH);
    let (symbols_tx, symbols_rx) = mpsc::channel(CHANNEL_DEPTH);
    (
        FeedbackRunner {
            machine: FeedbackMachine::new(),
            leds,
            writes: writes_rx,
            button: button_rx,
            symbols: symbols_tx,
            disconnected,
            shutdown,
        },
        DeviceChannels {
            writes: writes_tx,
            button: button_tx,
            symbols: symbols_rx,
        },
    )
}

impl<L: Leds> FeedbackRunner<L> {
    /// Drive the machine until shutdown. LEDs are left dark on exit.
    pub async fn run(mut self) {
        let mut release_cadence = interval(RELEASE_TICK);
        release_cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pulse_cadence = interval(PULSE_TICK);
        pulse_cadence.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Wrap-up frames pending playback, offsets relative to `base`.
        let mut pending: VecDeque<TimedFrame> = VecDeque::new();
        let mut base = Instant::now();

        loop {
            let frame_deadline = pending.front().map(|f| base + f.at);

            tokio::select! {
                _ = release_cadence.tick() => {
                    match self.machine.release_tick() {
                        Some(ReleaseWrite::Frame { green }) => {
                            self.leds.set(LedChannel::Green, green);
                            self.leds.set(LedChannel::Blue, !green);
                        }
                        Some(ReleaseWrite::Off) => self.set_all(LedSet::OFF),
                        None => {}
                    }
                }
                _ = pulse_cadence.tick() => {
                    if let Some(red) = self.machine.pulse_tick() {
                        self.leds.set(LedChannel::Red, red);
                    }
                }
                _ = next_frame(frame_deadline) => {
                    if let Some(frame) = pending.pop_front() {
                        self.set_all(frame.leds);
                    }
                    if pending.is_empty() {
                        self.machine.finish_wrap_up();
                    }
                }
                write = self.writes.recv() => {
                    let Some(write) = write else { break };
                    match write {
                        DeviceWrite::Percentage(pct) => {
                            if let Reaction::WrapUp(frames) = self.machine.apply_percentage(pct) {
                                base = Instant::now();
                                pending = frames.into();
                            }
                        }
                        DeviceWrite::Ready(ready) => self.machine.apply_ready(ready),
                    }
                }
                edge = self.button.recv() => {
                    let Some(()) = edge else { break };
                    let symbol = self.machine.press();
                    if self.symbols.send(symbol.as_byte()).await.is_err() {
                        break;
                    }
                }
                _ = self.disconnected.changed() => {
                    if *self.disconnected.borrow() {
                        self.machine.disconnect();
                        self.set_all(LedSet::OFF);
                        // Already-queued wrap-up frames still play out.
                    }
                }
                _ = self.shutdown.changed() => {
                    debug!("feedback runner shutting down");
                    break;
                }
            }
        }
        self.set_all(LedSet::OFF);
    }

    fn set_all(&mut self, leds: LedSet) {
        self.leds.set(LedChannel::Red, leds.red);
        self.leds.set(LedChannel::Green, leds.green);
        self.leds.set(LedChannel::Blue, leds.blue);
    }
}

/// Resolves at the next choreography frame, or never when none is queued.
async fn next_frame(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
