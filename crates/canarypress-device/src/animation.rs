//! Pure animation math: cadences, frame colors, and the wrap-up choreography.
//!
//! Everything here is time-free — frames carry offsets, and the runner turns
//! offsets into actual timers.

use std::time::Duration;

/// Cadence of the release progress animation.
pub const RELEASE_TICK: Duration = Duration::from_millis(200);

/// Cadence of the readiness pulse.
pub const PULSE_TICK: Duration = Duration::from_millis(500);

/// Debounce window the button collaborator applies before reporting an edge.
pub const DEBOUNCE: Duration = Duration::from_millis(50);

/// The three LED channels on the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedChannel {
    Red,
    Green,
    Blue,
}

/// A full assignment of all three channels, used by choreography frames and
/// hard resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedSet {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
}

impl LedSet {
    pub const OFF: LedSet = LedSet { red: false, green: false, blue: false };
    pub const RED: LedSet = LedSet { red: true, green: false, blue: false };
    pub const GREEN: LedSet = LedSet { red: false, green: true, blue: false };
    pub const ALL: LedSet = LedSet { red: true, green: true, blue: true };
}

/// One choreography frame: at offset `at` from the start, drive the LEDs to
/// `leds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedFrame {
    pub at: Duration,
    pub leds: LedSet,
}

/// The wrap-up choreography played when the rollout reaches 100%.
///
/// Three red/green blink pairs starting at 500/1000/1500 ms (250 ms red, then
/// 250 ms green), a full-color hold at 2000 ms, everything off at 4000 ms.
pub fn wrap_up_frames() -> Vec<TimedFrame> {
    let mut frames = Vec::with_capacity(8);
    for pulse in 1..=3u64 {
        let at = Duration::from_millis(pulse * 500);
        frames.push(TimedFrame { at, leds: LedSet::RED });
        frames.push(TimedFrame {
            at: at + Duration::from_millis(250),
            leds: LedSet::GREEN,
        });
    }
    frames.push(TimedFrame {
        at: Duration::from_millis(2000),
        leds: LedSet::ALL,
    });
    frames.push(TimedFrame {
        at: Duration::from_millis(4000),
        leds: LedSet::OFF,
    });
    frames
}

/// Whether a progress-animation step shows green (true) or blue (false).
///
/// Over a rolling ten-tick window the green share tracks how far past the
/// canary's decile the counter is.
pub fn release_step_is_green(step: u32, pct: u8) -> bool {
    step % 10 > u32::from(pct / 10)
}
