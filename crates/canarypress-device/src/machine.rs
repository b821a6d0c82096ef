//! Feedback state machine.
//!
//! Pure transitions over an explicit [`DeviceState`]; timers live in the
//! runner. The release animation and the readiness pulse are orthogonal
//! chains gated by flags: a cleared flag makes the chain's next tick emit a
//! final "off" write and then go quiet, so termination always costs one more
//! tick, never an immediate cancel.

use tracing::debug;

use canarypress_codec::{quantize, WireSymbol};

use crate::animation::{release_step_is_green, wrap_up_frames, TimedFrame};

/// How far each button press advances the desired percentage.
const PRESS_STEP: u8 = 20;

/// Top-level display state. The readiness pulse is tracked separately since
/// it runs concurrently with any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Idle,
    /// Progress animation running for the current display percentage.
    Releasing,
    /// Wrap-up choreography in flight. Not cancelable once started.
    WrappingUp,
}

/// What an inbound write asks the runner to do beyond plain LED ticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    None,
    /// Play the wrap-up choreography from its first frame.
    WrapUp(Vec<TimedFrame>),
}

/// LED output of one release-animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseWrite {
    /// Progress frame: green on and blue off, or the reverse.
    Frame { green: bool },
    /// Terminal write: all channels off.
    Off,
}

/// The device-side state machine.
#[derive(Debug, Default)]
pub struct FeedbackMachine {
    state: DeviceState,
    display_pct: u8,
    step: u32,
    ready_pulsing: bool,
    red_on: bool,
}

impl FeedbackMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn display_pct(&self) -> u8 {
        self.display_pct
    }

    /// Handle a debounced button edge.
    ///
    /// Advances the local display optimistically — no backend confirmation is
    /// awaited — cancels the readiness pulse, and returns the quantized
    /// symbol to transmit.
    pub fn press(&mut self) -> WireSymbol {
        let desired = self.display_pct.saturating_add(PRESS_STEP).min(100);
        self.display_pct = desired;
        self.ready_pulsing = false;
        debug!(desired, "button press");
        quantize(desired)
    }

    /// Handle an inbound release-percentage write.
    ///
    /// 100 starts the wrap-up and resets the display synchronously; a value
    /// in (0, 100) (re)starts the progress animation; 0 lets a running
    /// animation observe it and shut itself off on its next tick.
    pub fn apply_percentage(&mut self, pct: u8) -> Reaction {
        if self.state == DeviceState::WrappingUp {
            debug!(pct, "ignoring percentage write during wrap-up");
            return Reaction::None;
        }
        if pct >= 100 {
            self.state = DeviceState::WrappingUp;
            self.display_pct = 0;
            self.step = 0;
            return Reaction::WrapUp(wrap_up_frames());
        }
        self.display_pct = pct;
        if pct > 0 {
            self.state = DeviceState::Releasing;
            self.ready_pulsing = false;
        }
        Reaction::None
    }

    /// Handle an inbound readiness write. Setting the flag starts the pulse
    /// on the next pulse tick; clearing it ends the pulse one tick later.
    pub fn apply_ready(&mut self, ready: bool) {
        self.ready_pulsing = ready;
    }

    /// One step of the release animation cadence.
    pub fn release_tick(&mut self) -> Option<ReleaseWrite> {
        if self.state != DeviceState::Releasing {
            return None;
        }
        if self.display_pct == 0 {
            self.state = DeviceState::Idle;
            self.step = 0;
            return Some(ReleaseWrite::Off);
        }
        self.step = self.step.wrapping_add(1);
        Some(ReleaseWrite::Frame {
            green: release_step_is_green(self.step, self.display_pct),
        })
    }

    /// One step of the readiness pulse cadence. Returns the new red-channel
    /// state, or `None` when the pulse is fully off.
    pub fn pulse_tick(&mut self) -> Option<bool> {
        if self.ready_pulsing {
            self.red_on = !self.red_on;
            Some(self.red_on)
        } else if self.red_on {
            self.red_on = false;
            Some(false)
        } else {
            None
        }
    }

    /// The wrap-up choreography finished playing.
    pub fn finish_wrap_up(&mut self) {
        if self.state == DeviceState::WrappingUp {
            self.state = DeviceState::Idle;
        }
    }

    /// Hard reset on link loss: display cleared, both animation flags
    /// dropped. The caller turns the LEDs off.
    pub fn disconnect(&mut self) {
        debug!("link lost, resetting");
        self.state = DeviceState::Idle;
        self.display_pct = 0;
        self.step = 0;
        self.ready_pulsing = false;
        self.red_on = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canarypress_codec::{decode, Command};

    #[test]
    fn presses_step_by_twenty() {
        let mut machine = FeedbackMachine::new();
        assert_eq!(machine.press(), WireSymbol::Digit(2));
        assert_eq!(machine.display_pct(), 20);
        assert_eq!(machine.press(), WireSymbol::Digit(4));
        assert_eq!(machine.display_pct(), 40);
        assert_eq!(machine.press(), WireSymbol::Digit(6));
        assert_eq!(machine.display_pct(), 60);
    }

    #[test]
    fn press_from_eighty_transmits_the_sentinel() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(80);
        let symbol = machine.press();
        assert_eq!(symbol, WireSymbol::Complete);
        assert_eq!(machine.display_pct(), 100);
        assert_eq!(decode(symbol.as_byte()), Ok(Command::Complete));
    }

    #[test]
    fn press_caps_at_one_hundred() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(95);
        machine.press();
        assert_eq!(machine.display_pct(), 100);
    }

    #[test]
    fn press_cancels_the_readiness_pulse() {
        let mut machine = FeedbackMachine::new();
        machine.apply_ready(true);
        assert_eq!(machine.pulse_tick(), Some(true));

        machine.press();
        // One more tick to emit the final off, then quiet.
        assert_eq!(machine.pulse_tick(), Some(false));
        assert_eq!(machine.pulse_tick(), None);
    }

    #[test]
    fn full_write_starts_wrap_up_and_resets_display() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(80);
        assert_eq!(machine.display_pct(), 80);

        let reaction = machine.apply_percentage(100);
        let Reaction::WrapUp(frames) = reaction else {
            panic!("expected wrap-up, got {reaction:?}");
        };
        assert_eq!(frames.len(), 8);
        // Display reset is synchronous with initiating the choreography.
        assert_eq!(machine.display_pct(), 0);
        assert_eq!(machine.state(), DeviceState::WrappingUp);

        machine.finish_wrap_up();
        assert_eq!(machine.state(), DeviceState::Idle);
    }

    #[test]
    fn wrap_up_is_not_cancelable() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(100);
        assert_eq!(machine.apply_percentage(40), Reaction::None);
        assert_eq!(machine.state(), DeviceState::WrappingUp);
        assert_eq!(machine.display_pct(), 0);
    }

    #[test]
    fn release_animation_mixes_green_and_blue() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(60);
        assert_eq!(machine.state(), DeviceState::Releasing);

        let mut greens = 0;
        for _ in 0..10 {
            match machine.release_tick() {
                Some(ReleaseWrite::Frame { green }) => {
                    if green {
                        greens += 1;
                    }
                }
                other => panic!("expected frame, got {other:?}"),
            }
        }
        assert_eq!(greens, 3);
    }

    #[test]
    fn zero_write_ends_the_animation_one_tick_later() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(40);
        assert!(matches!(
            machine.release_tick(),
            Some(ReleaseWrite::Frame { .. })
        ));

        machine.apply_percentage(0);
        assert_eq!(machine.release_tick(), Some(ReleaseWrite::Off));
        assert_eq!(machine.state(), DeviceState::Idle);
        assert_eq!(machine.release_tick(), None);
    }

    #[test]
    fn releasing_write_cancels_the_pulse() {
        let mut machine = FeedbackMachine::new();
        machine.apply_ready(true);
        machine.pulse_tick();

        machine.apply_percentage(30);
        assert_eq!(machine.pulse_tick(), Some(false));
        assert_eq!(machine.pulse_tick(), None);
    }

    #[test]
    fn ready_pulse_toggles_until_cleared() {
        let mut machine = FeedbackMachine::new();
        machine.apply_ready(true);
        assert_eq!(machine.pulse_tick(), Some(true));
        assert_eq!(machine.pulse_tick(), Some(false));
        assert_eq!(machine.pulse_tick(), Some(true));

        machine.apply_ready(false);
        assert_eq!(machine.pulse_tick(), Some(false));
        assert_eq!(machine.pulse_tick(), None);
    }

    #[test]
    fn idle_machine_ticks_are_silent() {
        let mut machine = FeedbackMachine::new();
        assert_eq!(machine.release_tick(), None);
        assert_eq!(machine.pulse_tick(), None);
    }

    #[test]
    fn disconnect_resets_everything() {
        let mut machine = FeedbackMachine::new();
        machine.apply_percentage(60);
        machine.apply_ready(true);
        machine.pulse_tick();

        machine.disconnect();
        assert_eq!(machine.state(), DeviceState::Idle);
        assert_eq!(machine.display_pct(), 0);
        assert_eq!(machine.release_tick(), None);
        assert_eq!(machine.pulse_tick(), None);
    }
}
