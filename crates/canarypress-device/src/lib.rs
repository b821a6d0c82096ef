//! Device-side feedback logic.
//!
//! [`FeedbackMachine`] is the pure state machine: button edges and inbound
//! writes go in, LED writes and wire symbols come out, with all timing left
//! to the caller. [`FeedbackRunner`] is the async shell that owns the LED
//! hardware and drives the machine from timers and channels.

pub mod animation;
mod machine;
mod runner;

pub use animation::{LedChannel, LedSet, TimedFrame, DEBOUNCE, PULSE_TICK, RELEASE_TICK};
pub use machine::{DeviceState, FeedbackMachine, Reaction, ReleaseWrite};
pub use runner::{feedback_runner, DeviceChannels, DeviceWrite, FeedbackRunner, Leds};
