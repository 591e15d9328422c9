//! `cuebot-hal` – Hardware Abstraction Layer
//!
//! Narrow capability traits for every peripheral the robot drives, plus the
//! [`DriverContext`] facade actions talk to.
//!
//! # Modules
//!
//! - [`servo`] – [`Servo`][servo::Servo] trait and the
//!   [`linspace`][servo::linspace] helper used for stepped moves.
//! - [`led`] – [`Led`][led::Led] trait for push-button lamps.
//! - [`display`] – [`Display`][display::Display] trait for the OLED panel.
//! - [`sound`] – async [`SoundOutput`][sound::SoundOutput] trait.
//! - [`sensor`] – [`SensorHardware`][sensor::SensorHardware], the
//!   multi-channel ADC read once per poll cycle.
//! - [`context`] – [`DriverContext`]: registry of drivers and the actuator
//!   facade (clamping, stepped moves, headless/mute fallbacks).
//! - [`sim`] – simulated drivers and the [`SimRig`][sim::SimRig] builder.

pub mod context;
pub mod display;
pub mod led;
pub mod sensor;
pub mod servo;
pub mod sim;
pub mod sound;

pub use context::DriverContext;
pub use display::Display;
pub use led::Led;
pub use sensor::SensorHardware;
pub use servo::Servo;
pub use sound::SoundOutput;
