//! `cuebot-sensors` – Sensor intake.
//!
//! Turns raw ADC samples and GPIO edges into the events actions react to.
//!
//! # Modules
//!
//! - [`poller`] – [`SensorPoller`][poller::SensorPoller]: one poll cycle per
//!   call, change detection against a tolerance, and dispatch to the
//!   callbacks held by a shared [`CallbackRegistrar`][poller::CallbackRegistrar].
//! - [`knob`] – [`Knob`][knob::Knob]: transient per-callback view of a
//!   potentiometer channel.
//! - [`buttons`] – [`ButtonBoard`][buttons::ButtonBoard]: button layout, LED
//!   toggling on press, and routing of [`ButtonEvent`][cuebot_types::ButtonEvent]s
//!   to the active handler.

pub mod buttons;
pub mod knob;
pub mod poller;

pub use buttons::{ButtonBoard, ButtonHandler};
pub use knob::Knob;
pub use poller::{CallbackId, CallbackRegistrar, PollSnapshot, SensorPoller};
