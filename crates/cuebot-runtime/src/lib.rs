//! `cuebot-runtime` – the action runtime.
//!
//! Runs the sensor poll loop alongside the action-dispatch loop and hosts the
//! built-in show catalog.
//!
//! # Modules
//!
//! - [`action`] – the [`Action`][action::Action] trait, its optional button
//!   and knob handler slots, [`Transition`][action::Transition], the shared
//!   [`ActionContext`][action::ActionContext], and the
//!   [`Activation`][action::Activation] guard that installs and releases
//!   handlers around `run`.
//! - [`registry`] – [`ActionRegistry`][registry::ActionRegistry]: name and
//!   tag lookup, populated from an explicit table.
//! - [`scheduler`] – [`Runner`][scheduler::Runner]: queue, default-action
//!   fallback, failure containment, and [`start_runtime`].
//! - [`actions`] – the built-in catalog (`MainLoop`, `FlashStuff`, …).
//! - [`events`] – broadcast [`EventBus`][events::EventBus] carrying
//!   lifecycle and fault events.
//! - [`monitor`] – the status readout and the LED/servo sweeps.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: `tracing`
//!   subscriber setup with optional OTLP export.

pub mod action;
pub mod actions;
pub mod events;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod telemetry;

pub use action::{Action, ActionContext, ActionSettings, Transition};
pub use events::{EventBus, Topic};
pub use registry::ActionRegistry;
pub use scheduler::{start_runtime, Runner, RunnerConfig, RunnerHandle};
pub use telemetry::{init_tracing, TracerProviderGuard};
