//! The [`Action`] abstraction and its activation lifecycle.
//!
//! An action is a named, resumable routine.  While it runs it may listen to
//! button and knob input through optional handler slots; the runner installs
//! those handlers with [`Activation::activate`] right before `run` and
//! removes them with [`Activation::deactivate`] right after, whether `run`
//! succeeded, failed, or panicked.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use cuebot_runtime::action::{Action, ActionContext, Transition};
//! use cuebot_types::CueError;
//!
//! struct Wave;
//!
//! #[async_trait]
//! impl Action for Wave {
//!     fn name(&self) -> &'static str {
//!         "Wave"
//!     }
//!
//!     async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
//!         ctx.drivers.play_speech("hello").await?;
//!         Ok(Transition::to("MainLoop"))
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cuebot_hal::DriverContext;
use cuebot_sensors::poller::contain;
use cuebot_sensors::{ButtonBoard, ButtonHandler, CallbackId, CallbackRegistrar, Knob, PollSnapshot};
use cuebot_types::CueError;
use parking_lot::Mutex;
use tracing::debug;

use crate::registry::ActionRegistry;

/// Handler for knob changes delivered to the active action.
pub type KnobHandler = Arc<dyn Fn(&Knob<'_>) -> Result<(), CueError> + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Transition
// ─────────────────────────────────────────────────────────────────────────────

/// Successors an action asks the runner to queue, by registered name.
///
/// Empty means "back to the default action".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition(Vec<String>);

impl Transition {
    pub fn none() -> Self {
        Self(Vec::new())
    }

    pub fn to(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Queue several actions, run in the given order.
    pub fn sequence<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    pub fn successors(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_successors(self) -> Vec<String> {
        self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared runtime state
// ─────────────────────────────────────────────────────────────────────────────

/// Tunables the built-in actions read at run time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSettings {
    /// How long the default loop waits for input before it exits.
    pub dwell: Duration,
    /// Cadence of the default loop's input check and bar redraw.
    pub tick: Duration,
    /// Button label → action name.  A target of the form `tag:<tag>` picks a
    /// random action carrying that tag.
    pub choices: BTreeMap<String, String>,
    /// ADC channels driving the first and second slider bar.
    pub bar_channels: (usize, usize),
    /// Second line spoken by the default loop.
    pub greeting: String,
    /// Directory holding the images shown by the show actions.
    pub resources: PathBuf,
}

impl Default for ActionSettings {
    fn default() -> Self {
        let choices = [
            ("red", "FlashStuff"),
            ("blue", "PlayTwoSounds"),
            ("green", "LoadingShow"),
            ("yellow", "DanceParty"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            dwell: Duration::from_secs(30),
            tick: Duration::from_millis(100),
            choices,
            bar_channels: (2, 3),
            greeting: "Welcome to the show".to_string(),
            resources: PathBuf::from("resources"),
        }
    }
}

/// Levels of the two slider bars shown by the default loop.
///
/// Lives in the runtime rather than in an action so the values survive
/// between loop instances.  Only the default loop's knob handler writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sliders {
    pub first: f32,
    pub second: f32,
}

impl Default for Sliders {
    fn default() -> Self {
        Self {
            first: 0.4,
            second: 0.8,
        }
    }
}

/// Everything an action can reach while it runs.  Cheap to clone.
#[derive(Clone)]
pub struct ActionContext {
    pub drivers: Arc<DriverContext>,
    pub registry: Arc<ActionRegistry>,
    pub settings: Arc<ActionSettings>,
    pub sliders: Arc<Mutex<Sliders>>,
}

impl ActionContext {
    pub fn new(
        drivers: Arc<DriverContext>,
        registry: Arc<ActionRegistry>,
        settings: ActionSettings,
    ) -> Self {
        Self {
            drivers,
            registry,
            settings: Arc::new(settings),
            sliders: Arc::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Action
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Action: Send {
    /// Registered name, used in logs and events.
    fn name(&self) -> &'static str;

    /// Button handler installed while this action runs.
    fn button_handler(&self, _ctx: &ActionContext) -> Option<ButtonHandler> {
        None
    }

    /// Knob handler installed while this action runs.  It sees only
    /// channels whose value changed in the cycle.
    fn knob_handler(&self, _ctx: &ActionContext) -> Option<KnobHandler> {
        None
    }

    /// The action body.  Suspends only on timed waits and sub-task joins.
    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Activation
// ─────────────────────────────────────────────────────────────────────────────

/// Handlers installed for one action.  Released exactly once, either by
/// [`deactivate`][Self::deactivate] or on drop.
pub struct Activation {
    action: &'static str,
    registrar: CallbackRegistrar,
    buttons: Arc<ButtonBoard>,
    knob_callback: Option<CallbackId>,
    owns_buttons: bool,
    released: bool,
}

impl Activation {
    /// Install `action`'s handlers.  A no-op for actions that define none.
    pub fn activate(
        action: &dyn Action,
        ctx: &ActionContext,
        registrar: &CallbackRegistrar,
        buttons: &Arc<ButtonBoard>,
    ) -> Self {
        let name = action.name();

        let owns_buttons = match action.button_handler(ctx) {
            Some(handler) => {
                buttons.set_handler(name, handler);
                true
            }
            None => false,
        };

        let knob_callback = action.knob_handler(ctx).map(|handler| {
            let callback = format!("{name}::knob");
            registrar.set_poll_callback(
                callback.clone(),
                Box::new(move |snapshot: &PollSnapshot| {
                    // Channels are delivered independently.
                    for reading in snapshot.changed().filter(|r| !r.is_sentinel()) {
                        contain("knob", &callback, || handler(&Knob::new(reading, snapshot)));
                    }
                    Ok(())
                }),
            )
        });

        debug!(action = name, buttons = owns_buttons, knobs = knob_callback.is_some(), "activated");
        Self {
            action: name,
            registrar: registrar.clone(),
            buttons: Arc::clone(buttons),
            knob_callback,
            owns_buttons,
            released: false,
        }
    }

    pub fn action(&self) -> &'static str {
        self.action
    }

    /// Remove the handlers.  Once this returns no event reaches them.
    pub fn deactivate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if self.owns_buttons {
            self.buttons.clear_handler();
        }
        if let Some(id) = self.knob_callback.take() {
            self.registrar.remove_callback(id);
        }
        debug!(action = self.action, "deactivated");
    }
}

impl Drop for Activation {
    fn drop(&mut self) {
        self.release();
    }
}
