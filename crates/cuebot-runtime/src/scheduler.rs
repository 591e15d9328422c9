//! [`Runner`] – the cooperative scheduler.
//!
//! Two loops run side by side:
//!
//! 1. **Poll loop** – a spawned task that calls
//!    [`SensorPoller::poll`] every [`RunnerConfig::poll_interval`].  It never
//!    waits on an action.
//! 2. **Dispatch loop** – pops the next action name from the queue (pushing
//!    the default action first if the queue is empty), constructs it,
//!    activates its handlers, awaits `run`, deactivates, and queues the
//!    successors it returned.
//!
//! A failed or panicking `run` is logged with the action's name, its handlers
//! are still released, and dispatch continues as if it had returned no
//! successors.
//!
//! Every step is published on the runner's [`EventBus`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cuebot_hal::sim::SimRig;
//! use cuebot_runtime::registry::ActionRegistry;
//! use cuebot_runtime::scheduler::{Runner, RunnerConfig};
//! use cuebot_sensors::ButtonBoard;
//!
//! # async fn demo() -> Result<(), cuebot_types::CueError> {
//! let rig = SimRig::new(8).with_display().with_sound().build();
//! let buttons = Arc::new(ButtonBoard::new(&[], Arc::clone(&rig.context)));
//! let runner = Runner::new(
//!     RunnerConfig::default(),
//!     rig.context,
//!     Box::new(rig.sensors),
//!     buttons,
//!     Arc::new(ActionRegistry::builtin()),
//! )?;
//! runner.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cuebot_hal::{DriverContext, SensorHardware};
use cuebot_sensors::{
    ButtonBoard, CallbackId, CallbackRegistrar, Knob, PollSnapshot, SensorPoller,
};
use cuebot_types::{CueError, EventPayload, KnobLink};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::action::{Activation, ActionContext, ActionSettings};
use crate::actions::MAIN_LOOP;
use crate::events::EventBus;
use crate::registry::ActionRegistry;

const EVENT_SOURCE: &str = "cuebot-runtime::runner";

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`Runner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Gap between two poll cycles.
    pub poll_interval: Duration,
    /// |Δ| a channel must exceed to count as changed.
    pub change_tolerance: i32,
    /// Threshold for ADC buttons that do not set their own.
    pub button_threshold: i32,
    /// Action pushed whenever the queue runs dry.
    pub default_action: String,
    /// Standing knob→servo links, active regardless of the running action.
    pub knob_links: Vec<KnobLink>,
    pub actions: ActionSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            change_tolerance: cuebot_sensors::poller::DEFAULT_CHANGE_TOLERANCE,
            button_threshold: cuebot_sensors::poller::DEFAULT_THRESHOLD,
            default_action: MAIN_LOOP.to_string(),
            knob_links: Vec::new(),
            actions: ActionSettings::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Cloneable handle for forcing actions from outside the dispatch loop.
///
/// Forced actions join the back of the queue; the running action is never
/// interrupted.
#[derive(Clone)]
pub struct RunnerHandle {
    registry: Arc<ActionRegistry>,
    requests: mpsc::UnboundedSender<String>,
}

impl RunnerHandle {
    /// Queue the action registered as `name`.
    ///
    /// # Errors
    ///
    /// [`CueError::ActionNotFound`] for an unknown name, [`CueError::Channel`]
    /// once the runner has stopped.
    pub fn enqueue(&self, name: &str) -> Result<(), CueError> {
        self.registry.get(name)?;
        self.requests
            .send(name.to_string())
            .map_err(|_| CueError::Channel("runner has stopped".to_string()))
    }

    /// Queue a random action carrying `tag` and return its name.
    pub fn enqueue_random(&self, tag: &str) -> Result<String, CueError> {
        let name = self.registry.random_with_tag(tag)?.name.clone();
        self.enqueue(&name)?;
        Ok(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runner
// ─────────────────────────────────────────────────────────────────────────────

pub struct Runner {
    ctx: ActionContext,
    poller: Arc<Mutex<SensorPoller>>,
    registrar: CallbackRegistrar,
    buttons: Arc<ButtonBoard>,
    bus: EventBus,
    queue: VecDeque<String>,
    default_action: String,
    poll_interval: Duration,
    requests_tx: mpsc::UnboundedSender<String>,
    requests_rx: mpsc::UnboundedReceiver<String>,
    standing: Vec<CallbackId>,
}

impl Runner {
    /// Build a runner and install its standing callbacks (knob→servo links
    /// and ADC buttons).
    ///
    /// # Errors
    ///
    /// [`CueError::ActionNotFound`] if the default action is not registered;
    /// [`CueError::Config`] if a knob link names an unknown servo or channel.
    pub fn new(
        config: RunnerConfig,
        drivers: Arc<DriverContext>,
        sensors: Box<dyn SensorHardware>,
        buttons: Arc<ButtonBoard>,
        registry: Arc<ActionRegistry>,
    ) -> Result<Self, CueError> {
        registry.get(&config.default_action)?;

        let poller = SensorPoller::new(sensors).with_tolerance(config.change_tolerance);
        let registrar = poller.registrar();

        let mut standing = Self::install_knob_links(
            &config.knob_links,
            &drivers,
            &registrar,
            poller.channel_count(),
        )?;
        standing.extend(buttons.install_adc_buttons(&registrar, config.button_threshold));

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        info!(
            default_action = %config.default_action,
            poll_ms = config.poll_interval.as_millis() as u64,
            standing_callbacks = standing.len(),
            "runner initialised"
        );

        Ok(Self {
            ctx: ActionContext::new(drivers, registry, config.actions),
            poller: Arc::new(Mutex::new(poller)),
            registrar,
            buttons,
            bus: EventBus::default(),
            queue: VecDeque::new(),
            default_action: config.default_action,
            poll_interval: config.poll_interval,
            requests_tx,
            requests_rx,
            standing,
        })
    }

    fn install_knob_links(
        links: &[KnobLink],
        drivers: &Arc<DriverContext>,
        registrar: &CallbackRegistrar,
        channels: usize,
    ) -> Result<Vec<CallbackId>, CueError> {
        let servos = drivers.servo_labels();
        links
            .iter()
            .map(|link| {
                if !servos.contains(&link.servo) {
                    return Err(CueError::Config(format!(
                        "knob link on channel {} names unknown servo '{}'",
                        link.channel, link.servo
                    )));
                }
                if link.channel >= channels {
                    return Err(CueError::Config(format!(
                        "knob link channel {} is out of range (0..{channels})",
                        link.channel
                    )));
                }
                let drivers = Arc::clone(drivers);
                let (channel, servo) = (link.channel, link.servo.clone());
                Ok(registrar.set_poll_callback(
                    format!("knob_link:{channel}->{servo}"),
                    Box::new(move |snapshot: &PollSnapshot| {
                        match snapshot.reading(channel) {
                            Some(r) if r.changed_since_last && !r.is_sentinel() => {
                                let knob = Knob::new(r, snapshot);
                                drivers.set_servo_position(&servo, knob.normalized())
                            }
                            _ => Ok(()),
                        }
                    }),
                ))
            })
            .collect()
    }

    pub fn handle(&self) -> RunnerHandle {
        RunnerHandle {
            registry: Arc::clone(&self.ctx.registry),
            requests: self.requests_tx.clone(),
        }
    }

    /// The bus lifecycle events are published on.
    pub fn bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn context(&self) -> &ActionContext {
        &self.ctx
    }

    pub fn buttons(&self) -> Arc<ButtonBoard> {
        Arc::clone(&self.buttons)
    }

    /// Number of standing (runner-owned) poll callbacks.
    pub fn standing_callbacks(&self) -> usize {
        self.standing.len()
    }

    /// Names waiting in the queue, front first.
    pub fn queued(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }

    /// Run one poll cycle now.  The poll loop does exactly this on every tick.
    pub fn poll_once(&self) -> PollSnapshot {
        Self::poll_cycle(&self.poller, &self.bus)
    }

    fn poll_cycle(poller: &Mutex<SensorPoller>, bus: &EventBus) -> PollSnapshot {
        let snapshot = poller.lock().poll();
        let faulted = snapshot.faulted_channels();
        if !faulted.is_empty() {
            bus.emit(EVENT_SOURCE, EventPayload::ReadFault { channels: faulted });
        }
        snapshot
    }

    fn spawn_poll_loop(&self) -> JoinHandle<()> {
        let poller = Arc::clone(&self.poller);
        let bus = self.bus.clone();
        let period = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                Self::poll_cycle(&poller, &bus);
            }
        })
    }

    fn drain_requests(&mut self) {
        while let Ok(name) = self.requests_rx.try_recv() {
            info!(action = %name, "forced action queued");
            self.queue.push_back(name);
        }
    }

    /// Run exactly one action to completion and return its name.
    ///
    /// Never fails: lookup errors, action errors, and panics are logged and
    /// published, and the queue is left as if the action returned nothing.
    pub async fn dispatch_next(&mut self) -> String {
        self.drain_requests();

        let registry = Arc::clone(&self.ctx.registry);
        let entry = loop {
            if self.queue.is_empty() {
                info!(action = %self.default_action, "queue empty; going to default action");
                self.queue.push_back(self.default_action.clone());
                self.bus.emit(
                    EVENT_SOURCE,
                    EventPayload::DefaultInjected {
                        action: self.default_action.clone(),
                    },
                );
            }
            let Some(name) = self.queue.pop_front() else {
                continue;
            };
            match registry.get(&name) {
                Ok(entry) => break entry,
                Err(e) => error!(action = %name, error = %e, "skipping unknown action"),
            }
        };

        let mut action = entry.construct();
        let name = action.name();
        info!(action = name, remaining = self.queue.len(), "action chosen");

        let activation =
            Activation::activate(action.as_ref(), &self.ctx, &self.registrar, &self.buttons);
        self.bus.emit(
            EVENT_SOURCE,
            EventPayload::ActionStarted {
                action: name.to_string(),
            },
        );

        let outcome = AssertUnwindSafe(action.run(&self.ctx)).catch_unwind().await;

        activation.deactivate();
        self.bus.emit(
            EVENT_SOURCE,
            EventPayload::ActionDeactivated {
                action: name.to_string(),
            },
        );

        match outcome {
            Ok(Ok(transition)) => {
                let successors = transition.into_successors();
                debug!(action = name, ?successors, "action finished");
                self.bus.emit(
                    EVENT_SOURCE,
                    EventPayload::ActionFinished {
                        action: name.to_string(),
                        successors: successors.clone(),
                    },
                );
                self.queue.extend(successors);
            }
            Ok(Err(e)) => self.report_failure(name, e.to_string()),
            Err(panic) => self.report_failure(name, panic_message(panic.as_ref())),
        }

        name.to_string()
    }

    fn report_failure(&self, action: &str, details: String) {
        let err = CueError::ActionFailed {
            action: action.to_string(),
            details: details.clone(),
        };
        error!(action, error = %err, "falling back");
        self.bus.emit(
            EVENT_SOURCE,
            EventPayload::ActionFailed {
                action: action.to_string(),
                error: details,
            },
        );
    }

    async fn dispatch_forever(&mut self) {
        loop {
            self.dispatch_next().await;
        }
    }

    /// Run both loops until `shutdown` resolves, then release every handler.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), CueError>
    where
        F: Future<Output = ()>,
    {
        info!("runtime starting");
        let poll_task = self.spawn_poll_loop();

        tokio::select! {
            _ = shutdown => info!("shutdown requested"),
            _ = self.dispatch_forever() => {}
        }

        poll_task.abort();
        self.buttons.clear_handler();
        self.registrar.clear_callbacks();
        if let Err(e) = self.ctx.drivers.clear_all_leds() {
            warn!(error = %e, "could not clear LEDs on shutdown");
        }
        info!("runtime stopped");
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Boot the built-in catalog against `drivers` and run until `shutdown`.
pub async fn start_runtime<F>(
    drivers: Arc<DriverContext>,
    sensors: Box<dyn SensorHardware>,
    buttons: Arc<ButtonBoard>,
    config: RunnerConfig,
    shutdown: F,
) -> Result<(), CueError>
where
    F: Future<Output = ()>,
{
    let registry = Arc::new(ActionRegistry::builtin());
    Runner::new(config, drivers, sensors, buttons, registry)?
        .run_until(shutdown)
        .await
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
