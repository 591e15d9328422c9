//! Sensor Poller.
//!
//! Samples every ADC channel once per [`SensorPoller::poll`], flags the
//! channels that moved by more than the change tolerance, and dispatches the
//! cycle to every registered callback.
//!
//! Registrations live in a shared [`CallbackRegistrar`] so that an action
//! can add and remove its own handlers while the poll loop owns the poller.
//!
//! # Cycle order
//!
//! 1. Read all channels.  A failed read becomes [`SENTINEL_READING`] for
//!    that channel only, with `changed_since_last = false`.
//! 2. Every "on every poll" callback sees the full [`PollSnapshot`].
//! 3. Every threshold callback whose channel rose across its threshold in
//!    this cycle fires once.
//! 4. The new values are committed as "previous".  Failed channels keep
//!    their last good value.
//!
//! The registrar lock is held for the whole dispatch, so a callback removed
//! by [`CallbackRegistrar::remove_callback`] never runs again once that call
//! returns.  Callbacks must not register or remove callbacks themselves.
//!
//! # Example
//!
//! ```rust
//! use cuebot_hal::sim::SimSensors;
//! use cuebot_sensors::poller::SensorPoller;
//!
//! let (sensors, handle) = SimSensors::new(8);
//! let mut poller = SensorPoller::new(Box::new(sensors));
//! handle.set(4, 950);
//! let snapshot = poller.poll();
//! assert!(snapshot.readings[4].changed_since_last);
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cuebot_hal::SensorHardware;
use cuebot_types::{ChannelReading, CueError, SENTINEL_READING};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

/// Default |Δ| a channel must exceed to count as changed.
pub const DEFAULT_CHANGE_TOLERANCE: i32 = 5;
/// Default threshold for threshold callbacks registered without one.
pub const DEFAULT_THRESHOLD: i32 = 900;

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Everything observed in one poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSnapshot {
    /// Monotonic cycle counter, starting at 1.
    pub cycle: u64,
    /// One reading per channel, in channel order.
    pub readings: Vec<ChannelReading>,
    /// Committed values from the previous cycle, in channel order.
    pub previous: Vec<i32>,
}

impl PollSnapshot {
    pub fn reading(&self, channel: usize) -> Option<&ChannelReading> {
        self.readings.get(channel)
    }

    /// Readings flagged as changed in this cycle.
    pub fn changed(&self) -> impl Iterator<Item = &ChannelReading> {
        self.readings.iter().filter(|r| r.changed_since_last)
    }

    /// Channels whose read failed in this cycle.
    pub fn faulted_channels(&self) -> Vec<usize> {
        self.readings
            .iter()
            .filter(|r| r.is_sentinel())
            .map(|r| r.channel)
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Callbacks
// ────────────────────────────────────────────────────────────────────────────

/// Invoked once per cycle with the full snapshot.
pub type PollCallback = Box<dyn FnMut(&PollSnapshot) -> Result<(), CueError> + Send>;

/// Invoked when a channel rises across a threshold.
pub type ThresholdCallback =
    Box<dyn FnMut(&ChannelReading, &PollSnapshot) -> Result<(), CueError> + Send>;

/// Identity of one registration, used to remove exactly that registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

enum Callback {
    EveryPoll(PollCallback),
    Threshold {
        channel: usize,
        threshold: i32,
        callback: ThresholdCallback,
    },
}

struct Registration {
    id: CallbackId,
    name: String,
    callback: Callback,
}

/// Shared, cloneable list of poll registrations.
#[derive(Clone, Default)]
pub struct CallbackRegistrar {
    registrations: Arc<Mutex<Vec<Registration>>>,
    next_id: Arc<AtomicU64>,
}

impl CallbackRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback that runs on every poll cycle.
    pub fn set_poll_callback(&self, name: impl Into<String>, callback: PollCallback) -> CallbackId {
        self.push(name.into(), Callback::EveryPoll(callback))
    }

    /// Register a callback for `channel` rising across `threshold`
    /// ([`DEFAULT_THRESHOLD`] when `None`).
    pub fn set_threshold_callback(
        &self,
        name: impl Into<String>,
        channel: usize,
        threshold: Option<i32>,
        callback: ThresholdCallback,
    ) -> CallbackId {
        self.push(
            name.into(),
            Callback::Threshold {
                channel,
                threshold: threshold.unwrap_or(DEFAULT_THRESHOLD),
                callback,
            },
        )
    }

    /// Remove one registration.  Returns `false` if it was already gone.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut regs = self.registrations.lock();
        let before = regs.len();
        regs.retain(|r| r.id != id);
        regs.len() != before
    }

    /// Remove every registration.  Calling it again is a no-op.
    pub fn clear_callbacks(&self) {
        self.registrations.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, name: String, callback: Callback) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(callback = %name, ?id, "poll callback registered");
        self.registrations.lock().push(Registration { id, name, callback });
        id
    }
}

/// Run `f`, logging (never propagating) a returned error or a panic.
pub fn contain(kind: &str, name: &str, f: impl FnOnce() -> Result<(), CueError>) {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(callback = %name, kind, error = %e, "callback failed"),
        Err(_) => error!(callback = %name, kind, "callback panicked"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Poller
// ────────────────────────────────────────────────────────────────────────────

/// Owns the ADC front-end and the per-channel "previous value" state.
pub struct SensorPoller {
    hardware: Box<dyn SensorHardware>,
    tolerance: i32,
    previous: Vec<i32>,
    cycle: u64,
    registrar: CallbackRegistrar,
}

impl SensorPoller {
    /// Create a poller with [`DEFAULT_CHANGE_TOLERANCE`].  Every channel's
    /// previous value starts at `0`.
    pub fn new(hardware: Box<dyn SensorHardware>) -> Self {
        let channels = hardware.channel_count();
        Self {
            hardware,
            tolerance: DEFAULT_CHANGE_TOLERANCE,
            previous: vec![0; channels],
            cycle: 0,
            registrar: CallbackRegistrar::new(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: i32) -> Self {
        self.tolerance = tolerance.max(0);
        self
    }

    /// Handle for adding and removing callbacks from other tasks.
    pub fn registrar(&self) -> CallbackRegistrar {
        self.registrar.clone()
    }

    pub fn channel_count(&self) -> usize {
        self.previous.len()
    }

    /// Run one poll cycle.  Does not sleep; the caller owns the cadence.
    pub fn poll(&mut self) -> PollSnapshot {
        self.cycle += 1;
        let raw = self.hardware.read_all_channels();

        let readings: Vec<ChannelReading> = (0..self.previous.len())
            .map(|channel| match raw.get(channel) {
                Some(Ok(value)) => ChannelReading {
                    channel,
                    raw_value: *value,
                    changed_since_last: (value - self.previous[channel]).abs() > self.tolerance,
                },
                Some(Err(e)) => {
                    warn!(channel, error = %e, "channel read failed; reporting sentinel");
                    Self::sentinel(channel)
                }
                None => {
                    warn!(channel, "driver returned no value for channel; reporting sentinel");
                    Self::sentinel(channel)
                }
            })
            .collect();

        let snapshot = PollSnapshot {
            cycle: self.cycle,
            readings,
            previous: self.previous.clone(),
        };
        debug!(cycle = snapshot.cycle, changed = snapshot.changed().count(), "poll");

        self.dispatch(&snapshot);

        for reading in &snapshot.readings {
            if !reading.is_sentinel() {
                self.previous[reading.channel] = reading.raw_value;
            }
        }
        snapshot
    }

    fn sentinel(channel: usize) -> ChannelReading {
        ChannelReading {
            channel,
            raw_value: SENTINEL_READING,
            changed_since_last: false,
        }
    }

    fn dispatch(&self, snapshot: &PollSnapshot) {
        let mut regs = self.registrar.registrations.lock();

        for reg in regs.iter_mut() {
            if let Callback::EveryPoll(cb) = &mut reg.callback {
                contain("poll", &reg.name, || cb(snapshot));
            }
        }

        for reg in regs.iter_mut() {
            if let Callback::Threshold {
                channel,
                threshold,
                callback,
            } = &mut reg.callback
            {
                let Some(reading) = snapshot.reading(*channel) else {
                    continue;
                };
                let rose = reading.raw_value > *threshold
                    && reading.changed_since_last
                    && snapshot.previous[*channel] <= *threshold;
                if rose {
                    debug!(callback = %reg.name, channel = *channel, value = reading.raw_value, "threshold crossed");
                    contain("threshold", &reg.name, || callback(reading, snapshot));
                }
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
