use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Value substituted for a channel whose hardware read failed.
pub const SENTINEL_READING: i32 = -1;

/// Full-scale count of the 10-bit ADC (readings span `0..ADC_FULL_SCALE`).
pub const ADC_FULL_SCALE: i32 = 1024;

/// One channel's value in a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelReading {
    pub channel: usize,
    /// Raw ADC count, or [`SENTINEL_READING`] when the read failed.
    pub raw_value: i32,
    /// `true` when |value − previous| exceeds the poller's tolerance.
    pub changed_since_last: bool,
}

impl ChannelReading {
    /// `true` if this reading is the failed-read sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.raw_value == SENTINEL_READING
    }

    /// Reading scaled into `0.0..1.0` of the ADC range.
    pub fn normalized(&self) -> f32 {
        self.raw_value.max(0) as f32 / ADC_FULL_SCALE as f32
    }
}

/// A logical button press, delivered to the active action's button handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub label: String,
    /// State of the button's LED at the moment the event was delivered.
    /// Buttons without an LED always report `false`.
    pub led_is_on: bool,
}

/// Physical button declaration, as written in the hardware layout config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ButtonDef {
    /// Plain push-button on a GPIO pin.
    GpioButton {
        pin: u8,
        #[serde(default)]
        label: Option<String>,
    },
    /// Push-button with an integrated LED on its own GPIO pin.
    LedPushButton {
        switch_pin: u8,
        led_pin: u8,
        #[serde(default)]
        label: Option<String>,
    },
    /// Button wired to an ADC channel and detected by threshold crossing.
    AdcButton {
        adc_pin: usize,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        threshold: Option<i32>,
    },
}

impl ButtonDef {
    /// Logical label, falling back to `Button<pin>` when none is configured.
    pub fn label(&self) -> String {
        match self {
            ButtonDef::GpioButton { pin, label } => {
                label.clone().unwrap_or_else(|| format!("Button{pin}"))
            }
            ButtonDef::LedPushButton {
                switch_pin, label, ..
            } => label.clone().unwrap_or_else(|| format!("Button{switch_pin}")),
            ButtonDef::AdcButton { adc_pin, label, .. } => {
                label.clone().unwrap_or_else(|| format!("Button{adc_pin}"))
            }
        }
    }

    pub fn has_led(&self) -> bool {
        matches!(self, ButtonDef::LedPushButton { .. })
    }

    /// ADC channel and optional per-button threshold for ADC buttons.
    pub fn adc_channel(&self) -> Option<(usize, Option<i32>)> {
        match self {
            ButtonDef::AdcButton {
                adc_pin, threshold, ..
            } => Some((*adc_pin, *threshold)),
            _ => None,
        }
    }
}

/// Labelled servo on a PWM channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServoDef {
    pub label: String,
    pub channel: u8,
}

/// Standing link that mirrors a knob channel onto a servo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnobLink {
    pub channel: usize,
    pub servo: String,
}

/// Runtime lifecycle notification published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"cuebot-runtime::runner"`
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data routed over the runtime event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// The queue was empty and the default action was pushed.
    DefaultInjected { action: String },
    /// An action was activated and its `run` is about to be awaited.
    ActionStarted { action: String },
    /// An action returned normally, naming the successors it queued.
    ActionFinished {
        action: String,
        successors: Vec<String>,
    },
    /// An action's `run` failed or panicked; the runner falls back to default.
    ActionFailed { action: String, error: String },
    /// An action's handlers were released.
    ActionDeactivated { action: String },
    /// A poll cycle contained one or more failed channel reads.
    ReadFault { channels: Vec<usize> },
}

/// Error taxonomy shared by every cuebot crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CueError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Action not registered: {0}")]
    ActionNotFound(String),

    #[error("No action carries tag: {0}")]
    EmptyTag(String),

    #[error("Action {action} failed: {details}")]
    ActionFailed { action: String, details: String },

    #[error("Callback {callback} failed: {details}")]
    Callback { callback: String, details: String },

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl CueError {
    /// Shorthand for [`CueError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        CueError::HardwareFault {
            component: component.into(),
            details: details.into(),
        }
    }
}
