//! In-process simulated hardware for tests and the desktop console.
//!
//! [`SimRig`] builds a [`DriverContext`] whose every slot is backed by a
//! driver that records what it was asked to do, plus a [`SimSensors`] front
//! end whose channel values are set from the outside through a
//! [`SensorHandle`].  This lets the full runtime run headless in CI.
//!
//! # Stub behaviour
//!
//! | Driver | Behaviour |
//! |---|---|
//! | [`SimServo`] | Stores the last position. |
//! | [`SimLed`] | Stores the last state. |
//! | [`SimDisplay`] | Appends a [`DisplayCommand`] to a shared log. |
//! | [`SimSound`] | Appends a [`SoundCommand`], then sleeps for the clip length. |
//! | [`SimSensors`] | Returns the values held by its [`SensorHandle`]. |
//!
//! # Example
//!
//! ```rust
//! use cuebot_hal::sim::SimRig;
//!
//! let rig = SimRig::new(8)
//!     .with_servo("servo1")
//!     .with_leds(4)
//!     .with_display()
//!     .with_sound()
//!     .build();
//!
//! rig.context.set_servo_position("servo1", 0.5).unwrap();
//! rig.sensor_handle.set(2, 512);
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cuebot_types::CueError;
use parking_lot::Mutex;
use tracing::info;

use crate::context::DriverContext;
use crate::display::Display;
use crate::led::Led;
use crate::sensor::SensorHardware;
use crate::servo::Servo;
use crate::sound::SoundOutput;

/// Shared, append-only log of commands a simulated driver received.
pub type CommandLog<T> = Arc<Mutex<Vec<T>>>;

/// Simulated speech runs this long per character of text.
pub const SPEECH_TIME_PER_CHAR: Duration = Duration::from_millis(50);
/// Length of the simulated start-up chime.
pub const INIT_CHIME_DURATION: Duration = Duration::from_millis(500);

// ────────────────────────────────────────────────────────────────────────────
// Servo and LED
// ────────────────────────────────────────────────────────────────────────────

/// A simulated servo that records the most recent commanded position.
pub struct SimServo {
    id: String,
    position: f32,
}

impl SimServo {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            position: 0.0,
        })
    }
}

impl Servo for SimServo {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, normalized: f32) -> Result<(), CueError> {
        self.position = normalized;
        Ok(())
    }

    fn position(&self) -> f32 {
        self.position
    }
}

/// A simulated LED.  Starts off.
pub struct SimLed {
    id: String,
    state: bool,
}

impl SimLed {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            state: false,
        })
    }
}

impl Led for SimLed {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, on: bool) -> Result<(), CueError> {
        self.state = on;
        Ok(())
    }

    fn state(&self) -> bool {
        self.state
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Display
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCommand {
    Text(String),
    Image(PathBuf),
    Fill(u8, u8, u8),
    Bars(f32, f32),
    Clear,
}

/// A simulated panel that logs every draw call and echoes it to `tracing`.
pub struct SimDisplay {
    log: CommandLog<DisplayCommand>,
}

impl SimDisplay {
    pub fn new(log: CommandLog<DisplayCommand>) -> Box<Self> {
        Box::new(Self { log })
    }

    fn record(&self, command: DisplayCommand) {
        info!(target: "cuebot::display", ?command, "display");
        self.log.lock().push(command);
    }
}

impl Display for SimDisplay {
    fn draw_text(&mut self, text: &str) -> Result<(), CueError> {
        self.record(DisplayCommand::Text(text.to_string()));
        Ok(())
    }

    fn draw_image(&mut self, path: &Path) -> Result<(), CueError> {
        self.record(DisplayCommand::Image(path.to_path_buf()));
        Ok(())
    }

    fn fill_color(&mut self, r: u8, g: u8, b: u8) -> Result<(), CueError> {
        self.record(DisplayCommand::Fill(r, g, b));
        Ok(())
    }

    fn draw_bars(&mut self, first: f32, second: f32) -> Result<(), CueError> {
        // Bar redraws happen every tick; keep them out of the info stream.
        self.log.lock().push(DisplayCommand::Bars(first, second));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), CueError> {
        self.record(DisplayCommand::Clear);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sound
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum SoundCommand {
    Speech(String),
    Tone { freq_hz: f32, duration: Duration },
    InitChime,
}

/// A simulated speaker.  Each call logs the clip, then sleeps for as long
/// as the clip would play.
pub struct SimSound {
    log: CommandLog<SoundCommand>,
}

impl SimSound {
    pub fn new(log: CommandLog<SoundCommand>) -> Arc<Self> {
        Arc::new(Self { log })
    }

    fn record(&self, command: SoundCommand) {
        info!(target: "cuebot::sound", ?command, "sound");
        self.log.lock().push(command);
    }
}

#[async_trait]
impl SoundOutput for SimSound {
    async fn play_speech(&self, text: &str) -> Result<(), CueError> {
        self.record(SoundCommand::Speech(text.to_string()));
        tokio::time::sleep(SPEECH_TIME_PER_CHAR * text.chars().count() as u32).await;
        Ok(())
    }

    async fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<(), CueError> {
        if !(freq_hz.is_finite() && freq_hz > 0.0) {
            return Err(CueError::hardware(
                "sound",
                format!("invalid tone frequency {freq_hz}"),
            ));
        }
        self.record(SoundCommand::Tone { freq_hz, duration });
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn play_init_chime(&self) -> Result<(), CueError> {
        self.record(SoundCommand::InitChime);
        tokio::time::sleep(INIT_CHIME_DURATION).await;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// Cloneable handle used to drive a [`SimSensors`] from tests or a console.
///
/// A channel holding `None` fails its next read.
#[derive(Clone)]
pub struct SensorHandle {
    values: Arc<Mutex<Vec<Option<i32>>>>,
}

impl SensorHandle {
    /// Set the raw value of `channel`.  Out-of-range channels are ignored.
    pub fn set(&self, channel: usize, raw: i32) {
        if let Some(slot) = self.values.lock().get_mut(channel) {
            *slot = Some(raw);
        }
    }

    /// Make every subsequent read of `channel` fail until it is `set` again.
    pub fn fail(&self, channel: usize) {
        if let Some(slot) = self.values.lock().get_mut(channel) {
            *slot = None;
        }
    }

    /// Current simulated value of `channel`.
    pub fn get(&self, channel: usize) -> Option<i32> {
        self.values.lock().get(channel).copied().flatten()
    }
}

/// Simulated multi-channel ADC.  All channels start at `0`.
pub struct SimSensors {
    handle: SensorHandle,
    channels: usize,
}

impl SimSensors {
    pub fn new(channels: usize) -> (Self, SensorHandle) {
        let handle = SensorHandle {
            values: Arc::new(Mutex::new(vec![Some(0); channels])),
        };
        (
            Self {
                handle: handle.clone(),
                channels,
            },
            handle,
        )
    }
}

impl SensorHardware for SimSensors {
    fn channel_count(&self) -> usize {
        self.channels
    }

    fn read_all_channels(&mut self) -> Vec<Result<i32, CueError>> {
        let values = self.handle.values.lock();
        values
            .iter()
            .enumerate()
            .map(|(channel, v)| {
                v.ok_or_else(|| {
                    CueError::hardware(
                        format!("adc:{channel}"),
                        "simulated read failure".to_string(),
                    )
                })
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// Everything a simulated robot exposes to the code under test.
pub struct SimHardware {
    pub context: Arc<DriverContext>,
    pub sensors: SimSensors,
    pub sensor_handle: SensorHandle,
    pub display_log: CommandLog<DisplayCommand>,
    pub sound_log: CommandLog<SoundCommand>,
}

/// Builder for a fully simulated robot.
///
/// Call the `with_*` methods to add the components you need, then
/// [`build`][Self::build].
pub struct SimRig {
    channels: usize,
    servos: Vec<String>,
    leds: usize,
    display: bool,
    sound: bool,
}

impl SimRig {
    /// Start a rig with an ADC of `channels` channels and nothing else.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            servos: Vec::new(),
            leds: 0,
            display: false,
            sound: false,
        }
    }

    pub fn with_servo(mut self, label: impl Into<String>) -> Self {
        self.servos.push(label.into());
        self
    }

    pub fn with_leds(mut self, count: usize) -> Self {
        self.leds = count;
        self
    }

    pub fn with_display(mut self) -> Self {
        self.display = true;
        self
    }

    pub fn with_sound(mut self) -> Self {
        self.sound = true;
        self
    }

    pub fn build(self) -> SimHardware {
        let display_log: CommandLog<DisplayCommand> = Arc::default();
        let sound_log: CommandLog<SoundCommand> = Arc::default();

        let mut context = DriverContext::new();
        for label in self.servos {
            context.register_servo(SimServo::new(label));
        }
        for i in 0..self.leds {
            context.register_led(SimLed::new(format!("led:{i}")));
        }
        if self.display {
            context.register_display(SimDisplay::new(Arc::clone(&display_log)));
        }
        if self.sound {
            context.register_sound(SimSound::new(Arc::clone(&sound_log)));
        }

        let (sensors, sensor_handle) = SimSensors::new(self.channels);
        SimHardware {
            context: Arc::new(context),
            sensors,
            sensor_handle,
            display_log,
            sound_log,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
