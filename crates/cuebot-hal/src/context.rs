//! [`DriverContext`] – the actuator facade shared by every action.
//!
//! The context stores every registered [`Servo`], [`Led`], [`Display`], and
//! [`SoundOutput`] driver.  Actions and poll callbacks call its `&self`
//! methods concurrently; each driver sits behind its own lock, and no lock is
//! held across an `.await`.
//!
//! A missing display or sound driver is not an error: the robot keeps running
//! headless or mute and the skipped call is logged at `debug`.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cuebot_types::CueError;
use parking_lot::Mutex;
use tracing::debug;

use crate::display::Display;
use crate::led::Led;
use crate::servo::{linspace, Servo};
use crate::sound::SoundOutput;

/// Central driver registry and actuator facade.
///
/// Construct with [`DriverContext::new`], register drivers, then wrap it in an
/// [`Arc`] and hand clones to the runtime.
#[derive(Default)]
pub struct DriverContext {
    servos: Vec<(String, Mutex<Box<dyn Servo>>)>,
    leds: Vec<Mutex<Box<dyn Led>>>,
    display: Option<Mutex<Box<dyn Display>>>,
    sound: Option<Arc<dyn SoundOutput>>,
}

impl DriverContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a servo driver.  Any previously registered servo with the
    /// same label is replaced in place.
    pub fn register_servo(&mut self, servo: Box<dyn Servo>) {
        let label = servo.id().to_string();
        match self.servos.iter_mut().find(|(l, _)| *l == label) {
            Some(slot) => slot.1 = Mutex::new(servo),
            None => self.servos.push((label, Mutex::new(servo))),
        }
    }

    /// Register an LED.  LEDs are addressed by registration order.
    pub fn register_led(&mut self, led: Box<dyn Led>) {
        self.leds.push(Mutex::new(led));
    }

    /// Install the display driver, replacing any previous one.
    pub fn register_display(&mut self, display: Box<dyn Display>) {
        self.display = Some(Mutex::new(display));
    }

    /// Install the sound driver, replacing any previous one.
    pub fn register_sound(&mut self, sound: Arc<dyn SoundOutput>) {
        self.sound = Some(sound);
    }

    // ------------------------------------------------------------------
    // Servos
    // ------------------------------------------------------------------

    /// Labels of every registered servo, in registration order.
    pub fn servo_labels(&self) -> Vec<String> {
        self.servos.iter().map(|(l, _)| l.clone()).collect()
    }

    /// Last commanded position of `label`.
    pub fn servo_position(&self, label: &str) -> Result<f32, CueError> {
        Ok(self.servo(label)?.lock().position())
    }

    /// Move `label` to `position`, clamped to `0.0..=1.0`.
    ///
    /// # Errors
    ///
    /// [`CueError::HardwareFault`] when the servo is not registered, the
    /// position is not finite, or the driver write fails.
    pub fn set_servo_position(&self, label: &str, position: f32) -> Result<(), CueError> {
        let target = Self::clamp_position(label, position)?;
        debug!(servo = label, position = target, "set servo");
        self.servo(label)?.lock().set_position(target)
    }

    /// Move `label` to `position` in `steps` evenly spaced increments spread
    /// over `duration`.  Suspends between increments, so other tasks keep
    /// running while the servo travels.
    pub async fn set_servo_position_stepped(
        &self,
        label: &str,
        position: f32,
        duration: Duration,
        steps: usize,
    ) -> Result<(), CueError> {
        let target = Self::clamp_position(label, position)?;
        let start = self.servo_position(label)?;
        let points = linspace(start, target, steps);
        let pause = duration / points.len() as u32;
        debug!(servo = label, from = start, to = target, steps = points.len(), "stepped move");
        for point in points {
            self.servo(label)?.lock().set_position(point)?;
            tokio::time::sleep(pause).await;
        }
        Ok(())
    }

    fn servo(&self, label: &str) -> Result<&Mutex<Box<dyn Servo>>, CueError> {
        self.servos
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, s)| s)
            .ok_or_else(|| {
                CueError::hardware(
                    format!("servo:{label}"),
                    format!("servo '{label}' is not registered"),
                )
            })
    }

    fn clamp_position(label: &str, position: f32) -> Result<f32, CueError> {
        if !position.is_finite() {
            return Err(CueError::hardware(
                format!("servo:{label}"),
                format!("position {position} is not finite"),
            ));
        }
        Ok(position.clamp(0.0, 1.0))
    }

    // ------------------------------------------------------------------
    // LEDs
    // ------------------------------------------------------------------

    pub fn led_count(&self) -> usize {
        self.leds.len()
    }

    /// State of LED `index`, or `None` if no such LED exists.
    pub fn led_state(&self, index: usize) -> Option<bool> {
        self.leds.get(index).map(|led| led.lock().state())
    }

    /// States of every LED, in index order.
    pub fn led_states(&self) -> Vec<bool> {
        self.leds.iter().map(|led| led.lock().state()).collect()
    }

    /// Flip LED `index` and return its new state.
    pub fn toggle_led(&self, index: usize) -> Result<bool, CueError> {
        let led = self.leds.get(index).ok_or_else(|| {
            CueError::hardware(format!("led:{index}"), format!("led {index} is not registered"))
        })?;
        led.lock().toggle()
    }

    pub fn toggle_all_leds(&self) -> Result<(), CueError> {
        for led in &self.leds {
            led.lock().toggle()?;
        }
        Ok(())
    }

    pub fn clear_all_leds(&self) -> Result<(), CueError> {
        for led in &self.leds {
            led.lock().set_state(false)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Display
    // ------------------------------------------------------------------

    pub fn draw_text(&self, text: &str) -> Result<(), CueError> {
        self.with_display("draw_text", |d| d.draw_text(text))
    }

    pub fn draw_image(&self, path: &Path) -> Result<(), CueError> {
        self.with_display("draw_image", |d| d.draw_image(path))
    }

    pub fn fill_color(&self, r: u8, g: u8, b: u8) -> Result<(), CueError> {
        self.with_display("fill_color", |d| d.fill_color(r, g, b))
    }

    pub fn draw_bars(&self, first: f32, second: f32) -> Result<(), CueError> {
        self.with_display("draw_bars", |d| {
            d.draw_bars(first.clamp(0.0, 1.0), second.clamp(0.0, 1.0))
        })
    }

    pub fn clear_display(&self) -> Result<(), CueError> {
        self.with_display("clear", |d| d.clear())
    }

    fn with_display(
        &self,
        op: &str,
        f: impl FnOnce(&mut dyn Display) -> Result<(), CueError>,
    ) -> Result<(), CueError> {
        match &self.display {
            Some(display) => f(display.lock().as_mut()),
            None => {
                debug!(op, "no display registered; skipping");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Sound
    // ------------------------------------------------------------------

    pub async fn play_speech(&self, text: &str) -> Result<(), CueError> {
        match self.sound.clone() {
            Some(sound) => sound.play_speech(text).await,
            None => {
                debug!(text, "no sound output registered; skipping speech");
                Ok(())
            }
        }
    }

    pub async fn play_tone(&self, freq_hz: f32, duration: Duration) -> Result<(), CueError> {
        match self.sound.clone() {
            Some(sound) => sound.play_tone(freq_hz, duration).await,
            None => {
                debug!(freq_hz, "no sound output registered; skipping tone");
                Ok(())
            }
        }
    }

    pub async fn play_init_chime(&self) -> Result<(), CueError> {
        match self.sound.clone() {
            Some(sound) => sound.play_init_chime().await,
            None => {
                debug!("no sound output registered; skipping chime");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    struct TrackingServo {
        id: String,
        position: f32,
        history: Arc<Mutex<Vec<f32>>>,
    }

    impl TrackingServo {
        fn new(id: &str) -> (Box<Self>, Arc<Mutex<Vec<f32>>>) {
            let history = Arc::new(Mutex::new(Vec::new()));
            let servo = Box::new(Self {
                id: id.to_string(),
                position: 0.0,
                history: Arc::clone(&history),
            });
            (servo, history)
        }
    }

    impl Servo for TrackingServo {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_position(&mut self, normalized: f32) -> Result<(), CueError> {
            self.position = normalized;
            self.history.lock().push(normalized);
            Ok(())
        }
        fn position(&self) -> f32 {
            self.position
        }
    }

    struct MockLed {
        state: bool,
    }

    impl Led for MockLed {
        fn id(&self) -> &str {
            "mock"
        }
        fn set_state(&mut self, on: bool) -> Result<(), CueError> {
            self.state = on;
            Ok(())
        }
        fn state(&self) -> bool {
            self.state
        }
    }

    fn context_with_leds(n: usize) -> DriverContext {
        let mut ctx = DriverContext::new();
        for _ in 0..n {
            ctx.register_led(Box::new(MockLed { state: false }));
        }
        ctx
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn set_servo_position_clamps_to_unit_range() {
        let mut ctx = DriverContext::new();
        let (servo, _) = TrackingServo::new("head");
        ctx.register_servo(servo);

        ctx.set_servo_position("head", 1.7).unwrap();
        assert!((ctx.servo_position("head").unwrap() - 1.0).abs() < f32::EPSILON);

        ctx.set_servo_position("head", -0.3).unwrap();
        assert!(ctx.servo_position("head").unwrap().abs() < f32::EPSILON);
    }

    #[test]
    fn set_servo_position_rejects_nan() {
        let mut ctx = DriverContext::new();
        let (servo, _) = TrackingServo::new("head");
        ctx.register_servo(servo);
        let result = ctx.set_servo_position("head", f32::NAN);
        assert!(matches!(result, Err(CueError::HardwareFault { .. })));
    }

    #[test]
    fn missing_servo_returns_error() {
        let ctx = DriverContext::new();
        let result = ctx.set_servo_position("ghost", 0.5);
        assert!(matches!(result, Err(CueError::HardwareFault { .. })));
    }

    #[test]
    fn re_registering_servo_replaces_old_driver() {
        let mut ctx = DriverContext::new();
        let (first, _) = TrackingServo::new("arm");
        ctx.register_servo(first);
        ctx.set_servo_position("arm", 0.8).unwrap();

        let (second, _) = TrackingServo::new("arm");
        ctx.register_servo(second);
        assert_eq!(ctx.servo_labels(), vec!["arm".to_string()]);
        assert!(ctx.servo_position("arm").unwrap().abs() < f32::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn stepped_move_visits_each_step_over_duration() {
        let mut ctx = DriverContext::new();
        let (servo, history) = TrackingServo::new("arm");
        ctx.register_servo(servo);

        let started = tokio::time::Instant::now();
        ctx.set_servo_position_stepped("arm", 1.0, Duration::from_secs(1), 5)
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(1));
        let visited = history.lock().clone();
        assert_eq!(visited.len(), 5);
        assert!((visited[1] - 0.25).abs() < 1e-6);
        assert!((visited[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn toggle_led_reports_new_state() {
        let ctx = context_with_leds(2);
        assert!(ctx.toggle_led(1).unwrap());
        assert_eq!(ctx.led_states(), vec![false, true]);
        assert!(matches!(ctx.toggle_led(5), Err(CueError::HardwareFault { .. })));
    }

    #[test]
    fn clear_all_leds_turns_everything_off() {
        let ctx = context_with_leds(3);
        ctx.toggle_all_leds().unwrap();
        assert_eq!(ctx.led_states(), vec![true, true, true]);
        ctx.clear_all_leds().unwrap();
        assert_eq!(ctx.led_states(), vec![false, false, false]);
        assert_eq!(ctx.led_state(7), None);
    }

    #[tokio::test]
    async fn headless_context_skips_display_and_sound() {
        let ctx = DriverContext::new();
        ctx.draw_text("hello").unwrap();
        ctx.clear_display().unwrap();
        ctx.play_speech("hello").await.unwrap();
        ctx.play_init_chime().await.unwrap();
    }
}
