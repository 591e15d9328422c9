//! Bench modes: the status monitor and the LED/servo sweeps.
//!
//! [`StatusMonitor`] replaces the action runtime with a live readout of every
//! ADC channel, LED, and servo on the display.  It redraws only when the text
//! changes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cuebot_hal::DriverContext;
use cuebot_sensors::{PollSnapshot, SensorPoller};
use cuebot_types::CueError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Readout cadence used by the binary.
pub const MONITOR_INTERVAL: Duration = Duration::from_millis(200);
/// Pause between steps of the LED and servo sweeps.
pub const SWEEP_PAUSE: Duration = Duration::from_millis(500);

const CHANNELS_PER_LINE: usize = 4;

pub struct StatusMonitor {
    drivers: Arc<DriverContext>,
    last: Option<String>,
}

impl StatusMonitor {
    pub fn new(drivers: Arc<DriverContext>) -> Self {
        Self {
            drivers,
            last: None,
        }
    }

    /// Text shown for `snapshot`: normalised ADC values four to a line, then
    /// LED states, then servo positions.
    pub fn render(&self, snapshot: &PollSnapshot) -> String {
        let adc: Vec<String> = snapshot
            .readings
            .chunks(CHANNELS_PER_LINE)
            .map(|line| {
                line.iter()
                    .map(|r| {
                        if r.is_sentinel() {
                            "--".to_string()
                        } else {
                            format!("{:.1}", r.normalized())
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        let leds: Vec<&str> = self
            .drivers
            .led_states()
            .into_iter()
            .map(|on| if on { "on" } else { "off" })
            .collect();

        let servos: Vec<String> = self
            .drivers
            .servo_labels()
            .into_iter()
            .filter_map(|label| {
                let position = self.drivers.servo_position(&label).ok()?;
                Some(format!("{label}={position:.2}"))
            })
            .collect();

        format!(
            "ADC:\n{}\nLED:\n{}\nServos:\n{}",
            adc.join("\n"),
            leds.join(" "),
            servos.join(" ")
        )
    }

    /// Redraw if the readout changed.  Returns whether it redrew.
    pub fn refresh(&mut self, snapshot: &PollSnapshot) -> Result<bool, CueError> {
        let text = self.render(snapshot);
        if self.last.as_deref() == Some(text.as_str()) {
            return Ok(false);
        }
        self.drivers.draw_text(&text)?;
        debug!(cycle = snapshot.cycle, "status redrawn");
        self.last = Some(text);
        Ok(true)
    }

    /// Poll and refresh every `interval` until `shutdown` resolves.
    pub async fn run_until<F>(
        mut self,
        mut poller: SensorPoller,
        interval: Duration,
        shutdown: F,
    ) -> Result<(), CueError>
    where
        F: Future<Output = ()>,
    {
        info!("status monitor running");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let snapshot = poller.poll();
                    self.refresh(&snapshot)?;
                }
            }
        }
        self.drivers.clear_display()
    }
}

/// Toggle every LED each [`SWEEP_PAUSE`], `cycles` times (forever if `None`).
pub async fn led_test(drivers: &DriverContext, cycles: Option<usize>) -> Result<(), CueError> {
    let mut done = 0;
    while cycles.is_none_or(|n| done < n) {
        drivers.toggle_all_leds()?;
        debug!(states = ?drivers.led_states(), "led sweep");
        tokio::time::sleep(SWEEP_PAUSE).await;
        done += 1;
    }
    drivers.clear_all_leds()
}

/// Drive each servo 0 → 1 → 0, pausing [`SWEEP_PAUSE`] at every stop.
pub async fn servo_test(drivers: &DriverContext) -> Result<(), CueError> {
    for label in drivers.servo_labels() {
        for position in [0.0, 1.0, 0.0] {
            info!(servo = %label, position, "servo sweep");
            drivers.set_servo_position(&label, position)?;
            tokio::time::sleep(SWEEP_PAUSE).await;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cuebot_hal::sim::{DisplayCommand, SimRig};

    #[test]
    fn render_lays_out_channels_leds_and_servos() {
        let rig = SimRig::new(8).with_servo("arm").with_leds(2).with_display().build();
        rig.sensor_handle.set(0, 512);
        rig.sensor_handle.fail(5);
        rig.context.toggle_led(1).unwrap();
        rig.context.set_servo_position("arm", 0.25).unwrap();

        let mut poller = SensorPoller::new(Box::new(rig.sensors));
        let monitor = StatusMonitor::new(Arc::clone(&rig.context));
        let text = monitor.render(&poller.poll());

        assert_eq!(
            text,
            "ADC:\n0.5 0.0 0.0 0.0\n0.0 -- 0.0 0.0\nLED:\noff on\nServos:\narm=0.25"
        );
    }

    #[test]
    fn refresh_redraws_only_on_change() {
        let rig = SimRig::new(4).with_display().build();
        let mut poller = SensorPoller::new(Box::new(rig.sensors));
        let mut monitor = StatusMonitor::new(Arc::clone(&rig.context));

        assert!(monitor.refresh(&poller.poll()).unwrap());
        assert!(!monitor.refresh(&poller.poll()).unwrap());
        rig.sensor_handle.set(2, 1000);
        assert!(monitor.refresh(&poller.poll()).unwrap());

        let texts = rig
            .display_log
            .lock()
            .iter()
            .filter(|c| matches!(c, DisplayCommand::Text(_)))
            .count();
        assert_eq!(texts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn led_test_leaves_leds_off() {
        let rig = SimRig::new(0).with_leds(3).build();
        led_test(&rig.context, Some(3)).await.unwrap();
        assert_eq!(rig.context.led_states(), vec![false; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn servo_test_sweeps_each_servo() {
        let rig = SimRig::new(0).with_servo("a").with_servo("b").build();
        let started = tokio::time::Instant::now();
        servo_test(&rig.context).await.unwrap();
        assert!(started.elapsed() >= SWEEP_PAUSE * 6);
        assert!(rig.context.servo_position("b").unwrap().abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_stops_on_shutdown() {
        let rig = SimRig::new(4).with_display().build();
        let poller = SensorPoller::new(Box::new(rig.sensors));
        let monitor = StatusMonitor::new(Arc::clone(&rig.context));

        monitor
            .run_until(
                poller,
                MONITOR_INTERVAL,
                tokio::time::sleep(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        assert_eq!(rig.display_log.lock().last(), Some(&DisplayCommand::Clear));
    }
}
