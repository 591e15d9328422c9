//! Generic `Servo` trait for position-controlled hobby servos.
//!
//! Drivers implement this trait and register themselves with a
//! [`DriverContext`][crate::context::DriverContext].  Actions only ever talk
//! to the context, so a PCA9685 driver and a simulated servo are
//! interchangeable.

use cuebot_types::CueError;

/// A servo addressed by a stable label, commanded in normalised units.
///
/// `0.0` is the calibrated minimum of the servo's travel and `1.0` the
/// maximum.  Scaling into PWM counts is the driver's business.
pub trait Servo: Send + Sync {
    /// Stable label for this servo, e.g. `"head"` or `"left_arm"`.
    fn id(&self) -> &str;

    /// Command the servo to `normalized` (already clamped to `0.0..=1.0`).
    ///
    /// # Errors
    ///
    /// Returns [`CueError::HardwareFault`] if the PWM write fails.
    fn set_position(&mut self, normalized: f32) -> Result<(), CueError>;

    /// Last commanded position.  Written only by [`Servo::set_position`].
    fn position(&self) -> f32;
}

/// `steps` evenly spaced points from `start` to `end`, both inclusive.
///
/// A single step jumps straight to `end`.
pub fn linspace(start: f32, end: f32, steps: usize) -> Vec<f32> {
    match steps {
        0 | 1 => vec![end],
        n => {
            let span = (end - start) / (n - 1) as f32;
            (0..n).map(|i| start + span * i as f32).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockServo {
        id: String,
        position: f32,
    }

    impl Servo for MockServo {
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

    #[test]
    fn mock_servo_set_and_get_position() {
        let mut servo = MockServo {
            id: "head".to_string(),
            position: 0.0,
        };
        assert_eq!(servo.id(), "head");
        servo.set_position(0.75).unwrap();
        assert!((servo.position() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn linspace_includes_both_endpoints() {
        let points = linspace(0.0, 1.0, 5);
        assert_eq!(points.len(), 5);
        assert!((points[0] - 0.0).abs() < f32::EPSILON);
        assert!((points[2] - 0.5).abs() < f32::EPSILON);
        assert!((points[4] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn linspace_single_step_jumps_to_target() {
        assert_eq!(linspace(0.2, 0.9, 1), vec![0.9]);
        assert_eq!(linspace(0.2, 0.9, 0), vec![0.9]);
    }
}
