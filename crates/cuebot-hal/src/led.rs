//! Generic `Led` trait for the lamps built into the push-buttons.

use cuebot_types::CueError;

/// A discrete on/off lamp.
///
/// Drivers implement this trait and register themselves with a
/// [`DriverContext`][crate::context::DriverContext].
pub trait Led: Send + Sync {
    /// Stable identifier, e.g. `"led:23"`.
    fn id(&self) -> &str;

    /// Drive the lamp on (`true`) or off (`false`).
    ///
    /// # Errors
    ///
    /// Returns [`CueError::HardwareFault`] if the GPIO write fails.
    fn set_state(&mut self, on: bool) -> Result<(), CueError>;

    /// Current lamp state.
    fn state(&self) -> bool;

    /// Flip the lamp and return the new state.
    fn toggle(&mut self) -> Result<bool, CueError> {
        let next = !self.state();
        self.set_state(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn toggle_flips_and_reports_new_state() {
        let mut led = MockLed { state: false };
        assert!(led.toggle().unwrap());
        assert!(led.state());
        assert!(!led.toggle().unwrap());
        assert!(!led.state());
    }
}
