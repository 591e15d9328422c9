//! `ButtonBoard` – GPIO edge intake for the physical buttons.
//!
//! The board knows every configured [`ButtonDef`].  A press on an LED push
//! button toggles that button's LED first, then the resulting
//! [`ButtonEvent`] goes to the single active handler, if one is installed.
//! LEDs are indexed in the order LED push buttons appear in the layout.
//!
//! ADC buttons have no edge source of their own; [`ButtonBoard::install_adc_buttons`]
//! turns each into a threshold callback on the poller that calls
//! [`ButtonBoard::press`].

use std::sync::Arc;

use cuebot_hal::DriverContext;
use cuebot_types::{ButtonDef, ButtonEvent, ChannelReading, CueError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::poller::{contain, CallbackId, CallbackRegistrar, PollSnapshot};

/// Handler for button events delivered to the active action.
pub type ButtonHandler = Arc<dyn Fn(&ButtonEvent) -> Result<(), CueError> + Send + Sync>;

struct BoardButton {
    label: String,
    led_index: Option<usize>,
    def: ButtonDef,
}

pub struct ButtonBoard {
    buttons: Vec<BoardButton>,
    context: Arc<DriverContext>,
    handler: Mutex<Option<(String, ButtonHandler)>>,
}

impl ButtonBoard {
    pub fn new(defs: &[ButtonDef], context: Arc<DriverContext>) -> Self {
        let mut next_led = 0;
        let buttons = defs
            .iter()
            .map(|def| {
                let led_index = def.has_led().then(|| {
                    next_led += 1;
                    next_led - 1
                });
                BoardButton {
                    label: def.label(),
                    led_index,
                    def: def.clone(),
                }
            })
            .collect();
        Self {
            buttons,
            context,
            handler: Mutex::new(None),
        }
    }

    /// Labels of every configured button, in layout order.
    pub fn labels(&self) -> Vec<String> {
        self.buttons.iter().map(|b| b.label.clone()).collect()
    }

    /// Number of LEDs the layout expects the driver context to provide.
    pub fn led_count(&self) -> usize {
        self.buttons.iter().filter(|b| b.led_index.is_some()).count()
    }

    /// LED index of the button labelled `label`.
    pub fn led_index(&self, label: &str) -> Option<usize> {
        self.find(label).and_then(|b| b.led_index)
    }

    /// Install `handler` as the active handler, replacing any previous one.
    pub fn set_handler(&self, owner: impl Into<String>, handler: ButtonHandler) {
        let owner = owner.into();
        debug!(owner = %owner, "button handler installed");
        *self.handler.lock() = Some((owner, handler));
    }

    /// Remove the active handler.  Once this returns no further event
    /// reaches the removed handler.
    pub fn clear_handler(&self) {
        if let Some((owner, _)) = self.handler.lock().take() {
            debug!(owner = %owner, "button handler cleared");
        }
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Deliver a press of the button labelled `label`.
    ///
    /// # Errors
    ///
    /// [`CueError::HardwareFault`] if no such button is configured or its
    /// LED cannot be toggled.  Handler failures are logged, not returned.
    pub fn press(&self, label: &str) -> Result<(), CueError> {
        let button = self.find(label).ok_or_else(|| {
            CueError::hardware("buttons", format!("no button labelled '{label}'"))
        })?;

        let led_is_on = match button.led_index {
            Some(index) => self.context.toggle_led(index)?,
            None => false,
        };
        let event = ButtonEvent {
            label: button.label.clone(),
            led_is_on,
        };
        info!(button = %event.label, led_is_on, "button pressed");

        let handler = self.handler.lock();
        match handler.as_ref() {
            Some((owner, h)) => contain("button", owner, || h(&event)),
            None => debug!(button = %event.label, "no active button handler"),
        }
        Ok(())
    }

    /// Register a threshold callback for every ADC button in the layout.
    /// `default_threshold` applies to buttons that do not set their own.
    pub fn install_adc_buttons(
        self: &Arc<Self>,
        registrar: &CallbackRegistrar,
        default_threshold: i32,
    ) -> Vec<CallbackId> {
        self.buttons
            .iter()
            .filter_map(|b| {
                let (channel, threshold) = b.def.adc_channel()?;
                let board = Arc::clone(self);
                let label = b.label.clone();
                Some(registrar.set_threshold_callback(
                    format!("adc_button:{label}"),
                    channel,
                    Some(threshold.unwrap_or(default_threshold)),
                    Box::new(move |_: &ChannelReading, _: &PollSnapshot| board.press(&label)),
                ))
            })
            .collect()
    }

    fn find(&self, label: &str) -> Option<&BoardButton> {
        let found = self.buttons.iter().find(|b| b.label == label);
        if found.is_none() {
            warn!(button = label, "press for unknown button");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::SensorPoller;
    use cuebot_hal::sim::SimRig;

    fn layout() -> Vec<ButtonDef> {
        vec![
            ButtonDef::LedPushButton {
                switch_pin: 17,
                led_pin: 27,
                label: Some("red".into()),
            },
            ButtonDef::GpioButton {
                pin: 5,
                label: None,
            },
            ButtonDef::LedPushButton {
                switch_pin: 22,
                led_pin: 23,
                label: Some("blue".into()),
            },
            ButtonDef::AdcButton {
                adc_pin: 4,
                label: Some("foot".into()),
                threshold: Some(700),
            },
        ]
    }

    fn recording_handler() -> (ButtonHandler, Arc<Mutex<Vec<ButtonEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let handler: ButtonHandler = Arc::new(move |e: &ButtonEvent| {
            sink.lock().push(e.clone());
            Ok(())
        });
        (handler, events)
    }

    #[test]
    fn led_indices_follow_led_button_order() {
        let rig = SimRig::new(8).with_leds(2).build();
        let board = ButtonBoard::new(&layout(), rig.context);
        assert_eq!(board.led_count(), 2);
        assert_eq!(board.led_index("red"), Some(0));
        assert_eq!(board.led_index("blue"), Some(1));
        assert_eq!(board.led_index("Button5"), None);
        assert_eq!(board.labels(), vec!["red", "Button5", "blue", "foot"]);
    }

    #[test]
    fn press_toggles_led_before_handler_sees_event() {
        let rig = SimRig::new(8).with_leds(2).build();
        let board = ButtonBoard::new(&layout(), Arc::clone(&rig.context));
        let (handler, events) = recording_handler();
        board.set_handler("test", handler);

        board.press("blue").unwrap();
        board.press("blue").unwrap();
        board.press("Button5").unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert!(events[0].led_is_on);
        assert!(!events[1].led_is_on);
        assert!(!events[2].led_is_on);
        assert_eq!(rig.context.led_states(), vec![false, false]);
    }

    #[test]
    fn cleared_handler_receives_nothing() {
        let rig = SimRig::new(8).with_leds(2).build();
        let board = ButtonBoard::new(&layout(), rig.context);
        let (handler, events) = recording_handler();
        board.set_handler("test", handler);
        board.clear_handler();
        assert!(!board.has_handler());

        board.press("red").unwrap();
        assert!(events.lock().is_empty());
    }

    #[test]
    fn unknown_button_is_an_error() {
        let rig = SimRig::new(8).with_leds(2).build();
        let board = ButtonBoard::new(&layout(), rig.context);
        assert!(matches!(
            board.press("purple"),
            Err(CueError::HardwareFault { .. })
        ));
    }

    #[test]
    fn adc_button_presses_on_threshold_crossing() {
        let rig = SimRig::new(8).with_leds(2).build();
        let board = Arc::new(ButtonBoard::new(&layout(), rig.context));
        let (handler, events) = recording_handler();
        board.set_handler("test", handler);

        let mut poller = SensorPoller::new(Box::new(rig.sensors));
        let ids = board.install_adc_buttons(&poller.registrar(), 900);
        assert_eq!(ids.len(), 1);

        rig.sensor_handle.set(4, 750);
        poller.poll();
        poller.poll();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].label, "foot");
    }
}
