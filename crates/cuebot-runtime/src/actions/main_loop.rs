//! `MainLoop` – the rest state.
//!
//! Greets, shows the two slider bars, then ticks until either a lit button
//! is pressed or the dwell time runs out.  Knob channels
//! [`ActionSettings::bar_channels`][crate::action::ActionSettings] drive the
//! bars.  A press whose LED is off is ignored; repeated presses between two
//! ticks collapse to the latest one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cuebot_sensors::{ButtonHandler, Knob};
use cuebot_types::{ButtonEvent, CueError};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::action::{Action, ActionContext, KnobHandler, Transition};

/// Pause between announcing a choice and leaving the loop.
const ANNOUNCE_PAUSE: Duration = Duration::from_millis(250);

#[derive(Default)]
pub struct MainLoop {
    pending: Arc<Mutex<Option<String>>>,
}

impl MainLoop {
    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self::default())
    }

    /// Action name for a chosen button label, if the label is mapped.
    fn resolve(label: &str, ctx: &ActionContext) -> Option<String> {
        let target = ctx.settings.choices.get(label)?;
        match target.strip_prefix("tag:") {
            Some(tag) => match ctx.registry.random_with_tag(tag) {
                Ok(entry) => Some(entry.name.clone()),
                Err(e) => {
                    info!(label, error = %e, "choice has no candidates");
                    None
                }
            },
            None => Some(target.clone()),
        }
    }

    fn draw_bars(ctx: &ActionContext) -> Result<(), CueError> {
        let sliders = *ctx.sliders.lock();
        ctx.drivers.draw_bars(sliders.first, sliders.second)
    }
}

#[async_trait]
impl Action for MainLoop {
    fn name(&self) -> &'static str {
        "MainLoop"
    }

    fn button_handler(&self, _ctx: &ActionContext) -> Option<ButtonHandler> {
        let pending = Arc::clone(&self.pending);
        Some(Arc::new(move |event: &ButtonEvent| {
            if event.led_is_on {
                *pending.lock() = Some(event.label.clone());
            } else {
                debug!(button = %event.label, "led off; press ignored");
            }
            Ok(())
        }))
    }

    fn knob_handler(&self, ctx: &ActionContext) -> Option<KnobHandler> {
        let sliders = Arc::clone(&ctx.sliders);
        let (first, second) = ctx.settings.bar_channels;
        Some(Arc::new(move |knob: &Knob<'_>| {
            let mut s = sliders.lock();
            if knob.pin == first {
                s.first = knob.inverted();
            } else if knob.pin == second {
                s.second = knob.inverted();
            }
            Ok(())
        }))
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        let drivers = &ctx.drivers;
        let settings = &ctx.settings;

        drivers.draw_text("Hello! Main loop.")?;
        Self::draw_bars(ctx)?;
        drivers.play_speech("Hello.").await?;
        drivers.play_speech(&settings.greeting).await?;

        let mut result = Transition::none();
        let mut waited = Duration::ZERO;
        while waited < settings.dwell {
            let choice = self.pending.lock().take();
            if let Some(label) = choice {
                info!(button = %label, "choice made");
                drivers.draw_text(&format!("Pushed {label}"))?;
                drivers.play_speech(&format!("You pushed {label}")).await?;
                tokio::time::sleep(ANNOUNCE_PAUSE).await;

                match Self::resolve(&label, ctx) {
                    Some(next) => {
                        result = Transition::to(next);
                        break;
                    }
                    None => drivers.clear_all_leds()?,
                }
            }

            Self::draw_bars(ctx)?;
            tokio::time::sleep(settings.tick).await;
            waited += settings.tick;
        }

        drivers.clear_display()?;
        drivers.clear_all_leds()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionSettings;
    use crate::registry::ActionRegistry;
    use cuebot_hal::sim::{DisplayCommand, SimHardware, SimRig};
    use cuebot_types::ChannelReading;

    fn context(settings: ActionSettings) -> (ActionContext, SimHardware) {
        let rig = SimRig::new(8).with_leds(4).with_display().with_sound().build();
        let ctx = ActionContext::new(
            Arc::clone(&rig.context),
            Arc::new(ActionRegistry::builtin()),
            settings,
        );
        (ctx, rig)
    }

    fn press(handler: &ButtonHandler, label: &str, led_is_on: bool) {
        handler(&ButtonEvent {
            label: label.to_string(),
            led_is_on,
        })
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn exits_to_default_after_dwell_without_input() {
        let settings = ActionSettings {
            dwell: Duration::from_secs(1),
            ..ActionSettings::default()
        };
        let (ctx, rig) = context(settings);
        let started = tokio::time::Instant::now();

        let transition = MainLoop::default().run(&ctx).await.unwrap();

        assert!(transition.is_empty());
        assert!(started.elapsed() >= Duration::from_secs(1));
        let log = rig.display_log.lock();
        assert_eq!(log.first(), Some(&DisplayCommand::Text("Hello! Main loop.".into())));
        assert_eq!(log.last(), Some(&DisplayCommand::Clear));
    }

    #[tokio::test(start_paused = true)]
    async fn lit_button_selects_mapped_action() {
        let (ctx, rig) = context(ActionSettings::default());
        let mut action = MainLoop::default();
        let handler = action.button_handler(&ctx).unwrap();

        press(&handler, "green", false); // led off: ignored
        press(&handler, "red", true);
        press(&handler, "blue", true); // latest wins

        let transition = action.run(&ctx).await.unwrap();
        assert_eq!(transition, Transition::to("PlayTwoSounds"));
        assert!(
            rig.display_log
                .lock()
                .contains(&DisplayCommand::Text("Pushed blue".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_choice_clears_leds_and_keeps_looping() {
        let settings = ActionSettings {
            dwell: Duration::from_secs(2),
            ..ActionSettings::default()
        };
        let (ctx, rig) = context(settings);
        rig.context.toggle_led(0).unwrap();
        let mut action = MainLoop::default();
        let handler = action.button_handler(&ctx).unwrap();
        press(&handler, "purple", true);

        let transition = action.run(&ctx).await.unwrap();
        assert!(transition.is_empty());
        assert_eq!(rig.context.led_states(), vec![false; 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn tag_choice_picks_from_tag() {
        let mut settings = ActionSettings::default();
        settings.choices.insert("white".into(), "tag:random".into());
        let (ctx, _rig) = context(settings);
        let mut action = MainLoop::default();
        let handler = action.button_handler(&ctx).unwrap();
        press(&handler, "white", true);

        let transition = action.run(&ctx).await.unwrap();
        let next = &transition.successors()[0];
        assert!(["FlashStuff", "DanceParty", "Greeting"].contains(&next.as_str()));
    }

    #[test]
    fn knobs_drive_inverted_sliders() {
        let (ctx, _rig) = context(ActionSettings::default());
        let action = MainLoop::default();
        let handler = action.knob_handler(&ctx).unwrap();

        let snapshot = cuebot_sensors::PollSnapshot {
            cycle: 1,
            readings: (0..4)
                .map(|channel| ChannelReading {
                    channel,
                    raw_value: 256 * channel as i32,
                    changed_since_last: true,
                })
                .collect(),
            previous: vec![0; 4],
        };
        for reading in &snapshot.readings {
            handler(&Knob::new(reading, &snapshot)).unwrap();
        }

        let sliders = *ctx.sliders.lock();
        assert!((sliders.first - 0.5).abs() < 1e-6);
        assert!((sliders.second - 0.25).abs() < 1e-6);
    }
}
