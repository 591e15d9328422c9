//! Choreographed effect sequences triggered from the main loop.

use std::time::Duration;

use async_trait::async_trait;
use cuebot_types::CueError;
use futures_util::future::try_join_all;
use tracing::info;

use crate::action::{Action, ActionContext, Transition};
use crate::actions::MAIN_LOOP;

const HALF_BEAT: Duration = Duration::from_millis(250);

// ─────────────────────────────────────────────────────────────────────────────
// FlashStuff
// ─────────────────────────────────────────────────────────────────────────────

/// Blinks every LED six times while the display ramps up to red.
pub struct FlashStuff;

impl FlashStuff {
    pub const CYCLES: u32 = 6;

    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for FlashStuff {
    fn name(&self) -> &'static str {
        "FlashStuff"
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        let drivers = &ctx.drivers;
        drivers.draw_text("beep beep!")?;
        tokio::time::sleep(Duration::from_millis(500)).await;

        for i in 0..Self::CYCLES {
            info!(cycle = i, "flash");
            drivers.toggle_all_leds()?;
            drivers.fill_color((255 * i / Self::CYCLES) as u8, 0, 0)?;
            tokio::time::sleep(HALF_BEAT).await;
            drivers.toggle_all_leds()?;
            tokio::time::sleep(HALF_BEAT).await;
        }
        drivers.clear_display()?;

        Ok(Transition::to(MAIN_LOOP))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PlayTwoSounds
// ─────────────────────────────────────────────────────────────────────────────

pub struct PlayTwoSounds;

impl PlayTwoSounds {
    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for PlayTwoSounds {
    fn name(&self) -> &'static str {
        "PlayTwoSounds"
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        let drivers = &ctx.drivers;
        let resources = &ctx.settings.resources;

        drivers.draw_image(&resources.join("heart1.jpg"))?;
        drivers.play_init_chime().await?;
        drivers.play_speech("Hello, I am the robot").await?;
        drivers.play_tone(1000.0, Duration::from_secs(1)).await?;
        drivers.draw_image(&resources.join("heart2.jpg"))?;
        drivers.play_init_chime().await?;

        Ok(Transition::none())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LoadingShow
// ─────────────────────────────────────────────────────────────────────────────

/// A fake progress animation: four frames one second apart.
pub struct LoadingShow;

impl LoadingShow {
    pub const FRAMES: usize = 4;

    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for LoadingShow {
    fn name(&self) -> &'static str {
        "LoadingShow"
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        let drivers = &ctx.drivers;
        drivers.play_init_chime().await?;
        drivers
            .play_speech("Thank you for waiting. Your show is loading")
            .await?;

        for frame in 1..=Self::FRAMES {
            let image = ctx.settings.resources.join(format!("loading-{frame}.png"));
            drivers.draw_image(&image)?;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        Ok(Transition::none())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// DanceParty
// ─────────────────────────────────────────────────────────────────────────────

pub struct DanceParty;

impl DanceParty {
    pub const TONES_HZ: [f32; 4] = [400.0, 800.0, 400.0, 800.0];
    pub const TONE_LENGTH: Duration = Duration::from_millis(200);

    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for DanceParty {
    fn name(&self) -> &'static str {
        "DanceParty"
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        for freq in Self::TONES_HZ {
            ctx.drivers.play_tone(freq, Self::TONE_LENGTH).await?;
        }
        Ok(Transition::none())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Greeting
// ─────────────────────────────────────────────────────────────────────────────

/// Says hello while every servo waves, both at once.
pub struct Greeting;

impl Greeting {
    pub const LINE: &'static str = "Hello there, lovely to meet you";
    /// Each half of the wave (up, then down).
    pub const WAVE_HALF: Duration = Duration::from_millis(500);
    pub const WAVE_STEPS: usize = 10;

    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }

    async fn wave(ctx: &ActionContext) -> Result<(), CueError> {
        let labels = ctx.drivers.servo_labels();
        try_join_all(labels.iter().map(|label| async move {
            let drivers = &ctx.drivers;
            drivers
                .set_servo_position_stepped(label, 1.0, Self::WAVE_HALF, Self::WAVE_STEPS)
                .await?;
            drivers
                .set_servo_position_stepped(label, 0.0, Self::WAVE_HALF, Self::WAVE_STEPS)
                .await
        }))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Action for Greeting {
    fn name(&self) -> &'static str {
        "Greeting"
    }

    async fn run(&mut self, ctx: &ActionContext) -> Result<Transition, CueError> {
        let (speech, wave) = tokio::join!(ctx.drivers.play_speech(Self::LINE), Self::wave(ctx));
        speech?;
        wave?;
        Ok(Transition::none())
    }
}
