//! Bench actions for checking the runtime and the wiring.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cuebot_sensors::Knob;
use cuebot_types::CueError;
use tracing::info;

use crate::action::{Action, ActionContext, KnobHandler, Transition};

/// Waits one second and returns to the default.
pub struct BasicTest;

impl BasicTest {
    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for BasicTest {
    fn name(&self) -> &'static str {
        "BasicTest"
    }

    async fn run(&mut self, _ctx: &ActionContext) -> Result<Transition, CueError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Transition::none())
    }
}

/// Logs every knob change for one second.
pub struct KnobEcho;

impl KnobEcho {
    pub fn boxed() -> Box<dyn Action> {
        Box::new(Self)
    }
}

#[async_trait]
impl Action for KnobEcho {
    fn name(&self) -> &'static str {
        "KnobEcho"
    }

    fn knob_handler(&self, _ctx: &ActionContext) -> Option<KnobHandler> {
        Some(Arc::new(|knob: &Knob<'_>| {
            info!(
                channel = knob.pin,
                value = knob.value,
                previous = knob.previous_value(),
                "knob"
            );
            Ok(())
        }))
    }

    async fn run(&mut self, _ctx: &ActionContext) -> Result<Transition, CueError> {
        tokio::time::sleep(Duration::from_secs(1)).await;
        Ok(Transition::none())
    }
}
