//! Built-in action catalog.
//!
//! | Name | Tags | Module |
//! |---|---|---|
//! | `MainLoop` | | [`main_loop`] |
//! | `FlashStuff` | `random` | [`shows`] |
//! | `PlayTwoSounds` | | [`shows`] |
//! | `LoadingShow` | | [`shows`] |
//! | `DanceParty` | `random` | [`shows`] |
//! | `Greeting` | `random` | [`shows`] |
//! | `BasicTest` | | [`utility`] |
//! | `KnobEcho` | | [`utility`] |

pub mod main_loop;
pub mod shows;
pub mod utility;

use crate::registry::ActionFactory;

pub use main_loop::MainLoop;
pub use shows::{DanceParty, FlashStuff, Greeting, LoadingShow, PlayTwoSounds};
pub use utility::{BasicTest, KnobEcho};

/// Name of the default action.
pub const MAIN_LOOP: &str = "MainLoop";

/// Explicit registration table read by
/// [`ActionRegistry::builtin`][crate::registry::ActionRegistry::builtin].
pub const BUILTIN: &[(&str, ActionFactory, &[&str])] = &[
    (MAIN_LOOP, MainLoop::boxed, &[]),
    ("FlashStuff", FlashStuff::boxed, &["random"]),
    ("PlayTwoSounds", PlayTwoSounds::boxed, &[]),
    ("LoadingShow", LoadingShow::boxed, &[]),
    ("DanceParty", DanceParty::boxed, &["random"]),
    ("Greeting", Greeting::boxed, &["random"]),
    ("BasicTest", BasicTest::boxed, &[]),
    ("KnobEcho", KnobEcho::boxed, &[]),
];
