//! Robot configuration – reads/writes `~/.cuebot/config.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working simulated rig: four lit push-buttons, one ADC button, two servos.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cuebot_runtime::{ActionSettings, RunnerConfig};
use cuebot_types::{ButtonDef, CueError, KnobLink, ServoDef};
use serde::{Deserialize, Serialize};

/// Persisted robot configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Gap between two sensor poll cycles.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// |Δ| an ADC channel must exceed to count as changed.
    #[serde(default = "default_change_tolerance")]
    pub change_tolerance: i32,

    /// Threshold for ADC buttons that do not declare their own.
    #[serde(default = "default_button_threshold")]
    pub button_threshold: i32,

    /// How long the main loop waits for a choice before restarting.
    #[serde(default = "default_dwell_secs")]
    pub dwell_secs: u64,

    #[serde(default = "default_action")]
    pub default_action: String,

    /// Line spoken after "Hello." when the main loop starts.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Directory the show actions load their images from.
    #[serde(default = "default_resources")]
    pub resources: PathBuf,

    /// Number of ADC channels.
    #[serde(default = "default_channels")]
    pub channels: usize,

    /// LEDs not attached to a push-button.
    #[serde(default)]
    pub leds: usize,

    #[serde(default = "default_buttons")]
    pub buttons: Vec<ButtonDef>,

    #[serde(default = "default_servos")]
    pub servos: Vec<ServoDef>,

    #[serde(default)]
    pub knob_links: Vec<KnobLink>,

    /// Button label → action name (or `tag:<tag>`).
    #[serde(default = "default_choices")]
    pub choices: BTreeMap<String, String>,
}

fn default_poll_interval_ms() -> u64 {
    50
}
fn default_change_tolerance() -> i32 {
    cuebot_sensors::poller::DEFAULT_CHANGE_TOLERANCE
}
fn default_button_threshold() -> i32 {
    cuebot_sensors::poller::DEFAULT_THRESHOLD
}
fn default_dwell_secs() -> u64 {
    30
}
fn default_action() -> String {
    cuebot_runtime::actions::MAIN_LOOP.to_string()
}
fn default_greeting() -> String {
    ActionSettings::default().greeting
}
fn default_resources() -> PathBuf {
    ActionSettings::default().resources
}
fn default_channels() -> usize {
    8
}
fn default_buttons() -> Vec<ButtonDef> {
    let lit = [
        ("red", 17, 5),
        ("blue", 27, 6),
        ("green", 22, 13),
        ("yellow", 23, 19),
    ];
    let mut buttons: Vec<ButtonDef> = lit
        .into_iter()
        .map(|(label, switch_pin, led_pin)| ButtonDef::LedPushButton {
            switch_pin,
            led_pin,
            label: Some(label.to_string()),
        })
        .collect();
    buttons.push(ButtonDef::AdcButton {
        adc_pin: 7,
        label: Some("big".to_string()),
        threshold: None,
    });
    buttons
}
fn default_servos() -> Vec<ServoDef> {
    vec![
        ServoDef {
            label: "servo1".to_string(),
            channel: 0,
        },
        ServoDef {
            label: "servo2".to_string(),
            channel: 1,
        },
    ]
}
fn default_choices() -> BTreeMap<String, String> {
    ActionSettings::default().choices
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            change_tolerance: default_change_tolerance(),
            button_threshold: default_button_threshold(),
            dwell_secs: default_dwell_secs(),
            default_action: default_action(),
            greeting: default_greeting(),
            resources: default_resources(),
            channels: default_channels(),
            leds: 0,
            buttons: default_buttons(),
            servos: default_servos(),
            knob_links: Vec::new(),
            choices: default_choices(),
        }
    }
}

impl Config {
    /// LEDs the rig needs: one per lit push-button plus the free-standing ones.
    pub fn led_count(&self) -> usize {
        self.buttons.iter().filter(|b| b.has_led()).count() + self.leds
    }

    pub fn to_runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            change_tolerance: self.change_tolerance,
            button_threshold: self.button_threshold,
            default_action: self.default_action.clone(),
            knob_links: self.knob_links.clone(),
            actions: ActionSettings {
                dwell: Duration::from_secs(self.dwell_secs),
                choices: self.choices.clone(),
                greeting: self.greeting.clone(),
                resources: self.resources.clone(),
                ..ActionSettings::default()
            },
        }
    }
}

/// Return the path to `~/.cuebot/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".cuebot").join("config.toml")
}

/// Load the config from `path`, falling back to defaults when the file does
/// not exist.  Environment overrides are applied either way.
pub fn load_from(path: &Path) -> Result<Config, CueError> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|e| {
            CueError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| CueError::Config(format!("failed to parse {}: {e}", path.display())))?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `CUEBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `CUEBOT_POLL_INTERVAL_MS` | `poll_interval_ms` |
/// | `CUEBOT_DWELL_SECS` | `dwell_secs` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CUEBOT_POLL_INTERVAL_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.poll_interval_ms = ms;
    }
    if let Ok(v) = std::env::var("CUEBOT_DWELL_SECS")
        && let Ok(secs) = v.parse::<u64>()
    {
        cfg.dwell_secs = secs;
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), CueError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CueError::Config(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| CueError::Config(format!("failed to serialise config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| CueError::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_points_to_cuebot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.cuebot/config.toml"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let cfg = load_from(&dir.path().join("nope.toml")).expect("load");
        assert_eq!(cfg.channels, 8);
        assert_eq!(cfg.buttons.len(), 5);
        assert_eq!(cfg.led_count(), 4);
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let mut cfg = Config::default();
        cfg.knob_links.push(KnobLink {
            channel: 4,
            servo: "servo1".to_string(),
        });
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load");
        assert_eq!(loaded.buttons, cfg.buttons);
        assert_eq!(loaded.servos, cfg.servos);
        assert_eq!(loaded.knob_links, cfg.knob_links);
        assert_eq!(loaded.choices, cfg.choices);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            change_tolerance = 12

            [[buttons]]
            type = "gpio_button"
            pin = 4

            [[buttons]]
            type = "adc_button"
            adc_pin = 6
            threshold = 700
            "#,
        )
        .expect("write");

        let cfg = load_from(&path).expect("load");
        assert_eq!(cfg.change_tolerance, 12);
        assert_eq!(cfg.button_threshold, 900);
        assert_eq!(cfg.buttons[0].label(), "Button4");
        assert_eq!(cfg.buttons[1].adc_channel(), Some((6, Some(700))));
        assert_eq!(cfg.led_count(), 0);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "channels = \"eight\"").expect("write");
        assert!(matches!(load_from(&path), Err(CueError::Config(_))));
    }

    #[test]
    fn runner_config_carries_tuning_and_choices() {
        let mut cfg = Config::default();
        cfg.dwell_secs = 5;
        cfg.choices.insert("big".into(), "tag:random".into());

        let runner = cfg.to_runner_config();
        assert_eq!(runner.poll_interval, Duration::from_millis(50));
        assert_eq!(runner.actions.dwell, Duration::from_secs(5));
        assert_eq!(runner.actions.choices["big"], "tag:random");
        assert_eq!(runner.default_action, "MainLoop");
    }

    #[test]
    fn apply_env_overrides_reads_cuebot_vars() {
        // SAFETY: these variables are only touched by this test.
        unsafe {
            std::env::set_var("CUEBOT_POLL_INTERVAL_MS", "20");
            std::env::set_var("CUEBOT_DWELL_SECS", "not-a-number");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.poll_interval_ms, 20);
        assert_eq!(cfg.dwell_secs, 30);
        unsafe {
            std::env::remove_var("CUEBOT_POLL_INTERVAL_MS");
            std::env::remove_var("CUEBOT_DWELL_SECS");
        }
    }
}
