//! Console – line commands standing in for the physical inputs.
//!
//! Supported commands:
//!   press <label>            – press a button
//!   knob <channel> <value>   – set a simulated ADC channel
//!   fail <channel>           – make a channel's reads fail
//!   enqueue <action>         – queue an action behind the running one
//!   status                   – print LEDs, servos and channel values
//!   help                     – show this list
//!   quit | exit              – stop the robot

use std::io::BufRead;
use std::sync::Arc;

use colored::Colorize;
use cuebot_hal::DriverContext;
use cuebot_hal::sim::SensorHandle;
use cuebot_runtime::RunnerHandle;
use cuebot_sensors::ButtonBoard;
use cuebot_types::CueError;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Press(String),
    Knob { channel: usize, value: i32 },
    Fail(usize),
    Enqueue(String),
    Status,
    Help,
    Quit,
}

/// Parse one console line.  Returns `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (verb, args.as_slice()) {
        ("press", [label]) => Command::Press(label.to_string()),
        ("knob", [channel, value]) => Command::Knob {
            channel: parse_number(channel, "channel")?,
            value: parse_number(value, "value")?,
        },
        ("fail", [channel]) => Command::Fail(parse_number(channel, "channel")?),
        ("enqueue", [action]) => Command::Enqueue(action.to_string()),
        ("status", []) => Command::Status,
        ("help", []) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        ("press" | "knob" | "fail" | "enqueue" | "status" | "help" | "quit" | "exit", _) => {
            return Err(format!("wrong arguments for '{verb}'; type help"));
        }
        (other, _) => return Err(format!("unknown command '{other}'; type help")),
    };
    Ok(Some(command))
}

fn parse_number<T: std::str::FromStr>(word: &str, what: &str) -> Result<T, String> {
    word.parse()
        .map_err(|_| format!("{what} must be a number, got '{word}'"))
}

/// What the console can reach on the running robot.
pub struct Console {
    drivers: Arc<DriverContext>,
    buttons: Arc<ButtonBoard>,
    sensors: SensorHandle,
    channels: usize,
    /// `None` in monitor mode, where no actions run.
    runner: Option<RunnerHandle>,
}

impl Console {
    pub fn new(
        drivers: Arc<DriverContext>,
        buttons: Arc<ButtonBoard>,
        sensors: SensorHandle,
        channels: usize,
        runner: Option<RunnerHandle>,
    ) -> Self {
        Self {
            drivers,
            buttons,
            sensors,
            channels,
            runner,
        }
    }

    /// Carry out `command` and return the text to print.
    pub fn execute(&self, command: &Command) -> Result<String, CueError> {
        match command {
            Command::Press(label) => {
                self.buttons.press(label)?;
                Ok(format!("pressed {label}"))
            }
            Command::Knob { channel, value } => {
                self.check_channel(*channel)?;
                self.sensors.set(*channel, *value);
                Ok(format!("channel {channel} = {value}"))
            }
            Command::Fail(channel) => {
                self.check_channel(*channel)?;
                self.sensors.fail(*channel);
                Ok(format!("channel {channel} now fails its reads"))
            }
            Command::Enqueue(action) => match &self.runner {
                Some(runner) => {
                    runner.enqueue(action)?;
                    Ok(format!("queued {action}"))
                }
                None => Err(CueError::Channel(
                    "no action runner in this mode".to_string(),
                )),
            },
            Command::Status => Ok(self.status()),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok("stopping".to_string()),
        }
    }

    fn check_channel(&self, channel: usize) -> Result<(), CueError> {
        if channel < self.channels {
            Ok(())
        } else {
            Err(CueError::Config(format!(
                "channel {channel} is out of range (0..{})",
                self.channels
            )))
        }
    }

    fn status(&self) -> String {
        let channels: Vec<String> = (0..self.channels)
            .map(|ch| match self.sensors.get(ch) {
                Some(v) => format!("{ch}:{v}"),
                None => format!("{ch}:--"),
            })
            .collect();
        let leds: Vec<String> = self
            .buttons
            .labels()
            .into_iter()
            .filter_map(|label| {
                let index = self.buttons.led_index(&label)?;
                let on = self.drivers.led_state(index)?;
                Some(format!("{label}={}", if on { "on" } else { "off" }))
            })
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
            "adc    {}\nleds   {}\nservos {}",
            channels.join(" "),
            leds.join(" "),
            servos.join(" ")
        )
    }

    /// Read commands from stdin until `quit`.
    ///
    /// Stdin is read on a dedicated thread so a pending read never holds up
    /// runtime shutdown.
    pub async fn run(self) {
        let (tx, lines) = mpsc::channel::<String>(16);
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        eprintln!("{}: {}", "Read error".red(), e);
                        break;
                    }
                }
            }
        });
        self.serve(lines).await;
    }

    /// Execute `lines` until `quit`.  Resolves only on `quit`: once the input
    /// closes the console goes quiet and stays pending, so a detached stdin
    /// never stops the robot.
    pub async fn serve(&self, mut lines: mpsc::Receiver<String>) {
        while let Some(line) = lines.recv().await {
            match parse(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => {
                    println!("{}", "Goodbye.".green());
                    return;
                }
                Ok(Some(command)) => match self.execute(&command) {
                    Ok(out) => println!("{out}"),
                    Err(e) => println!("{}: {}", "Error".red(), e),
                },
                Err(msg) => println!("{}", msg.yellow()),
            }
        }
        info!("console input closed; Ctrl-C stops the robot");
        std::future::pending::<()>().await;
    }
}

const HELP: &str = "\
press <label>           press a button
knob <channel> <value>  set a simulated ADC channel (0..1024)
fail <channel>          make a channel's reads fail
enqueue <action>        queue an action behind the running one
status                  show LEDs, servos and channel values
quit                    stop the robot";

#[cfg(test)]
mod tests {
    use super::*;
    use cuebot_hal::sim::SimRig;
    use cuebot_types::ButtonDef;

    #[test]
    fn parses_every_command() {
        assert_eq!(parse("press red"), Ok(Some(Command::Press("red".into()))));
        assert_eq!(
            parse("  knob 3   950 "),
            Ok(Some(Command::Knob {
                channel: 3,
                value: 950
            }))
        );
        assert_eq!(parse("fail 2"), Ok(Some(Command::Fail(2))));
        assert_eq!(
            parse("enqueue DanceParty"),
            Ok(Some(Command::Enqueue("DanceParty".into())))
        );
        assert_eq!(parse("status"), Ok(Some(Command::Status)));
        assert_eq!(parse("exit"), Ok(Some(Command::Quit)));
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse("knob 3").is_err());
        assert!(parse("knob x 10").unwrap_err().contains("channel"));
        assert!(parse("press").is_err());
        assert!(parse("dance").unwrap_err().contains("unknown command"));
    }

    fn console() -> (Console, cuebot_hal::sim::SimHardware) {
        let rig = SimRig::new(4).with_servo("arm").with_leds(1).build();
        let defs = [
            ButtonDef::LedPushButton {
                switch_pin: 17,
                led_pin: 5,
                label: Some("red".into()),
            },
            ButtonDef::GpioButton {
                pin: 4,
                label: None,
            },
        ];
        let buttons = Arc::new(ButtonBoard::new(&defs, Arc::clone(&rig.context)));
        let console = Console::new(
            Arc::clone(&rig.context),
            buttons,
            rig.sensor_handle.clone(),
            4,
            None,
        );
        (console, rig)
    }

    #[test]
    fn knob_and_fail_drive_the_simulated_adc() {
        let (console, rig) = console();
        console
            .execute(&Command::Knob {
                channel: 1,
                value: 700,
            })
            .unwrap();
        console.execute(&Command::Fail(2)).unwrap();

        assert_eq!(rig.sensor_handle.get(1), Some(700));
        assert_eq!(rig.sensor_handle.get(2), None);
        assert!(console.execute(&Command::Fail(9)).is_err());
    }

    #[test]
    fn press_toggles_led_and_shows_in_status() {
        let (console, rig) = console();
        console.execute(&Command::Press("red".into())).unwrap();
        assert_eq!(rig.context.led_state(0), Some(true));

        let status = console.execute(&Command::Status).unwrap();
        assert!(status.contains("red=on"));
        assert!(status.contains("arm=0.00"));
        assert!(console.execute(&Command::Press("purple".into())).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_input_keeps_the_console_pending() {
        let (console, rig) = console();
        let (tx, lines) = mpsc::channel(4);
        tx.send("knob 1 300".to_string()).await.unwrap();
        drop(tx);

        let served =
            tokio::time::timeout(std::time::Duration::from_secs(60), console.serve(lines)).await;

        assert!(served.is_err(), "end of input must not finish the console");
        assert_eq!(rig.sensor_handle.get(1), Some(300));
    }

    #[tokio::test]
    async fn quit_finishes_the_console() {
        let (console, _rig) = console();
        let (tx, lines) = mpsc::channel(4);
        tx.send("status".to_string()).await.unwrap();
        tx.send("quit".to_string()).await.unwrap();

        console.serve(lines).await;
        drop(tx);
    }

    #[test]
    fn enqueue_without_runner_is_an_error() {
        let (console, _rig) = console();
        assert!(matches!(
            console.execute(&Command::Enqueue("MainLoop".into())),
            Err(CueError::Channel(_))
        ));
    }
}
