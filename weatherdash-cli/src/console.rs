use anyhow::{Context, Result, anyhow, bail};
use weatherdash_core::TemperatureUnit;

/// A command typed while `weatherdash watch` is running.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Unit(TemperatureUnit),
    Threshold(f64),
    Interval(u32),
    City(String),
    Refresh,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  unit C|F              switch display unit (threshold is restated)
  threshold <degrees>   alert threshold in the display unit
  interval <minutes>    poll period
  city <name>           location that drives alerts
  refresh               poll now
  quit                  stop watching";

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let cmd = match verb.to_lowercase().as_str() {
            "unit" | "u" => ConsoleCommand::Unit(rest.parse()?),
            "threshold" | "t" => ConsoleCommand::Threshold(
                rest.parse()
                    .with_context(|| format!("Invalid threshold '{rest}'"))?,
            ),
            "interval" | "i" => ConsoleCommand::Interval(
                rest.parse()
                    .with_context(|| format!("Invalid interval '{rest}'"))?,
            ),
            "city" | "c" => {
                if rest.is_empty() {
                    bail!("Usage: city <name>");
                }
                ConsoleCommand::City(rest.to_string())
            }
            "refresh" | "r" => ConsoleCommand::Refresh,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            "" => return Err(anyhow!("Empty command. Type `help` for a list.")),
            other => bail!("Unknown command '{other}'. Type `help` for a list."),
        };

        Ok(cmd)
    }
}
