use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Select, validator::Validation};
use std::{future::Future, sync::Arc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use weatherdash_core::{
    Config, CycleOutcome, EngineState, ObservationSource, PollEvent, PollHandle, PollOrchestrator,
    TemperatureUnit, config::source_from_config,
};

use crate::{
    console::{self, ConsoleCommand},
    render,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and dashboard settings.
    Configure,

    /// Poll every location once and print the dashboard.
    Once {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Keep polling and re-render after every cycle. Reads commands on stdin.
    Watch {
        /// Poll period in minutes.
        #[arg(long)]
        interval: Option<u32>,

        #[command(flatten)]
        overrides: Overrides,
    },

    /// List tracked locations.
    Locations,
}

/// Per-run overrides of the stored dashboard settings.
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Display unit, C or F.
    #[arg(long)]
    pub unit: Option<TemperatureUnit>,

    /// Alert threshold in the display unit.
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// Location whose readings drive alerts.
    #[arg(long)]
    pub city: Option<String>,

    /// Print the engine state as JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        if let Some(unit) = self.unit {
            config.dashboard.switch_unit(unit);
        }
        if let Some(threshold) = self.threshold {
            config.dashboard.alert_threshold = threshold;
        }
        if let Some(city) = &self.city {
            config.dashboard.watched_location = Some(city.clone());
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Once { overrides } => once(&overrides).await,
            Command::Watch {
                interval,
                overrides,
            } => watch(interval, &overrides).await,
            Command::Locations => {
                let config = Config::load()?;
                for loc in &config.locations {
                    println!("{:<12} {:>9.4} {:>9.4}", loc.name, loc.latitude, loc.longitude);
                }
                Ok(())
            }
        }
    }
}

fn load_config(interval: Option<u32>, overrides: &Overrides) -> Result<Config> {
    let mut config = Config::load()?;
    overrides.apply(&mut config);
    if let Some(minutes) = interval {
        config.dashboard.update_interval_minutes = minutes;
    }
    config.validate()?;
    Ok(config)
}

fn build_orchestrator(config: &Config) -> Result<PollOrchestrator> {
    let source: Arc<dyn ObservationSource> = Arc::new(source_from_config(config)?);
    let orchestrator =
        PollOrchestrator::new(source, config.locations.clone(), config.dashboard.clone())?;
    Ok(orchestrator)
}

fn print_state(
    state: &EngineState,
    unit: TemperatureUnit,
    watched: Option<&str>,
    json: bool,
) -> Result<()> {
    if json {
        let line = serde_json::to_string(state).context("Failed to serialize engine state")?;
        println!("{line}");
    } else {
        println!("{}", render::render(state, unit, watched));
    }
    Ok(())
}

async fn once(overrides: &Overrides) -> Result<()> {
    let config = load_config(None, overrides)?;
    let mut orchestrator = build_orchestrator(&config)?;

    let report = orchestrator.run_cycle().await;
    let watched = config.dashboard.watched(&config.locations);
    print_state(
        orchestrator.state(),
        config.dashboard.temperature_unit,
        watched,
        overrides.json,
    )?;

    if report.outcome == CycleOutcome::Failed {
        bail!("No location could be fetched");
    }
    Ok(())
}

async fn watch(interval: Option<u32>, overrides: &Overrides) -> Result<()> {
    let config = load_config(interval, overrides)?;
    let view = View {
        unit: config.dashboard.temperature_unit,
        watched: config
            .dashboard
            .watched(&config.locations)
            .map(str::to_owned),
        json: overrides.json,
    };

    let (handle, events) = build_orchestrator(&config)?.spawn();
    if !overrides.json {
        eprintln!("Type `help` for commands, Ctrl-C to stop.");
    }

    run_console(
        handle,
        events,
        BufReader::new(tokio::io::stdin()),
        tokio::signal::ctrl_c(),
        view,
    )
    .await
}

/// What the live console renders with.
#[derive(Debug, Clone)]
struct View {
    unit: TemperatureUnit,
    watched: Option<String>,
    json: bool,
}

/// Render on every poll event and apply console commands until `quit` or
/// `shutdown` resolves. The orchestrator is shut down on the way out.
async fn run_console<R, S>(
    handle: PollHandle,
    mut events: mpsc::Receiver<PollEvent>,
    input: R,
    shutdown: S,
    mut view: View,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future,
{
    let mut lines = input.lines();
    let mut stdin_open = true;
    // created once so a signal landing mid-render is not lost
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break Ok(()) };
                if let PollEvent::CycleCompleted(report) = &event {
                    tracing::debug!(observed = report.observed, "cycle rendered");
                }
                let state = handle.snapshot().await;
                if let Err(err) = print_state(&state, view.unit, view.watched.as_deref(), view.json) {
                    break Err(err);
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match ConsoleCommand::parse(&line) {
                        Ok(ConsoleCommand::Quit) => break Ok(()),
                        Ok(cmd) => {
                            if let Err(err) = dispatch(&handle, cmd, &mut view).await {
                                eprintln!("error: {err:#}");
                            }
                        }
                        Err(err) => eprintln!("error: {err:#}"),
                    },
                    // no console attached; keep polling until Ctrl-C
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        tracing::warn!(error = %err, "stdin closed");
                        stdin_open = false;
                    }
                }
            }
            _ = &mut shutdown => break Ok(()),
        }
    };

    handle.shutdown().await;
    result
}

async fn dispatch(handle: &PollHandle, cmd: ConsoleCommand, view: &mut View) -> Result<()> {
    match cmd {
        ConsoleCommand::Unit(unit) => {
            handle.set_unit(unit).await?;
            view.unit = unit;
        }
        ConsoleCommand::Threshold(value) => handle.set_threshold(value).await?,
        ConsoleCommand::Interval(minutes) => handle.set_interval_minutes(minutes).await?,
        ConsoleCommand::City(name) => {
            handle.watch_location(&name).await?;
            view.watched = Some(name);
        }
        ConsoleCommand::Refresh => handle.refresh_now().await?,
        ConsoleCommand::Help => eprintln!("{}", console::HELP),
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key (leave empty to keep current):")
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let units = TemperatureUnit::all().to_vec();
    let current = units
        .iter()
        .position(|u| *u == config.dashboard.temperature_unit)
        .unwrap_or(0);
    let unit = Select::new("Temperature unit:", units)
        .with_starting_cursor(current)
        .prompt()?;
    config.dashboard.switch_unit(unit);

    config.dashboard.update_interval_minutes =
        CustomType::<u32>::new("Update interval (minutes):")
            .with_default(config.dashboard.update_interval_minutes)
            .with_validator(|v: &u32| {
                if *v == 0 {
                    Ok(Validation::Invalid("Must be at least 1 minute".into()))
                } else {
                    Ok(Validation::Valid)
                }
            })
            .prompt()?;

    let threshold_prompt = format!("Alert threshold (°{unit}):");
    config.dashboard.alert_threshold = CustomType::<f64>::new(&threshold_prompt)
        .with_default(config.dashboard.alert_threshold)
        .prompt()?;

    let names: Vec<String> = config.locations.iter().map(|l| l.name.clone()).collect();
    if !names.is_empty() {
        let current = config
            .dashboard
            .watched(&config.locations)
            .and_then(|w| names.iter().position(|n| n == w))
            .unwrap_or(0);
        let city = Select::new("Location to watch for alerts:", names)
            .with_starting_cursor(current)
            .prompt()?;
        config.dashboard.watched_location = Some(city);
    }

    config.validate()?;
    config.save()?;

    println!(
        "Saved configuration to {}",
        Config::config_file_path()?.display()
    );
    if config.api_key().is_none() {
        println!("No API key stored. Hint: re-run `weatherdash configure` or set OPENWEATHER_API_KEY.");
    }
    Ok(())
}
