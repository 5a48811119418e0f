//! Plain-text rendering of an engine snapshot.

use chrono::{DateTime, Local, Utc};
use std::fmt::Write;
use weatherdash_core::{EngineState, PollPhase, TemperatureUnit, units};

fn temp(value_c: f64, unit: TemperatureUnit) -> String {
    format!("{:.1}°{}", units::convert(value_c, unit), unit)
}

const BAR_WIDTH: usize = 20;

/// Horizontal bar for `value` scaled against `max`. Non-positive values draw nothing.
fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max).min(1.0) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(filled)
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn render(state: &EngineState, unit: TemperatureUnit, watched: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(err) = &state.error {
        let _ = writeln!(out, "!! {err} (showing last known values)");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Current weather");
    if state.observations.is_empty() {
        let _ = writeln!(out, "  no observations yet");
    }
    for obs in &state.observations {
        let marker = if watched == Some(obs.location.as_str()) { "*" } else { " " };
        let _ = writeln!(
            out,
            " {marker}{glyph} {name:<12} {temp:>9}  feels {feels:>9}  {cond:<10} hum {hum:>3}%  wind {wind:.1} m/s",
            glyph = obs.condition_kind().glyph(),
            name = obs.location,
            temp = temp(obs.temperature_c, unit),
            feels = temp(obs.feels_like_c, unit),
            cond = obs.condition,
            hum = obs.humidity_pct,
            wind = obs.wind_speed_mps,
        );
    }

    if !state.observations.is_empty() {
        let hottest = state
            .observations
            .iter()
            .map(|obs| units::convert(obs.temperature_c, unit))
            .fold(f64::MIN, f64::max);

        let _ = writeln!(out);
        let _ = writeln!(out, "Comparison");
        for obs in &state.observations {
            let _ = writeln!(
                out,
                "  {name:<12} temp {tbar:<width$} {temp:>9}  hum {hbar:<width$} {hum:>3}%",
                name = obs.location,
                tbar = bar(units::convert(obs.temperature_c, unit), hottest),
                temp = temp(obs.temperature_c, unit),
                hbar = bar(f64::from(obs.humidity_pct), 100.0),
                hum = obs.humidity_pct,
                width = BAR_WIDTH,
            );
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Daily summaries");
    if state.summaries.is_empty() {
        let _ = writeln!(out, "  none");
    }
    for s in &state.summaries {
        let _ = writeln!(
            out,
            "  {date}  {name:<12} avg {avg:>9}  max {max:>9}  min {min:>9}  {cond} ({n} readings)",
            date = s.date,
            name = s.location,
            avg = temp(s.average_temp_c, unit),
            max = temp(s.max_temp_c, unit),
            min = temp(s.min_temp_c, unit),
            cond = s.dominant_condition,
            n = s.sample_count,
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Alerts");
    if state.alerts.is_empty() {
        let _ = writeln!(out, "  No active alerts");
    }
    for alert in state.alerts.active() {
        let _ = writeln!(out, "  [{}] {}", local_time(alert.raised_at), alert.message);
    }

    if !state.failures.is_empty() && state.error.is_none() {
        let _ = writeln!(out);
        for failure in &state.failures {
            let _ = writeln!(out, "  skipped: {failure}");
        }
    }

    let _ = writeln!(out);
    let status = match state.phase {
        PollPhase::Fetching => "fetching...".to_string(),
        PollPhase::Idle => match state.next_poll_at {
            Some(next) => format!("next poll at {}", local_time(next)),
            None => "idle".to_string(),
        },
    };
    let _ = writeln!(out, "cycles: {}  {}", state.cycles, status);

    out
}
