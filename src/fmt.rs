//! Human-friendly CLI output formatters.
//!
//! Each `fmt_*` function formats one command's output for terminal display.
//! When `color` is true, ANSI escape codes are emitted via `owo_colors`.

use crate::commands::{
    IndexOutput, LaunchOutput, PinOutput, PinsOutput, RecentOutput, SearchOutput, StatsOutput,
};
use owo_colors::OwoColorize;
use std::io::{self, Write};

// ── search ──────────────────────────────────────────────────────────────────

pub fn fmt_search(w: &mut impl Write, out: &SearchOutput, color: bool) -> io::Result<()> {
    if out.results.is_empty() {
        writeln!(w, "No applications match '{}'", out.query)?;
        return Ok(());
    }

    for item in &out.results {
        let args = item
            .arguments
            .as_deref()
            .map(|a| format!(" {a}"))
            .unwrap_or_default();

        if color {
            let kind_colored = match item.kind {
                "exact" => format!("{:<9}", item.kind).green().to_string(),
                "prefix" => format!("{:<9}", item.kind).cyan().to_string(),
                "substring" => format!("{:<9}", item.kind).yellow().to_string(),
                _ => format!("{:<9}", item.kind).dimmed().to_string(),
            };
            writeln!(
                w,
                "{:>5} {} {}  {}",
                item.score,
                kind_colored,
                item.name.bold(),
                format_args!("{}{args}", item.executable).dimmed()
            )?;
        } else {
            writeln!(
                w,
                "{:>5} {:<9} {}  {}{args}",
                item.score, item.kind, item.name, item.executable
            )?;
        }
    }

    Ok(())
}

// ── index ───────────────────────────────────────────────────────────────────

pub fn fmt_index(w: &mut impl Write, out: &IndexOutput) -> io::Result<()> {
    writeln!(w, "{}", out.message)?;
    Ok(())
}

// ── stats ───────────────────────────────────────────────────────────────────

pub fn fmt_stats(w: &mut impl Write, out: &StatsOutput, color: bool) -> io::Result<()> {
    if color {
        writeln!(w, "{:<16} {}", "Applications:".bold(), out.total_apps)?;
        writeln!(w, "{:<16} {}", "Tokens:".bold(), out.total_tokens)?;
    } else {
        writeln!(w, "{:<16} {}", "Applications:", out.total_apps)?;
        writeln!(w, "{:<16} {}", "Tokens:", out.total_tokens)?;
    }

    if !out.by_source.is_empty() {
        writeln!(w)?;
        if color {
            writeln!(w, "{}", "By source:".bold())?;
        } else {
            writeln!(w, "By source:")?;
        }
        for entry in &out.by_source {
            writeln!(w, "  {:<12} {}", entry.source.as_str(), entry.count)?;
        }
    }

    Ok(())
}

// ── recent ──────────────────────────────────────────────────────────────────

pub fn fmt_recent(w: &mut impl Write, out: &RecentOutput, color: bool) -> io::Result<()> {
    for launch in &out.launches {
        let when = launch.launched_at.format("%Y-%m-%d %H:%M");
        let query = launch
            .query
            .as_deref()
            .map(|q| format!("  (\"{q}\")"))
            .unwrap_or_default();

        if color {
            writeln!(w, "{}  {}{}", when.dimmed(), launch.app.name.bold(), query)?;
        } else {
            writeln!(w, "{when}  {}{query}", launch.app.name)?;
        }
    }
    Ok(())
}

// ── launch ──────────────────────────────────────────────────────────────────

pub fn fmt_launch(w: &mut impl Write, out: &LaunchOutput, color: bool) -> io::Result<()> {
    if color {
        writeln!(w, "Launched {}  {}", out.name.bold(), out.executable.dimmed())?;
    } else {
        writeln!(w, "Launched {}  {}", out.name, out.executable)?;
    }
    Ok(())
}

// ── pins ────────────────────────────────────────────────────────────────────

pub fn fmt_pin(w: &mut impl Write, out: &PinOutput) -> io::Result<()> {
    let verb = match (out.pinned, out.changed) {
        (true, true) => "Pinned",
        (true, false) => "Already pinned:",
        (false, true) => "Unpinned",
        (false, false) => "Not pinned:",
    };
    writeln!(w, "{verb} {}", out.name)
}

pub fn fmt_pins(w: &mut impl Write, out: &PinsOutput, color: bool) -> io::Result<()> {
    if out.pins.is_empty() {
        return writeln!(w, "No pinned applications");
    }
    for (i, pin) in out.pins.iter().enumerate() {
        if color {
            writeln!(w, "{:>3}. {}  {}", i + 1, pin.app.name.bold(), pin.app.executable.dimmed())?;
        } else {
            writeln!(w, "{:>3}. {}  {}", i + 1, pin.app.name, pin.app.executable)?;
        }
    }
    Ok(())
}
