//! Summarizes a captured serial console log of the monitor.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;

use climate_common::report::summarize;

#[derive(Debug, Parser)]
#[command(name = "climate-report")]
#[command(about = "Summarize readings from a captured monitor console log")]
struct Cli {
    /// Console capture containing the CSV header and data lines.
    path: PathBuf,
    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let path = cli.path.display();
    let text = std::fs::read_to_string(&cli.path)
        .with_context(|| format!("failed to read {path}"))?;

    let Some(summary) = summarize(&text) else {
        bail!("{path} contains no readings");
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Loaded {} readings from {path}", summary.count);
    println!("Time range: {} to {}", summary.first, summary.last);
    println!(
        "Temperature: min {:.2}°C, max {:.2}°C, mean {:.2}°C",
        summary.temperature_c.min, summary.temperature_c.max, summary.temperature_c.mean
    );
    println!(
        "Humidity: min {:.1}% RH, max {:.1}% RH, mean {:.1}% RH",
        summary.humidity_rh.min, summary.humidity_rh.max, summary.humidity_rh.mean
    );
    if summary.skipped_lines > 0 {
        println!("Skipped {} non-data line(s)", summary.skipped_lines);
    }
    Ok(())
}
