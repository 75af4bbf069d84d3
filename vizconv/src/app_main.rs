// SPDX-License-Identifier: GPL-3.0-only

//! Command line entry point
//!
//! Wires a [`SourceConverter`] to a [`DemoSource`], applies stored and
//! command line overrides, then plays the role of a renderer polling once per
//! display frame.

use crate::cli;
use crate::config::ConverterConfig;
use crate::converter::SourceConverter;
use crate::demo::DemoSource;
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use vizconv_shared::{ConfigurationChanged, VisualizationDataFrame};

/// One converted frame as printed with `--json`
#[derive(Debug, Serialize)]
struct FrameReport<'a> {
    index: u64,
    frame: Option<&'a VisualizationDataFrame>,
}

/// Main entry point for the CLI
///
/// # Errors
///
/// Returns an error if the demo source or the overrides are invalid, or the
/// configuration cannot be saved.
pub async fn run() -> Result<()> {
    let matches = cli::build().get_matches();

    // Initialize logging - respect RUST_LOG env var, fallback to verbose flag
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    } else {
        let log_level = if matches.get_flag("verbose") {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .init();
    }

    let mut config = ConverterConfig::load();
    cli::merge_into(&matches, &mut config);

    if matches.subcommand_matches("save-config").is_some() {
        let path = config.save()?;
        println!("Saved configuration to {}", path.display());
        return Ok(());
    }

    let frames = matches.get_one::<u64>("frames").copied().unwrap_or(0);
    let json = matches.get_flag("json");

    let source = Arc::new(DemoSource::new(&config.demo).context("Invalid demo source settings")?);
    let converter = SourceConverter::new();
    converter
        .subscribe(move |event: &ConfigurationChanged| {
            if json {
                println!("{{\"changed\":\"{}\"}}", event.property);
            } else {
                println!("changed: {}", event.property);
            }
        })
        .context("Failed to subscribe to converter changes")?;

    converter.set_source(Some(source.clone()));
    config
        .converter
        .apply_to(&converter)
        .context("Invalid converter overrides")?;

    info!(
        "Converting {} channels x {} bins to {} channels x {} bins",
        config.demo.channels,
        config.demo.frequency_count,
        describe(converter.channel_count()),
        describe(converter.frequency_count()),
    );

    let polled = tokio::select! {
        polled = drive(&converter, &source, frames, config.demo.fps, |index, frame| {
            print_frame(index, frame, json);
        }) => polled,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping");
            0
        }
    };

    converter.unbind();
    info!("Polled {polled} frames");
    Ok(())
}

fn describe(value: Option<u32>) -> String {
    value.map_or_else(|| "native".to_string(), |v| v.to_string())
}

/// Advance `source` and poll `converter` once per tick, `frames` times.
///
/// Returns the number of polls that yielded a frame.
pub async fn drive<F>(
    converter: &SourceConverter,
    source: &DemoSource,
    frames: u64,
    fps: f32,
    mut emit: F,
) -> u64
where
    F: FnMut(u64, Option<&VisualizationDataFrame>),
{
    let period = if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f32(1.0 / fps)
    } else {
        warn!("Ignoring unusable fps {fps}, polling at 60 Hz");
        Duration::from_secs_f32(1.0 / 60.0)
    };

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut produced = 0;
    for index in 0..frames {
        ticker.tick().await;
        source.advance(period);
        let frame = converter.get_data();
        if frame.is_some() {
            produced += 1;
        }
        emit(index, frame.as_deref());
    }
    produced
}

fn print_frame(index: u64, frame: Option<&VisualizationDataFrame>, json: bool) {
    if json {
        match serde_json::to_string(&FrameReport { index, frame }) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("Failed to serialize frame {index}: {e}"),
        }
        return;
    }

    let Some(frame) = frame else {
        println!("#{index:<5} no data");
        return;
    };

    let rms = frame
        .rms()
        .map_or_else(|| "-".to_string(), |d| format!("{:.3?}", d.values()));
    let spectrum = frame.spectrum().map_or_else(
        || "-".to_string(),
        |s| {
            let loudest = s
                .channel(0)
                .and_then(|c| {
                    c.iter()
                        .enumerate()
                        .max_by(|a, b| a.1.total_cmp(b.1))
                        .map(|(bin, _)| bin)
                })
                .unwrap_or(0);
            format!(
                "{}x{} {} peak@{:.0}Hz",
                s.channel_count(),
                s.frequency_count(),
                s.frequency_scale(),
                s.grid().bin_frequency(loudest)
            )
        },
    );
    println!(
        "#{index:<5} t={:>8.3}s rms={rms} spectrum={spectrum}",
        frame.time().as_secs_f64()
    );
}
