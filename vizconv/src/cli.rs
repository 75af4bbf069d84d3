// SPDX-License-Identifier: GPL-3.0-only
use clap::parser::ValueSource;
use clap::{ArgAction, ArgMatches, Command, arg, command, value_parser};
use strum::VariantNames;
use vizconv_shared::{AnalyzerType, ScaleType};

use crate::config::ConverterConfig;

pub const DEFAULT_FRAMES: &str = "120";

#[must_use]
pub fn build() -> Command {
    command!()
    .about("Reshape live visualization frames to a requested channel and bin layout")
    .long_about(
        "Binds a converter to a synthetic audio analysis source, applies the configured overrides and prints every converted frame and configuration change."
    )
    .subcommand_required(false)
    .arg_required_else_help(false)
    .subcommand(
        Command::new("save-config")
            .about("Save the effective settings as the new defaults")
            .long_about("Merge command line overrides into the stored configuration and write it back to disk.")
    )
    .arg(
        arg!(--"frequency-count" <count> "Number of spectrum bins in converted frames")
        .value_parser(value_parser!(u32).range(1..))
    )
    .arg(
        arg!(--channels <count> "Number of channels in converted frames")
        .value_parser(value_parser!(u32).range(1..))
    )
    .arg(
        arg!(--"rise-ms" <ms> "Smoothing time constant for rising values, in milliseconds")
        .value_parser(value_parser!(u64).range(1..))
    )
    .arg(
        arg!(--"fall-ms" <ms> "Smoothing time constant for falling values, in milliseconds")
        .value_parser(value_parser!(u64).range(1..))
    )
    .arg(
        arg!(--"min-frequency" <hz> "Lowest frequency of the converted spectrum")
        .value_parser(value_parser!(f32))
    )
    .arg(
        arg!(--"max-frequency" <hz> "Highest frequency of the converted spectrum")
        .value_parser(value_parser!(f32))
    )
    .arg(
        arg!(--scale <scale> "Frequency scale of the converted spectrum")
        .help(format!("Choose bin spacing: {}", ScaleType::VARIANTS.join(", ")))
        .value_parser(value_parser!(ScaleType))
    )
    .arg(
        arg!(--analyzers <types> "Data kinds to keep, e.g. rms|spectrum")
        .value_parser(value_parser!(AnalyzerType))
    )
    .arg(
        arg!(--"no-cache" "Return nothing instead of the last frame when the source has none")
        .action(ArgAction::SetTrue)
    )
    .arg(
        arg!(--frames <count> "Number of frames to poll before exiting")
        .default_value(DEFAULT_FRAMES)
        .value_parser(value_parser!(u64))
    )
    .arg(
        arg!(--fps <fps> "Polling rate of the demo renderer")
        .value_parser(value_parser!(f32))
    )
    .arg(
        arg!(--json "Print converted frames as JSON")
        .action(ArgAction::SetTrue)
    )
    .arg(
        arg!(-v --verbose ... "Enable verbose logging")
        .action(ArgAction::SetTrue)
    )
}

fn explicit<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Option<T> {
    if matches.value_source(id) == Some(ValueSource::CommandLine) {
        matches.get_one::<T>(id).cloned()
    } else {
        None
    }
}

/// Overlay options given on the command line onto `config`
pub fn merge_into(matches: &ArgMatches, config: &mut ConverterConfig) {
    let overrides = &mut config.converter;

    if let Some(count) = explicit::<u32>(matches, "frequency-count") {
        overrides.frequency_count = Some(count);
    }
    if let Some(count) = explicit::<u32>(matches, "channels") {
        overrides.channel_count = Some(count);
    }
    if let Some(ms) = explicit::<u64>(matches, "rise-ms") {
        overrides.rise_ms = Some(ms);
    }
    if let Some(ms) = explicit::<u64>(matches, "fall-ms") {
        overrides.fall_ms = Some(ms);
    }
    if let Some(hz) = explicit::<f32>(matches, "min-frequency") {
        overrides.min_frequency = Some(hz);
    }
    if let Some(hz) = explicit::<f32>(matches, "max-frequency") {
        overrides.max_frequency = Some(hz);
    }
    if let Some(scale) = explicit::<ScaleType>(matches, "scale") {
        overrides.frequency_scale = Some(scale);
    }
    if let Some(types) = explicit::<AnalyzerType>(matches, "analyzers") {
        overrides.analyzer_types = Some(types);
    }
    if matches.get_flag("no-cache") {
        overrides.cache_data = false;
    }
    if let Some(fps) = explicit::<f32>(matches, "fps") {
        config.demo.fps = fps;
    }
}
