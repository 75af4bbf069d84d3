// SPDX-License-Identifier: GPL-3.0-only
pub mod cli;
pub mod config;
pub mod converter;
pub mod demo;

// Re-export the main run function
pub use app_main::run;
pub use converter::{ConverterError, SourceConverter};

mod app_main;
