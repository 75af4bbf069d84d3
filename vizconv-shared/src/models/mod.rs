// SPDX-License-Identifier: GPL-3.0-only
pub mod frame;
pub mod property;
pub mod scalar;
pub mod spectrum;
pub mod types;

pub use frame::VisualizationDataFrame;
pub use property::Property;
pub use scalar::ScalarData;
pub use spectrum::{SILENCE_DB, SpectrumData, SpectrumGrid, silence};
pub use types::{AnalyzerType, PlaybackState, ScaleType};
