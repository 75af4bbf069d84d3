// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

use crate::models::types::ScaleType;
use crate::validation::ValidationError;

/// Floor used as "silence" for dB-scaled magnitudes
pub const SILENCE_DB: f32 = -100.0;

/// Value representing silence for the given amplitude scale
#[must_use]
pub fn silence(amplitude_scale: ScaleType) -> f32 {
    match amplitude_scale {
        ScaleType::Linear => 0.0,
        ScaleType::Logarithmic => SILENCE_DB,
    }
}

/// Frequency bin layout of a spectrum.
///
/// The range `[min_frequency, max_frequency]` is split into `frequency_count`
/// equal bins, equal in Hz for `Linear` and equal in log-frequency for
/// `Logarithmic`. Each bin is represented by its center frequency.
///
/// Only [`SpectrumGrid::new`] builds a grid, deserialization included, so a
/// grid always has at least one bin and an ascending finite range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGrid")]
pub struct SpectrumGrid {
    frequency_count: u32,
    frequency_scale: ScaleType,
    min_frequency: f32,
    max_frequency: f32,
}

#[derive(Deserialize)]
struct RawGrid {
    frequency_count: u32,
    frequency_scale: ScaleType,
    min_frequency: f32,
    max_frequency: f32,
}

impl TryFrom<RawGrid> for SpectrumGrid {
    type Error = ValidationError;

    fn try_from(raw: RawGrid) -> Result<Self, Self::Error> {
        Self::new(
            raw.frequency_count,
            raw.frequency_scale,
            raw.min_frequency,
            raw.max_frequency,
        )
    }
}

impl SpectrumGrid {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the bin count is zero, the range is not
    /// finite and ascending, or a logarithmic grid starts at or below 0 Hz.
    pub fn new(
        frequency_count: u32,
        frequency_scale: ScaleType,
        min_frequency: f32,
        max_frequency: f32,
    ) -> Result<Self, ValidationError> {
        if frequency_count == 0 {
            return Err(ValidationError::InvalidFrequencyCount {
                value: frequency_count,
            });
        }
        if !min_frequency.is_finite() || !max_frequency.is_finite() {
            return Err(ValidationError::NonFiniteFrequency {
                value: if min_frequency.is_finite() {
                    max_frequency
                } else {
                    min_frequency
                },
            });
        }
        crate::validation::validate_min_frequency(
            min_frequency,
            Some(frequency_scale),
            Some(max_frequency),
        )?;

        Ok(Self {
            frequency_count,
            frequency_scale,
            min_frequency,
            max_frequency,
        })
    }

    #[must_use]
    pub fn frequency_count(&self) -> u32 {
        self.frequency_count
    }

    #[must_use]
    pub fn frequency_scale(&self) -> ScaleType {
        self.frequency_scale
    }

    #[must_use]
    pub fn min_frequency(&self) -> f32 {
        self.min_frequency
    }

    #[must_use]
    pub fn max_frequency(&self) -> f32 {
        self.max_frequency
    }

    /// Width of one bin: Hz for linear grids, natural-log units for logarithmic ones
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn step(&self) -> f32 {
        let (lo, hi) = self.axis_bounds();
        (hi - lo) / self.frequency_count as f32
    }

    /// Center frequency of bin `index` in Hz
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_frequency(&self, index: usize) -> f32 {
        let (lo, _) = self.axis_bounds();
        let position = lo + (index as f32 + 0.5) * self.step();
        match self.frequency_scale {
            ScaleType::Linear => position,
            ScaleType::Logarithmic => position.exp(),
        }
    }

    /// Ascending bin center frequencies
    #[must_use]
    pub fn frequencies(&self) -> Vec<f32> {
        (0..self.frequency_count as usize)
            .map(|i| self.bin_frequency(i))
            .collect()
    }

    /// Position of `frequency` in bin-index units, where bin `i` is centered at `i`.
    ///
    /// Frequencies inside the covered range map to `[-0.5, count - 0.5]`.
    /// Returns `None` for frequencies that cannot be placed on a logarithmic axis.
    #[must_use]
    pub fn fractional_index(&self, frequency: f32) -> Option<f32> {
        let position = match self.frequency_scale {
            ScaleType::Linear => frequency,
            ScaleType::Logarithmic if frequency > 0.0 => frequency.ln(),
            ScaleType::Logarithmic => return None,
        };
        let (lo, _) = self.axis_bounds();
        Some((position - lo) / self.step() - 0.5)
    }

    fn axis_bounds(&self) -> (f32, f32) {
        match self.frequency_scale {
            ScaleType::Linear => (self.min_frequency, self.max_frequency),
            ScaleType::Logarithmic => (self.min_frequency.ln(), self.max_frequency.ln()),
        }
    }
}

/// Per-channel, per-bin magnitudes on a [`SpectrumGrid`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSpectrum")]
pub struct SpectrumData {
    grid: SpectrumGrid,
    amplitude_scale: ScaleType,
    channels: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct RawSpectrum {
    grid: SpectrumGrid,
    amplitude_scale: ScaleType,
    channels: Vec<Vec<f32>>,
}

impl TryFrom<RawSpectrum> for SpectrumData {
    type Error = ValidationError;

    fn try_from(raw: RawSpectrum) -> Result<Self, Self::Error> {
        Self::new(raw.channels, raw.amplitude_scale, raw.grid)
    }
}

impl SpectrumData {
    /// # Errors
    ///
    /// Returns [`ValidationError::SpectrumShapeMismatch`] if there are no channels
    /// or any channel does not hold exactly `grid.frequency_count` values.
    pub fn new(
        channels: Vec<Vec<f32>>,
        amplitude_scale: ScaleType,
        grid: SpectrumGrid,
    ) -> Result<Self, ValidationError> {
        let expected = grid.frequency_count as usize;
        if channels.is_empty() {
            return Err(ValidationError::SpectrumShapeMismatch {
                expected,
                actual: 0,
            });
        }
        if let Some(bad) = channels.iter().find(|c| c.len() != expected) {
            return Err(ValidationError::SpectrumShapeMismatch {
                expected,
                actual: bad.len(),
            });
        }

        Ok(Self {
            grid,
            amplitude_scale,
            channels,
        })
    }

    /// Silent spectrum with the given shape
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] under the same rules as [`SpectrumGrid::new`],
    /// or if `channel_count` is zero.
    pub fn create_empty(
        channel_count: u32,
        frequency_count: u32,
        amplitude_scale: ScaleType,
        frequency_scale: ScaleType,
        min_frequency: f32,
        max_frequency: f32,
    ) -> Result<Self, ValidationError> {
        if channel_count == 0 {
            return Err(ValidationError::InvalidChannelCount {
                value: channel_count,
            });
        }
        let grid = SpectrumGrid::new(frequency_count, frequency_scale, min_frequency, max_frequency)?;
        let channels =
            vec![vec![silence(amplitude_scale); frequency_count as usize]; channel_count as usize];
        Self::new(channels, amplitude_scale, grid)
    }

    #[must_use]
    pub fn grid(&self) -> &SpectrumGrid {
        &self.grid
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    #[must_use]
    pub fn frequency_count(&self) -> u32 {
        self.grid.frequency_count
    }

    #[must_use]
    pub fn frequency_scale(&self) -> ScaleType {
        self.grid.frequency_scale
    }

    #[must_use]
    pub fn amplitude_scale(&self) -> ScaleType {
        self.amplitude_scale
    }

    #[must_use]
    pub fn min_frequency(&self) -> f32 {
        self.grid.min_frequency
    }

    #[must_use]
    pub fn max_frequency(&self) -> f32 {
        self.grid.max_frequency
    }

    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    #[must_use]
    pub fn frequencies(&self) -> Vec<f32> {
        self.grid.frequencies()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_grid_centers() {
        let grid = SpectrumGrid::new(4, ScaleType::Linear, 0.0, 400.0).unwrap();
        assert_eq!(grid.frequencies(), vec![50.0, 150.0, 250.0, 350.0]);
        assert_eq!(grid.fractional_index(50.0), Some(0.0));
        assert_eq!(grid.fractional_index(0.0), Some(-0.5));
        assert_eq!(grid.fractional_index(400.0), Some(3.5));
    }

    #[test]
    fn test_log_grid_centers_are_geometric() {
        let grid = SpectrumGrid::new(2, ScaleType::Logarithmic, 10.0, 1000.0).unwrap();
        let freqs = grid.frequencies();
        assert!((freqs[0] - 31.622_776).abs() < 1e-3);
        assert!((freqs[1] - 316.227_77).abs() < 1e-2);
        assert_eq!(grid.fractional_index(0.0), None);
        assert!((grid.fractional_index(10.0).unwrap() + 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_grid_rejects_bad_ranges() {
        assert!(SpectrumGrid::new(0, ScaleType::Linear, 0.0, 100.0).is_err());
        assert!(SpectrumGrid::new(8, ScaleType::Linear, 100.0, 100.0).is_err());
        assert!(SpectrumGrid::new(8, ScaleType::Linear, -1.0, 100.0).is_err());
        assert!(SpectrumGrid::new(8, ScaleType::Logarithmic, 0.0, 100.0).is_err());
        assert!(SpectrumGrid::new(8, ScaleType::Linear, 0.0, f32::NAN).is_err());
    }

    #[test]
    fn test_create_empty_shape() {
        let spectrum =
            SpectrumData::create_empty(2, 1024, ScaleType::Linear, ScaleType::Linear, 0.0, 22100.0)
                .unwrap();
        assert_eq!(spectrum.channel_count(), 2);
        assert_eq!(spectrum.frequency_count(), 1024);
        assert!(spectrum.channels().iter().flatten().all(|&v| v == 0.0));

        let db = SpectrumData::create_empty(
            1,
            4,
            ScaleType::Logarithmic,
            ScaleType::Linear,
            0.0,
            100.0,
        )
        .unwrap();
        assert_eq!(db.channel(0).unwrap(), &[SILENCE_DB; 4]);
    }

    #[test]
    fn test_deserialize_validates_grid() {
        let grid: SpectrumGrid = serde_json::from_str(
            r#"{"frequency_count":4,"frequency_scale":"linear","min_frequency":0.0,"max_frequency":400.0}"#,
        )
        .unwrap();
        assert_eq!(grid, SpectrumGrid::new(4, ScaleType::Linear, 0.0, 400.0).unwrap());

        let empty = serde_json::from_str::<SpectrumGrid>(
            r#"{"frequency_count":0,"frequency_scale":"linear","min_frequency":0.0,"max_frequency":400.0}"#,
        );
        assert!(empty.is_err());

        let collapsed = serde_json::from_str::<SpectrumGrid>(
            r#"{"frequency_count":4,"frequency_scale":"linear","min_frequency":100.0,"max_frequency":100.0}"#,
        );
        assert!(collapsed.is_err());
    }

    #[test]
    fn test_deserialize_validates_spectrum_shape() {
        let grid = SpectrumGrid::new(2, ScaleType::Linear, 0.0, 20.0).unwrap();
        let spectrum = SpectrumData::new(vec![vec![1.0, 2.0]], ScaleType::Linear, grid).unwrap();
        let json = serde_json::to_string(&spectrum).unwrap();
        assert_eq!(serde_json::from_str::<SpectrumData>(&json).unwrap(), spectrum);

        let ragged = json.replace("[1.0,2.0]", "[1.0]");
        assert!(serde_json::from_str::<SpectrumData>(&ragged).is_err());
    }

    #[test]
    fn test_new_rejects_ragged_channels() {
        let grid = SpectrumGrid::new(3, ScaleType::Linear, 0.0, 30.0).unwrap();
        let result = SpectrumData::new(vec![vec![0.0; 3], vec![0.0; 2]], ScaleType::Linear, grid);
        assert!(matches!(
            result,
            Err(ValidationError::SpectrumShapeMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }
}
