// SPDX-License-Identifier: GPL-3.0-only
//! Spectral rebinning between bin grids.
//!
//! Every target bin is evaluated at its center frequency. That frequency is
//! located on the source grid and the magnitude is interpolated linearly
//! between the two neighboring source bin centers. Between the outermost bin
//! center and the edge of the source range the edge bin value is held. Target
//! bins centered outside the source range are silent.

use vizconv_shared::SpectrumGrid;

/// Tolerance, in source-bin units, for centers that land on the range edge
const EDGE_TOLERANCE: f32 = 1e-3;

/// Where each target bin reads from on the source grid
#[derive(Debug, Clone, PartialEq)]
pub struct RebinPlan {
    taps: Vec<Tap>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tap {
    Silent,
    Interpolate { lower: usize, upper: usize, t: f32 },
}

impl RebinPlan {
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn new(from: &SpectrumGrid, to: &SpectrumGrid) -> Self {
        let targets = to.frequency_count() as usize;
        let Some(last) = (from.frequency_count() as usize).checked_sub(1) else {
            return Self {
                taps: vec![Tap::Silent; targets],
            };
        };
        let upper_edge = last as f32 + 0.5 + EDGE_TOLERANCE;
        let lower_edge = -0.5 - EDGE_TOLERANCE;

        let taps = (0..targets)
            .map(|i| match from.fractional_index(to.bin_frequency(i)) {
                Some(x) if (lower_edge..=upper_edge).contains(&x) => {
                    let x = x.clamp(0.0, last as f32);
                    let lower = x.floor() as usize;
                    let upper = (lower + 1).min(last);
                    Tap::Interpolate {
                        lower,
                        upper,
                        t: x - lower as f32,
                    }
                }
                _ => Tap::Silent,
            })
            .collect();

        Self { taps }
    }

    /// Resample one channel; `silence` fills bins outside the source range
    #[must_use]
    pub fn apply(&self, values: &[f32], silence: f32) -> Vec<f32> {
        self.taps
            .iter()
            .map(|tap| match *tap {
                Tap::Silent => silence,
                Tap::Interpolate { lower, upper, t } => {
                    values[lower] + (values[upper] - values[lower]) * t
                }
            })
            .collect()
    }
}
