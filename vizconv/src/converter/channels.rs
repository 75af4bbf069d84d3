// SPDX-License-Identifier: GPL-3.0-only
//! Channel count conversion.
//!
//! Without an explicit matrix, up-mixing copies source channel
//! `floor(t * S / T)` into target channel `t` (so mono feeds every target
//! channel) and down-mixing averages every source channel `s` with
//! `floor(s * T / S) == t` into target channel `t`.

/// Per target channel, the weighted source channels it is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMix {
    source_channels: usize,
    rows: Vec<Vec<(usize, f32)>>,
}

impl ChannelMix {
    /// Mix derived from the nearest-neighbor partition rule
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn partition(source_channels: usize, target_channels: usize) -> Self {
        let rows = if target_channels >= source_channels {
            (0..target_channels)
                .map(|t| vec![(t * source_channels / target_channels, 1.0)])
                .collect()
        } else {
            let mut rows: Vec<Vec<(usize, f32)>> = vec![Vec::new(); target_channels];
            for s in 0..source_channels {
                rows[s * target_channels / source_channels].push((s, 1.0));
            }
            for row in &mut rows {
                let weight = 1.0 / row.len() as f32;
                for entry in row.iter_mut() {
                    entry.1 = weight;
                }
            }
            rows
        };

        Self {
            source_channels,
            rows,
        }
    }

    /// Mix from a row-major `target x source` coefficient matrix.
    ///
    /// Returns `None` when the matrix size does not match the channel counts.
    #[must_use]
    pub fn from_matrix(
        coefficients: &[f32],
        source_channels: usize,
        target_channels: usize,
    ) -> Option<Self> {
        if source_channels == 0 || coefficients.len() != source_channels * target_channels {
            return None;
        }
        let rows = coefficients
            .chunks(source_channels)
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, w)| **w != 0.0)
                    .map(|(s, w)| (s, *w))
                    .collect()
            })
            .collect();

        Some(Self {
            source_channels,
            rows,
        })
    }

    #[must_use]
    pub fn target_channels(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.rows.len() == self.source_channels
            && self
                .rows
                .iter()
                .enumerate()
                .all(|(t, row)| row.as_slice() == [(t, 1.0)])
    }

    /// Mix one value per channel
    #[must_use]
    pub fn apply_scalar(&self, values: &[f32]) -> Vec<f32> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|&(s, w)| values[s] * w).sum())
            .collect()
    }

    /// Mix whole channels bin by bin
    #[must_use]
    pub fn apply_channels(&self, channels: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let bins = channels.first().map_or(0, Vec::len);
        self.rows
            .iter()
            .map(|row| {
                let mut mixed = vec![0.0; bins];
                for &(s, w) in row {
                    for (out, value) in mixed.iter_mut().zip(&channels[s]) {
                        *out += value * w;
                    }
                }
                mixed
            })
            .collect()
    }
}
