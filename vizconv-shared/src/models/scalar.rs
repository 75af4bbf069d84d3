// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};

use crate::models::spectrum::silence;
use crate::models::types::ScaleType;

/// One value per channel, used for RMS and peak levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarData {
    amplitude_scale: ScaleType,
    values: Vec<f32>,
}

impl ScalarData {
    #[must_use]
    pub fn new(values: Vec<f32>, amplitude_scale: ScaleType) -> Self {
        Self {
            amplitude_scale,
            values,
        }
    }

    /// Silent values for `channel_count` channels
    #[must_use]
    pub fn create_empty(channel_count: u32, amplitude_scale: ScaleType) -> Self {
        Self::new(
            vec![silence(amplitude_scale); channel_count as usize],
            amplitude_scale,
        )
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, channel: usize) -> Option<f32> {
        self.values.get(channel).copied()
    }

    #[must_use]
    pub fn amplitude_scale(&self) -> ScaleType {
        self.amplitude_scale
    }
}
