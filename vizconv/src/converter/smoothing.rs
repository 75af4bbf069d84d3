// SPDX-License-Identifier: GPL-3.0-only
//! Attack/release smoothing of magnitudes across successive frames.
//!
//! Each value moves toward its new raw value along an exponential curve:
//! `out = prev + (raw - prev) * (1 - exp(-elapsed / tau))`, where `tau` is the
//! rise time when the value goes up and the fall time when it goes down. An
//! unset time constant passes the raw value straight through for that
//! direction. Zero elapsed time leaves the previous output untouched.

use std::time::Duration;

/// Time constants for rising and falling values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RiseFall {
    pub rise: Option<Duration>,
    pub fall: Option<Duration>,
}

impl RiseFall {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.rise.is_some() || self.fall.is_some()
    }

    /// Next output for one value
    #[must_use]
    pub fn step(&self, previous: f32, raw: f32, elapsed: Duration) -> f32 {
        let time_constant = if raw > previous {
            self.rise
        } else if raw < previous {
            self.fall
        } else {
            return raw;
        };

        match time_constant {
            Some(tau) => previous + (raw - previous) * approach(elapsed, tau),
            None => raw,
        }
    }
}

/// Fraction of the remaining distance covered after `elapsed`
#[allow(clippy::cast_possible_truncation)]
fn approach(elapsed: Duration, time_constant: Duration) -> f32 {
    let ratio = elapsed.as_secs_f64() / time_constant.as_secs_f64();
    (1.0 - (-ratio).exp()) as f32
}

/// Last-output memory for one block of values (one value per channel for
/// scalar data, channel-major bins for spectra).
#[derive(Debug, Clone, Default)]
pub struct SmoothingState {
    channels: usize,
    bins: usize,
    values: Vec<f32>,
}

impl SmoothingState {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels = 0;
        self.bins = 0;
        self.values.clear();
    }

    /// Smooth `values` (laid out as `channels x bins`) in place.
    ///
    /// Returns `true` if the memory had to be reseeded because it was empty
    /// or its shape no longer matches; the values are then passed through.
    pub fn apply(
        &mut self,
        values: &mut [f32],
        channels: usize,
        bins: usize,
        filter: RiseFall,
        elapsed: Duration,
    ) -> bool {
        if self.channels != channels || self.bins != bins || self.values.len() != values.len() {
            let had_memory = !self.is_empty();
            self.channels = channels;
            self.bins = bins;
            self.values.clear();
            self.values.extend_from_slice(values);
            return had_memory;
        }

        for (memory, value) in self.values.iter_mut().zip(values.iter_mut()) {
            let smoothed = filter.step(*memory, *value, elapsed);
            *memory = smoothed;
            *value = smoothed;
        }
        false
    }
}
