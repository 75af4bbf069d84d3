// SPDX-License-Identifier: GPL-3.0-only
//! Reshaping of native source frames into the requested configuration.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use vizconv_shared::{
    AnalyzerType, ScalarData, ScaleType, SpectrumData, SpectrumGrid, VisualizationDataFrame,
    silence,
};

use super::channels::ChannelMix;
use super::rebin::RebinPlan;
use super::smoothing::{RiseFall, SmoothingState};
use super::store::{ParameterStore, log_min_frequency_floor};

/// Shape requested by the consumer. Unset fields keep the frame's own values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TargetConfig {
    pub analyzer_types: AnalyzerType,
    pub channel_count: Option<u32>,
    pub frequency_count: Option<u32>,
    pub frequency_scale: Option<ScaleType>,
    pub min_frequency: Option<f32>,
    pub max_frequency: Option<f32>,
    pub smoothing: RiseFall,
    pub channel_mapping: Option<Vec<f32>>,
}

impl TargetConfig {
    #[must_use]
    pub fn from_store(store: &ParameterStore) -> Self {
        Self {
            analyzer_types: store.analyzer_types.value().copied().unwrap_or_default(),
            channel_count: store.channel_count.value().copied(),
            frequency_count: store.frequency_count.value().copied(),
            frequency_scale: store.frequency_scale.value().copied(),
            min_frequency: store.min_frequency.value().copied(),
            max_frequency: store.max_frequency.value().copied(),
            smoothing: RiseFall {
                rise: store.rise_time(),
                fall: store.fall_time(),
            },
            channel_mapping: store.channel_mapping().map(<[f32]>::to_vec),
        }
    }

    /// Grid the spectrum on `native` is converted to.
    ///
    /// Falls back to a clamped minimum frequency when a logarithmic target
    /// would start at or below 0 Hz, and to `native` itself when no usable
    /// grid can be formed.
    fn grid_for(&self, native: &SpectrumGrid) -> Result<SpectrumGrid, SpectrumGrid> {
        let count = self.frequency_count.unwrap_or(native.frequency_count());
        let scale = self.frequency_scale.unwrap_or(native.frequency_scale());
        let min = self.min_frequency.unwrap_or(native.min_frequency());
        let max = self.max_frequency.unwrap_or(native.max_frequency());

        SpectrumGrid::new(count, scale, min, max)
            .or_else(|e| match scale {
                ScaleType::Logarithmic if min <= 0.0 => {
                    SpectrumGrid::new(count, scale, log_min_frequency_floor(Some(max)), max)
                }
                _ => Err(e),
            })
            .map_err(|_| *native)
    }
}

/// Converter state carried from one poll to the next
#[derive(Default)]
pub struct FrameConverter {
    rms: SmoothingState,
    peak: SmoothingState,
    spectrum: SmoothingState,
    last_time: Option<Duration>,
    cached: Option<Arc<VisualizationDataFrame>>,
    plan: Option<(SpectrumGrid, SpectrumGrid, RebinPlan)>,
    warned_mapping: Option<(usize, usize)>,
    warned_grid: Option<SpectrumGrid>,
}

impl FrameConverter {
    /// Forget smoothing memory and the cached frame
    pub fn reset(&mut self) {
        self.clear_smoothing();
        self.last_time = None;
        self.cached = None;
    }

    #[must_use]
    pub fn cached(&self) -> Option<Arc<VisualizationDataFrame>> {
        self.cached.clone()
    }

    pub fn remember(&mut self, frame: Arc<VisualizationDataFrame>) {
        self.cached = Some(frame);
    }

    pub fn forget(&mut self) {
        self.cached = None;
    }

    /// Produce a new frame shaped like `target` from `frame`
    #[must_use]
    pub fn convert(
        &mut self,
        frame: &VisualizationDataFrame,
        target: &TargetConfig,
    ) -> VisualizationDataFrame {
        let elapsed = self.elapsed(frame.time());
        let kinds = target.analyzer_types.intersection(frame.analyzer_types());

        let rms = frame
            .rms()
            .filter(|_| kinds.contains(AnalyzerType::RMS))
            .map(|data| self.convert_scalar(data, target, elapsed, Level::Rms));
        let peak = frame
            .peak()
            .filter(|_| kinds.contains(AnalyzerType::PEAK))
            .map(|data| self.convert_scalar(data, target, elapsed, Level::Peak));
        let spectrum = frame
            .spectrum()
            .filter(|_| kinds.contains(AnalyzerType::SPECTRUM))
            .map(|data| self.convert_spectrum(data, target, elapsed));

        VisualizationDataFrame::new(frame.time(), frame.duration(), rms, peak, spectrum)
    }

    /// Time since the previous frame; a timestamp going backwards drops all
    /// smoothing memory
    fn elapsed(&mut self, time: Duration) -> Duration {
        let elapsed = match self.last_time {
            Some(last) if time < last => {
                debug!("Frame time moved backwards ({last:?} -> {time:?}), resetting smoothing");
                self.clear_smoothing();
                Duration::ZERO
            }
            Some(last) => time - last,
            None => Duration::ZERO,
        };
        self.last_time = Some(time);
        elapsed
    }

    fn clear_smoothing(&mut self) {
        self.rms.clear();
        self.peak.clear();
        self.spectrum.clear();
    }

    fn channel_mix(&mut self, source_channels: usize, target: &TargetConfig) -> ChannelMix {
        let target_channels = target
            .channel_count
            .map_or(source_channels, |count| count as usize);

        if let Some(matrix) = &target.channel_mapping {
            if let Some(mix) = ChannelMix::from_matrix(matrix, source_channels, target_channels) {
                return mix;
            }
            let shape = (source_channels, target_channels);
            if self.warned_mapping != Some(shape) {
                warn!(
                    "Channel mapping with {} coefficients does not fit {source_channels} -> {target_channels} channels, using default mix",
                    matrix.len()
                );
                self.warned_mapping = Some(shape);
            }
        }
        ChannelMix::partition(source_channels, target_channels)
    }

    fn convert_scalar(
        &mut self,
        data: &ScalarData,
        target: &TargetConfig,
        elapsed: Duration,
        level: Level,
    ) -> ScalarData {
        if data.channel_count() == 0 {
            return data.clone();
        }

        let mix = self.channel_mix(data.channel_count(), target);
        let mut values = if mix.is_identity() {
            data.values().to_vec()
        } else {
            mix.apply_scalar(data.values())
        };

        let channels = values.len();
        let state = match level {
            Level::Rms => &mut self.rms,
            Level::Peak => &mut self.peak,
        };
        if state.apply(&mut values, channels, 1, target.smoothing, elapsed)
            && target.smoothing.is_enabled()
        {
            debug!("{level:?} smoothing reset for {channels} channels");
        }

        ScalarData::new(values, data.amplitude_scale())
    }

    fn convert_spectrum(
        &mut self,
        data: &SpectrumData,
        target: &TargetConfig,
        elapsed: Duration,
    ) -> SpectrumData {
        if data.frequency_count() == 0 || data.channel_count() == 0 {
            return data.clone();
        }

        let mix = self.channel_mix(data.channel_count(), target);
        let mixed = if mix.is_identity() {
            data.channels().to_vec()
        } else {
            mix.apply_channels(data.channels())
        };

        let native = *data.grid();
        let grid = match target.grid_for(&native) {
            Ok(grid) => grid,
            Err(native) => {
                if self.warned_grid != Some(native) {
                    warn!("Requested frequency range is unusable for this spectrum, passing bins through");
                    self.warned_grid = Some(native);
                }
                native
            }
        };

        let channels = if grid == native {
            mixed
        } else {
            let floor = silence(data.amplitude_scale());
            let plan = self.plan(&native, &grid);
            mixed.iter().map(|c| plan.apply(c, floor)).collect()
        };

        let bins = grid.frequency_count() as usize;
        let channel_count = channels.len();
        let mut flat: Vec<f32> = channels.into_iter().flatten().collect();
        if self
            .spectrum
            .apply(&mut flat, channel_count, bins, target.smoothing, elapsed)
            && target.smoothing.is_enabled()
        {
            debug!("Spectrum smoothing reset for {channel_count}x{bins} bins");
        }
        let channels: Vec<Vec<f32>> = flat.chunks(bins).map(<[f32]>::to_vec).collect();

        match SpectrumData::new(channels, data.amplitude_scale(), grid) {
            Ok(spectrum) => spectrum,
            Err(e) => {
                warn!("Converted spectrum is inconsistent ({e}), passing source spectrum through");
                data.clone()
            }
        }
    }

    /// Rebin plan for `from -> to`, reused while neither grid changes
    fn plan(&mut self, from: &SpectrumGrid, to: &SpectrumGrid) -> &RebinPlan {
        let stale = !matches!(&self.plan, Some((f, t, _)) if f == from && t == to);
        if stale {
            debug!(
                "Rebinning {} {} bins to {} {} bins",
                from.frequency_count(),
                from.frequency_scale(),
                to.frequency_count(),
                to.frequency_scale()
            );
        }
        let entry = match self.plan.take() {
            Some(entry) if !stale => entry,
            _ => (*from, *to, RebinPlan::new(from, to)),
        };
        &self.plan.insert(entry).2
    }
}

#[derive(Debug, Clone, Copy)]
enum Level {
    Rms,
    Peak,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum_frame(time_ms: u64, channels: Vec<Vec<f32>>, grid: SpectrumGrid) -> VisualizationDataFrame {
        let rms: Vec<f32> = channels.iter().map(|c| c.iter().sum::<f32>()).collect();
        VisualizationDataFrame::new(
            Duration::from_millis(time_ms),
            Duration::from_millis(16),
            Some(ScalarData::new(rms.clone(), ScaleType::Linear)),
            Some(ScalarData::new(rms, ScaleType::Linear)),
            Some(SpectrumData::new(channels, ScaleType::Linear, grid).unwrap()),
        )
    }

    fn grid(count: u32) -> SpectrumGrid {
        SpectrumGrid::new(count, ScaleType::Linear, 0.0, 400.0).unwrap()
    }

    #[test]
    fn test_unset_target_passes_frame_through() {
        let frame = spectrum_frame(0, vec![vec![1.0, 2.0, 3.0, 4.0]; 2], grid(4));
        let out = FrameConverter::default().convert(&frame, &TargetConfig::default());
        assert_eq!(out, frame);
    }

    #[test]
    fn test_analyzer_types_restrict_output() {
        let frame = spectrum_frame(0, vec![vec![1.0; 4]], grid(4));
        let target = TargetConfig {
            analyzer_types: AnalyzerType::RMS | AnalyzerType::SPECTRUM,
            ..TargetConfig::default()
        };
        let out = FrameConverter::default().convert(&frame, &target);
        assert!(out.rms().is_some());
        assert!(out.peak().is_none());
        assert!(out.spectrum().is_some());
    }

    #[test]
    fn test_downmix_then_rebin() {
        let frame = spectrum_frame(
            0,
            vec![vec![0.0, 10.0, 20.0, 30.0], vec![10.0, 20.0, 30.0, 40.0]],
            grid(4),
        );
        let target = TargetConfig {
            channel_count: Some(1),
            frequency_count: Some(2),
            ..TargetConfig::default()
        };
        let out = FrameConverter::default().convert(&frame, &target);

        let spectrum = out.spectrum().unwrap();
        assert_eq!(spectrum.channel_count(), 1);
        assert_eq!(spectrum.frequency_count(), 2);
        assert_eq!(spectrum.channel(0).unwrap(), &[10.0, 30.0]);
        assert_eq!(out.rms().unwrap().values(), &[80.0]);
    }

    #[test]
    fn test_zero_elapsed_repeats_output() {
        let target = TargetConfig {
            smoothing: RiseFall {
                rise: Some(Duration::from_millis(100)),
                fall: Some(Duration::from_millis(100)),
            },
            ..TargetConfig::default()
        };
        let mut converter = FrameConverter::default();
        let _ = converter.convert(&spectrum_frame(0, vec![vec![0.0; 4]], grid(4)), &target);

        let rising = spectrum_frame(50, vec![vec![1.0; 4]], grid(4));
        let first = converter.convert(&rising, &target);
        let second = converter.convert(&rising, &target);
        assert_eq!(first, second);

        let value = first.spectrum().unwrap().channel(0).unwrap()[0];
        assert!(value > 0.0 && value < 1.0);
    }

    #[test]
    fn test_backwards_time_resets_smoothing() {
        let target = TargetConfig {
            smoothing: RiseFall {
                rise: Some(Duration::from_millis(100)),
                fall: None,
            },
            ..TargetConfig::default()
        };
        let mut converter = FrameConverter::default();
        let _ = converter.convert(&spectrum_frame(1000, vec![vec![0.0; 4]], grid(4)), &target);

        let out = converter.convert(&spectrum_frame(0, vec![vec![1.0; 4]], grid(4)), &target);
        assert_eq!(out.spectrum().unwrap().channel(0).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_mismatched_channel_mapping_falls_back_to_partition() {
        let frame = spectrum_frame(0, vec![vec![2.0; 4], vec![4.0; 4]], grid(4));
        let target = TargetConfig {
            channel_count: Some(1),
            channel_mapping: Some(vec![1.0; 3]),
            ..TargetConfig::default()
        };
        let out = FrameConverter::default().convert(&frame, &target);
        assert_eq!(out.spectrum().unwrap().channel(0).unwrap(), &[3.0; 4]);
    }

    #[test]
    fn test_logarithmic_target_with_zero_minimum_is_clamped() {
        let frame = spectrum_frame(0, vec![vec![1.0; 4]], grid(4));
        let target = TargetConfig {
            frequency_scale: Some(ScaleType::Logarithmic),
            ..TargetConfig::default()
        };
        let out = FrameConverter::default().convert(&frame, &target);
        let spectrum = out.spectrum().unwrap();
        assert_eq!(spectrum.frequency_scale(), ScaleType::Logarithmic);
        assert_eq!(spectrum.min_frequency(), 20.0);
    }
}
