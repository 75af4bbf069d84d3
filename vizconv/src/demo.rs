// SPDX-License-Identifier: GPL-3.0-only
//! Synthetic visualization source with a sweeping spectral peak.

use log::debug;
use parking_lot::RwLock;
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use vizconv_shared::{
    AnalyzerType, PlaybackState, Property, ScalarData, ScaleType, SourceChange, SourceUnavailable,
    SpectrumData, SpectrumGrid, ValidationError, VisualizationDataFrame, VisualizationSource,
};

use crate::config::DemoConfig;

/// Capacity of the parameter change channel
const CHANGE_CAPACITY: usize = 64;

/// Seconds for the peak to sweep across the whole range and back
const SWEEP_PERIOD: f32 = 4.0;

/// Relative width of the peak, in fractions of the bin count
const PEAK_WIDTH: f32 = 0.04;

struct DemoState {
    channels: u32,
    grid: SpectrumGrid,
    fps: f32,
    analyzer_types: AnalyzerType,
    playback_state: PlaybackState,
    is_suspended: bool,
    time: Duration,
    frame: Option<Arc<VisualizationDataFrame>>,
}

pub struct DemoSource {
    state: RwLock<DemoState>,
    changes: broadcast::Sender<SourceChange>,
}

impl DemoSource {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the configured channel count, bin count
    /// or frequency range is unusable.
    pub fn new(config: &DemoConfig) -> Result<Self, ValidationError> {
        if config.channels == 0 {
            return Err(ValidationError::InvalidChannelCount {
                value: config.channels,
            });
        }
        let grid = SpectrumGrid::new(
            config.frequency_count,
            config.frequency_scale,
            config.min_frequency,
            config.max_frequency,
        )?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);

        Ok(Self {
            state: RwLock::new(DemoState {
                channels: config.channels,
                grid,
                fps: config.fps,
                analyzer_types: AnalyzerType::ALL,
                playback_state: PlaybackState::Playing,
                is_suspended: false,
                time: Duration::ZERO,
                frame: None,
            }),
            changes,
        })
    }

    fn announce(&self, changed: &[Property]) {
        for property in changed {
            // Nobody listening is fine
            let _ = self.changes.send(*property);
        }
    }

    /// Move time forward by `dt` and produce the next frame.
    ///
    /// Time and frames only advance while playing and not suspended.
    pub fn advance(&self, dt: Duration) {
        {
            let mut state = self.state.write();
            if state.is_suspended || state.playback_state != PlaybackState::Playing {
                return;
            }
            state.time += dt;
            let frame = synthesize(&state);
            state.frame = Some(Arc::new(frame));
        }
        self.announce(&[Property::PresentationTime]);
    }

    pub fn set_playback_state(&self, playback_state: PlaybackState) {
        {
            let mut state = self.state.write();
            if state.playback_state == playback_state {
                return;
            }
            debug!("Demo source {} -> {playback_state}", state.playback_state);
            state.playback_state = playback_state;
            if playback_state == PlaybackState::Stopped {
                state.time = Duration::ZERO;
                state.frame = None;
            }
        }
        self.announce(&[Property::PlaybackState]);
    }

    pub fn set_suspended(&self, is_suspended: bool) {
        {
            let mut state = self.state.write();
            if state.is_suspended == is_suspended {
                return;
            }
            state.is_suspended = is_suspended;
        }
        self.announce(&[Property::IsSuspended]);
    }

    pub fn set_analyzer_types(&self, analyzer_types: AnalyzerType) {
        self.state.write().analyzer_types = analyzer_types;
        self.announce(&[Property::AnalyzerTypes]);
    }

    /// Replace the native bin grid
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the grid is unusable; the previous grid
    /// is kept.
    pub fn set_grid(
        &self,
        frequency_count: u32,
        frequency_scale: ScaleType,
        min_frequency: f32,
        max_frequency: f32,
    ) -> Result<(), ValidationError> {
        let grid = SpectrumGrid::new(frequency_count, frequency_scale, min_frequency, max_frequency)?;
        let previous = std::mem::replace(&mut self.state.write().grid, grid);

        let mut changed = Vec::new();
        if previous.frequency_count() != grid.frequency_count() {
            changed.push(Property::FrequencyCount);
        }
        if previous.min_frequency() != grid.min_frequency() {
            changed.push(Property::MinFrequency);
        }
        if previous.max_frequency() != grid.max_frequency() {
            changed.push(Property::MaxFrequency);
        }
        if previous.frequency_scale() != grid.frequency_scale() {
            changed.push(Property::FrequencyScale);
        }
        self.announce(&changed);
        Ok(())
    }
}

/// Frame for the current state: a Gaussian bump that sweeps back and forth
/// across the bins, slightly offset per channel
#[allow(clippy::cast_precision_loss)]
fn synthesize(state: &DemoState) -> VisualizationDataFrame {
    let bins = state.grid.frequency_count() as usize;
    let phase = (state.time.as_secs_f32() / SWEEP_PERIOD * TAU).sin() * 0.5 + 0.5;
    let width = (bins as f32 * PEAK_WIDTH).max(1.0);

    let channels: Vec<Vec<f32>> = (0..state.channels)
        .map(|channel| {
            let center = (phase + channel as f32 * 0.05).fract() * (bins - 1) as f32;
            (0..bins)
                .map(|bin| {
                    let distance = (bin as f32 - center) / width;
                    (-0.5 * distance * distance).exp()
                })
                .collect()
        })
        .collect();

    let rms: Vec<f32> = channels
        .iter()
        .map(|c| (c.iter().map(|&x| x * x).sum::<f32>() / c.len() as f32).sqrt())
        .collect();
    let peak: Vec<f32> = channels
        .iter()
        .map(|c| c.iter().copied().fold(0.0, f32::max))
        .collect();

    let types = state.analyzer_types;
    let spectrum = types
        .contains(AnalyzerType::SPECTRUM)
        .then(|| SpectrumData::new(channels, ScaleType::Linear, state.grid).ok())
        .flatten();

    VisualizationDataFrame::new(
        state.time,
        Duration::from_secs_f32(1.0 / state.fps.max(1.0)),
        types
            .contains(AnalyzerType::RMS)
            .then(|| ScalarData::new(rms, ScaleType::Linear)),
        types
            .contains(AnalyzerType::PEAK)
            .then(|| ScalarData::new(peak, ScaleType::Linear)),
        spectrum,
    )
}

impl VisualizationSource for DemoSource {
    fn get_data(&self) -> Option<Arc<VisualizationDataFrame>> {
        self.state.read().frame.clone()
    }

    fn analyzer_types(&self) -> AnalyzerType {
        self.state.read().analyzer_types
    }

    fn fps(&self) -> Result<f32, SourceUnavailable> {
        Ok(self.state.read().fps)
    }

    fn is_suspended(&self) -> Result<bool, SourceUnavailable> {
        Ok(self.state.read().is_suspended)
    }

    fn playback_state(&self) -> Result<PlaybackState, SourceUnavailable> {
        Ok(self.state.read().playback_state)
    }

    fn presentation_time(&self) -> Result<Option<Duration>, SourceUnavailable> {
        let state = self.state.read();
        Ok((state.playback_state != PlaybackState::Stopped).then_some(state.time))
    }

    fn channel_count(&self) -> Option<u32> {
        Some(self.state.read().channels)
    }

    fn frequency_count(&self) -> Option<u32> {
        Some(self.state.read().grid.frequency_count())
    }

    fn frequency_scale(&self) -> Option<ScaleType> {
        Some(self.state.read().grid.frequency_scale())
    }

    fn min_frequency(&self) -> Option<f32> {
        Some(self.state.read().grid.min_frequency())
    }

    fn max_frequency(&self) -> Option<f32> {
        Some(self.state.read().grid.max_frequency())
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChange>> {
        Some(self.changes.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::SourceConverter;

    const FRAME: Duration = Duration::from_millis(16);

    fn demo() -> DemoSource {
        DemoSource::new(&DemoConfig {
            channels: 2,
            frequency_count: 64,
            ..DemoConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_unusable_config() {
        let zero_channels = DemoConfig {
            channels: 0,
            ..DemoConfig::default()
        };
        assert!(DemoSource::new(&zero_channels).is_err());

        let log_from_zero = DemoConfig {
            frequency_scale: ScaleType::Logarithmic,
            min_frequency: 0.0,
            ..DemoConfig::default()
        };
        assert!(DemoSource::new(&log_from_zero).is_err());
    }

    #[test]
    fn test_advance_produces_frames() {
        let source = demo();
        assert!(source.get_data().is_none());

        source.advance(FRAME);
        let frame = source.get_data().unwrap();
        assert_eq!(frame.time(), FRAME);
        assert_eq!(frame.channel_count(), Some(2));

        let spectrum = frame.spectrum().unwrap();
        assert_eq!(spectrum.frequency_count(), 64);
        let peak = frame.peak().unwrap().values()[0];
        assert!(peak > 0.5 && peak <= 1.0);
        assert!(frame.rms().unwrap().values()[0] < peak);
    }

    #[test]
    fn test_paused_source_holds_frame() {
        let source = demo();
        source.advance(FRAME);
        source.set_playback_state(PlaybackState::Paused);
        source.advance(FRAME);
        assert_eq!(source.get_data().unwrap().time(), FRAME);
        assert_eq!(source.presentation_time().unwrap(), Some(FRAME));

        source.set_playback_state(PlaybackState::Stopped);
        assert!(source.get_data().is_none());
        assert_eq!(source.presentation_time().unwrap(), None);
    }

    #[test]
    fn test_analyzer_types_limit_frame_contents() {
        let source = demo();
        source.set_analyzer_types(AnalyzerType::RMS);
        source.advance(FRAME);
        assert_eq!(source.get_data().unwrap().analyzer_types(), AnalyzerType::RMS);
    }

    #[test]
    fn test_grid_change_is_announced() {
        let source = demo();
        let mut changes = source.subscribe_changes().unwrap();

        source
            .set_grid(128, ScaleType::Linear, 0.0, 22_050.0)
            .unwrap();
        assert_eq!(changes.try_recv().unwrap(), Property::FrequencyCount);
        assert!(changes.try_recv().is_err());
        assert_eq!(source.frequency_count(), Some(128));

        assert!(source.set_grid(0, ScaleType::Linear, 0.0, 1.0).is_err());
        assert_eq!(source.frequency_count(), Some(128));
    }

    #[test]
    fn test_converter_forwards_demo_changes() {
        let source = Arc::new(demo());
        let converter = SourceConverter::new();
        converter.set_source(Some(source.clone()));

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        converter
            .subscribe(move |event| sink.lock().push(event.property))
            .unwrap();

        source.set_suspended(true);
        converter.refresh();
        assert_eq!(*seen.lock(), vec![Property::IsSuspended]);
        assert!(converter.is_suspended().unwrap());
    }
}
