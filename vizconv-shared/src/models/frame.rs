// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::scalar::ScalarData;
use crate::models::spectrum::SpectrumData;
use crate::models::types::AnalyzerType;

/// Immutable snapshot of analysis data for one presentation instant.
///
/// Any of the three data kinds may be absent when the producer does not
/// compute it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationDataFrame {
    time: Duration,
    duration: Duration,
    rms: Option<ScalarData>,
    peak: Option<ScalarData>,
    spectrum: Option<SpectrumData>,
}

impl VisualizationDataFrame {
    #[must_use]
    pub fn new(
        time: Duration,
        duration: Duration,
        rms: Option<ScalarData>,
        peak: Option<ScalarData>,
        spectrum: Option<SpectrumData>,
    ) -> Self {
        Self {
            time,
            duration,
            rms,
            peak,
            spectrum,
        }
    }

    /// Presentation timestamp
    #[must_use]
    pub fn time(&self) -> Duration {
        self.time
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn rms(&self) -> Option<&ScalarData> {
        self.rms.as_ref()
    }

    #[must_use]
    pub fn peak(&self) -> Option<&ScalarData> {
        self.peak.as_ref()
    }

    #[must_use]
    pub fn spectrum(&self) -> Option<&SpectrumData> {
        self.spectrum.as_ref()
    }

    /// Kinds of data present in this frame
    #[must_use]
    pub fn analyzer_types(&self) -> AnalyzerType {
        let mut types = AnalyzerType::NONE;
        if self.rms.is_some() {
            types = types | AnalyzerType::RMS;
        }
        if self.peak.is_some() {
            types = types | AnalyzerType::PEAK;
        }
        if self.spectrum.is_some() {
            types = types | AnalyzerType::SPECTRUM;
        }
        types
    }

    /// Channel count of the first data kind present, spectrum first
    #[must_use]
    pub fn channel_count(&self) -> Option<usize> {
        self.spectrum
            .as_ref()
            .map(SpectrumData::channel_count)
            .or_else(|| self.rms.as_ref().map(ScalarData::channel_count))
            .or_else(|| self.peak.as_ref().map(ScalarData::channel_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::types::ScaleType;

    #[test]
    fn test_frame_reports_present_kinds() {
        let frame = VisualizationDataFrame::new(
            Duration::from_secs(1),
            Duration::from_millis(16),
            Some(ScalarData::create_empty(2, ScaleType::Linear)),
            None,
            None,
        );
        assert_eq!(frame.analyzer_types(), AnalyzerType::RMS);
        assert_eq!(frame.channel_count(), Some(2));

        let empty = VisualizationDataFrame::new(Duration::ZERO, Duration::ZERO, None, None, None);
        assert!(empty.analyzer_types().is_empty());
        assert_eq!(empty.channel_count(), None);
    }
}
