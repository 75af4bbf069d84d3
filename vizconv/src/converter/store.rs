// SPDX-License-Identifier: GPL-3.0-only
//! Bound source plus validated consumer overrides.

use log::debug;
use std::sync::Arc;
use std::time::Duration;
use vizconv_shared::validation::{
    ValidationError, validate_channel_count, validate_channel_mapping, validate_fall_time,
    validate_frequency_count, validate_max_frequency, validate_min_frequency, validate_rise_time,
};
use vizconv_shared::{AnalyzerType, Property, ScaleType, VisualizationSource};

/// Lower bound substituted for a non-positive minimum frequency on a logarithmic scale
pub const LOG_MIN_FREQUENCY_FLOOR: f32 = 20.0;

/// Either an explicit consumer value or "use whatever the source reports"
#[derive(Debug, Clone, PartialEq)]
pub enum Override<T> {
    Inherit,
    Value(T),
}

impl<T> Default for Override<T> {
    fn default() -> Self {
        Self::Inherit
    }
}

impl<T> Override<T> {
    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Override::Inherit => None,
            Override::Value(v) => Some(v),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        matches!(self, Override::Value(_))
    }
}

impl<T: Copy> Override<T> {
    /// Override if present, otherwise the inherited value
    pub fn resolve(&self, inherited: impl FnOnce() -> Option<T>) -> Option<T> {
        match self {
            Override::Inherit => inherited(),
            Override::Value(v) => Some(*v),
        }
    }
}

impl<T> From<Option<T>> for Override<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Override::Inherit, Override::Value)
    }
}

/// Minimum frequency usable on a logarithmic axis below `max`
#[must_use]
pub fn log_min_frequency_floor(max: Option<f32>) -> f32 {
    match max {
        Some(max) if max <= LOG_MIN_FREQUENCY_FLOOR => max / 10.0,
        _ => LOG_MIN_FREQUENCY_FLOOR,
    }
}

pub struct ParameterStore {
    source: Option<Arc<dyn VisualizationSource>>,
    pub(crate) frequency_count: Override<u32>,
    pub(crate) channel_count: Override<u32>,
    pub(crate) rise_time: Override<Duration>,
    pub(crate) fall_time: Override<Duration>,
    pub(crate) min_frequency: Override<f32>,
    pub(crate) max_frequency: Override<f32>,
    pub(crate) frequency_scale: Override<ScaleType>,
    pub(crate) analyzer_types: Override<AnalyzerType>,
    pub(crate) cache_data: bool,
    pub(crate) channel_mapping: Override<Vec<f32>>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self {
            source: None,
            frequency_count: Override::Inherit,
            channel_count: Override::Inherit,
            rise_time: Override::Inherit,
            fall_time: Override::Inherit,
            min_frequency: Override::Inherit,
            max_frequency: Override::Inherit,
            frequency_scale: Override::Inherit,
            analyzer_types: Override::Inherit,
            cache_data: true,
            channel_mapping: Override::Inherit,
        }
    }
}

impl ParameterStore {
    #[must_use]
    pub fn source(&self) -> Option<&Arc<dyn VisualizationSource>> {
        self.source.as_ref()
    }

    pub fn set_source(&mut self, source: Option<Arc<dyn VisualizationSource>>) {
        debug!(
            "{} visualization source",
            if source.is_some() { "Binding" } else { "Unbinding" }
        );
        self.source = source;
    }

    // Effective values: override first, then the source, then unset

    #[must_use]
    pub fn frequency_count(&self) -> Option<u32> {
        self.frequency_count
            .resolve(|| self.source.as_ref().and_then(|s| s.frequency_count()))
    }

    #[must_use]
    pub fn channel_count(&self) -> Option<u32> {
        self.channel_count
            .resolve(|| self.source.as_ref().and_then(|s| s.channel_count()))
    }

    #[must_use]
    pub fn rise_time(&self) -> Option<Duration> {
        self.rise_time.value().copied()
    }

    #[must_use]
    pub fn fall_time(&self) -> Option<Duration> {
        self.fall_time.value().copied()
    }

    #[must_use]
    pub fn min_frequency(&self) -> Option<f32> {
        self.min_frequency
            .resolve(|| self.source.as_ref().and_then(|s| s.min_frequency()))
    }

    #[must_use]
    pub fn max_frequency(&self) -> Option<f32> {
        self.max_frequency
            .resolve(|| self.source.as_ref().and_then(|s| s.max_frequency()))
    }

    #[must_use]
    pub fn frequency_scale(&self) -> Option<ScaleType> {
        self.frequency_scale
            .resolve(|| self.source.as_ref().and_then(|s| s.frequency_scale()))
    }

    #[must_use]
    pub fn analyzer_types(&self) -> AnalyzerType {
        self.analyzer_types
            .resolve(|| self.source.as_ref().map(|s| s.analyzer_types()))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn cache_data(&self) -> bool {
        self.cache_data
    }

    #[must_use]
    pub fn channel_mapping(&self) -> Option<&[f32]> {
        self.channel_mapping.value().map(Vec::as_slice)
    }

    /// Whether `property` is currently masked by an override
    #[must_use]
    pub fn is_overridden(&self, property: Property) -> bool {
        match property {
            Property::FrequencyCount => self.frequency_count.is_set(),
            Property::ChannelCount => self.channel_count.is_set(),
            Property::RiseTime => self.rise_time.is_set(),
            Property::FallTime => self.fall_time.is_set(),
            Property::MinFrequency => self.min_frequency.is_set(),
            Property::MaxFrequency => self.max_frequency.is_set(),
            Property::FrequencyScale => self.frequency_scale.is_set(),
            Property::AnalyzerTypes => self.analyzer_types.is_set(),
            Property::ChannelMapping => self.channel_mapping.is_set(),
            Property::CacheData => true,
            Property::Source
            | Property::Fps
            | Property::IsSuspended
            | Property::PlaybackState
            | Property::PresentationTime => false,
        }
    }

    // Setters: `None` returns the field to inherit mode and is always accepted

    /// # Errors
    /// Returns [`ValidationError::InvalidFrequencyCount`] for zero.
    pub fn set_frequency_count(&mut self, value: Option<u32>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_frequency_count(v)?;
        }
        self.frequency_count = value.into();
        Ok(())
    }

    /// # Errors
    /// Returns [`ValidationError::InvalidChannelCount`] for zero.
    pub fn set_channel_count(&mut self, value: Option<u32>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_channel_count(v)?;
        }
        self.channel_count = value.into();
        Ok(())
    }

    /// # Errors
    /// Returns [`ValidationError::InvalidRiseTime`] for a zero duration.
    pub fn set_rise_time(&mut self, value: Option<Duration>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_rise_time(v)?;
        }
        self.rise_time = value.into();
        Ok(())
    }

    /// # Errors
    /// Returns [`ValidationError::InvalidFallTime`] for a zero duration.
    pub fn set_fall_time(&mut self, value: Option<Duration>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_fall_time(v)?;
        }
        self.fall_time = value.into();
        Ok(())
    }

    /// # Errors
    /// Returns a [`ValidationError`] if the value is not finite, is not valid
    /// for the effective scale, or is not below the effective maximum.
    pub fn set_min_frequency(&mut self, value: Option<f32>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_min_frequency(v, self.frequency_scale(), self.max_frequency())?;
        }
        self.min_frequency = value.into();
        Ok(())
    }

    /// # Errors
    /// Returns a [`ValidationError`] if the value is not finite and positive, or
    /// is not above the effective minimum.
    pub fn set_max_frequency(&mut self, value: Option<f32>) -> Result<(), ValidationError> {
        if let Some(v) = value {
            validate_max_frequency(v, self.min_frequency())?;
        }
        self.max_frequency = value.into();
        Ok(())
    }

    /// Always accepted. A minimum frequency override that the new scale cannot
    /// represent is clamped up to [`log_min_frequency_floor`].
    pub fn set_frequency_scale(&mut self, value: Option<ScaleType>) {
        self.frequency_scale = value.into();

        if let Override::Value(min) = self.min_frequency {
            let max = self.max_frequency();
            if validate_min_frequency(min, self.frequency_scale(), max).is_err() {
                let clamped = log_min_frequency_floor(max);
                debug!("Clamping minimum frequency {min} Hz to {clamped} Hz after scale change");
                self.min_frequency = Override::Value(clamped);
            }
        }
    }

    pub fn set_analyzer_types(&mut self, value: Option<AnalyzerType>) {
        self.analyzer_types = value.into();
    }

    pub fn set_cache_data(&mut self, value: bool) {
        self.cache_data = value;
    }

    /// # Errors
    /// Returns [`ValidationError::EmptyChannelMapping`] or
    /// [`ValidationError::NonFiniteChannelMapping`].
    pub fn set_channel_mapping(&mut self, value: Option<Vec<f32>>) -> Result<(), ValidationError> {
        if let Some(v) = &value {
            validate_channel_mapping(v)?;
        }
        self.channel_mapping = value.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_store_reads_unset() {
        let store = ParameterStore::default();
        assert!(store.source().is_none());
        assert_eq!(store.frequency_count(), None);
        assert_eq!(store.channel_count(), None);
        assert_eq!(store.rise_time(), None);
        assert_eq!(store.fall_time(), None);
        assert_eq!(store.min_frequency(), None);
        assert_eq!(store.max_frequency(), None);
        assert_eq!(store.frequency_scale(), None);
        assert_eq!(store.analyzer_types(), AnalyzerType::ALL);
        assert!(store.cache_data());
    }

    #[test]
    fn test_rejected_value_keeps_previous() {
        let mut store = ParameterStore::default();
        store.set_frequency_count(Some(64)).unwrap();
        assert!(store.set_frequency_count(Some(0)).is_err());
        assert_eq!(store.frequency_count(), Some(64));

        assert!(store.set_rise_time(Some(Duration::ZERO)).is_err());
        assert_eq!(store.rise_time(), None);
    }

    #[test]
    fn test_clearing_override_is_always_accepted() {
        let mut store = ParameterStore::default();
        store.set_channel_count(Some(2)).unwrap();
        store.set_channel_count(None).unwrap();
        assert_eq!(store.channel_count(), None);
        assert!(!store.is_overridden(Property::ChannelCount));
    }

    #[test]
    fn test_min_max_cross_validation() {
        let mut store = ParameterStore::default();
        store.set_min_frequency(Some(20.0)).unwrap();
        store.set_max_frequency(Some(20000.0)).unwrap();

        assert!(store.set_min_frequency(Some(20000.0)).is_err());
        assert!(store.set_max_frequency(Some(10.0)).is_err());
        assert_eq!(store.min_frequency(), Some(20.0));
        assert_eq!(store.max_frequency(), Some(20000.0));
    }

    #[test]
    fn test_scale_change_clamps_zero_minimum() {
        let mut store = ParameterStore::default();
        store.set_frequency_scale(Some(ScaleType::Linear));
        store.set_min_frequency(Some(0.0)).unwrap();
        store.set_max_frequency(Some(8000.0)).unwrap();

        store.set_frequency_scale(Some(ScaleType::Logarithmic));
        assert_eq!(store.min_frequency(), Some(LOG_MIN_FREQUENCY_FLOOR));
    }

    #[test]
    fn test_log_floor_stays_below_small_maximum() {
        assert_eq!(log_min_frequency_floor(None), LOG_MIN_FREQUENCY_FLOOR);
        assert_eq!(log_min_frequency_floor(Some(10.0)), 1.0);
    }

    #[test]
    fn test_empty_channel_mapping_rejected() {
        let mut store = ParameterStore::default();
        assert!(store.set_channel_mapping(Some(Vec::new())).is_err());
        assert_eq!(store.channel_mapping(), None);
        store.set_channel_mapping(Some(vec![0.5, 0.5])).unwrap();
        assert_eq!(store.channel_mapping(), Some(&[0.5, 0.5][..]));
    }
}
