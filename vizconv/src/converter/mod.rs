// SPDX-License-Identifier: GPL-3.0-only
//! Consumer-facing converter bound to one upstream [`VisualizationSource`].

pub mod channels;
pub mod frame;
pub mod rebin;
pub mod smoothing;
pub mod store;
pub mod tracker;

use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;
use vizconv_shared::{
    AnalyzerType, ChangeNotifier, ConfigurationChanged, PlaybackState, Property, ScaleType,
    SourceChange, SourceUnavailable, SubscriptionError, ValidationError, VisualizationDataFrame,
    VisualizationSource,
};

use frame::{FrameConverter, TargetConfig};
use store::ParameterStore;
use tracker::ChangeTracker;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConverterError {
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    SourceUnavailable(#[from] SourceUnavailable),
}

struct Inner {
    store: ParameterStore,
    tracker: ChangeTracker,
    frames: FrameConverter,
}

impl Inner {
    fn collect_changes(&mut self) -> Vec<Property> {
        self.tracker.collect(&self.store)
    }
}

/// Negotiates consumer-requested parameters with a bound source and reshapes
/// its frames on every [`get_data`](Self::get_data).
///
/// All methods take `&self`; a converter can be shared behind an `Arc`.
/// Change handlers run on the mutating thread after the internal lock has
/// been released, so they may call back into the converter.
pub struct SourceConverter {
    id: Uuid,
    inner: Mutex<Inner>,
    notifier: ChangeNotifier,
}

impl Default for SourceConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceConverter {
    #[must_use]
    pub fn new() -> Self {
        let store = ParameterStore::default();
        let tracker = ChangeTracker::new(&store);
        Self {
            id: Uuid::new_v4(),
            inner: Mutex::new(Inner {
                store,
                tracker,
                frames: FrameConverter::default(),
            }),
            notifier: ChangeNotifier::default(),
        }
    }

    /// Sender id carried by this converter's notifications
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// # Errors
    ///
    /// Returns an error if the subscriber limit is reached.
    pub fn subscribe<F>(&self, handler: F) -> Result<Uuid, SubscriptionError>
    where
        F: Fn(&ConfigurationChanged) + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: Uuid) -> bool {
        self.notifier.unsubscribe(id)
    }

    fn publish(&self, changed: Vec<Property>) {
        let events: Vec<ConfigurationChanged> = changed
            .into_iter()
            .map(|property| ConfigurationChanged {
                sender: self.id,
                property,
            })
            .collect();
        self.notifier.publish(&events);
    }

    /// Apply a validated mutation and publish whatever it changed
    fn mutate<F>(&self, property: Property, apply: F) -> Result<(), ConverterError>
    where
        F: FnOnce(&mut ParameterStore) -> Result<(), ValidationError>,
    {
        let changed = {
            let mut inner = self.inner.lock();
            if let Err(e) = apply(&mut inner.store) {
                warn!("Rejected {property} override: {e}");
                return Err(e.into());
            }
            inner.collect_changes()
        };
        self.announce(property, changed);
        Ok(())
    }

    /// Apply a mutation that cannot be rejected and publish whatever it changed
    fn update(&self, property: Property, apply: impl FnOnce(&mut ParameterStore)) {
        let changed = {
            let mut inner = self.inner.lock();
            apply(&mut inner.store);
            inner.collect_changes()
        };
        self.announce(property, changed);
    }

    fn announce(&self, property: Property, changed: Vec<Property>) {
        if !changed.is_empty() {
            debug!("{property} updated, notifying {changed:?}");
        }
        self.publish(changed);
    }

    fn read<T>(&self, f: impl FnOnce(&ParameterStore) -> T) -> T {
        f(&self.inner.lock().store)
    }

    fn bound_source(&self) -> Option<Arc<dyn VisualizationSource>> {
        self.read(|store| store.source().cloned())
    }

    /// Read a property that only the source can answer
    fn pass_through<T>(
        &self,
        property: Property,
        f: impl FnOnce(&dyn VisualizationSource) -> Result<T, SourceUnavailable>,
    ) -> Result<T, SourceUnavailable> {
        match self.bound_source() {
            Some(source) => f(source.as_ref()),
            None => Err(SourceUnavailable { property }),
        }
    }

    // Source binding

    #[must_use]
    pub fn source(&self) -> Option<Arc<dyn VisualizationSource>> {
        self.bound_source()
    }

    /// Bind `source`, or detach with `None`. Always accepted; smoothing memory
    /// and the frame cache are dropped when the binding actually changes.
    pub fn set_source(&self, source: Option<Arc<dyn VisualizationSource>>) {
        let changed = {
            let mut inner = self.inner.lock();
            let same = match (inner.store.source(), &source) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if !same {
                inner.tracker.follow(source.as_ref());
                inner.frames.reset();
            }
            inner.store.set_source(source);
            inner.collect_changes()
        };
        self.publish(changed);
    }

    pub fn unbind(&self) {
        self.set_source(None);
    }

    // Overridable parameters

    #[must_use]
    pub fn frequency_count(&self) -> Option<u32> {
        self.read(ParameterStore::frequency_count)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] for zero.
    pub fn set_frequency_count(&self, value: Option<u32>) -> Result<(), ConverterError> {
        self.mutate(Property::FrequencyCount, |s| s.set_frequency_count(value))
    }

    #[must_use]
    pub fn channel_count(&self) -> Option<u32> {
        self.read(ParameterStore::channel_count)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] for zero.
    pub fn set_channel_count(&self, value: Option<u32>) -> Result<(), ConverterError> {
        self.mutate(Property::ChannelCount, |s| s.set_channel_count(value))
    }

    #[must_use]
    pub fn rise_time(&self) -> Option<Duration> {
        self.read(ParameterStore::rise_time)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] for a zero duration.
    pub fn set_rise_time(&self, value: Option<Duration>) -> Result<(), ConverterError> {
        self.mutate(Property::RiseTime, |s| s.set_rise_time(value))
    }

    #[must_use]
    pub fn fall_time(&self) -> Option<Duration> {
        self.read(ParameterStore::fall_time)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] for a zero duration.
    pub fn set_fall_time(&self, value: Option<Duration>) -> Result<(), ConverterError> {
        self.mutate(Property::FallTime, |s| s.set_fall_time(value))
    }

    #[must_use]
    pub fn min_frequency(&self) -> Option<f32> {
        self.read(ParameterStore::min_frequency)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] if the value is not valid for the
    /// effective frequency scale or is not below the effective maximum.
    pub fn set_min_frequency(&self, value: Option<f32>) -> Result<(), ConverterError> {
        self.mutate(Property::MinFrequency, |s| s.set_min_frequency(value))
    }

    #[must_use]
    pub fn max_frequency(&self) -> Option<f32> {
        self.read(ParameterStore::max_frequency)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] if the value is not above the
    /// effective minimum.
    pub fn set_max_frequency(&self, value: Option<f32>) -> Result<(), ConverterError> {
        self.mutate(Property::MaxFrequency, |s| s.set_max_frequency(value))
    }

    #[must_use]
    pub fn frequency_scale(&self) -> Option<ScaleType> {
        self.read(ParameterStore::frequency_scale)
    }

    /// May also clamp and re-notify the minimum frequency.
    pub fn set_frequency_scale(&self, value: Option<ScaleType>) {
        self.update(Property::FrequencyScale, |s| s.set_frequency_scale(value));
    }

    #[must_use]
    pub fn analyzer_types(&self) -> AnalyzerType {
        self.read(ParameterStore::analyzer_types)
    }

    pub fn set_analyzer_types(&self, value: Option<AnalyzerType>) {
        self.update(Property::AnalyzerTypes, |s| s.set_analyzer_types(value));
    }

    #[must_use]
    pub fn cache_data(&self) -> bool {
        self.read(ParameterStore::cache_data)
    }

    /// Disabling the cache also drops the frame currently held
    pub fn set_cache_data(&self, value: bool) {
        self.update(Property::CacheData, |s| s.set_cache_data(value));
        if !value {
            self.inner.lock().frames.forget();
        }
    }

    #[must_use]
    pub fn channel_mapping(&self) -> Option<Vec<f32>> {
        self.read(|s| s.channel_mapping().map(<[f32]>::to_vec))
    }

    /// Row-major `target x source` mixing matrix
    ///
    /// # Errors
    ///
    /// Returns [`ConverterError::Validation`] for an empty matrix or
    /// non-finite coefficients.
    pub fn set_channel_mapping(&self, value: Option<Vec<f32>>) -> Result<(), ConverterError> {
        self.mutate(Property::ChannelMapping, |s| s.set_channel_mapping(value))
    }

    // Source-only properties

    /// # Errors
    ///
    /// Returns [`ConverterError::SourceUnavailable`] with no bound source.
    pub fn fps(&self) -> Result<f32, ConverterError> {
        Ok(self.pass_through(Property::Fps, |s| s.fps())?)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::SourceUnavailable`] with no bound source.
    pub fn is_suspended(&self) -> Result<bool, ConverterError> {
        Ok(self.pass_through(Property::IsSuspended, |s| s.is_suspended())?)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::SourceUnavailable`] with no bound source.
    pub fn playback_state(&self) -> Result<PlaybackState, ConverterError> {
        Ok(self.pass_through(Property::PlaybackState, |s| s.playback_state())?)
    }

    /// # Errors
    ///
    /// Returns [`ConverterError::SourceUnavailable`] with no bound source.
    pub fn presentation_time(&self) -> Result<Option<Duration>, ConverterError> {
        Ok(self.pass_through(Property::PresentationTime, |s| s.presentation_time())?)
    }

    // Polling

    /// Current source frame reshaped to the effective configuration.
    ///
    /// Returns `None` with no bound source, or when the source has no frame
    /// and nothing is cached. Upstream change notifications are forwarded as
    /// part of the poll.
    #[must_use]
    pub fn get_data(&self) -> Option<Arc<VisualizationDataFrame>> {
        let (frame, changed) = {
            let mut guard = self.inner.lock();
            let changed = guard.collect_changes();
            let Inner { store, frames, .. } = &mut *guard;

            let frame = match store.source().map(|source| source.get_data()) {
                None => None,
                Some(Some(native)) => {
                    let converted = Arc::new(frames.convert(&native, &TargetConfig::from_store(store)));
                    if store.cache_data() {
                        frames.remember(Arc::clone(&converted));
                    }
                    Some(converted)
                }
                Some(None) if store.cache_data() => frames.cached(),
                Some(None) => None,
            };
            (frame, changed)
        };
        self.publish(changed);
        frame
    }

    /// Forward pending upstream changes without pulling a frame
    pub fn refresh(&self) {
        let changed = self.inner.lock().collect_changes();
        self.publish(changed);
    }

    /// Drop smoothing memory and the cached frame
    pub fn reset(&self) {
        debug!("Resetting converter {}", self.id);
        self.inner.lock().frames.reset();
    }
}

impl VisualizationSource for SourceConverter {
    fn get_data(&self) -> Option<Arc<VisualizationDataFrame>> {
        SourceConverter::get_data(self)
    }

    fn analyzer_types(&self) -> AnalyzerType {
        SourceConverter::analyzer_types(self)
    }

    fn fps(&self) -> Result<f32, SourceUnavailable> {
        self.pass_through(Property::Fps, |s| s.fps())
    }

    fn is_suspended(&self) -> Result<bool, SourceUnavailable> {
        self.pass_through(Property::IsSuspended, |s| s.is_suspended())
    }

    fn playback_state(&self) -> Result<PlaybackState, SourceUnavailable> {
        self.pass_through(Property::PlaybackState, |s| s.playback_state())
    }

    fn presentation_time(&self) -> Result<Option<Duration>, SourceUnavailable> {
        self.pass_through(Property::PresentationTime, |s| s.presentation_time())
    }

    fn channel_count(&self) -> Option<u32> {
        SourceConverter::channel_count(self)
    }

    fn frequency_count(&self) -> Option<u32> {
        SourceConverter::frequency_count(self)
    }

    fn frequency_scale(&self) -> Option<ScaleType> {
        SourceConverter::frequency_scale(self)
    }

    fn min_frequency(&self) -> Option<f32> {
        SourceConverter::min_frequency(self)
    }

    fn max_frequency(&self) -> Option<f32> {
        SourceConverter::max_frequency(self)
    }

    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChange>> {
        Some(self.notifier.subscribe_relay())
    }
}

#[cfg(test)]
#[path = "converter_tests.rs"]
mod tests;
