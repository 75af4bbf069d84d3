// SPDX-License-Identifier: GPL-3.0-only
//! Snapshot diffing that turns store mutations into ordered change names.

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use vizconv_shared::{AnalyzerType, Property, ScaleType, SourceChange, VisualizationSource, source_identity};

use super::store::{Override, ParameterStore};

/// Everything a consumer can observe changing through a mutation.
///
/// Overrides are captured rather than effective values: a source that
/// already reports the requested value still counts as a change.
#[derive(Debug, Clone, PartialEq, Default)]
struct Snapshot {
    source: Option<usize>,
    frequency_count: Override<u32>,
    channel_count: Override<u32>,
    rise_time: Override<Duration>,
    fall_time: Override<Duration>,
    min_frequency: Override<f32>,
    max_frequency: Override<f32>,
    frequency_scale: Override<ScaleType>,
    analyzer_types: Override<AnalyzerType>,
    cache_data: bool,
    channel_mapping: Override<Vec<f32>>,
}

impl Snapshot {
    fn capture(store: &ParameterStore) -> Self {
        Self {
            source: store.source().map(source_identity),
            frequency_count: store.frequency_count.clone(),
            channel_count: store.channel_count.clone(),
            rise_time: store.rise_time.clone(),
            fall_time: store.fall_time.clone(),
            min_frequency: store.min_frequency.clone(),
            max_frequency: store.max_frequency.clone(),
            frequency_scale: store.frequency_scale.clone(),
            analyzer_types: store.analyzer_types.clone(),
            cache_data: store.cache_data,
            channel_mapping: store.channel_mapping.clone(),
        }
    }

    /// Names of the fields that differ, in declaration order
    fn diff(&self, next: &Self) -> Vec<Property> {
        let mut changed = Vec::new();
        let mut check = |differs: bool, property: Property| {
            if differs {
                changed.push(property);
            }
        };

        check(self.source != next.source, Property::Source);
        check(self.frequency_count != next.frequency_count, Property::FrequencyCount);
        check(self.channel_count != next.channel_count, Property::ChannelCount);
        check(self.rise_time != next.rise_time, Property::RiseTime);
        check(self.fall_time != next.fall_time, Property::FallTime);
        check(self.min_frequency != next.min_frequency, Property::MinFrequency);
        check(self.max_frequency != next.max_frequency, Property::MaxFrequency);
        check(self.frequency_scale != next.frequency_scale, Property::FrequencyScale);
        check(self.analyzer_types != next.analyzer_types, Property::AnalyzerTypes);
        check(self.cache_data != next.cache_data, Property::CacheData);
        check(self.channel_mapping != next.channel_mapping, Property::ChannelMapping);
        changed
    }
}

/// Tracks the last published snapshot and the bound source's change stream
pub struct ChangeTracker {
    last: Snapshot,
    upstream: Option<broadcast::Receiver<SourceChange>>,
}

impl ChangeTracker {
    #[must_use]
    pub fn new(store: &ParameterStore) -> Self {
        Self {
            last: Snapshot::capture(store),
            upstream: None,
        }
    }

    /// Follow the change stream of a newly bound source, dropping anything
    /// still queued from the previous one
    pub fn follow(&mut self, source: Option<&Arc<dyn VisualizationSource>>) {
        self.upstream = source.and_then(|s| s.subscribe_changes());
    }

    /// Fields changed since the previous call: the snapshot diff first, then
    /// upstream changes that are not masked by an override
    pub fn collect(&mut self, store: &ParameterStore) -> Vec<Property> {
        let next = Snapshot::capture(store);
        let mut changed = self.last.diff(&next);
        self.last = next;

        self.drain_upstream(store, &mut changed);
        changed
    }

    fn drain_upstream(&mut self, store: &ParameterStore, changed: &mut Vec<Property>) {
        let Some(upstream) = self.upstream.as_mut() else {
            return;
        };

        loop {
            match upstream.try_recv() {
                Ok(property) => {
                    if forwards(property, store) {
                        changed.push(property);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {skipped} upstream change notifications");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => {
                    debug!("Upstream change stream closed");
                    self.upstream = None;
                    break;
                }
            }
        }
    }
}

/// Whether an upstream change is observable through this converter
fn forwards(property: Property, store: &ParameterStore) -> bool {
    match property {
        // Converter-local settings never inherit from the source
        Property::Source
        | Property::RiseTime
        | Property::FallTime
        | Property::CacheData
        | Property::ChannelMapping => false,
        property if property.is_pass_through_only() => true,
        _ => !store.is_overridden(property),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_mutation_no_changes() {
        let store = ParameterStore::default();
        let mut tracker = ChangeTracker::new(&store);
        assert!(tracker.collect(&store).is_empty());
    }

    #[test]
    fn test_changes_reported_in_declaration_order() {
        let mut store = ParameterStore::default();
        let mut tracker = ChangeTracker::new(&store);

        store.set_frequency_scale(Some(ScaleType::Linear));
        store.set_channel_count(Some(2)).unwrap();
        store.set_cache_data(false);

        assert_eq!(
            tracker.collect(&store),
            vec![
                Property::ChannelCount,
                Property::FrequencyScale,
                Property::CacheData
            ]
        );
        assert!(tracker.collect(&store).is_empty());
    }

    #[test]
    fn test_reassigning_same_value_is_silent() {
        let mut store = ParameterStore::default();
        store.set_frequency_count(Some(10)).unwrap();
        let mut tracker = ChangeTracker::new(&store);

        store.set_frequency_count(Some(10)).unwrap();
        assert!(tracker.collect(&store).is_empty());
    }

    #[test]
    fn test_scale_cascade_reports_min_frequency() {
        let mut store = ParameterStore::default();
        store.set_frequency_scale(Some(ScaleType::Linear));
        store.set_min_frequency(Some(0.0)).unwrap();
        let mut tracker = ChangeTracker::new(&store);

        store.set_frequency_scale(Some(ScaleType::Logarithmic));
        assert_eq!(
            tracker.collect(&store),
            vec![Property::MinFrequency, Property::FrequencyScale]
        );
    }

    #[test]
    fn test_forwarding_masks_overridden_fields() {
        let mut store = ParameterStore::default();
        assert!(forwards(Property::PlaybackState, &store));
        assert!(forwards(Property::FrequencyCount, &store));
        assert!(!forwards(Property::Source, &store));

        store.set_frequency_count(Some(32)).unwrap();
        assert!(!forwards(Property::FrequencyCount, &store));
        assert!(forwards(Property::ChannelCount, &store));
    }
}
