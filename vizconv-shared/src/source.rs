// SPDX-License-Identifier: GPL-3.0-only
//! Contract between a visualization data producer and its consumers

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::models::{AnalyzerType, PlaybackState, Property, ScaleType, VisualizationDataFrame};

/// Name of one of a source's own parameters that just changed
pub type SourceChange = Property;

/// A pass-through-only property was read while nothing upstream can answer it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{property} is unavailable: no source is bound")]
pub struct SourceUnavailable {
    pub property: Property,
}

/// Producer of visualization frames.
///
/// Implementations are shared between the thread that updates them and the
/// thread that polls them, so every method takes `&self` and must return a
/// consistent snapshot of that one value.
pub trait VisualizationSource: Send + Sync {
    /// Current frame, or `None` when nothing has been produced yet
    fn get_data(&self) -> Option<Arc<VisualizationDataFrame>>;

    fn analyzer_types(&self) -> AnalyzerType;

    /// # Errors
    /// Returns [`SourceUnavailable`] when the value cannot be determined.
    fn fps(&self) -> Result<f32, SourceUnavailable>;

    /// # Errors
    /// Returns [`SourceUnavailable`] when the value cannot be determined.
    fn is_suspended(&self) -> Result<bool, SourceUnavailable>;

    /// # Errors
    /// Returns [`SourceUnavailable`] when the value cannot be determined.
    fn playback_state(&self) -> Result<PlaybackState, SourceUnavailable>;

    /// # Errors
    /// Returns [`SourceUnavailable`] when the value cannot be determined.
    fn presentation_time(&self) -> Result<Option<Duration>, SourceUnavailable>;

    fn channel_count(&self) -> Option<u32>;

    fn frequency_count(&self) -> Option<u32>;

    fn frequency_scale(&self) -> Option<ScaleType>;

    fn min_frequency(&self) -> Option<f32>;

    fn max_frequency(&self) -> Option<f32>;

    /// Stream of names of this source's own properties as they change.
    ///
    /// Sources that never change their parameters may keep the default.
    fn subscribe_changes(&self) -> Option<broadcast::Receiver<SourceChange>> {
        None
    }
}

/// Identity of a bound source, comparable without touching the source itself
#[must_use]
pub fn source_identity(source: &Arc<dyn VisualizationSource>) -> usize {
    Arc::as_ptr(source).cast::<()>() as usize
}
