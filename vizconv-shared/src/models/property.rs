// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString};

/// Name of an observable property of a visualization source.
///
/// The declaration order of the first eight variants is the order in which a
/// converter reports simultaneous changes.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumCount,
    EnumIter,
    EnumString,
)]
pub enum Property {
    Source,
    FrequencyCount,
    ChannelCount,
    RiseTime,
    FallTime,
    MinFrequency,
    MaxFrequency,
    FrequencyScale,
    AnalyzerTypes,
    CacheData,
    ChannelMapping,
    Fps,
    IsSuspended,
    PlaybackState,
    PresentationTime,
}

impl Property {
    /// Properties that only exist upstream and can never be overridden
    #[must_use]
    pub fn is_pass_through_only(self) -> bool {
        matches!(
            self,
            Property::Fps
                | Property::IsSuspended
                | Property::PlaybackState
                | Property::PresentationTime
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_property_names_match_variants() {
        assert_eq!(Property::FrequencyCount.as_ref(), "FrequencyCount");
        assert_eq!(Property::MinFrequency.to_string(), "MinFrequency");
        assert_eq!("FrequencyScale".parse(), Ok(Property::FrequencyScale));
    }

    #[test]
    fn test_pass_through_only_set() {
        let pass_through: Vec<Property> = Property::iter()
            .filter(|p| p.is_pass_through_only())
            .collect();
        assert_eq!(
            pass_through,
            vec![
                Property::Fps,
                Property::IsSuspended,
                Property::PlaybackState,
                Property::PresentationTime
            ]
        );
    }
}
