// SPDX-License-Identifier: GPL-3.0-only
//! Validation rules for converter overrides and spectrum layouts
//!
//! Every override assignment runs through one of these functions before it is
//! stored, so a rejected value never reaches converter state.

use std::time::Duration;

use crate::models::types::ScaleType;

/// Validation errors for rejected configuration values
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid frequency count: {value} (must be > 0)")]
    InvalidFrequencyCount { value: u32 },

    #[error("Invalid channel count: {value} (must be > 0)")]
    InvalidChannelCount { value: u32 },

    #[error("Invalid rise time: {value:?} (must be > 0)")]
    InvalidRiseTime { value: Duration },

    #[error("Invalid fall time: {value:?} (must be > 0)")]
    InvalidFallTime { value: Duration },

    #[error("Frequency must be finite, got {value}")]
    NonFiniteFrequency { value: f32 },

    #[error("Invalid minimum frequency: {value} Hz (must be >= 0 Hz on a linear scale)")]
    NegativeMinFrequency { value: f32 },

    #[error("Invalid minimum frequency: {value} Hz (must be > 0 Hz on a logarithmic scale)")]
    NonPositiveLogMinFrequency { value: f32 },

    #[error("Minimum frequency {value} Hz must be below the maximum frequency {max} Hz")]
    MinFrequencyAboveMax { value: f32, max: f32 },

    #[error("Invalid maximum frequency: {value} Hz (must be > 0 Hz)")]
    NonPositiveMaxFrequency { value: f32 },

    #[error("Maximum frequency {value} Hz must be above the minimum frequency {min} Hz")]
    MaxFrequencyBelowMin { value: f32, min: f32 },

    #[error("Spectrum shape mismatch: expected {expected} bins per channel, got {actual}")]
    SpectrumShapeMismatch { expected: usize, actual: usize },

    #[error("Channel mapping must contain at least one coefficient")]
    EmptyChannelMapping,

    #[error("Channel mapping coefficient {index} is not finite")]
    NonFiniteChannelMapping { index: usize },
}

/// Validate a requested frequency bin count
///
/// # Errors
/// Returns [`ValidationError::InvalidFrequencyCount`] for zero.
pub fn validate_frequency_count(value: u32) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidFrequencyCount { value });
    }
    Ok(())
}

/// Validate a requested channel count
///
/// # Errors
/// Returns [`ValidationError::InvalidChannelCount`] for zero.
pub fn validate_channel_count(value: u32) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::InvalidChannelCount { value });
    }
    Ok(())
}

/// # Errors
/// Returns [`ValidationError::InvalidRiseTime`] for a zero duration.
pub fn validate_rise_time(value: Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::InvalidRiseTime { value });
    }
    Ok(())
}

/// # Errors
/// Returns [`ValidationError::InvalidFallTime`] for a zero duration.
pub fn validate_fall_time(value: Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::InvalidFallTime { value });
    }
    Ok(())
}

/// Validate a lower frequency bound against the effective scale and upper bound.
///
/// Zero is only a valid lower bound on a known linear scale; when the scale is
/// logarithmic or not yet known the bound must be strictly positive.
///
/// # Errors
/// Returns [`ValidationError::NonFiniteFrequency`],
/// [`ValidationError::NegativeMinFrequency`],
/// [`ValidationError::NonPositiveLogMinFrequency`] or
/// [`ValidationError::MinFrequencyAboveMax`].
pub fn validate_min_frequency(
    value: f32,
    scale: Option<ScaleType>,
    max: Option<f32>,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteFrequency { value });
    }
    match scale {
        Some(ScaleType::Linear) if value < 0.0 => {
            return Err(ValidationError::NegativeMinFrequency { value });
        }
        Some(ScaleType::Linear) => {}
        Some(ScaleType::Logarithmic) | None if value <= 0.0 => {
            return Err(ValidationError::NonPositiveLogMinFrequency { value });
        }
        Some(ScaleType::Logarithmic) | None => {}
    }
    if let Some(max) = max {
        if value >= max {
            return Err(ValidationError::MinFrequencyAboveMax { value, max });
        }
    }
    Ok(())
}

/// Validate an upper frequency bound against the effective lower bound
///
/// # Errors
/// Returns [`ValidationError::NonFiniteFrequency`],
/// [`ValidationError::NonPositiveMaxFrequency`] or
/// [`ValidationError::MaxFrequencyBelowMin`].
pub fn validate_max_frequency(value: f32, min: Option<f32>) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteFrequency { value });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveMaxFrequency { value });
    }
    if let Some(min) = min {
        if value <= min {
            return Err(ValidationError::MaxFrequencyBelowMin { value, min });
        }
    }
    Ok(())
}

/// Validate a row-major channel mixing matrix
///
/// The matrix shape is only known once frames arrive, so this checks content only.
///
/// # Errors
/// Returns [`ValidationError::EmptyChannelMapping`] or
/// [`ValidationError::NonFiniteChannelMapping`].
pub fn validate_channel_mapping(coefficients: &[f32]) -> Result<(), ValidationError> {
    if coefficients.is_empty() {
        return Err(ValidationError::EmptyChannelMapping);
    }
    if let Some(index) = coefficients.iter().position(|c| !c.is_finite()) {
        return Err(ValidationError::NonFiniteChannelMapping { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_must_be_positive() {
        assert!(validate_frequency_count(1).is_ok());
        assert!(validate_frequency_count(u32::MAX).is_ok());
        assert_eq!(
            validate_frequency_count(0),
            Err(ValidationError::InvalidFrequencyCount { value: 0 })
        );
        assert!(validate_channel_count(2).is_ok());
        assert!(validate_channel_count(0).is_err());
    }

    #[test]
    fn test_times_must_be_positive() {
        assert!(validate_rise_time(Duration::from_nanos(100)).is_ok());
        assert!(validate_rise_time(Duration::ZERO).is_err());
        assert!(validate_fall_time(Duration::from_millis(5)).is_ok());
        assert!(validate_fall_time(Duration::ZERO).is_err());
    }

    #[test]
    fn test_min_frequency_depends_on_scale() {
        assert!(validate_min_frequency(0.0, Some(ScaleType::Linear), None).is_ok());
        assert!(validate_min_frequency(0.0, Some(ScaleType::Logarithmic), None).is_err());
        assert!(validate_min_frequency(0.0, None, None).is_err());
        assert!(validate_min_frequency(-1.0, Some(ScaleType::Linear), None).is_err());
        assert!(validate_min_frequency(20.0, None, Some(20000.0)).is_ok());
        assert_eq!(
            validate_min_frequency(20000.0, Some(ScaleType::Logarithmic), Some(20000.0)),
            Err(ValidationError::MinFrequencyAboveMax {
                value: 20000.0,
                max: 20000.0
            })
        );
        assert!(validate_min_frequency(f32::NAN, Some(ScaleType::Linear), None).is_err());
    }

    #[test]
    fn test_max_frequency_bounds() {
        assert!(validate_max_frequency(20000.0, Some(20.0)).is_ok());
        assert!(validate_max_frequency(10.0, Some(20.0)).is_err());
        assert!(validate_max_frequency(20.0, Some(20.0)).is_err());
        assert!(validate_max_frequency(0.0, None).is_err());
        assert!(validate_max_frequency(f32::INFINITY, None).is_err());
    }

    #[test]
    fn test_channel_mapping_content() {
        assert!(validate_channel_mapping(&[0.5, 0.5]).is_ok());
        assert_eq!(
            validate_channel_mapping(&[]),
            Err(ValidationError::EmptyChannelMapping)
        );
        assert_eq!(
            validate_channel_mapping(&[1.0, f32::NAN]),
            Err(ValidationError::NonFiniteChannelMapping { index: 1 })
        );
    }
}
