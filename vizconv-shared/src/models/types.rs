// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr};
use strum_macros::{AsRefStr, Display, EnumCount, EnumIter, EnumString, VariantNames};

/// Set of analysis kinds a source produces or a consumer wants.
///
/// Behaves like a small bit set: `AnalyzerType::RMS | AnalyzerType::SPECTRUM`.
/// Serialized as a `|` separated list of names (`"rms|spectrum"`), `"all"` or `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AnalyzerType(u8);

impl AnalyzerType {
    pub const NONE: Self = Self(0);
    pub const RMS: Self = Self(1);
    pub const PEAK: Self = Self(2);
    pub const SPECTRUM: Self = Self(4);
    pub const ALL: Self = Self(Self::RMS.0 | Self::PEAK.0 | Self::SPECTRUM.0);

    const NAMED: [(Self, &'static str); 3] = [
        (Self::RMS, "rms"),
        (Self::PEAK, "peak"),
        (Self::SPECTRUM, "spectrum"),
    ];

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for AnalyzerType {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for AnalyzerType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for AnalyzerType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.intersection(rhs)
    }
}

impl std::fmt::Display for AnalyzerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::ALL {
            return write!(f, "all");
        }
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Self::NAMED
            .iter()
            .filter(|(kind, _)| self.contains(*kind))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

impl std::str::FromStr for AnalyzerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "all" => return Ok(Self::ALL),
            "none" | "" => return Ok(Self::NONE),
            _ => {}
        }

        s.split(['|', ','])
            .map(str::trim)
            .try_fold(Self::NONE, |acc, part| {
                Self::NAMED
                    .iter()
                    .find(|(_, name)| *name == part)
                    .map(|(kind, _)| acc | *kind)
                    .ok_or_else(|| format!("unknown analyzer type '{part}'"))
            })
    }
}

impl TryFrom<String> for AnalyzerType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AnalyzerType> for String {
    fn from(value: AnalyzerType) -> Self {
        value.to_string()
    }
}

/// Spacing of a frequency axis, or the unit of an amplitude axis
/// (`Logarithmic` amplitudes are in dB).
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
    VariantNames,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScaleType {
    #[default]
    Linear,
    Logarithmic,
}

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
    EnumIter,
    Default,
)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}
