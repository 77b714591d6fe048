//! Common types used throughout Artip

use std::{fmt::Display, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

use crate::error::ArtipError;

/// Antenna identifier, as numbered in the measurement set.
pub type AntennaId = usize;

/// Scan identifier, as numbered in the measurement set.
pub type ScanId = usize;

/// An unordered pair of antennas. The pair is normalised so that `ant1 <= ant2`, so
/// `Baseline::new(2, 1) == Baseline::new(1, 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Baseline {
    ant1: AntennaId,
    ant2: AntennaId,
}

impl Baseline {
    /// Create a baseline between two antennas, in any order.
    pub fn new(ant_a: AntennaId, ant_b: AntennaId) -> Self {
        if ant_a <= ant_b {
            Self {
                ant1: ant_a,
                ant2: ant_b,
            }
        } else {
            Self {
                ant1: ant_b,
                ant2: ant_a,
            }
        }
    }

    /// The lower antenna id
    pub fn ant1(&self) -> AntennaId {
        self.ant1
    }

    /// The higher antenna id
    pub fn ant2(&self) -> AntennaId {
        self.ant2
    }

    /// Whether either end of the baseline is `antenna`
    pub fn contains(&self, antenna: AntennaId) -> bool {
        self.ant1 == antenna || self.ant2 == antenna
    }

    /// Whether this is an autocorrelation
    pub fn is_auto(&self) -> bool {
        self.ant1 == self.ant2
    }
}

impl Display for Baseline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}&{}", self.ant1, self.ant2)
    }
}

impl From<(AntennaId, AntennaId)> for Baseline {
    fn from((ant_a, ant_b): (AntennaId, AntennaId)) -> Self {
        Self::new(ant_a, ant_b)
    }
}

/// Correlation products, analysed independently of each other.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    StrumDisplay,
    EnumIter,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
#[allow(missing_docs)]
pub enum Polarization {
    RR,
    LL,
    RL,
    LR,
    XX,
    YY,
    XY,
    YX,
}

/// The role a field plays in the observation.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    StrumDisplay,
    EnumIter,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum SourceType {
    /// Flux density calibrator
    FluxCalibration,
    /// Bandpass calibrator
    BandpassCalibration,
    /// Phase calibrator
    PhaseCalibration,
    /// Science target
    Target,
}

lazy_static! {
    static ref RE_CHANNEL_RANGE: Regex =
        Regex::new(r"^\s*(?P<start>\d+)\s*(?:~\s*(?P<end>\d+)\s*)?$").unwrap();
}

/// An inclusive range of channel indices, written `start~end` as in CASA
/// selection syntax. A single channel may be written as `chan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    /// First channel in the range
    pub start: usize,
    /// Last channel in the range (inclusive)
    pub end: usize,
}

impl ChannelRange {
    /// Create a channel range, `start..=end`.
    ///
    /// # Errors
    ///
    /// Will return [`ArtipError::InvalidChannelRange`] if `start > end`.
    pub fn new(start: usize, end: usize) -> Result<Self, ArtipError> {
        if start > end {
            return Err(ArtipError::InvalidChannelRange {
                received: format!("{}~{}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    /// Whether `chan` lies within the range
    pub fn contains(&self, chan: usize) -> bool {
        (self.start..=self.end).contains(&chan)
    }
}

impl Display for ChannelRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}~{}", self.start, self.end)
    }
}

impl FromStr for ChannelRange {
    type Err = ArtipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ArtipError::InvalidChannelRange { received: s.into() };
        let captures = RE_CHANNEL_RANGE.captures(s).ok_or_else(invalid)?;
        let start = captures["start"].parse().map_err(|_| invalid())?;
        let end = match captures.name("end") {
            Some(end) => end.as_str().parse().map_err(|_| invalid())?,
            None => start,
        };
        Self::new(start, end).map_err(|_| invalid())
    }
}
