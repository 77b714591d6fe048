//! Flagging parameters, passed explicitly to each flagger.

use std::{collections::BTreeMap, fmt::Display};

use derive_builder::Builder;
use itertools::Itertools;

use crate::{
    constants::DEFAULT_BAD_ANTENNA_FRACTION,
    error::ArtipError,
    types::{ChannelRange, SourceType},
    Polarization,
};

/// Where to find a source in the measurement set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Name of the field observed for this source
    pub field: String,
    /// Channels to analyse
    pub channel_range: ChannelRange,
}

/// Options for flagging a measurement set
#[derive(Builder, Debug, Clone)]
pub struct FlagConfig {
    /// Polarizations to analyse, each independently
    #[builder(default = "vec![Polarization::RR, Polarization::LL]")]
    pub polarizations: Vec<Polarization>,
    /// Field and channels for each type of source
    #[builder(default)]
    pub sources: BTreeMap<SourceType, SourceConfig>,
    /// The source used for closure phases
    #[builder(default = "SourceType::FluxCalibration")]
    pub closure_source: SourceType,
    /// The fraction of an antenna's baselines which must be bad for the antenna to be bad
    #[builder(default = "DEFAULT_BAD_ANTENNA_FRACTION")]
    pub bad_antenna_fraction: f64,
    /// Whether to draw progress bars
    #[builder(default = "true")]
    pub draw_progress: bool,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            polarizations: vec![Polarization::RR, Polarization::LL],
            sources: BTreeMap::new(),
            closure_source: SourceType::FluxCalibration,
            bad_antenna_fraction: DEFAULT_BAD_ANTENNA_FRACTION,
            draw_progress: true,
        }
    }
}

impl FlagConfig {
    /// The configuration of a source type.
    ///
    /// # Errors
    ///
    /// Will return [`ArtipError::UnknownSource`] if the source type is not configured.
    pub fn source(&self, source_type: SourceType) -> Result<&SourceConfig, ArtipError> {
        self.sources
            .get(&source_type)
            .ok_or_else(|| ArtipError::UnknownSource {
                source_type: source_type.to_string(),
            })
    }
}

impl Display for FlagConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Will analyse polarizations {}.",
            self.polarizations.iter().join(", ")
        )?;
        for (source_type, source) in &self.sources {
            writeln!(
                f,
                "{:>22}: field {}, channels {}",
                source_type.to_string(),
                source.field,
                source.channel_range
            )?;
        }
        writeln!(f, "Will use {} for closure phases.", self.closure_source)?;
        writeln!(
            f,
            "Will flag antennas with at least {:.0}% bad baselines.",
            self.bad_antenna_fraction * 100.
        )?;
        writeln!(
            f,
            "{} draw progress bars.",
            if self.draw_progress {
                "Will"
            } else {
                "Will not"
            }
        )?;
        Ok(())
    }
}
