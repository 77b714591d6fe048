#![warn(missing_docs)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Artip is a statistical flagging engine for radio interferometry visibility data. It finds
//! antennas, baselines and time samples whose data stray from the rest of a calibrator scan,
//! and tells the measurement set to flag them.
//!
//! # Examples
//!
//! Here's an example of how to find bad antennas on a flux calibrator
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use artip::{
//!     config::{FlagConfigBuilder, SourceConfig},
//!     detailed::{flag_selections, DetailedFlagger},
//!     measurement_set::{MeasurementSet, MemoryMeasurementSet, VisRow},
//!     types::SourceType,
//!     Baseline, Complex, Polarization,
//! };
//!
//! // five antennas, where every baseline of antenna 4 is much brighter than the rest
//! let mut rows = vec![];
//! for (ant1, ant2) in (0..5).flat_map(|ant1| ((ant1 + 1)..5).map(move |ant2| (ant1, ant2))) {
//!     for time_idx in 0..4 {
//!         let amp = if ant2 == 4 { 90. } else { 10. + (ant1 + ant2) as f64 };
//!         rows.push(VisRow {
//!             scan_id: 1,
//!             field: "3C286".into(),
//!             time: 10. * time_idx as f64,
//!             baseline: Baseline::new(ant1, ant2),
//!             polarization: Polarization::RR,
//!             channel: 0,
//!             vis: Complex::new(amp, 0.),
//!             flagged: false,
//!         });
//!     }
//! }
//! let mut ms = MemoryMeasurementSet::new(rows);
//!
//! // where to find the flux calibrator
//! let config = FlagConfigBuilder::default()
//!     .polarizations(vec![Polarization::RR])
//!     .sources(BTreeMap::from([(
//!         SourceType::FluxCalibration,
//!         SourceConfig {
//!             field: "3C286".into(),
//!             channel_range: "0~0".parse().unwrap(),
//!         },
//!     )]))
//!     .draw_progress(false)
//!     .build()
//!     .unwrap();
//!
//! // classify every antenna, time sample and baseline of each (polarization, scan)
//! let summary = DetailedFlagger::new(&ms, &config)
//!     .get_bad_antennas(SourceType::FluxCalibration)
//!     .unwrap();
//! assert_eq!(summary.passes[0].classes().unwrap().antennas.bad(), vec![4]);
//!
//! // flag everything which was found to be bad
//! for selection in flag_selections(&summary) {
//!     ms.flag(selection).unwrap();
//! }
//! assert!(!ms.unflagged_antenna_ids(Polarization::RR, 1).contains(&4));
//! ```
//!
//! # Details
//!
//! Each flagger runs one pass per (polarization, scan) of a source, in parallel with
//! [`rayon`]. Within a pass, the deviation of every slice from a reference is classified by
//! [`classify::classify`], with the same thresholds in every dimension:
//!
//! - [`detailed::DetailedFlagger`] compares the median amplitude of each antenna, time
//!   sample and baseline to the median of the whole scan.
//! - [`rflag::RFlagger`] compares the phase dispersion of each baseline.
//! - [`closure::ClosureFlagger`] compares the closure phases of the triangles each baseline
//!   takes part in.

use cfg_if::cfg_if;

pub mod amplitude;
pub mod classify;
pub mod closure;
pub mod config;
pub mod constants;
pub mod detailed;
pub mod error;
pub mod io;
pub mod measurement_set;
pub mod report;
pub mod rflag;
pub mod stats;
pub mod types;
pub mod util;

pub use error::ArtipError;
pub use types::{AntennaId, Baseline, Polarization, ScanId};

// re-exports
pub use ndarray;
pub use num_complex::Complex;

cfg_if! {
    if #[cfg(feature = "cli")] {
        pub mod cli;
        pub use cli::ArtipContext;
    }
}

#[cfg(test)]
mod test_common;

/// Evaluate an expression, adding the time it took to the entry `$name` of a
/// `HashMap<String, Duration>`.
#[macro_export]
macro_rules! with_increment_duration {
    ($durations:expr, $name:expr, $body:expr) => {{
        let _now = std::time::Instant::now();
        let _res = $body;
        *$durations
            .entry($name.into())
            .or_insert(std::time::Duration::ZERO) += _now.elapsed();
        _res
    }};
}
