//! Utility functions shared by the flaggers

use std::{collections::BTreeSet, ops::Range};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, warn};

use crate::{
    classify::Classification,
    error::ArtipError,
    measurement_set::{FlagReason, FlagSelection},
    AntennaId, Baseline, Polarization, ScanId,
};

/// A progress bar over `len` (polarization, scan) passes, drawn to stderr if
/// `draw_progress`.
pub(crate) fn pass_progress_bar(
    len: usize,
    message: &'static str,
    draw_progress: bool,
) -> ProgressBar {
    let draw_target = if draw_progress {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    };
    let progress = ProgressBar::with_draw_target(Some(len as _), draw_target)
        .with_position(0)
        .with_message(message);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})")
    {
        progress.set_style(style.progress_chars("=> "));
    }
    progress
}

/// The union of bad baselines over several (polarization, scan) passes.
///
/// Failed passes are logged and skipped.
///
/// # Errors
///
/// If every pass failed, the first error is returned.
pub(crate) fn union_bad_baselines(
    passes: Vec<(Polarization, ScanId, Result<Classification<Baseline>, ArtipError>)>,
) -> Result<BTreeSet<Baseline>, ArtipError> {
    let mut bad_baselines = BTreeSet::new();
    let mut first_error = None;
    let mut num_ok = 0;
    for (polarization, scan_id, result) in passes {
        match result {
            Ok(classification) => {
                num_ok += 1;
                let bad = classification.bad();
                debug!(
                    "pol={} scan={} reference={:?} bad baselines: {:?}",
                    polarization, scan_id, classification.reference, bad
                );
                bad_baselines.extend(bad);
            }
            Err(err) => {
                warn!("skipping pol={} scan={}: {}", polarization, scan_id, err);
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if num_ok == 0 => Err(err),
        _ => Ok(bad_baselines),
    }
}

/// Group sorted indices into half-open ranges of consecutive indices.
///
/// # Examples
///
/// ```rust
/// use artip::util::contiguous_ranges;
///
/// assert_eq!(contiguous_ranges(&[1, 2, 3, 7, 9, 10]), vec![1..4, 7..8, 9..11]);
/// ```
pub fn contiguous_ranges(idxs: &[usize]) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = vec![];
    for &idx in idxs {
        if let Some(range) = ranges.last_mut().filter(|range| range.end == idx) {
            range.end += 1;
            continue;
        }
        ranges.push(idx..(idx + 1));
    }
    ranges
}

/// Antennas for which at least `fraction` of their baselines to the other `antennas`
/// are bad.
pub fn bad_antennas_from_baselines(
    bad_baselines: &BTreeSet<Baseline>,
    antennas: &[AntennaId],
    fraction: f64,
) -> BTreeSet<AntennaId> {
    if antennas.len() < 2 {
        return BTreeSet::new();
    }
    let num_baselines = (antennas.len() - 1) as f64;
    antennas
        .iter()
        .copied()
        .filter(|&ant| {
            let num_bad = bad_baselines
                .iter()
                .filter(|baseline| baseline.contains(ant))
                .count();
            num_bad as f64 / num_baselines >= fraction
        })
        .collect()
}

/// Selections which flag bad baselines in every scan and polarization. Antennas with
/// at least `fraction` of their baselines bad are flagged as a whole with
/// [`FlagReason::BadAntenna`], and the bad baselines left over with
/// [`FlagReason::BadBaseline`].
pub fn baseline_flag_selections(
    bad_baselines: &BTreeSet<Baseline>,
    antennas: &[AntennaId],
    fraction: f64,
) -> Vec<FlagSelection> {
    let bad_antennas = bad_antennas_from_baselines(bad_baselines, antennas, fraction);
    let remaining: Vec<Baseline> = bad_baselines
        .iter()
        .copied()
        .filter(|baseline| !bad_antennas.iter().any(|&ant| baseline.contains(ant)))
        .collect();

    let mut selections = vec![];
    if !bad_antennas.is_empty() {
        selections.push(FlagSelection {
            antennas: bad_antennas.into_iter().collect(),
            ..FlagSelection::new(FlagReason::BadAntenna)
        });
    }
    if !remaining.is_empty() {
        selections.push(FlagSelection {
            baselines: remaining,
            ..FlagSelection::new(FlagReason::BadBaseline)
        });
    }
    selections
}
