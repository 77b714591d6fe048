//! Aggregation of bad antennas across the scans of a source.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Display,
};

use itertools::Itertools;
use prettytable::{format as prettyformat, row, table};

use crate::{detailed::DetailedFlagSummary, AntennaId, ScanId};

/// The scans in which each antenna was judged bad. Only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagReport {
    bad_scans: BTreeMap<AntennaId, BTreeSet<ScanId>>,
}

impl FlagReport {
    /// Create an empty report over the given antennas
    pub fn new(antennas: &[AntennaId]) -> Self {
        Self {
            bad_scans: antennas
                .iter()
                .map(|&antenna| (antenna, BTreeSet::new()))
                .collect(),
        }
    }

    /// Record that `antenna` was bad in `scan_id`. Antennas not given to [`FlagReport::new`]
    /// are added.
    pub fn add(&mut self, antenna: AntennaId, scan_id: ScanId) {
        self.bad_scans.entry(antenna).or_default().insert(scan_id);
    }

    /// Record every bad antenna of every classified pass in a detailed flagging summary.
    pub fn record_summary(&mut self, summary: &DetailedFlagSummary) {
        for (scan_id, antennas) in summary.bad_antennas_by_scan() {
            for antenna in antennas {
                self.add(antenna, scan_id);
            }
        }
    }

    /// The scans in which `antenna` was bad, in ascending order
    pub fn bad_scans(&self, antenna: AntennaId) -> Vec<ScanId> {
        self.bad_scans
            .get(&antenna)
            .map(|scans| scans.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Summarise the report over `scan_ids`.
    pub fn generate_report(&self, scan_ids: &[ScanId]) -> ReportSummary {
        let scan_ids: Vec<ScanId> = scan_ids.iter().copied().sorted().dedup().collect();
        let bad_scans = self
            .bad_scans
            .iter()
            .map(|(&antenna, scans)| {
                let in_report = scans
                    .iter()
                    .copied()
                    .filter(|scan_id| scan_ids.binary_search(scan_id).is_ok())
                    .collect();
                (antenna, in_report)
            })
            .collect();
        ReportSummary {
            scan_ids,
            bad_scans,
        }
    }
}

/// The bad scans of every antenna, restricted to some scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    /// The scans which were reported on
    pub scan_ids: Vec<ScanId>,
    /// The bad scans of each antenna, in ascending order
    pub bad_scans: BTreeMap<AntennaId, Vec<ScanId>>,
}

impl ReportSummary {
    /// Antennas which were bad in at least one reported scan
    pub fn bad_antennas(&self) -> Vec<AntennaId> {
        self.bad_scans
            .iter()
            .filter(|(_, scans)| !scans.is_empty())
            .map(|(&antenna, _)| antenna)
            .collect()
    }
}

impl Display for ReportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut antenna_table = table!(["", "bad", "of", "scans"]);
        antenna_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
        for (antenna, scans) in &self.bad_scans {
            let row = row![r =>
                format!("ant{}:", antenna),
                scans.len(),
                self.scan_ids.len(),
                scans.iter().join(",")
            ];
            antenna_table.add_row(row);
        }
        writeln!(
            f,
            "Bad antenna report (antennas={}, bad={}, scans={}):\n{}",
            self.bad_scans.len(),
            self.bad_antennas().len(),
            self.scan_ids.iter().join(","),
            antenna_table
        )
    }
}
