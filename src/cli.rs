//! Command Line Interface helpers for Artip

use crate::{
    closure::ClosureFlagger,
    config::{FlagConfig, FlagConfigBuilder, SourceConfig},
    detailed::{flag_selections, DetailedFlagger},
    error::{ArtipError, ArtipError::DryRun, CLIError::InvalidCommandLineArgument},
    io::{read_visibility_csv, write_flag_commands},
    measurement_set::{MeasurementSet, MemoryMeasurementSet},
    report::FlagReport,
    rflag::RFlagger,
    types::{ChannelRange, SourceType},
    util::baseline_flag_selections,
    with_increment_duration, Baseline, Polarization,
};
use clap::{arg, command, ErrorKind::ArgumentNotFound, ValueHint::FilePath};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use strum::IntoEnumIterator;
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    ffi::OsString,
    fmt::{Debug, Display},
    str::FromStr,
    time::Duration,
};

/// Args for flagging a visibility dump.
pub struct ArtipContext {
    /// The visibilities to flag
    pub ms: MemoryMeasurementSet,
    /// Flagging parameters
    pub config: FlagConfig,
    /// Path the visibilities were read from
    pub vis_in: String,
    /// The source to run detailed and phase dispersion flagging on
    pub detailed_source: SourceType,
    /// Whether to apply the flags found by detailed flagging
    pub apply_flags: bool,
    /// Optional path to write a flag command list to
    pub flag_out: Option<String>,
}

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match GIT_HEAD_REF {
        Some(hr) => {
            let dirty = GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                GIT_COMMIT_HASH.unwrap_or("<unknown>"),
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {}", hr)?;
        }
        None => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {}", BUILT_TIME_UTC)?;
    writeln!(f, "         with compiler {}", RUSTC_VERSION)?;
    writeln!(f)?;
    Ok(())
}

impl Display for ArtipContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        writeln!(f, "Visibilities:         {}", self.vis_in)?;
        writeln!(
            f,
            "Rows:                 {} ({} flagged)",
            self.ms.rows().len(),
            self.ms.rows().iter().filter(|row| row.flagged).count()
        )?;
        writeln!(
            f,
            "Antennas:             {}",
            self.ms.antennas().iter().join(",")
        )?;
        for (source_type, source) in &self.config.sources {
            writeln!(
                f,
                "{:>20}: scans {}",
                source_type.to_string(),
                self.ms.scan_ids_for(&source.field).iter().join(",")
            )?;
        }

        write!(f, "{}", self.config)?;
        writeln!(
            f,
            "Will run detailed flagging on {}.",
            self.detailed_source
        )?;
        writeln!(
            f,
            "{} apply detailed flags.",
            if self.apply_flags { "Will" } else { "Will not" }
        )?;
        match &self.flag_out {
            Some(flag_out) => writeln!(f, "Will write flag commands to {}", flag_out)?,
            None => writeln!(f, "Will not write flag commands.")?,
        }
        Ok(())
    }
}

impl ArtipContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, ArtipError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Find and flag bad antennas, baselines and time samples in \
                    radio interferometry visibilities.")
            .args(&[
                // input options
                arg!(vis_in: <PATH> "Visibility dump (CSV) to flag")
                    .value_hint(FilePath)
                    .help_heading("INPUT")
                    .required(true),

                // processing options
                arg!(--"dry-run" "Just print the summary and exit"),
                arg!(--"no-draw-progress" "do not show progress bars"),

                // source options
                arg!(-s --source <SOURCE> "Field and channel range (start~end) of a source type")
                    .value_names(&["TYPE", "FIELD", "CHANS"])
                    .number_of_values(3)
                    .multiple_occurrences(true)
                    .help_heading("SOURCES")
                    .required(true),
                arg!(--"detailed-source" <TYPE> "Source type to run detailed and phase dispersion flagging on [default: flux_calibration]")
                    .help_heading("SOURCES")
                    .required(false),
                arg!(--"closure-source" <TYPE> "Source type to compute closure phases on [default: flux_calibration]")
                    .help_heading("SOURCES")
                    .required(false),

                // flagging options
                arg!(--pols <POLS> "Comma separated polarizations to analyse [default: RR,LL]")
                    .help_heading("FLAGGING")
                    .required(false),
                arg!(--"bad-antenna-fraction" <FRACTION> "Flag antennas with at least this fraction of bad baselines [default: 0.5]")
                    .help_heading("FLAGGING")
                    .required(false),
                arg!(--"apply-flags" "Apply the flags found by detailed flagging")
                    .help_heading("FLAGGING"),

                // output options
                arg!(-f --"flag-out" <PATH> "Write a flag command list")
                    .value_hint(FilePath)
                    .help_heading("OUTPUT")
                    .required(false),
            ]);
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_source_type(option: &str, value: &str) -> Result<SourceType, ArtipError> {
        SourceType::from_str(value).map_err(|_| {
            ArtipError::CLIError(InvalidCommandLineArgument {
                option: option.into(),
                expected: SourceType::iter().join(", "),
                received: value.into(),
            })
        })
    }

    fn parse_source_matches(
        matches: &clap::ArgMatches,
    ) -> Result<BTreeMap<SourceType, SourceConfig>, ArtipError> {
        let values: Vec<&str> = matches
            .values_of("source")
            .map(|values| values.collect())
            .unwrap_or_default();
        let mut sources = BTreeMap::new();
        for chunk in values.chunks(3) {
            if let [source_type, field, chans] = chunk {
                let source_type =
                    Self::parse_source_type("--source <TYPE> <FIELD> <CHANS>", source_type)?;
                let source = SourceConfig {
                    field: (*field).to_string(),
                    channel_range: ChannelRange::from_str(chans)?,
                };
                if sources.insert(source_type, source).is_some() {
                    warn!("--source {} given more than once, using the last", source_type);
                }
            }
        }
        Ok(sources)
    }

    fn parse_source_type_matches(
        matches: &clap::ArgMatches,
        name: &str,
    ) -> Result<SourceType, ArtipError> {
        match matches.value_of(name) {
            Some(value) => Self::parse_source_type(&format!("--{} <TYPE>", name), value),
            None => Ok(SourceType::FluxCalibration),
        }
    }

    fn parse_flag_matches(
        matches: &clap::ArgMatches,
        sources: BTreeMap<SourceType, SourceConfig>,
    ) -> Result<FlagConfig, ArtipError> {
        let mut builder = FlagConfigBuilder::default();
        builder
            .sources(sources)
            .closure_source(Self::parse_source_type_matches(matches, "closure-source")?)
            .draw_progress(!matches.is_present("no-draw-progress"));

        if let Some(pols) = matches.value_of("pols") {
            let polarizations = pols
                .split(',')
                .map(|pol| {
                    Polarization::from_str(pol.trim()).map_err(|_| {
                        ArtipError::CLIError(InvalidCommandLineArgument {
                            option: "--pols <POLS>".into(),
                            expected: "comma separated polarizations, e.g. RR,LL".into(),
                            received: pols.into(),
                        })
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            builder.polarizations(polarizations);
        }

        match matches.value_of_t::<f64>("bad-antenna-fraction") {
            Ok(fraction) => {
                if !(fraction > 0. && fraction <= 1.) {
                    return Err(ArtipError::CLIError(InvalidCommandLineArgument {
                        option: "--bad-antenna-fraction <FRACTION>".into(),
                        expected: "0 < fraction <= 1".into(),
                        received: format!("{}", fraction),
                    }));
                }
                builder.bad_antenna_fraction(fraction);
            }
            Err(err) => match err.kind() {
                ArgumentNotFound { .. } => {}
                _ => return Err(err.into()),
            },
        }

        let config = builder.build()?;
        config.source(config.closure_source)?;
        Ok(config)
    }

    /// Parse an iterator of arguments, `args` into an `ArtipContext`.
    ///
    /// # Errors
    ///
    /// Can raise:
    /// - `clap::Error` if clap cannot parse `args`
    /// - `ArtipError::CLIError` if the arguments are invalid.
    /// - `ArtipError::UnknownSource` if the detailed or closure source was not given with
    ///   `--source`
    /// - `ArtipError::IOError` if the visibilities can't be read.
    /// - `ArtipError::DryRun` if `--dry-run` was given.
    pub fn from_args<I, T>(args: I) -> Result<Self, ArtipError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        let sources = Self::parse_source_matches(&matches)?;
        let config = Self::parse_flag_matches(&matches, sources)?;
        let detailed_source = Self::parse_source_type_matches(&matches, "detailed-source")?;
        config.source(detailed_source)?;

        let vis_in: String = match matches.value_of_t("vis_in") {
            Ok(path) => path,
            _ => unreachable!("<PATH> is required, enforced by clap"),
        };
        let ms = read_visibility_csv(&vis_in)?;

        let result = Self {
            ms,
            config,
            vis_in,
            detailed_source,
            apply_flags: matches.is_present("apply-flags"),
            flag_out: matches.value_of("flag-out").map(Into::into),
        };

        info!("{}", &result);

        if matches.is_present("dry-run") {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// Flag bad baselines and antennas, then report on detailed flagging.
    ///
    /// 1. Baselines with bad phase dispersion or bad closure phases are flagged. Antennas
    ///    with at least `bad_antenna_fraction` of their baselines bad are flagged instead.
    /// 2. Detailed flagging runs on the detailed source, and its bad antennas are reported.
    /// 3. If `apply_flags`, everything detailed flagging found is flagged.
    /// 4. If `flag_out`, the flag commands are written.
    ///
    /// Returns the time taken by each stage.
    ///
    /// # Errors
    ///
    /// can raise:
    /// - `ArtipError::DataUnavailable` if a flagger could not read any (polarization, scan)
    /// - `ArtipError::IOError` if the flag commands can't be written
    pub fn run(self) -> Result<HashMap<String, Duration>, ArtipError> {
        let ArtipContext {
            mut ms,
            config,
            detailed_source,
            apply_flags,
            flag_out,
            ..
        } = self;

        // used to time large operations
        let mut durations = HashMap::<String, Duration>::new();

        let antennas = ms.antennas();

        // //////////////// //
        // Baseline flagging //
        // //////////////// //

        let rflag_bad = with_increment_duration!(
            durations,
            "rflag",
            RFlagger::new(&ms, &config).get_bad_baselines(detailed_source)?
        );
        let closure_bad = with_increment_duration!(
            durations,
            "closure",
            ClosureFlagger::new(&ms, &config).get_bad_baselines()?
        );
        let bad_baselines: BTreeSet<Baseline> = rflag_bad.union(&closure_bad).copied().collect();
        for selection in
            baseline_flag_selections(&bad_baselines, &antennas, config.bad_antenna_fraction)
        {
            info!(
                "flagging {}: antennas {:?} baselines {:?}",
                selection.reason, selection.antennas, selection.baselines
            );
            with_increment_duration!(durations, "flag", ms.flag(selection)?);
        }

        // ///////////////// //
        // Detailed flagging //
        // ///////////////// //

        let summary = with_increment_duration!(
            durations,
            "detailed",
            DetailedFlagger::new(&ms, &config).get_bad_antennas(detailed_source)?
        );

        let mut report = FlagReport::new(&antennas);
        report.record_summary(&summary);
        let scan_ids = ms.scan_ids_for(&config.source(detailed_source)?.field);
        info!("{}", report.generate_report(&scan_ids));

        if apply_flags {
            for selection in flag_selections(&summary) {
                with_increment_duration!(durations, "flag", ms.flag(selection)?);
            }
        }

        // ////// //
        // Output //
        // ////// //

        if let Some(flag_out) = flag_out {
            with_increment_duration!(durations, "write", write_flag_commands(&flag_out, &ms)?);
        }

        Ok(durations)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use num_complex::Complex;
    use tempfile::{tempdir, TempDir};

    use crate::{
        io::write_visibility_csv,
        test_common::{synthetic_ms_with, SyntheticObs},
        ArtipContext, Baseline,
    };

    /// Six antennas with zero phase, where every baseline of antenna 5 has amplitude 100.
    fn write_bad_antenna_csv() -> (TempDir, String) {
        let obs = SyntheticObs {
            num_ants: 6,
            ..SyntheticObs::default()
        };
        let ms = synthetic_ms_with(&obs, |_, _, _, baseline: Baseline| {
            let amp = if baseline.contains(5) {
                100.
            } else {
                10. + 0.1 * (baseline.ant1() + baseline.ant2()) as f64
            };
            Some(Complex::new(amp, 0.))
        });
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("vis.csv");
        write_visibility_csv(&path, ms.rows()).unwrap();
        let path = path.to_str().unwrap().to_string();
        (tmp_dir, path)
    }

    #[test]
    fn test_artip_context_display_doesnt_crash() {
        let (_tmp_dir, vis_path) = write_bad_antenna_csv();

        #[rustfmt::skip]
        let args = vec![
            "artip",
            &vis_path,
            "--source", "flux_calibration", "3C286", "0~3",
            "--source", "target", "J1331", "1~2",
            "--pols", "RR, LL",
            "--bad-antenna-fraction", "0.75",
            "--no-draw-progress",
            "--apply-flags",
        ];

        let artip_ctx = ArtipContext::from_args(&args).unwrap();

        assert_eq!(artip_ctx.config.sources.len(), 2);
        assert!(!artip_ctx.config.draw_progress);
        assert!(artip_ctx.apply_flags);
        assert_eq!(artip_ctx.flag_out, None);
        assert_eq!(artip_ctx.config.bad_antenna_fraction, 0.75);
        assert_eq!(artip_ctx.ms.rows().len(), 2 * 4 * 15 * 4);

        let display = format!("{}", &artip_ctx);
        assert!(display.contains("flux_calibration: scans 1"));
        assert!(display.contains("target: field J1331, channels 1~2"));
        assert!(display.contains("Will flag antennas with at least 75% bad baselines."));
        assert!(display.contains("Will apply detailed flags."));
        assert!(display.contains("Will not write flag commands."));
    }

    #[test]
    fn test_run_writes_flag_commands() {
        let (tmp_dir, vis_path) = write_bad_antenna_csv();
        let flag_path = tmp_dir.path().join("flags.txt");

        #[rustfmt::skip]
        let args = vec![
            "artip",
            &vis_path,
            "--source", "flux_calibration", "3C286", "0~3",
            "--no-draw-progress",
            "--apply-flags",
            "-f", flag_path.to_str().unwrap(),
        ];

        let durations = ArtipContext::from_args(&args).unwrap().run().unwrap();
        for stage in ["rflag", "closure", "detailed", "flag", "write"] {
            assert!(durations.contains_key(stage), "no duration for {}", stage);
        }

        let contents = read_to_string(&flag_path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(
            lines,
            vec![
                "mode='manual' antenna='5' scan='1' correlation='RR' reason='BAD_ANTENNA_TIME'",
                "mode='manual' antenna='0&5;1&5;2&5;3&5;4&5' scan='1' correlation='RR' reason='BAD_BASELINE_TIME'",
                "mode='manual' antenna='5' scan='1' correlation='LL' reason='BAD_ANTENNA_TIME'",
                "mode='manual' antenna='0&5;1&5;2&5;3&5;4&5' scan='1' correlation='LL' reason='BAD_BASELINE_TIME'",
            ]
        );
    }
}
