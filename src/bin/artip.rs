use artip::{
    cli::ArtipContext,
    ArtipError::{ClapError, DryRun},
};
use clap::ErrorKind::{DisplayHelp, DisplayVersion};
use itertools::Itertools;
use log::{info, trace};
use std::{env, ffi::OsString, fmt::Debug, time::Duration};

fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    I: Debug,
{
    let artip_ctx = match ArtipContext::from_args(args) {
        Ok(artip_ctx) => artip_ctx,
        Err(DryRun {}) => {
            info!("Dry run. No flags will be written.");
            return 0;
        }
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match artip_ctx.run() {
        Ok(durations) => {
            info!(
                "total duration: {:?}",
                durations.into_iter().sorted().fold(
                    Duration::ZERO,
                    |duration_sum, (name, duration)| {
                        info!("{} duration: {:?}", name, duration);
                        duration_sum + duration
                    }
                )
            );
            0
        }
        Err(e) => {
            eprintln!("flagging error: {e}");
            1
        }
    }
}

fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    trace!("start main");
    let retcode = main_with_args(env::args());
    trace!("end main");
    std::process::exit(retcode);
}

#[cfg(test)]
mod tests {
    use artip::{
        io::write_visibility_csv,
        measurement_set::VisRow,
        Baseline, Complex, Polarization,
    };
    use tempfile::{tempdir, TempDir};

    use super::main_with_args;

    /// Four antennas observing 3C286 in scan 1, every visibility 10 + 0i.
    fn write_uniform_csv() -> (TempDir, String) {
        let mut rows = vec![];
        for (ant1, ant2) in [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)] {
            for (time_idx, polarization) in
                (0..3).flat_map(|t| [(t, Polarization::RR), (t, Polarization::LL)])
            {
                rows.push(VisRow {
                    scan_id: 1,
                    field: "3C286".into(),
                    time: 10. * time_idx as f64,
                    baseline: Baseline::new(ant1, ant2),
                    polarization,
                    channel: 0,
                    vis: Complex::new(10., 0.),
                    flagged: false,
                });
            }
        }
        let tmp_dir = tempdir().unwrap();
        let path = tmp_dir.path().join("vis.csv");
        write_visibility_csv(&path, &rows).unwrap();
        let path = path.to_str().unwrap().to_string();
        (tmp_dir, path)
    }

    #[test]
    fn main_with_version_succeeds() {
        assert_eq!(main_with_args(["artip", "--version"]), 0);
    }

    #[test]
    fn main_with_help_succeeds() {
        assert_eq!(main_with_args(["artip", "--help"]), 0);
    }

    #[test]
    fn main_with_dry_run_doesnt_crash() {
        let (_tmp_dir, vis_path) = write_uniform_csv();

        #[rustfmt::skip]
        assert_eq!(
            main_with_args([
                "artip",
                &vis_path,
                "--source", "flux_calibration", "3C286", "0~0",
                "--dry-run",
            ]),
            0
        );
    }

    #[test]
    fn main_with_bad_arg_returns_1() {
        let (_tmp_dir, vis_path) = write_uniform_csv();

        #[rustfmt::skip]
        assert_ne!(
            main_with_args([
                "artip",
                &vis_path,
                "--source", "flux_calibration", "3C286", "0~0",
                "--bad-antenna-fraction", "0",
            ]),
            0
        );
    }

    #[test]
    fn main_with_missing_data_returns_1() {
        let (_tmp_dir, vis_path) = write_uniform_csv();

        // there are no XX visibilities
        #[rustfmt::skip]
        assert_eq!(
            main_with_args([
                "artip",
                &vis_path,
                "--source", "flux_calibration", "3C286", "0~0",
                "--pols", "XX",
                "--no-draw-progress",
            ]),
            1
        );
    }

    #[test]
    fn main_succesful_writes_flag_commands() {
        let (tmp_dir, vis_path) = write_uniform_csv();
        let flag_path = tmp_dir.path().join("flags.txt");

        #[rustfmt::skip]
        assert_eq!(
            main_with_args([
                "artip",
                &vis_path,
                "--source", "flux_calibration", "3C286", "0~0",
                "--no-draw-progress",
                "--apply-flags",
                "--flag-out", flag_path.to_str().unwrap(),
            ]),
            0
        );

        // nothing stands out in uniform data
        assert!(flag_path.exists());
        assert_eq!(flag_path.metadata().unwrap().len(), 0);
    }
}
