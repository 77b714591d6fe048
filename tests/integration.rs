use std::{fs::read_to_string, path::Path};

use artip::{
    io::write_visibility_csv, measurement_set::VisRow, ArtipContext, Baseline, Complex,
    Polarization,
};
use tempfile::tempdir;

const NUM_TIMES: usize = 6;

/// Every cross baseline of `num_ants` antennas, observing 3C286 in scans 1 and 2 at
/// channels 0 and 1, both polarizations.
fn write_observation<P, F>(path: P, num_ants: usize, vis: F)
where
    P: AsRef<Path>,
    F: Fn(usize, Baseline) -> Complex<f64>,
{
    let mut rows = vec![];
    for (scan_pos, scan_id) in [1, 2].into_iter().enumerate() {
        for time_idx in 0..NUM_TIMES {
            for ant1 in 0..num_ants {
                for ant2 in (ant1 + 1)..num_ants {
                    let baseline = Baseline::new(ant1, ant2);
                    for polarization in [Polarization::RR, Polarization::LL] {
                        for channel in 0..2 {
                            rows.push(VisRow {
                                scan_id,
                                field: "3C286".into(),
                                time: 1000. * scan_pos as f64 + 10. * time_idx as f64,
                                baseline,
                                polarization,
                                channel,
                                vis: vis(time_idx, baseline),
                                flagged: false,
                            });
                        }
                    }
                }
            }
        }
    }
    write_visibility_csv(path, &rows).unwrap();
}

fn run_artip(vis_path: &Path, flag_path: &Path, extra_args: &[&str]) -> Vec<String> {
    #[rustfmt::skip]
    let mut args = vec![
        "artip",
        vis_path.to_str().unwrap(),
        "--source", "flux_calibration", "3C286", "0~1",
        "--no-draw-progress",
        "--flag-out", flag_path.to_str().unwrap(),
    ];
    args.extend_from_slice(extra_args);

    let artip_ctx = ArtipContext::from_args(&args).unwrap();
    artip_ctx.run().unwrap();

    read_to_string(flag_path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect()
}

#[test]
fn test_closure_phase_finds_bad_baseline() {
    let tmp_dir = tempdir().unwrap();
    let vis_path = tmp_dir.path().join("vis.csv");
    let flag_path = tmp_dir.path().join("flags.txt");

    // a small phase jitter everywhere, and a constant 1 rad offset on baseline 0&1
    write_observation(&vis_path, 7, |time_idx, baseline| {
        let jitter = if time_idx % 2 == 0 { 0.01 } else { -0.01 };
        let offset = if baseline == Baseline::new(0, 1) { 1. } else { 0. };
        Complex::from_polar(5., jitter + offset)
    });

    let commands = run_artip(&vis_path, &flag_path, &[]);
    assert_eq!(
        commands,
        vec!["mode='manual' antenna='0&1' reason='BAD_BASELINE'".to_string()]
    );
}

#[test]
fn test_detailed_flagging_finds_bad_antenna() {
    let tmp_dir = tempdir().unwrap();
    let vis_path = tmp_dir.path().join("vis.csv");
    let flag_path = tmp_dir.path().join("flags.txt");

    // every baseline of antenna 5 is far brighter than the rest
    write_observation(&vis_path, 6, |_, baseline| {
        let amp = if baseline.contains(5) {
            100.
        } else {
            10. + 0.1 * (baseline.ant1() + baseline.ant2()) as f64
        };
        Complex::new(amp, 0.)
    });

    // without --apply-flags, the report is only logged
    let commands = run_artip(&vis_path, &flag_path, &[]);
    assert!(commands.is_empty());

    let commands = run_artip(&vis_path, &flag_path, &["--apply-flags", "--pols", "RR"]);
    assert_eq!(
        commands,
        vec![
            "mode='manual' antenna='5' scan='1' correlation='RR' reason='BAD_ANTENNA_TIME'",
            "mode='manual' antenna='0&5;1&5;2&5;3&5;4&5' scan='1' correlation='RR' reason='BAD_BASELINE_TIME'",
            "mode='manual' antenna='5' scan='2' correlation='RR' reason='BAD_ANTENNA_TIME'",
            "mode='manual' antenna='0&5;1&5;2&5;3&5;4&5' scan='2' correlation='RR' reason='BAD_BASELINE_TIME'",
        ]
    );
}

#[test]
fn test_uniform_observation_has_no_flags() {
    let tmp_dir = tempdir().unwrap();
    let vis_path = tmp_dir.path().join("vis.csv");
    let flag_path = tmp_dir.path().join("flags.txt");

    write_observation(&vis_path, 5, |_, _| Complex::new(3., 0.));

    let commands = run_artip(&vis_path, &flag_path, &["--apply-flags"]);
    assert!(commands.is_empty());
}
