use rmp_serde::{decode, encode};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Output},
};

#[derive(Deserialize)]
struct Comparison {
    label: String,
    groups: [usize; 2],
    ci_a: (f64, f64),
    ci_b: (f64, f64),
    p_value: f64,
}

#[derive(Deserialize)]
struct SigRange {
    start: f64,
    end: f64,
}

#[derive(Deserialize)]
struct Report {
    timings: Vec<f64>,
    comparisons: Vec<Comparison>,
    significance_map: Vec<u8>,
    group_ranges: Vec<SigRange>,
    baseline_ranges: Vec<Vec<SigRange>>,
    skipped: Vec<String>,
}

fn run_bin(args: &[&str]) -> Output {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_photocomp"));

    Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command")
}

fn assert_success(args: &[&str]) {
    let output = run_bin(args);

    let stdout_str =
        std::str::from_utf8(&output.stdout).expect("failed to convert stdout to string");
    let stderr_str =
        std::str::from_utf8(&output.stderr).expect("failed to convert stderr to string");

    assert!(
        output.status.success(),
        "failed to run binary with {args:?}\nstdout:\n{stdout_str}\nstderr:\n{stderr_str}\n"
    );
}

fn write_msgpack<T: serde::Serialize>(file: &Path, val: &T) {
    let mut file = fs::File::create(file).expect("failed to create data file");
    encode::write(&mut file, val).expect("failed to write data file");
}

/// Group of 20 time points where rows 10..20 are offset by `shift`.
fn group(n_channels: usize, shift: f64) -> Vec<Vec<f64>> {
    (0..20)
        .map(|i_row| {
            (0..n_channels)
                .map(|i_ch| {
                    let noise = ((i_row * 13 + i_ch * 7) % 10) as f64 * 0.01;
                    if i_row >= 10 { noise + shift } else { noise }
                })
                .collect()
        })
        .collect()
}

fn setup_data_dir(name: &str, config_contents: &str) -> PathBuf {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir(&test_dir).expect("failed to create test directory");

    fs::write(test_dir.join("config.toml"), config_contents).expect("failed to write config file");

    let timings: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    write_msgpack(&test_dir.join("timings.msgpack"), &timings);

    write_msgpack(&test_dir.join("group-0.msgpack"), &group(6, 0.0));
    write_msgpack(&test_dir.join("group-1.msgpack"), &group(6, 5.0));

    let mut missing = group(6, 0.0);
    for row in &mut missing[10..] {
        row.fill(f64::NAN);
    }
    write_msgpack(&test_dir.join("group-2.msgpack"), &missing);

    test_dir
}

#[test]
fn basic_workflow() {
    let config_contents = String::new()
        + "[periods]\n"
        + "baseline = [0, 9]\n"
        + "comparison = [10, 19]\n"
        + "\n"
        + "[resampling]\n"
        + "n_resamples = 1000\n"
        + "n_permutations = 1000\n"
        + "perm_seed = 5\n";

    let test_dir = setup_data_dir("basic_workflow", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    assert_success(&["--data-dir", test_dir_str, "inspect"]);
    assert_success(&["--data-dir", test_dir_str, "analyze"]);

    let results_file = test_dir.join("results.msgpack");
    let reader = fs::File::open(&results_file).expect("failed to open results file");
    let report: Report = decode::from_read(reader).expect("failed to read results file");

    assert_eq!(report.timings.len(), 20);

    assert_eq!(report.comparisons.len(), 1);
    let comparison = &report.comparisons[0];
    assert_eq!(comparison.label, "Group 1 vs Group 2");
    assert_eq!(comparison.groups, [0, 1]);
    assert!(comparison.p_value < 0.05);
    assert!(comparison.ci_a.0 <= comparison.ci_a.1);
    assert!(comparison.ci_b.0 > 4.0 && comparison.ci_b.1 < 6.0);

    assert_eq!(
        report.skipped,
        vec!["Group 1 vs Group 3", "Group 2 vs Group 3"]
    );

    assert_eq!(report.significance_map[..10], [0; 10]);
    assert_eq!(report.significance_map[10..], [1; 10]);
    assert_eq!(report.group_ranges.len(), 1);
    assert_eq!(report.group_ranges[0].start, 110.0);
    assert_eq!(report.group_ranges[0].end, 119.0);

    assert_eq!(report.baseline_ranges.len(), 3);
    assert!(report.baseline_ranges[0].is_empty());
    assert_eq!(report.baseline_ranges[1].len(), 1);
    assert!(report.baseline_ranges[2].is_empty());

    assert_success(&["--data-dir", test_dir_str, "clean"]);
    assert!(!results_file.exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_period_fails() {
    let config_contents = String::new()
        + "[periods]\n"
        + "baseline = [0, 9]\n"
        + "comparison = [10, 20]\n";

    let test_dir = setup_data_dir("invalid_period_fails", &config_contents);
    let test_dir_str = test_dir
        .to_str()
        .expect("failed to convert test directory to string");

    let output = run_bin(&["--data-dir", test_dir_str, "analyze"]);
    assert!(!output.status.success());
    assert!(!test_dir.join("results.msgpack").exists());

    fs::remove_dir_all(&test_dir).ok();
}
