use std::fs;
use std::process::Command;

use tempfile::tempdir;

fn write_emr(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("emr.tsv");
    let mut data = String::from("eye_id\tbaseline_va\tone_year_va\n");
    for i in 0..60 {
        data.push_str(&format!("eye{i}\t{}\t{}\n", 15 + i, 20 + i));
    }
    fs::write(&path, data).expect("write EMR data");
    path
}

#[test]
fn run_writes_both_tables() {
    let tmp = tempdir().expect("temporary directory");
    let emr_path = write_emr(tmp.path());
    let scenarios_path = tmp.path().join("scenarios.toml");
    fs::write(
        &scenarios_path,
        "[[scenario]]\nname = \"four_months\"\nn_eyes = 50\nnumber_simulations = 8\n\n\
         [[scenario]]\nname = \"no_delay\"\nn_eyes = 50\nnumber_simulations = 8\ndelay = false\n",
    )
    .expect("write scenarios");

    let exe = env!("CARGO_BIN_EXE_vadelay");
    let status = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "run",
            emr_path.to_str().expect("path str"),
            "--scenarios",
            scenarios_path.to_str().expect("path str"),
            "--out-dir",
            "out",
        ])
        .status()
        .expect("run vadelay cli");

    assert!(status.success(), "CLI exited with status {status:?}");
    let iterations = fs::read_to_string(tmp.path().join("out/iterations.tsv")).expect("iterations");
    assert_eq!(iterations.lines().count(), 17);
    let summary = fs::read_to_string(tmp.path().join("out/summary.tsv")).expect("summary");
    assert_eq!(summary.lines().count(), 3);
    assert!(summary.contains("four_months"));
    assert!(summary.contains("no_delay"));
}

#[test]
fn simulate_rejects_unknown_loss_mode() {
    let tmp = tempdir().expect("temporary directory");
    let emr_path = write_emr(tmp.path());

    let exe = env!("CARGO_BIN_EXE_vadelay");
    let output = Command::new(exe)
        .current_dir(tmp.path())
        .args([
            "simulate",
            emr_path.to_str().expect("path str"),
            "--loss",
            "gamma",
            "--number-simulations",
            "2",
        ])
        .output()
        .expect("run vadelay cli");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "stderr was: {stderr}");
    assert!(!tmp.path().join("iterations.tsv").exists());
}
