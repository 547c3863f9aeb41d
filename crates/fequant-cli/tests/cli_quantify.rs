use fequant_core::fitting::{Profile, arctan_step};
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn fe_quant(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fe-quant"))
        .args(args)
        .output()
        .expect("fe-quant should run")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn synthetic_line() -> (Vec<f64>, Vec<f64>) {
    let energy: Vec<f64> = (0..551).map(|index| 680.0 + 0.1 * index as f64).collect();
    let data = energy
        .iter()
        .map(|x| {
            let background = 5.0 - 0.02 * (x - 680.0) + 1.0e-4 * (x - 680.0).powi(2);
            let l3_step = arctan_step(*x, 0.02, 708.35, 685.0);
            let l2_step = arctan_step(*x, 0.015, 722.45, 685.0);
            let steps = l3_step + l2_step;
            let peaks = Profile::Lorentzian.evaluate(*x, &[0.3, 708.5, 0.5])
                + Profile::Lorentzian.evaluate(*x, &[0.5, 710.0, 0.4])
                + Profile::Lorentzian.evaluate(*x, &[0.2, 721.0, 0.6]);
            background + steps + peaks
        })
        .collect();
    (energy, data)
}

fn write_spectrum(path: &Path, pixels: usize) {
    let (energy, line) = synthetic_line();
    let (navigation, data) = if pixels == 1 {
        (json!([]), line)
    } else {
        let data: Vec<f64> = std::iter::repeat_n(line, pixels).flatten().collect();
        (json!([pixels]), data)
    };
    let document = json!({ "energy": energy, "navigation": navigation, "data": data });
    write_file(path, &document.to_string());
}

fn read_report(path: &Path) -> Value {
    let content = fs::read_to_string(path).expect("report should exist");
    serde_json::from_str(&content).expect("report should be valid JSON")
}

#[test]
fn quantify_writes_integration_report_for_line_scan() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("spectrum.json");
    let report_path = temp.path().join("out/report.json");
    write_spectrum(&input, 2);

    let output = fe_quant(&[
        "quantify",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--output",
        report_path.to_str().expect("utf-8 path"),
        "--method",
        "Integration",
    ]);
    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = read_report(&report_path);
    assert_eq!(report["method"], "Integration");
    assert_eq!(report["navigation"], json!([2]));
    assert_eq!(report["pre_quant"], true);
    assert_eq!(report["quantification"]["second_edge"], "measured");
    let q1 = report["quantification"]["q1"].as_array().expect("q1 array");
    assert_eq!(q1.len(), 2);
    assert_eq!(q1[0], q1[1]);
    let heights = report["edge_step"]["height_1"].as_array().expect("heights");
    assert_eq!(heights.len(), 2);
    assert!(report.get("alignment").is_none());
}

#[test]
fn flags_override_configuration_file() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("spectrum.json");
    let config = temp.path().join("quant.json");
    let report_path = temp.path().join("report.json");
    write_spectrum(&input, 1);
    let document = r#"{ "method": "Voigt_fitting", "pre_quant": true }"#;
    write_file(&config, document);

    let output = fe_quant(&[
        "quantify",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--output",
        report_path.to_str().expect("utf-8 path"),
        "--config",
        config.to_str().expect("utf-8 path"),
        "--method",
        "Integration",
        "--no-pre-quant",
    ]);
    assert_eq!(output.status.code(), Some(0));

    let report = read_report(&report_path);
    assert_eq!(report["method"], "Integration");
    assert_eq!(report["pre_quant"], false);
    assert_eq!(report["navigation"], json!([]));
    assert!(report.get("edge_step").is_none());
    assert!(report["quantification"]["q2"].is_array());
}

#[test]
fn mask_shape_mismatch_is_input_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("spectrum.json");
    let mask = temp.path().join("mask.json");
    let report_path = temp.path().join("report.json");
    write_spectrum(&input, 2);
    let document = r#"{ "navigation": [3], "mask": [false, true, false] }"#;
    write_file(&mask, document);

    let output = fe_quant(&[
        "quantify",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--output",
        report_path.to_str().expect("utf-8 path"),
        "--mask",
        mask.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("INPUT.MASK_SHAPE"), "stderr: {stderr}");
    assert!(!report_path.exists());
}

#[test]
fn missing_input_is_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let report_path = temp.path().join("report.json");
    let missing = temp.path().join("missing.json");

    let output = fe_quant(&[
        "quantify",
        "--input",
        missing.to_str().expect("utf-8 path"),
        "--output",
        report_path.to_str().expect("utf-8 path"),
    ]);
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("IO.INPUT_READ"));
}

#[test]
fn signal_range_needs_two_values() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("spectrum.json");
    write_spectrum(&input, 1);

    let output = fe_quant(&[
        "quantify",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--output",
        "report.json",
        "--signal-range",
        "690,695,700",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.CLI_USAGE"));

    let output = fe_quant(&[
        "quantify",
        "--input",
        input.to_str().expect("utf-8 path"),
        "--output",
        "report.json",
        "--signal-range",
        "703,690",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.SIGNAL_RANGE"));
}

#[test]
fn check_config_prints_defaults_or_rejects_input() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = temp.path().join("quant.json");
    let config_path = config.to_str().expect("utf-8 path");

    let document = r#"{ "method": "Integration", "auto_shift": true }"#;
    write_file(&config, document);
    let output = fe_quant(&["check-config", "--config", config_path]);
    assert_eq!(output.status.code(), Some(0));
    let printed: Value =
        serde_json::from_slice(&output.stdout).expect("check-config should print JSON");
    assert_eq!(printed["method"], "Integration");
    assert_eq!(printed["auto_shift"], true);
    assert_eq!(printed["signal_range"], json!([690.0, 703.0]));
    assert_eq!(printed["background_type"], "Polynomial");

    write_file(&config, r#"{ "method": "Gaussian_fitting" }"#);
    let output = fe_quant(&["check-config", "--config", config_path]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.CONFIG"));
}

#[test]
fn unknown_method_flag_is_usage_error() {
    let output = fe_quant(&[
        "quantify",
        "--input",
        "spectrum.json",
        "--output",
        "report.json",
        "--method",
        "Gaussian_fitting",
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("INPUT.CLI_USAGE"));
}
