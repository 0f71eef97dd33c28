//! CLI integration tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the `iris` binary isolated from the user's config and environment
fn iris(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_iris"))
        .args(args)
        .current_dir(dir)
        .env("IRIS_CONFIG", dir.join("no-config.json"))
        .env_remove("IRIS_MODEL_PATH")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute iris")
}

fn trained(dir: &TempDir) -> PathBuf {
    let model = dir.path().join("model.bin");
    let output = iris(dir.path(), &["train", "--trees", "20", "--format", "json"]);
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(model.exists());
    model
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    let output = iris(dir.path(), &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    for command in ["train", "predict", "batch", "importance", "info"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

#[test]
fn test_train_reports_summary() {
    let dir = TempDir::new().unwrap();
    let output = iris(dir.path(), &["train", "--trees", "20", "--seed", "7", "--format", "json"]);
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["n_samples"], 150);
    assert_eq!(summary["n_estimators"], 20);
    assert_eq!(summary["seed"], 7);
    assert!(summary["training_accuracy"].as_f64().unwrap() > 0.9);
    assert!(summary["version"].as_str().unwrap().starts_with("rf-"));
}

#[test]
fn test_same_seed_gives_same_version() {
    let dir = TempDir::new().unwrap();
    let run = |name: &str| {
        let output = iris(
            dir.path(),
            &["train", "--trees", "10", "--output", name, "--format", "json"],
        );
        assert!(output.status.success());
        let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        summary["version"].as_str().unwrap().to_string()
    };
    assert_eq!(run("a.bin"), run("b.bin"));
}

#[test]
fn test_predict_setosa_json() {
    let dir = TempDir::new().unwrap();
    trained(&dir);

    let output = iris(dir.path(), &["predict", "5.4", "3.4", "1.3", "0.2", "--format", "json"]);
    assert!(output.status.success());

    let prediction: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(prediction["species"], "Setosa");
    let probabilities = prediction["probabilities"].as_array().unwrap();
    assert_eq!(probabilities.len(), 3);
}

#[test]
fn test_predict_table_and_export() {
    let dir = TempDir::new().unwrap();
    trained(&dir);

    let output = iris(
        dir.path(),
        &["predict", "5.4", "3.4", "1.3", "0.2", "--export", "out.csv"],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Setosa"));

    let csv = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
    assert!(csv.starts_with("Sepal Length,Sepal Width,Petal Length,Petal Width,Predicted Species"));
    assert!(csv.contains("Setosa"));
}

#[test]
fn test_predict_three_values_fails() {
    let dir = TempDir::new().unwrap();
    trained(&dir);

    let output = iris(dir.path(), &["predict", "5.4", "3.4", "1.3"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("expected 4 features"));
}

#[test]
fn test_predict_without_model_suggests_training() {
    let dir = TempDir::new().unwrap();
    let output = iris(dir.path(), &["predict", "5.4", "3.4", "1.3", "0.2"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("iris train"));
}

#[test]
fn test_corrupt_model_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("model.bin"), b"definitely not a model").unwrap();

    let output = iris(dir.path(), &["info"]);
    assert!(!output.status.success());
}

#[test]
fn test_batch_writes_csv() {
    let dir = TempDir::new().unwrap();
    trained(&dir);
    std::fs::write(
        dir.path().join("in.csv"),
        "sepal_length,sepal_width,petal_length,petal_width\n5.4,3.4,1.3,0.2\n7.7,3.0,6.1,2.3\n",
    )
    .unwrap();

    let output = iris(dir.path(), &["batch", "--input", "in.csv", "--output", "out.csv"]);
    assert!(output.status.success());

    let csv = std::fs::read_to_string(dir.path().join("out.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("Predicted Species,P(Setosa),P(Versicolor),P(Virginica)"));
    assert!(lines[1].contains(",Setosa,"));
    assert!(lines[2].contains(",Virginica,"));
}

#[test]
fn test_batch_bad_row_fails_whole_file() {
    let dir = TempDir::new().unwrap();
    trained(&dir);
    std::fs::write(
        dir.path().join("in.csv"),
        "a,b,c,d\n5.4,3.4,1.3,0.2\n6.0,oops,5.1,1.6\n",
    )
    .unwrap();

    let output = iris(dir.path(), &["batch", "--input", "in.csv", "--output", "out.csv"]);
    assert!(!output.status.success());
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn test_importance_and_info_json() {
    let dir = TempDir::new().unwrap();
    let model = trained(&dir);
    let model = model.to_str().unwrap();

    let output = iris(dir.path(), &["importance", "--format", "json", "--model", model]);
    assert!(output.status.success());
    let weights: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(weights.len(), 4);
    let total: f64 = weights.iter().map(|w| w["importance"].as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-6);

    let output = iris(dir.path(), &["info", "--format", "json", "--model", model]);
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["n_samples"], 150);
    assert_eq!(info["config"]["n_estimators"], 20);
}
