use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn dirwatch() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dirwatch"))
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = dirwatch()
        .current_dir(temp_path)
        .arg("init")
        .output()
        .expect("Failed to run init command");

    assert!(output.status.success());

    let config_path = temp_path.join(".dirwatch/settings.toml");
    assert!(config_path.exists());

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[watch]"));
    assert!(content.contains("ignore_vanished = true"));

    // Second init without --force fails
    let output = dirwatch()
        .current_dir(temp_path)
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(!output.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_dir = temp_path.join(".dirwatch");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("settings.toml"),
        "version = 2\n[watch]\ntrack_table = false\n",
    )
    .unwrap();

    let output = dirwatch()
        .current_dir(temp_path)
        .arg("config")
        .output()
        .expect("Failed to run config command");

    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("track_table = false"));
}

#[test]
fn test_register_json_summary() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("a");
    fs::create_dir_all(root.join("b")).unwrap();
    fs::create_dir_all(root.join("c")).unwrap();
    fs::write(root.join("b").join("file.txt"), "x").unwrap();

    let output = dirwatch()
        .current_dir(temp_dir.path())
        .args(["register", "a", "--json"])
        .output()
        .expect("Failed to run register command");

    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["registered"].as_array().unwrap().len(), 3);
    assert!(report["summary"]["skipped"].as_array().unwrap().is_empty());
    assert_eq!(report["table"]["entries"].as_object().unwrap().len(), 3);
}

#[test]
fn test_register_missing_path() {
    let temp_dir = TempDir::new().unwrap();

    let lenient = dirwatch()
        .current_dir(temp_dir.path())
        .args(["register", "missing", "--no-table"])
        .output()
        .expect("Failed to run register command");
    assert!(lenient.status.success());
    let stdout = String::from_utf8(lenient.stdout).unwrap();
    assert!(stdout.contains("Registered 0 directories"));
    assert!(stdout.contains("Skipped 1 vanished path(s)"));
    assert!(!stdout.contains("Table:"));

    let strict = dirwatch()
        .current_dir(temp_dir.path())
        .args(["register", "missing", "--strict"])
        .output()
        .expect("Failed to run register command");
    assert!(!strict.status.success());
    let stderr = String::from_utf8(strict.stderr).unwrap();
    assert!(stderr.contains("Registration failed"));
}
