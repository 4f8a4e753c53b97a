use std::process::{Command, Output};
use tempfile::TempDir;

fn chip(config_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_chip"))
        .args(args)
        .arg("--config-dir")
        .arg(config_dir.path())
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_BASE_URL")
        .env_remove("CHIP__PROVIDER__API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run chip")
}

#[test]
fn test_init_writes_default_config() {
    let dir = TempDir::new().unwrap();

    let output = chip(&dir, &["init"]);
    assert!(output.status.success());

    let written = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    assert!(written.contains("gpt-4.1-mini"));
    assert!(written.contains("You are a friendly chatbot named Chip."));

    // A second run leaves the file alone.
    std::fs::write(dir.path().join("config.json"), r#"{"assistant":{"name":"Echo"}}"#).unwrap();
    let output = chip(&dir, &["init"]);
    assert!(output.status.success());
    let kept = std::fs::read_to_string(dir.path().join("config.json")).unwrap();
    assert!(kept.contains("Echo"));
}

#[test]
fn test_status_masks_api_key() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"provider":{"api_key":"sk-test-abcd1234"},"assistant":{"model":"gpt-4o-mini"}}"#,
    )
    .unwrap();

    let output = chip(&dir, &["status"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gpt-4o-mini"));
    assert!(stdout.contains("1234"));
    assert!(!stdout.contains("sk-test-abcd1234"));
}

#[test]
fn test_chat_without_api_key_fails_cleanly() {
    let dir = TempDir::new().unwrap();

    let output = chip(&dir, &["chat", "--message", "hi"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("authentication"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.json"),
        r#"{"assistant":{"temperature":3.5}}"#,
    )
    .unwrap();

    let output = chip(&dir, &["status"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("assistant.temperature"), "stderr: {}", stderr);
}
