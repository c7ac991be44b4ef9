//! Sidecar launch tests using `/bin/sh` as a stand-in agent.

#![cfg(unix)]

use std::fs;

use o11y::sidecar::{launch, parse_handshake};
use o11y::{ClientConfig, O11yError, SidecarLauncher};
use regex::Regex;

const SHELL: &str = "/bin/sh";

/// A sidecar that copies its handshake line into `$1`.
fn recording_sidecar(script: &str, output: &std::path::Path) -> SidecarLauncher {
    SidecarLauncher::new(SHELL)
        .arg("-c")
        .arg(script)
        .arg("sidecar")
        .arg(output)
}

#[test]
fn launch_sends_handshake_line() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("handshake");

    let mut handoff = recording_sidecar(r#"IFS= read -r line; printf '%s\n' "$line" > "$1""#, &output)
        .launch()
        .unwrap();
    assert!(handoff.wait().unwrap().success());

    let line = fs::read_to_string(&output).unwrap();
    let pattern = Regex::new(r"^\d+ \d+\n$").unwrap();
    assert!(pattern.is_match(&line), "unexpected handshake {line:?}");
    assert_eq!(parse_handshake(&line), Some(handoff.fds()));

    let (stdout_fd, stderr_fd) = handoff.fds();
    assert_ne!(stdout_fd, stderr_fd);
    assert!(stdout_fd > 2 && stderr_fd > 2);
}

#[cfg(target_os = "linux")]
#[test]
fn handshake_descriptors_are_open_in_child() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("fds");
    let script = r#"read out err
for fd in "$out" "$err"; do
  if [ -e "/proc/$$/fd/$fd" ]; then echo open; else echo closed; fi
done > "$1""#;

    let mut handoff = recording_sidecar(script, &output).launch().unwrap();
    assert!(handoff.wait().unwrap().success());

    assert_eq!(fs::read_to_string(&output).unwrap(), "open\nopen\n");
}

#[test]
fn env_is_passed_to_child() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("env");

    let mut handoff = recording_sidecar(r#"read line; printf '%s' "$AGENT_MODE" > "$1""#, &output)
        .env("AGENT_MODE", "capture")
        .launch()
        .unwrap();
    assert!(handoff.wait().unwrap().success());

    assert_eq!(fs::read_to_string(&output).unwrap(), "capture");
}

#[test]
fn missing_binary_is_a_launch_error() {
    let err = launch("/nonexistent/o11y-agent").unwrap_err();

    assert!(matches!(err, O11yError::Launch { .. }));
    assert!(!err.is_recoverable());
    assert!(err.to_string().contains("/nonexistent/o11y-agent"));
}

#[test]
fn launcher_from_config() {
    let config = ClientConfig::builder().sidecar_path(SHELL).build();
    let launcher = SidecarLauncher::from_settings(&config.sidecar).unwrap();
    assert_eq!(launcher.binary(), std::path::Path::new(SHELL));

    let mut handoff = launcher.arg("-c").arg("read line").launch().unwrap();
    assert!(handoff.id() > 0);
    assert!(handoff.wait().unwrap().success());
}
