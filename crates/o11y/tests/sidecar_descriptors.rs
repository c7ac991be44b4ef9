//! Parent-side descriptor ownership after a sidecar launch.
//!
//! Kept in its own test binary: a concurrent test opening files could reuse
//! the closed descriptor numbers and make the check meaningless.

#![cfg(target_os = "linux")]

use std::path::Path;

use o11y::SidecarLauncher;

fn is_open(fd: i32) -> bool {
    Path::new(&format!("/proc/self/fd/{fd}")).exists()
}

#[test]
fn parent_closes_duplicates_after_handshake() {
    let mut handoff = SidecarLauncher::new("/bin/sh")
        .arg("-c")
        .arg("read line")
        .launch()
        .unwrap();

    let (stdout_fd, stderr_fd) = handoff.fds();
    assert!(!is_open(stdout_fd), "parent still holds fd {stdout_fd}");
    assert!(!is_open(stderr_fd), "parent still holds fd {stderr_fd}");

    assert!(handoff.wait().unwrap().success());
}
