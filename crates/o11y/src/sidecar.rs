//! Output-capture sidecar launch.
//!
//! The sidecar is an auxiliary process that captures and forwards the parent's
//! standard output and error. At launch the parent duplicates its own
//! stdout/stderr, lets the child inherit the duplicates, and tells the child
//! which descriptor numbers they are with a single line on its stdin:
//!
//! ```text
//! "{stdout_fd} {stderr_fd}\n"
//! ```
//!
//! The child opens those descriptors as its output destinations and keeps its
//! own stdout/stderr private for whatever it intercepts.
//!
//! Descriptor ownership: the parent closes its duplicates as soon as the
//! handshake line is written (or the launch fails). From then on the child is
//! solely responsible for them.

use std::ffi::OsString;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};

use nix::unistd::{close, dup};
use tracing::{debug, info, warn};

use crate::config::SidecarSettings;
use crate::error::{ConfigError, O11yError, O11yResult};

/// Launch `binary_path` with default settings.
///
/// See [`SidecarLauncher::launch`] for when to call it.
pub fn launch(binary_path: impl Into<PathBuf>) -> O11yResult<SidecarHandoff> {
    SidecarLauncher::new(binary_path).launch()
}

/// Format the handshake line for a pair of descriptors.
pub fn handshake_line(stdout_fd: RawFd, stderr_fd: RawFd) -> String {
    format!("{stdout_fd} {stderr_fd}\n")
}

/// Parse a handshake line as received on the sidecar's stdin.
pub fn parse_handshake(line: &str) -> Option<(RawFd, RawFd)> {
    let mut parts = line.trim_end_matches(['\r', '\n']).split(' ');
    let stdout_fd = parts.next()?.parse().ok()?;
    let stderr_fd = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((stdout_fd, stderr_fd))
}

/// Builder for a sidecar launch.
#[derive(Debug, Clone)]
pub struct SidecarLauncher {
    binary: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    inherit_stdio: bool,
}

impl SidecarLauncher {
    /// Launch `binary` with no arguments.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            envs: Vec::new(),
            inherit_stdio: false,
        }
    }

    /// Build a launcher from configuration.
    pub fn from_settings(settings: &SidecarSettings) -> O11yResult<Self> {
        let binary = settings.binary_path.clone().ok_or_else(|| {
            ConfigError::invalid_value("sidecar.binary_path", "no sidecar binary configured")
        })?;
        Ok(Self::new(binary).inherit_stdio(settings.inherit_stdio))
    }

    /// Append an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Wire the child's own stdout/stderr to ours instead of `/dev/null`.
    #[must_use]
    pub fn inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    /// The binary to launch.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Spawn the sidecar and perform the handshake.
    ///
    /// Returns as soon as the handshake line is flushed; the child is not
    /// monitored afterwards.
    ///
    /// The duplicated descriptors are inheritable until this returns, so any
    /// process another thread spawns meanwhile inherits them too. Call it at
    /// startup, before other threads start spawning processes.
    pub fn launch(&self) -> O11yResult<SidecarHandoff> {
        let streams = DuplicatedStreams::new().map_err(|e| self.launch_error(e))?;
        let (stdout_fd, stderr_fd) = (streams.stdout, streams.stderr);

        let mut command = Command::new(&self.binary);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped());
        if !self.inherit_stdio {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let mut child = command.spawn().map_err(|e| self.launch_error(e))?;
        let stdin = match handshake(&mut child, stdout_fd, stderr_fd) {
            Ok(stdin) => stdin,
            Err(e) => {
                warn!(binary = %self.binary.display(), error = %e, "sidecar handshake failed");
                // Best effort: the child is useless without its descriptors.
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.launch_error(e));
            }
        };
        drop(streams);

        info!(
            binary = %self.binary.display(),
            pid = child.id(),
            stdout_fd,
            stderr_fd,
            "sidecar launched"
        );

        Ok(SidecarHandoff {
            child,
            stdin: Some(stdin),
            stdout_fd,
            stderr_fd,
        })
    }

    fn launch_error(&self, source: io::Error) -> O11yError {
        O11yError::launch(&self.binary, source)
    }
}

fn handshake(child: &mut Child, stdout_fd: RawFd, stderr_fd: RawFd) -> io::Result<ChildStdin> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "child stdin unavailable"))?;
    stdin.write_all(handshake_line(stdout_fd, stderr_fd).as_bytes())?;
    stdin.flush()?;
    Ok(stdin)
}

/// Inheritable duplicates of our stdout/stderr, closed on drop.
struct DuplicatedStreams {
    stdout: RawFd,
    stderr: RawFd,
}

impl DuplicatedStreams {
    fn new() -> io::Result<Self> {
        let stdout = dup(io::stdout().as_raw_fd())?;
        match dup(io::stderr().as_raw_fd()) {
            Ok(stderr) => Ok(Self { stdout, stderr }),
            Err(e) => {
                let _ = close(stdout);
                Err(e.into())
            }
        }
    }
}

impl Drop for DuplicatedStreams {
    fn drop(&mut self) {
        for fd in [self.stdout, self.stderr] {
            if let Err(e) = close(fd) {
                debug!(fd, error = %e, "failed to close duplicated descriptor");
            }
        }
    }
}

/// A launched sidecar.
///
/// Holds the child and the write end of its stdin, which stays open for as
/// long as the handoff lives.
#[derive(Debug)]
pub struct SidecarHandoff {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout_fd: RawFd,
    stderr_fd: RawFd,
}

impl SidecarHandoff {
    /// Child process ID.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Descriptor numbers sent in the handshake, `(stdout, stderr)`.
    ///
    /// They are only valid inside the child.
    pub fn fds(&self) -> (RawFd, RawFd) {
        (self.stdout_fd, self.stderr_fd)
    }

    /// Check whether the child has exited.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Close the child's stdin and wait for it to exit.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.stdin.take();
        self.child.wait()
    }

    /// Kill the child.
    pub fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }
}
