//! Remote command channel: spawn helper processes and move bytes to them.
//!
//! The sync engines only need a stream duplex to a remote command plus a way
//! to upload the helper binaries once per sync. [`CommandTransport`] covers
//! both by delegating to a command prefix such as `ssh user@host` (or
//! `sh -c` for a same-machine duplex); anything that can spawn a process
//! with piped stdio can implement [`Transport`] instead.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use crate::error::SyncError;
use crate::protocol;

/// Spawns remote commands and uploads helper payloads.
pub trait Transport: Send + Sync {
    /// Spawn `command` on the far side and return its stdio duplex.
    fn command(&self, command: &str) -> Result<HelperChannel, SyncError>;

    /// Copy the file at `local` to `remote_name` on the far side and mark it
    /// executable.
    fn upload(&self, local: &Path, remote_name: &str) -> Result<(), SyncError>;
}

/// A spawned helper process with buffered stdin/stdout.
///
/// Owned by exactly one worker. [`HelperChannel::close`] drops stdin so the
/// helper sees end-of-stream at a frame boundary, then reaps it and checks
/// its exit status; dropping the channel instead kills the process, which is
/// reserved for error paths where the stream state is unknown.
#[derive(Debug)]
pub struct HelperChannel {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stdout: BufReader<ChildStdout>,
}

impl HelperChannel {
    fn from_child(mut child: Child) -> Result<HelperChannel, SyncError> {
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SyncError::Transport("helper stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SyncError::Transport("helper stdout not piped".into()))?;
        Ok(HelperChannel {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stdout: BufReader::new(stdout),
        })
    }

    fn stdin(&mut self) -> Result<&mut BufWriter<ChildStdin>, SyncError> {
        self.stdin
            .as_mut()
            .ok_or_else(|| SyncError::Transport("helper stdin already closed".into()))
    }

    /// Send one LF-terminated line.
    pub fn send_line(&mut self, value: impl std::fmt::Display) -> Result<(), SyncError> {
        let stdin = self.stdin()?;
        writeln!(stdin, "{value}")?;
        stdin.flush()?;
        Ok(())
    }

    /// Send raw bytes without flushing.
    pub fn send(&mut self, bytes: &[u8]) -> Result<(), SyncError> {
        self.stdin()?.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), SyncError> {
        self.stdin()?.flush()?;
        Ok(())
    }

    /// Read one ASCII decimal line from the helper.
    pub fn read_number(&mut self) -> Result<u64, SyncError> {
        protocol::read_number(&mut self.stdout)
    }

    /// Read exactly `len` bytes from the helper.
    pub fn read_exact(&mut self, len: usize, what: &str) -> Result<Vec<u8>, SyncError> {
        protocol::read_exact(&mut self.stdout, len, what)
    }

    /// Read up to `limit` bytes, tolerating end-of-stream.
    pub fn read_payload(&mut self, limit: u64) -> Result<Vec<u8>, SyncError> {
        protocol::read_payload(&mut self.stdout, limit)
    }

    /// Close stdin, wait for the helper to exit, and fail on a non-zero
    /// status. Call this only at a frame boundary.
    pub fn close(mut self) -> Result<(), SyncError> {
        if let Some(stdin) = self.stdin.take() {
            drop(stdin);
        }
        let status = self
            .child
            .wait()
            .map_err(|e| SyncError::Transport(format!("waiting for helper: {e}")))?;
        if !status.success() {
            return Err(SyncError::Transport(format!("helper exited with {status}")));
        }
        Ok(())
    }
}

impl Drop for HelperChannel {
    fn drop(&mut self) {
        // Error path: the stream state is unknown, do not wait politely.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// [`Transport`] over a spawned command prefix.
///
/// `CommandTransport::ssh("user@host")` runs helpers through ssh;
/// `CommandTransport::local()` runs them on this machine through `sh -c`,
/// which is also what the tests use.
#[derive(Clone, Debug)]
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTransport {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        CommandTransport {
            program: program.into(),
            args,
        }
    }

    /// Parse a command prefix such as `ssh -p 2222 user@host`.
    pub fn from_command_line(line: &str) -> Result<Self, SyncError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SyncError::Config("empty transport command".into()))?;
        Ok(CommandTransport {
            program,
            args: parts.collect(),
        })
    }

    pub fn ssh(destination: &str) -> Self {
        CommandTransport::new("ssh", vec![destination.to_string()])
    }

    /// Same-machine duplex; commands run under `sh -c`.
    pub fn local() -> Self {
        CommandTransport::new("sh", vec!["-c".to_string()])
    }
}

impl Transport for CommandTransport {
    fn command(&self, command: &str) -> Result<HelperChannel, SyncError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SyncError::Transport(format!("spawning {:?}: {e}", self.program)))?;
        HelperChannel::from_child(child)
    }

    fn upload(&self, local: &Path, remote_name: &str) -> Result<(), SyncError> {
        let mut channel =
            self.command(&format!("cat > '{remote_name}' && chmod +x '{remote_name}'"))?;
        let mut file = File::open(local)?;
        {
            let stdin = channel.stdin()?;
            io::copy(&mut file, stdin)?;
            stdin.flush()?;
        }
        channel
            .close()
            .map_err(|e| SyncError::Transport(format!("uploading {remote_name}: {e}")))
    }
}

/// Path of a helper binary next to the running executable.
pub fn locate_helper(name: &str) -> Result<PathBuf, SyncError> {
    let exe = std::env::current_exe()?;
    let dir = exe
        .parent()
        .ok_or_else(|| SyncError::Config("executable has no parent directory".into()))?;
    let path = dir.join(name);
    if !path.exists() {
        return Err(SyncError::Config(format!(
            "helper binary {name} not found next to {}",
            exe.display()
        )));
    }
    Ok(path)
}

/// Resolve the command for one helper: use the caller's pre-installed
/// command when given, otherwise upload the local binary under its own name
/// and run it from the remote working directory. Called once per sync.
pub(crate) fn ensure_helper(
    transport: &dyn Transport,
    override_command: Option<&str>,
    helper_dir: Option<&Path>,
    name: &str,
) -> Result<String, SyncError> {
    if let Some(command) = override_command {
        return Ok(command.to_string());
    }
    let local = match helper_dir {
        Some(dir) => dir.join(name),
        None => locate_helper(name)?,
    };
    if !local.exists() {
        return Err(SyncError::Config(format!(
            "helper binary not found at {}",
            local.display()
        )));
    }
    log::debug!("uploading helper {name}");
    transport.upload(&local, name)?;
    Ok(format!("./{name}"))
}

/// Ask a read helper for the size of a remote container, without starting a
/// block loop. The helper treats end-of-stream after the size echo as a
/// clean exit.
pub fn remote_size(
    transport: &dyn Transport,
    read_command: &str,
    path: &str,
) -> Result<u64, SyncError> {
    let mut channel = transport.command(read_command)?;
    channel.send_line(path)?;
    let size = channel.read_number()?;
    channel.close()?;
    Ok(size)
}
