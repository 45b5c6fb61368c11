use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use sysinfo::{ProcessesToUpdate, System};
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStderr, Command},
    task::JoinHandle,
    time::timeout,
};

use crate::error::AppError;

use super::command::{ingest_stop_args, printable};

const KILL_WAIT: Duration = Duration::from_secs(5);
const DRAIN_WAIT: Duration = Duration::from_secs(1);

/// A child the supervisor owns, together with the task forwarding its
/// stderr into the log.
#[derive(Debug)]
pub(crate) struct ManagedProcess {
    pub(crate) role: &'static str,
    pub(crate) binary: PathBuf,
    pub(crate) pid: Option<u32>,
    child: Child,
    drain: Option<JoinHandle<()>>,
}

impl ManagedProcess {
    /// `Some(status)` once the process has exited.
    pub(crate) fn exited(&mut self) -> Option<ExitStatus> {
        match self.child.try_wait() {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(role = self.role, pid = ?self.pid, ?err, "failed to poll process");
                None
            }
        }
    }

    /// Fails with a launch error naming the role if the process is gone.
    pub(crate) fn ensure_alive(&mut self) -> Result<(), AppError> {
        match self.exited() {
            Some(status) => Err(AppError::launch(format!(
                "{} ({}) exited during startup with {status}",
                self.role,
                self.binary.display()
            ))),
            None => Ok(()),
        }
    }

    async fn finish_drain(&mut self) {
        if let Some(mut handle) = self.drain.take() {
            if timeout(DRAIN_WAIT, &mut handle).await.is_err() {
                handle.abort();
            }
        }
    }
}

pub(crate) async fn spawn(
    role: &'static str,
    binary: &Path,
    args: Vec<OsString>,
    working_dir: &Path,
) -> Result<ManagedProcess, AppError> {
    tracing::debug!(role, binary = %binary.display(), command = %printable(&args), "spawning process");

    let mut command = Command::new(binary);
    command.args(&args);
    command.current_dir(working_dir);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let mut child = command.spawn().map_err(|err| map_io_error(err, binary))?;
    let pid = child.id();

    let drain = child
        .stderr
        .take()
        .map(|stderr| tokio::spawn(drain_stderr(stderr, role)));

    tracing::info!(role, pid = ?pid, binary = %binary.display(), "process started");

    Ok(ManagedProcess {
        role,
        binary: binary.to_path_buf(),
        pid,
        child,
        drain,
    })
}

/// Asks the process to exit, waits up to `grace`, then kills it.
pub(crate) async fn terminate_gracefully(process: &mut ManagedProcess, grace: Duration) {
    if let Some(status) = process.exited() {
        tracing::debug!(role = process.role, pid = ?process.pid, %status, "process already exited");
        process.finish_drain().await;
        return;
    }

    send_terminate(process);

    if !wait_for_exit(process, grace).await {
        tracing::warn!(
            role = process.role,
            pid = ?process.pid,
            grace_secs = grace.as_secs_f64(),
            "process ignored termination request, killing"
        );
        force_kill(process).await;
    }
}

/// Waits up to `limit` for the process to exit on its own.
pub(crate) async fn wait_for_exit(process: &mut ManagedProcess, limit: Duration) -> bool {
    match timeout(limit, process.child.wait()).await {
        Ok(Ok(status)) => {
            tracing::info!(role = process.role, pid = ?process.pid, %status, "process exited");
            process.finish_drain().await;
            true
        }
        Ok(Err(err)) => {
            tracing::warn!(role = process.role, pid = ?process.pid, ?err, "failed to wait for process");
            false
        }
        Err(_) => false,
    }
}

pub(crate) async fn force_kill(process: &mut ManagedProcess) {
    match timeout(KILL_WAIT, process.child.kill()).await {
        Ok(Ok(())) => {
            tracing::warn!(role = process.role, pid = ?process.pid, "process killed");
        }
        Ok(Err(err)) => {
            tracing::warn!(role = process.role, pid = ?process.pid, ?err, "failed to kill process");
        }
        Err(_) => {
            tracing::error!(role = process.role, pid = ?process.pid, "process did not die after kill");
        }
    }
    process.finish_drain().await;
}

#[cfg(unix)]
fn send_terminate(process: &mut ManagedProcess) {
    use nix::{
        sys::signal::{Signal, kill},
        unistd::Pid,
    };

    let Some(pid) = process.child.id() else {
        return;
    };
    tracing::debug!(role = process.role, pid, "sending SIGTERM");
    if let Err(err) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        tracing::warn!(role = process.role, pid, %err, "failed to send SIGTERM");
    }
}

#[cfg(not(unix))]
fn send_terminate(process: &mut ManagedProcess) {
    if let Err(err) = process.child.start_kill() {
        tracing::warn!(role = process.role, pid = ?process.pid, ?err, "failed to terminate process");
    }
}

/// Runs the ingest server's own stop command against the rendered config.
pub(crate) async fn stop_ingest(
    binary: &Path,
    working_dir: &Path,
    config_path: &Path,
    limit: Duration,
) -> Result<(), AppError> {
    let args = ingest_stop_args(working_dir, config_path);
    tracing::debug!(binary = %binary.display(), command = %printable(&args), "stopping ingest server");

    let mut command = Command::new(binary);
    command.args(&args);
    command.current_dir(working_dir);
    command.stdin(Stdio::null());
    command.stdout(Stdio::null());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let output = timeout(limit, command.output())
        .await
        .map_err(|_| AppError::launch("ingest stop command timed out"))?
        .map_err(|err| map_io_error(err, binary))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AppError::launch(format!(
            "ingest stop command exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Kills every host process whose name matches one of `stems`, skipping
/// this process. Returns how many were killed.
pub(crate) async fn sweep_orphans(stems: Vec<String>) -> usize {
    if stems.is_empty() {
        return 0;
    }

    let result = tokio::task::spawn_blocking(move || {
        let own_pid = sysinfo::get_current_pid().ok();
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);

        let mut killed = 0;
        for (pid, process) in system.processes() {
            if Some(*pid) == own_pid {
                continue;
            }
            let name = process.name().to_string_lossy().to_ascii_lowercase();
            if !stems.iter().any(|stem| matches_binary(&name, stem)) {
                continue;
            }
            if process.kill() {
                tracing::warn!(pid = pid.as_u32(), name = %name, "killed lingering process");
                killed += 1;
            } else {
                tracing::warn!(pid = pid.as_u32(), name = %name, "failed to kill lingering process");
            }
        }
        killed
    })
    .await;

    match result {
        Ok(killed) => killed,
        Err(err) => {
            tracing::error!(?err, "process sweep task failed");
            0
        }
    }
}

/// Process-table names are truncated on some hosts (15 bytes on Linux), so a
/// name that is a long-enough prefix of the stem also counts.
pub(crate) fn matches_binary(name: &str, stem: &str) -> bool {
    if stem.is_empty() || name.is_empty() {
        return false;
    }
    name.contains(stem) || (name.len() >= 15 && stem.starts_with(name))
}

pub(crate) fn map_io_error(err: std::io::Error, binary: &Path) -> AppError {
    match err.kind() {
        std::io::ErrorKind::NotFound => {
            AppError::dependency(format!("{} not found", binary.display()))
        }
        _ => AppError::launch(format!("{}: {err}", binary.display())),
    }
}

async fn drain_stderr(mut stderr: ChildStderr, role: &'static str) {
    let mut buffer = Vec::with_capacity(8192);
    let mut chunk = [0u8; 4096];

    loop {
        let read = match stderr.read(&mut chunk).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) => {
                tracing::debug!(role, ?err, "stderr stream closed");
                break;
            }
        };
        buffer.extend_from_slice(&chunk[..read]);

        while let Some(idx) = buffer
            .iter()
            .position(|byte| *byte == b'\r' || *byte == b'\n')
        {
            let line_bytes: Vec<u8> = buffer.drain(..=idx).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                log_process_line(role, trimmed);
            }
        }
    }

    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer);
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            log_process_line(role, trimmed);
        }
    }
}

fn log_process_line(role: &str, line: &str) {
    match classify_line(line) {
        LineSeverity::Error => tracing::error!(role, message = %line, "process output"),
        LineSeverity::Warning => tracing::warn!(role, message = %line, "process output"),
        LineSeverity::Progress => tracing::trace!(role, message = %line, "process output"),
        LineSeverity::Info => tracing::debug!(role, message = %line, "process output"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineSeverity {
    Error,
    Warning,
    Progress,
    Info,
}

pub(crate) fn classify_line(line: &str) -> LineSeverity {
    let lowered = line.to_ascii_lowercase();

    if lowered.contains("[emerg]")
        || lowered.contains("[alert]")
        || lowered.contains("[crit]")
        || lowered.contains("error")
        || lowered.contains("failed")
        || lowered.contains("fatal")
    {
        return LineSeverity::Error;
    }

    if lowered.contains("[warn]") || lowered.contains("warning") || lowered.contains("deprecated") {
        return LineSeverity::Warning;
    }

    if lowered.contains("speed=") || lowered.contains("frame=") || lowered.contains("bitrate=") {
        return LineSeverity::Progress;
    }

    LineSeverity::Info
}
