//! Process execution utilities with timeout support
//!
//! Every yt-dlp run goes through here. On unix each run gets its own process
//! group, so terminating it also takes down the ffmpeg/post-processor
//! children yt-dlp started, and nothing keeps writing into the temp dir after
//! the attempt is abandoned.

use std::io;
use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use crate::download::builder::Invocation;
use crate::download::DownloadError;

/// Timeout for quick probes such as `yt-dlp --version` (10 seconds)
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds a tokio `Command` for an invocation.
///
/// stdin is closed, stdout/stderr are piped and the child is killed on drop.
/// On unix the child leads a new process group.
pub fn command_for(invocation: &Invocation) -> Command {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// A spawned invocation together with the process group it leads.
///
/// Dropping it without `terminate` still kills the group.
#[derive(Debug)]
pub struct ProcessGroup {
    child: Child,
    pgid: Option<u32>,
    finished: bool,
}

impl ProcessGroup {
    /// Spawns an invocation with piped output for incremental reading.
    pub fn spawn(invocation: &Invocation) -> Result<Self, DownloadError> {
        let child = command_for(invocation)
            .spawn()
            .map_err(|source| DownloadError::CommandStartup {
                program: invocation.program.clone(),
                source,
            })?;
        // the pid stops being reported once the child is reaped; keep it for the group
        let pgid = child.id();
        Ok(Self {
            child,
            pgid,
            finished: false,
        })
    }

    pub fn take_pipes(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        (self.child.stdout.take(), self.child.stderr.take())
    }

    /// Waits for the group leader (yt-dlp itself) to exit.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Kills every process in the group and reaps the leader.
    ///
    /// Safe to call after the leader exited: stragglers still holding the
    /// pipes are killed. Calling it twice is a no-op.
    pub async fn terminate(&mut self) {
        if self.finished {
            return;
        }
        self.signal_group();
        if self.child.id().is_some() {
            if let Err(e) = self.child.kill().await {
                tracing::debug!("kill failed (process already gone?): {}", e);
            }
        }
        self.finished = true;
    }

    /// Reads both pipes to the end while waiting for the leader.
    ///
    /// Once the leader exits, leftover group members are killed so a
    /// straggler holding stdout open cannot stall the read.
    async fn collect_output(&mut self) -> io::Result<Output> {
        let (stdout, stderr) = self.take_pipes();
        let stdout = tokio::spawn(read_all(stdout));
        let stderr = tokio::spawn(read_all(stderr));

        let status = self.child.wait().await?;
        self.signal_group();

        let stdout = stdout.await.map_err(io::Error::other)??;
        let stderr = stderr.await.map_err(io::Error::other)??;
        Ok(Output { status, stdout, stderr })
    }

    #[cfg(unix)]
    fn signal_group(&self) {
        let Some(pgid) = self.pgid.and_then(|pid| i32::try_from(pid).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => tracing::debug!("killed process group {}", pgid),
            Err(nix::errno::Errno::ESRCH) => {}
            Err(e) => tracing::debug!("killpg {} failed: {}", pgid, e),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if !self.finished {
            self.signal_group();
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Run an invocation to completion with a timeout.
///
/// Returns the process Output on success (whatever the exit status), or a
/// `DownloadError` on spawn failure or timeout. The process group is killed
/// before returning either way.
pub async fn run_with_timeout(invocation: &Invocation, timeout: Duration) -> Result<Output, DownloadError> {
    let mut group = ProcessGroup::spawn(invocation)?;
    let result = tokio::time::timeout(timeout, group.collect_output()).await;
    group.terminate().await;
    match result {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(DownloadError::CommandStartup {
            program: invocation.program.clone(),
            source,
        }),
        Err(_) => Err(DownloadError::Timeout(timeout)),
    }
}
