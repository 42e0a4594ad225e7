use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;

use codicil_async_utils::CancelErr;
use codicil_async_utils::OrCancelExt;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

// I/O buffer sizing
const READ_CHUNK_SIZE: usize = 8192; // bytes per read
const AGGREGATE_BUFFER_INITIAL_CAPACITY: usize = 8 * 1024; // 8 KiB

/// How long readers may keep draining pipes after the child was killed.
/// Grandchildren outside the process group can hold the pipes open.
const IO_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Reported when the process did not exit on its own.
pub const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecParams {
    pub command: Vec<String>,
    pub cwd: PathBuf,
    pub timeout_ms: Option<u64>,
}

impl ExecParams {
    /// Only positive timeouts are enforced.
    pub fn maybe_timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecToolCallOutput {
    pub exit_code: i32,
    /// stdout followed by stderr.
    pub aggregated_output: String,
    pub duration: Duration,
    pub timed_out: bool,
    pub cancelled: bool,
}

impl ExecToolCallOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

enum WaitOutcome {
    Exited(ExitStatus),
    TimedOut,
    Cancelled,
}

/// Runs `params.command` with piped output in its own process group. A
/// timeout or cancellation kills the whole group; output buffered up to that
/// point is still returned. Only a failure to spawn is an error.
pub async fn process_exec_tool_call(
    params: ExecParams,
    cancel: CancellationToken,
) -> io::Result<ExecToolCallOutput> {
    let start = Instant::now();
    let timeout = params.maybe_timeout_duration();
    let ExecParams { command, cwd, .. } = params;

    let (program, args) = command.split_first().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "command args are empty")
    })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(&cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    debug!(?command, cwd = %cwd.display(), "spawned tool process");

    let stdout_reader = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout pipe was unexpectedly not available"))?;
    let stderr_reader = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr pipe was unexpectedly not available"))?;

    let (stdout_tx, mut stdout_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let (stderr_tx, mut stderr_rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let stdout_handle = tokio::spawn(read_chunks(stdout_reader, stdout_tx));
    let stderr_handle = tokio::spawn(read_chunks(stderr_reader, stderr_tx));

    let outcome = wait_for_exit(&mut child, timeout, &cancel).await?;
    let (exit_code, timed_out, cancelled) = match outcome {
        WaitOutcome::Exited(status) => (status.code().unwrap_or(NO_EXIT_CODE), false, false),
        WaitOutcome::TimedOut => {
            kill_process_group(&mut child);
            (NO_EXIT_CODE, true, false)
        }
        WaitOutcome::Cancelled => {
            kill_process_group(&mut child);
            (NO_EXIT_CODE, false, true)
        }
    };

    finish_reader(stdout_handle).await;
    finish_reader(stderr_handle).await;

    let mut combined = Vec::with_capacity(AGGREGATE_BUFFER_INITIAL_CAPACITY);
    while let Ok(chunk) = stdout_rx.try_recv() {
        combined.extend_from_slice(&chunk);
    }
    while let Ok(chunk) = stderr_rx.try_recv() {
        combined.extend_from_slice(&chunk);
    }

    Ok(ExecToolCallOutput {
        exit_code,
        aggregated_output: String::from_utf8_lossy(&combined).into_owned(),
        duration: start.elapsed(),
        timed_out,
        cancelled,
    })
}

async fn wait_for_exit(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
) -> io::Result<WaitOutcome> {
    let bounded_wait = async {
        match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(status) => status.map(WaitOutcome::Exited),
                Err(_) => Ok(WaitOutcome::TimedOut),
            },
            None => child.wait().await.map(WaitOutcome::Exited),
        }
    };
    match bounded_wait.or_cancel(cancel).await {
        Ok(outcome) => outcome,
        Err(CancelErr::Cancelled) => Ok(WaitOutcome::Cancelled),
    }
}

/// Best-effort kill of the child and everything in its process group.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // The child leads its own group, so -pid addresses all of it.
            unsafe {
                libc::kill(-(pid as i32), libc::SIGKILL);
            }
        }
    }
    if let Err(err) = child.start_kill() {
        debug!("tool process already gone: {err}");
    }
}

async fn finish_reader(handle: JoinHandle<io::Result<()>>) {
    let abort = handle.abort_handle();
    match tokio::time::timeout(IO_DRAIN_TIMEOUT, handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => warn!("error reading tool output: {err}"),
        Ok(Err(err)) => warn!("tool output reader panicked: {err}"),
        Err(_) => {
            debug!("tool output pipe still open after kill; abandoning reader");
            abort.abort();
        }
    }
}

async fn read_chunks<R: AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    tx: mpsc::UnboundedSender<Vec<u8>>,
) -> io::Result<()> {
    let mut tmp = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut tmp).await?;
        if n == 0 {
            return Ok(());
        }
        if tx.send(tmp[..n].to_vec()).is_err() {
            return Ok(());
        }
    }
}

/// JSON body handed back to the model for a shell-style call.
pub fn format_exec_output_for_model(exec_output: &ExecToolCallOutput) -> String {
    #[derive(Serialize)]
    struct ExecMetadata {
        exit_code: i32,
        duration_seconds: f32,
    }

    #[derive(Serialize)]
    struct ExecOutput<'a> {
        output: &'a str,
        metadata: ExecMetadata,
    }

    // round to 1 decimal place
    let duration_seconds = ((exec_output.duration.as_secs_f32()) * 10.0).round() / 10.0;

    let payload = ExecOutput {
        output: &exec_output.aggregated_output,
        metadata: ExecMetadata {
            exit_code: exec_output.exit_code,
            duration_seconds,
        },
    };

    serde_json::to_string(&payload).unwrap_or_else(|err| {
        warn!("failed to serialize exec output: {err}");
        exec_output.aggregated_output.clone()
    })
}
