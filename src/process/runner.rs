//! Command Execution Runner
//!
//! Runs one package-manager script, streams stdout/stderr into a
//! [`CommandRun`], and after the run settles waits a short display delay
//! before handing the exit code back through [`RunHandle::completion`].

use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;

use crate::model::{CommandRun, PackageManager};

pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_secs(2);

/// `<package manager> run <command> <extra args...>`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptInvocation {
    pub package_manager: PackageManager,
    pub command: String,
    pub extra_args: Vec<String>,
}

impl ScriptInvocation {
    pub fn new(package_manager: PackageManager, command: impl Into<String>) -> Self {
        Self {
            package_manager,
            command: command.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &'static str {
        self.package_manager.as_str()
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), self.command.clone()];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(self.program());
        command.args(self.args());
        command
    }
}

/// Caller's view of one run: live state plus the delayed completion signal.
pub struct RunHandle {
    updates: watch::Receiver<CommandRun>,
    completion: Option<oneshot::Receiver<i32>>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub fn current(&self) -> CommandRun {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommandRun> {
        self.updates.clone()
    }

    /// Wait for the exit code. `None` if the run was cancelled before the
    /// display delay elapsed.
    pub async fn completion(&mut self) -> Option<i32> {
        self.completion.take()?.await.ok()
    }

    /// Non-blocking check for the completion signal.
    pub fn try_completion(&mut self) -> Option<i32> {
        let receiver = self.completion.as_mut()?;
        match receiver.try_recv() {
            Ok(code) => {
                self.completion = None;
                Some(code)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.completion = None;
                None
            }
        }
    }

    /// Drop the pending completion signal. The child itself is not touched.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone, Debug)]
pub struct CommandRunner {
    completion_delay: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_DELAY)
    }
}

impl CommandRunner {
    pub fn new(completion_delay: Duration) -> Self {
        Self { completion_delay }
    }

    pub fn run(&self, invocation: &ScriptInvocation) -> RunHandle {
        let run = CommandRun::new(
            invocation.command.clone(),
            invocation.package_manager.as_str(),
        );
        self.run_command(run, invocation.to_command())
    }

    /// Drive an arbitrary prepared command, reporting into `run`.
    pub fn run_command(&self, run: CommandRun, command: Command) -> RunHandle {
        let (tx, rx) = watch::channel(run);
        let (done_tx, done_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        tokio::spawn(drive(
            command,
            tx,
            done_tx,
            self.completion_delay,
            cancel.clone(),
        ));
        RunHandle {
            updates: rx,
            completion: Some(done_rx),
            cancel,
        }
    }
}

async fn drive(
    mut command: Command,
    tx: watch::Sender<CommandRun>,
    done: oneshot::Sender<i32>,
    delay: Duration,
    cancel: CancellationToken,
) {
    let label = tx.borrow().invocation_label();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let (exit_code, failure) = match command.spawn() {
        Ok(mut child) => {
            let stdout = child.stdout.take().map(LineSource::new);
            let stderr = child.stderr.take().map(LineSource::new);
            stream_output(stdout, stderr, &tx).await;
            match child.wait().await {
                Ok(status) if status.success() => (status.code(), None),
                Ok(status) => (status.code(), Some(format!("Error: {} ({})", label, status))),
                Err(err) => (None, Some(format!("Error: {}", err))),
            }
        }
        Err(err) => (None, Some(format!("Error: failed to launch {}: {}", label, err))),
    };

    tx.send_modify(|run| {
        if let Some(line) = failure {
            run.output_lines.push(line);
        }
        let elapsed = run.started_at.elapsed();
        run.finish(exit_code, elapsed);
    });
    {
        let run = tx.borrow();
        info!(
            "{} finished with {:?} in {}",
            label,
            run.status,
            run.duration_label().unwrap_or_default()
        );
    }

    tokio::select! {
        _ = cancel.cancelled() => {
            debug!("Completion of {} cancelled during display delay", label);
            return;
        }
        _ = tokio::time::sleep(delay) => {}
    }

    if done.send(exit_code.unwrap_or(0)).is_err() {
        debug!("Nobody waiting for completion of {}", label);
    }
}

/// Appends stdout and stderr lines in arrival order per stream until both
/// close. Blank lines are dropped.
async fn stream_output<O, E>(
    mut stdout: Option<LineSource<O>>,
    mut stderr: Option<LineSource<E>>,
    tx: &watch::Sender<CommandRun>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    loop {
        let line = tokio::select! {
            Some(line) = next_line(&mut stdout) => line,
            Some(line) = next_line(&mut stderr) => line,
            else => break,
        };
        if line.trim().is_empty() {
            continue;
        }
        tx.send_modify(|run| run.output_lines.push(line));
    }
}

async fn next_line<R: AsyncRead + Unpin>(source: &mut Option<LineSource<R>>) -> Option<String> {
    let reader = source.as_mut()?;
    match reader.next_line().await {
        Some(line) => Some(line),
        None => {
            *source = None;
            None
        }
    }
}

/// Line reader whose partial data survives a dropped read, so it can sit in
/// a `select!` next to another stream.
struct LineSource<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineSource<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_line(&mut self) -> Option<String> {
        let read = self.reader.read_until(b'\n', &mut self.buf).await;
        if let Err(err) = &read {
            warn!("Reading child output failed: {}", err);
        }
        let at_end = matches!(read, Ok(0) | Err(_));
        if at_end && self.buf.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.buf)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        self.buf.clear();
        Some(line)
    }
}
