//! Step process execution with hang and timeout handling.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::RecvTimeoutError;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::shared::SharedWriter;
use crate::error::{Result, RunwayError};
use crate::hang::{HangDetector, DEFAULT_TICK_INTERVAL};
use crate::models::StepRunStatus;
use crate::secrets::{RedactingWriter, SecretSet};

/// How often the wait loop checks the process without a hang detector.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Default time between SIGTERM and SIGKILL.
pub const DEFAULT_KILL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Exit code reported when the process was ended by a signal.
const SIGNALED_EXIT_CODE: i32 = -1;

/// Outcome of a step process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `Success`, `Failed`, or one of the aborted statuses.
    pub status: StepRunStatus,

    /// Process exit code, `-1` if it was ended by a signal.
    pub exit_code: i32,

    pub duration: Duration,
}

/// A step process with optional hang detection, timeout and redaction.
///
/// stdout and stderr are both copied into the output writer given to
/// [`TimeoutCommand::run`].
///
/// # Example
///
/// ```no_run
/// use runway::shell::TimeoutCommand;
/// use std::time::Duration;
///
/// let (outcome, output) = TimeoutCommand::new("make")
///     .arg("test")
///     .timeout(Duration::from_secs(600))
///     .run(Vec::new())
///     .unwrap();
/// println!("{}: {}", outcome.status, String::from_utf8_lossy(&output));
/// ```
#[derive(Debug)]
pub struct TimeoutCommand {
    program: String,
    args: Vec<String>,
    envs: Option<Vec<(String, String)>>,
    cwd: Option<PathBuf>,
    inherit_stdin: bool,
    timeout: Option<Duration>,
    hang_timeout: Option<Duration>,
    tick_interval: Duration,
    kill_grace_period: Duration,
    secrets: Option<SecretSet>,
    hang_detector: Option<HangDetector>,
}

enum WaitEvent {
    Exited(ExitStatus),
    Hang,
    TimedOut,
}

impl TimeoutCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: None,
            cwd: None,
            inherit_stdin: false,
            timeout: None,
            hang_timeout: None,
            tick_interval: DEFAULT_TICK_INTERVAL,
            kill_grace_period: DEFAULT_KILL_GRACE_PERIOD,
            secrets: None,
            hang_detector: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run with exactly these variables instead of the inherited environment.
    pub fn envs(mut self, envs: Vec<(String, String)>) -> Self {
        self.envs = Some(envs);
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Connect the process to this process's stdin instead of null.
    pub fn inherit_stdin(mut self, inherit: bool) -> Self {
        self.inherit_stdin = inherit;
        self
    }

    /// Abort the process after `timeout` of wall-clock time.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abort the process after `timeout` without output.
    pub fn hang_timeout(mut self, timeout: Duration) -> Self {
        self.hang_timeout = Some(timeout);
        self
    }

    /// Tick interval of the hang detector built from [`TimeoutCommand::hang_timeout`].
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Use a ready-made hang detector instead of one built from a timeout.
    pub fn hang_detector(mut self, detector: HangDetector) -> Self {
        self.hang_detector = Some(detector);
        self
    }

    pub fn kill_grace_period(mut self, grace: Duration) -> Self {
        self.kill_grace_period = grace;
        self
    }

    /// Redact `secrets` from the output.
    pub fn redact(mut self, secrets: SecretSet) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Human-readable command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the process to completion, copying its output into `output`.
    ///
    /// Returns the outcome and `output` back once every byte (including a
    /// redactor's held tail) has been written.
    ///
    /// # Errors
    ///
    /// [`RunwayError::CommandFailed`] if the process cannot be started, or an
    /// I/O error from waiting on it or writing its output.
    pub fn run<O: Write + Send + 'static>(mut self, output: O) -> Result<(CommandOutcome, O)> {
        let command_line = self.command_line();
        let started = Instant::now();

        let detector = self.hang_detector.take().or_else(|| {
            self.hang_timeout
                .map(|timeout| HangDetector::with_timeout(timeout, self.tick_interval))
        });

        let sink = SharedWriter::new(OutputSink::new(output, self.secrets.take()));

        debug!("Starting step process: {}", command_line);
        let mut child = self.spawn().map_err(|e| {
            debug!("Failed to start {}: {}", command_line, e);
            RunwayError::CommandFailed {
                command: command_line.clone(),
                code: None,
            }
        })?;

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump(stdout, pump_writer(&sink, detector.as_ref())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump(stderr, pump_writer(&sink, detector.as_ref())));
        }

        if let Some(detector) = &detector {
            detector.start();
        }

        let deadline = self.timeout.map(|timeout| started + timeout);
        let event = wait_for_event(&mut child, detector.as_ref(), deadline)?;

        if let Some(detector) = &detector {
            detector.stop();
        }

        let (status, exit_status) = match event {
            WaitEvent::Exited(exit_status) => {
                let status = if exit_status.success() {
                    StepRunStatus::Success
                } else {
                    StepRunStatus::Failed
                };
                (status, exit_status)
            }
            WaitEvent::Hang => {
                warn!("{} produced no output, aborting", command_line);
                let exit_status = terminate(&mut child, self.kill_grace_period)?;
                (StepRunStatus::AbortedWithNoOutputTimeout, exit_status)
            }
            WaitEvent::TimedOut => {
                warn!("{} timed out, aborting", command_line);
                let exit_status = terminate(&mut child, self.kill_grace_period)?;
                (StepRunStatus::AbortedWithCustomTimeout, exit_status)
            }
        };

        for handle in pumps {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => warn!("Output pump for {} panicked", command_line),
            }
        }

        let output = match sink.try_into_inner() {
            Ok(sink) => sink.finish()?,
            Err(_) => {
                return Err(RunwayError::Other(anyhow::anyhow!(
                    "output of {} is still in use",
                    command_line
                )))
            }
        };

        let outcome = CommandOutcome {
            status,
            exit_code: exit_status.code().unwrap_or(SIGNALED_EXIT_CODE),
            duration: started.elapsed(),
        };
        debug!(
            "{} finished with {} (exit code {}) in {:?}",
            command_line, outcome.status, outcome.exit_code, outcome.duration
        );

        Ok((outcome, output))
    }

    fn spawn(&self) -> io::Result<Child> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(envs) = &self.envs {
            cmd.env_clear();
            cmd.envs(envs.iter().map(|(k, v)| (k, v)));
        }

        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        cmd.stdin(if self.inherit_stdin {
            Stdio::inherit()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        // own process group, so aborting also reaches the step's children
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn()
    }
}

/// Where step output ends up, redacted or not.
enum OutputSink<O: Write> {
    Plain(O),
    Redacted(RedactingWriter<O>),
}

impl<O: Write> OutputSink<O> {
    fn new(output: O, secrets: Option<SecretSet>) -> Self {
        match secrets {
            Some(secrets) => OutputSink::Redacted(RedactingWriter::new(&secrets, output)),
            None => OutputSink::Plain(output),
        }
    }

    fn finish(self) -> io::Result<O> {
        match self {
            OutputSink::Plain(mut output) => {
                output.flush()?;
                Ok(output)
            }
            OutputSink::Redacted(writer) => writer.finish(),
        }
    }
}

impl<O: Write> Write for OutputSink<O> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(output) => output.write(buf),
            OutputSink::Redacted(writer) => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(output) => output.flush(),
            OutputSink::Redacted(writer) => writer.flush(),
        }
    }
}

fn pump_writer<O: Write + Send + 'static>(
    sink: &SharedWriter<OutputSink<O>>,
    detector: Option<&HangDetector>,
) -> Box<dyn Write + Send> {
    match detector {
        Some(detector) => Box::new(detector.wrap_writer(sink.clone())),
        None => Box::new(sink.clone()),
    }
}

fn pump<R: Read + Send + 'static>(
    mut reader: R,
    mut writer: Box<dyn Write + Send>,
) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return writer.flush(),
                Ok(n) => writer.write_all(&buf[..n])?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    })
}

fn wait_for_event(
    child: &mut Child,
    detector: Option<&HangDetector>,
    deadline: Option<Instant>,
) -> io::Result<WaitEvent> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(WaitEvent::Exited(status));
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Ok(WaitEvent::TimedOut);
        }

        match detector {
            Some(detector) => match detector.notifications().recv_timeout(POLL_INTERVAL) {
                Ok(()) => return Ok(WaitEvent::Hang),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
            },
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Ask the process to stop, then kill it after `grace`.
fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        if let Err(e) = signal_group(child, libc::SIGTERM) {
            warn!("Failed to send SIGTERM to process {}: {}", child.id(), e);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                // the leader is gone; make sure nothing it started survives
                let _ = signal_group(child, libc::SIGKILL);
                return Ok(status);
            }
            thread::sleep(POLL_INTERVAL);
        }

        if let Err(e) = signal_group(child, libc::SIGKILL) {
            warn!("Failed to kill process group {}: {}", child.id(), e);
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    if let Err(e) = child.kill() {
        if e.kind() != io::ErrorKind::InvalidInput {
            warn!("Failed to kill process {}: {}", child.id(), e);
        }
    }
    child.wait()
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: libc::c_int) -> io::Result<()> {
    let pid = libc::pid_t::try_from(child.id()).map_err(io::Error::other)?;
    let rc = unsafe { libc::kill(-pid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
