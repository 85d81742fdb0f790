//! Child processes whose output is captured in log files.

use std::{
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::Path,
    process::{Child, Command, Stdio},
    time::{Duration, Instant},
};

use anyhow::{Context, Result, bail};

/// A line logged by a spawned process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLine<'a> {
    Stdout(&'a str),
    Stderr(&'a str),
}

/// Decides from the logged lines when a freshly spawned process can be used.
pub struct ReadinessCheck {
    /// How long the process gets to become ready.
    pub timeout: Duration,

    /// Called with every line the process logs until it returns `Ok(true)`. An `Err` means the
    /// process is never going to be ready.
    #[allow(clippy::type_complexity)]
    pub check: Box<dyn FnMut(LogLine<'_>) -> Result<bool> + Send>,
}

/// A spawned child process logging to `stdout.log` and `stderr.log` in its logs directory.
///
/// Dropping the wrapper kills the process and flushes the log files.
#[derive(Debug)]
pub struct Process {
    child: Child,
    stdout_log: File,
    stderr_log: File,
}

impl Process {
    const STDOUT_LOG: &str = "stdout.log";
    const STDERR_LOG: &str = "stderr.log";

    const POLL_INTERVAL: Duration = Duration::from_millis(20);

    /// Spawns `binary` with the arguments `configure` adds and blocks until `readiness` is met.
    pub fn spawn(
        binary: &Path,
        logs_directory: &Path,
        configure: impl FnOnce(&mut Command),
        readiness: ReadinessCheck,
    ) -> Result<Self> {
        let stdout_path = logs_directory.join(Self::STDOUT_LOG);
        let stderr_path = logs_directory.join(Self::STDERR_LOG);
        let stdout_log = create_log_file(&stdout_path)?;
        let stderr_log = create_log_file(&stderr_path)?;

        let mut command = Command::new(binary);
        configure(&mut command);
        command
            .stdin(Stdio::null())
            .stdout(stdout_log.try_clone().context("Failed to clone the stdout log")?)
            .stderr(stderr_log.try_clone().context("Failed to clone the stderr log")?);
        let child = command
            .spawn()
            .with_context(|| format!("Failed to spawn {}", binary.display()))?;

        let mut process = Self {
            child,
            stdout_log,
            stderr_log,
        };
        process.wait_until_ready(&stdout_path, &stderr_path, readiness)?;
        Ok(process)
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    fn wait_until_ready(
        &mut self,
        stdout_path: &Path,
        stderr_path: &Path,
        mut readiness: ReadinessCheck,
    ) -> Result<()> {
        let started = Instant::now();
        let mut stdout = LogTail::open(stdout_path)?;
        let mut stderr = LogTail::open(stderr_path)?;

        loop {
            let stdout_line = stdout.next_line();
            let stderr_line = stderr.next_line();

            let lines = [
                stdout_line.as_deref().map(LogLine::Stdout),
                stderr_line.as_deref().map(LogLine::Stderr),
            ];
            for line in lines.into_iter().flatten() {
                if (readiness.check)(line).context("The process failed to become ready")? {
                    return Ok(());
                }
            }

            if stdout_line.is_none() && stderr_line.is_none() {
                // Everything logged so far was seen, an exited process won't log anything new.
                if let Some(status) = self
                    .child
                    .try_wait()
                    .context("Failed to poll the process status")?
                {
                    stdout.drain();
                    stderr.drain();
                    bail!(
                        "The process exited with {status} before it was ready. stderr {} - stdout {}",
                        stderr.transcript,
                        stdout.transcript
                    )
                }
                std::thread::sleep(Self::POLL_INTERVAL);
            }

            if started.elapsed() > readiness.timeout {
                bail!(
                    "The process was not ready within {:?}. stderr {} - stdout {}",
                    readiness.timeout,
                    stderr.transcript,
                    stdout.transcript
                )
            }
        }
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        // The process may have exited on its own already.
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = self.stdout_log.flush();
        let _ = self.stderr_log.flush();
    }
}

fn create_log_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(path)
        .with_context(|| format!("Failed to create the log file {}", path.display()))
}

/// Follows a log file while it is being written, keeping everything read so far.
struct LogTail {
    reader: BufReader<File>,
    /// A line whose newline was not written yet.
    partial: String,
    transcript: String,
}

impl LogTail {
    fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open the log file {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            partial: String::new(),
            transcript: String::new(),
        })
    }

    /// The next complete line, `None` when nothing new was written yet.
    fn next_line(&mut self) -> Option<String> {
        match self.reader.read_line(&mut self.partial) {
            Ok(0) | Err(_) => return None,
            Ok(_) if !self.partial.ends_with('\n') => return None,
            Ok(_) => {}
        }

        let line = std::mem::take(&mut self.partial);
        self.transcript.push_str(&line);
        Some(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn drain(&mut self) {
        while self.next_line().is_some() {}
        self.transcript.push_str(&std::mem::take(&mut self.partial));
    }
}
