//! FFmpeg process runner with streamed progress, cancellation and timeout.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::progress::{parse_progress_line, LineSplitter, MonotonicSink, ProgressLine, PROGRESS_LAUNCHED};

/// Diagnostic lines kept for error reporting.
pub const DEFAULT_DIAGNOSTIC_TAIL: usize = 64;

/// What a finished tool run reported.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Process exit code (None if killed by a signal)
    pub exit_code: Option<i32>,
    /// Last non-progress diagnostic lines
    pub diagnostics: Vec<String>,
    /// Last frame counter seen on the progress marker
    pub last_frame: Option<u64>,
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Cancellation signal receiver
    cancel_rx: Option<watch::Receiver<bool>>,
    /// Upper bound on the run
    timeout: Option<Duration>,
    /// Number of diagnostic lines to keep
    diagnostic_tail: usize,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

enum Interrupt {
    Cancelled,
    TimedOut,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            cancel_rx: None,
            timeout: None,
            diagnostic_tail: DEFAULT_DIAGNOSTIC_TAIL,
        }
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a command, streaming its stderr into `progress`.
    ///
    /// Reports [`PROGRESS_LAUNCHED`] once the process is spawned. A non-zero
    /// exit becomes [`MediaError::ToolFailed`] carrying the diagnostic tail.
    pub async fn run(&self, cmd: &FfmpegCommand, progress: &MonotonicSink<'_>) -> MediaResult<RunOutcome> {
        if self.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        debug!("Running FFmpeg: {}", cmd.display());

        let mut child = Command::new(cmd.program())
            .args(cmd.build_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => MediaError::ToolNotFound(cmd.program().display().to_string()),
                _ => MediaError::from(e),
            })?;

        progress.milestone(PROGRESS_LAUNCHED);

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr not captured"))?;

        let finished = {
            let drive = async {
                let diagnostics = self.read_diagnostics(stderr, progress).await?;
                let status = child.wait().await?;
                Ok::<(ExitStatus, Diagnostics), MediaError>((status, diagnostics))
            };
            tokio::pin!(drive);

            tokio::select! {
                result = &mut drive => Ok(result),
                _ = wait_cancelled(self.cancel_rx.clone()) => Err(Interrupt::Cancelled),
                _ = wait_timeout(self.timeout) => Err(Interrupt::TimedOut),
            }
        };

        let (status, diagnostics) = match finished {
            Ok(result) => result?,
            Err(interrupt) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill FFmpeg process: {}", e);
                }
                return Err(match interrupt {
                    Interrupt::Cancelled => {
                        info!("FFmpeg cancelled, killed process");
                        MediaError::Cancelled
                    }
                    Interrupt::TimedOut => {
                        let limit = self.timeout.unwrap_or_default();
                        warn!("FFmpeg timed out after {:?}, killed process", limit);
                        MediaError::Timeout(limit)
                    }
                });
            }
        };

        if status.success() {
            Ok(RunOutcome {
                exit_code: status.code(),
                diagnostics: diagnostics.lines.into_iter().collect(),
                last_frame: diagnostics.last_frame,
            })
        } else {
            let message = match status.code() {
                Some(code) => format!("FFmpeg exited with status {}", code),
                None => "FFmpeg terminated by signal".to_string(),
            };
            let stderr = diagnostics.lines.into_iter().collect::<Vec<_>>().join("\n");
            Err(MediaError::tool_failed(message, Some(stderr), status.code()))
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Read the diagnostic stream to EOF, one line at a time.
    async fn read_diagnostics<R>(&self, mut stream: R, progress: &MonotonicSink<'_>) -> MediaResult<Diagnostics>
    where
        R: AsyncRead + Unpin,
    {
        let mut splitter = LineSplitter::new();
        let mut diagnostics = Diagnostics::new(self.diagnostic_tail);
        let mut buf = [0u8; 4096];

        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            for line in splitter.push(&buf[..n]) {
                diagnostics.handle(line, progress);
            }
        }
        if let Some(line) = splitter.finish() {
            diagnostics.handle(line, progress);
        }

        Ok(diagnostics)
    }
}

/// Bounded tail of diagnostic output plus the last frame counter.
struct Diagnostics {
    lines: VecDeque<String>,
    capacity: usize,
    last_frame: Option<u64>,
}

impl Diagnostics {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            last_frame: None,
        }
    }

    fn handle(&mut self, line: String, progress: &MonotonicSink<'_>) {
        let parsed = parse_progress_line(&line);
        match parsed {
            ProgressLine::Frame(frame) => self.last_frame = Some(frame),
            ProgressLine::Unparsable => debug!("Unparsable FFmpeg progress line: {}", line),
            ProgressLine::Other => {
                debug!(target: "kfx_media::ffmpeg", "{}", line);
                if self.lines.len() == self.capacity {
                    self.lines.pop_front();
                }
                self.lines.push_back(line);
            }
        }
        progress.line(parsed);
    }
}

async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without cancelling
            return std::future::pending().await;
        }
    }
}

async fn wait_timeout(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-ffmpeg");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_run_streams_progress() {
        let dir = TempDir::new().unwrap();
        let tool = write_script(
            dir.path(),
            r#"printf 'Input #0, mov\n' >&2
printf 'frame=   10 fps=0.0\rframe=  200 fps=50\r' >&2
printf 'frame=  400 fps=60\n' >&2
exit 0"#,
        );

        let seen = Mutex::new(Vec::new());
        let record = |p: u8| seen.lock().unwrap().push(p);
        let sink = MonotonicSink::new(&record, false);

        let cmd = FfmpegCommand::new(&tool, "in.mp4", "out/%03d.png");
        let outcome = FfmpegRunner::new().run(&cmd, &sink).await.unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.last_frame, Some(400));
        assert_eq!(outcome.diagnostics, vec!["Input #0, mov"]);
        assert_eq!(*seen.lock().unwrap(), vec![20, 21, 40, 60]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let tool = write_script(
            dir.path(),
            "echo 'in.mp4: Invalid data found when processing input' >&2\nexit 1",
        );

        let noop = NoopProgress;
        let sink = MonotonicSink::new(&noop, false);
        let cmd = FfmpegCommand::new(&tool, "in.mp4", "out/%03d.png");
        let err = FfmpegRunner::new().run(&cmd, &sink).await.unwrap_err();

        match &err {
            MediaError::ToolFailed { exit_code, stderr, .. } => {
                assert_eq!(*exit_code, Some(1));
                assert!(stderr.as_deref().unwrap().contains("Invalid data"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.detail().contains("Invalid data"));
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let noop = NoopProgress;
        let sink = MonotonicSink::new(&noop, false);
        let cmd = FfmpegCommand::new("/nonexistent/ffmpeg-binary", "in.mp4", "out.png");
        let err = FfmpegRunner::new().run(&cmd, &sink).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let tool = write_script(dir.path(), "exec sleep 30");

        let noop = NoopProgress;
        let sink = MonotonicSink::new(&noop, false);
        let cmd = FfmpegCommand::new(&tool, "in.mp4", "out.png");
        let err = FfmpegRunner::new()
            .with_timeout(Duration::from_millis(200))
            .run(&cmd, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout(limit) if limit == Duration::from_millis(200)));
        assert_eq!(err.to_string(), "Operation timed out after 200ms");
    }

    #[tokio::test]
    async fn test_cancellation_kills_process() {
        let dir = TempDir::new().unwrap();
        let tool = write_script(dir.path(), "exec sleep 30");
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_tx.send(true).ok();
        });

        let noop = NoopProgress;
        let sink = MonotonicSink::new(&noop, false);
        let cmd = FfmpegCommand::new(&tool, "in.mp4", "out.png");
        let err = FfmpegRunner::new()
            .with_cancel(cancel_rx)
            .run(&cmd, &sink)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
    }
}
