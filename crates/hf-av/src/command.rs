//! Builder for executing external tool commands with timeout and
//! cancellation support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use hf_core::Error;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use hf_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> hf_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-of").arg("json")
///     .arg("-show_streams")
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
    stdin_chunks: Option<Vec<Bytes>>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            stdin_chunks: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Provide data to be written to the process's stdin.
    pub fn stdin(&mut self, data: Vec<u8>) -> &mut Self {
        self.stdin_chunks = Some(vec![Bytes::from(data)]);
        self
    }

    /// Provide stdin as a sequence of buffers written back to back.
    ///
    /// Used for raw video frames so the batch never has to be concatenated.
    pub fn stdin_chunks(&mut self, chunks: Vec<Bytes>) -> &mut Self {
        self.stdin_chunks = Some(chunks);
        self
    }

    /// The arguments collected so far.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// - Returns [`Error::Tool`] if the process times out (message includes
    ///   the timeout duration).
    /// - Returns [`Error::Tool`] if the process exits with a non-zero status
    ///   (message includes stderr).
    /// - Returns [`Error::Tool`] if spawning the process fails.
    pub async fn execute(&self) -> hf_core::Result<ToolOutput> {
        self.run(None).await
    }

    /// Like [`execute`](Self::execute), but kills the process as soon as
    /// `cancel` fires and returns [`Error::Cancelled`].
    pub async fn execute_with_cancel(
        &self,
        cancel: &CancellationToken,
    ) -> hf_core::Result<ToolOutput> {
        self.run(Some(cancel)).await
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    async fn run(&self, cancel: Option<&CancellationToken>) -> hf_core::Result<ToolOutput> {
        let program_name = self.program_name();

        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Err(Error::Cancelled(format!("{program_name} not started")));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(if self.stdin_chunks.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Dropping the wait future (timeout or cancel) must take the process with it.
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        // Feed stdin from a separate task so a chatty stderr can't deadlock us.
        let writer = match (self.stdin_chunks.clone(), child.stdin.take()) {
            (Some(chunks), Some(mut stdin)) => Some(tokio::spawn(async move {
                for chunk in chunks {
                    stdin.write_all(&chunk).await?;
                }
                stdin.shutdown().await
            })),
            _ => None,
        };

        let wait = tokio::time::timeout(self.timeout, child.wait_with_output());
        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    r = wait => r,
                    _ = token.cancelled() => {
                        if let Some(w) = writer {
                            w.abort();
                        }
                        tracing::debug!("{program_name} killed by cancellation");
                        return Err(Error::Cancelled(format!("{program_name} killed")));
                    }
                }
            }
            None => wait.await,
        };

        match result {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(Error::tool(
                        program_name,
                        format!(
                            "exited with status {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                if let Some(w) = writer {
                    match w.await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            return Err(Error::tool(
                                program_name,
                                format!("failed to write stdin: {e}"),
                            ));
                        }
                        Err(e) => {
                            return Err(Error::Internal(format!("stdin writer join error: {e}")));
                        }
                    }
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(Error::tool(
                program_name,
                format!("I/O error waiting for process: {e}"),
            )),
            Err(_elapsed) => {
                if let Some(w) = writer {
                    w.abort();
                }
                Err(Error::tool(
                    program_name,
                    format!("timed out after {:?}", self.timeout),
                ))
            }
        }
    }
}
