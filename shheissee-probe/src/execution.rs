//! Command execution for the discovery adapters
//!
//! Handles:
//! - PATH lookup so a missing utility is reported as unavailable instead of failing
//! - One-shot commands bound to a deadline, output captured (stdout + stderr)
//! - Long-running commands streamed line by line through a bounded channel

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SourceError;

/// Capacity of the line channel used by streaming commands
pub const LINE_BUFFER: usize = 100;

/// Outcome of a finished command
#[derive(Debug)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u128,
}

/// Runs discovery utilities
pub struct CommandExecutor;

impl CommandExecutor {
    /// True when `program` resolves to a file on PATH (or is a path that exists)
    pub fn is_available(program: &str) -> bool {
        if program.contains('/') {
            return Path::new(program).is_file();
        }
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(program).is_file()))
            .unwrap_or(false)
    }

    /// Execute a command with a deadline, whatever its exit status
    pub async fn run(program: &str, args: &[&str], timeout: Duration) -> Result<ExecutionResult, SourceError> {
        if !Self::is_available(program) {
            return Err(SourceError::Unavailable(program.to_string()));
        }

        let start_time = Instant::now();
        debug!("Executing {} {:?} (timeout: {}s)", program, args, timeout.as_secs());

        let output = tokio::time::timeout(
            timeout,
            AsyncCommand::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| SourceError::Timeout(timeout))?
        .map_err(|e| SourceError::scan_failed(format!("{}: {}", program, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined_output = if stderr.is_empty() {
            stdout.to_string()
        } else {
            format!("{}\n{}", stdout, stderr)
        };

        Ok(ExecutionResult {
            success: output.status.success(),
            output: combined_output,
            exit_code: output.status.code(),
            execution_time_ms: start_time.elapsed().as_millis(),
        })
    }

    /// Execute a command and return its output, treating a non-zero exit as a scan failure
    pub async fn capture(program: &str, args: &[&str], timeout: Duration) -> Result<String, SourceError> {
        let result = Self::run(program, args, timeout).await?;
        if result.success {
            Ok(result.output)
        } else {
            Err(SourceError::scan_failed(format!(
                "{} exited with {:?}: {}",
                program,
                result.exit_code,
                result.output.trim()
            )))
        }
    }

    /// Spawn a long-running command and forward its stdout line by line.
    ///
    /// The channel closes when the child's stdout ends. Dropping the receiver
    /// stops the forwarding task, which kills the child.
    pub fn stream_lines(program: &str, args: &[&str]) -> Result<mpsc::Receiver<String>, SourceError> {
        if !Self::is_available(program) {
            return Err(SourceError::Unavailable(program.to_string()));
        }

        let mut child = AsyncCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::scan_failed(format!("{}: {}", program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::scan_failed(format!("{}: stdout not captured", program)))?;

        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let program = program.to_string();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if tx.send(line).await.is_err() {
                            debug!("{} stream consumer went away", program);
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("{} stream read error: {}", program, e);
                        break;
                    }
                }
            }
            // child is killed on drop if it is still running
            drop(child);
            debug!("{} stream closed", program);
        });

        Ok(rx)
    }
}
