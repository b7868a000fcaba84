use crate::error::ToolError;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs an external tool to completion and returns its standard output.
///
/// Output streams are redirected to anonymous temporary files rather than pipes, so that a
/// chatty tool can never block on a full pipe while we are polling it.
///
/// # Errors
///
/// * `ToolError::Spawn` if the process cannot be started (e.g. it is not on `PATH`)
/// * `ToolError::Timeout` if it runs longer than `timeout`; the process is killed
/// * `ToolError::ExitStatus` on a non-zero exit status, with its standard error
pub fn run_tool(tool: &str, cmd: &mut Command, timeout: Duration) -> Result<String, ToolError> {
    let mut stdout = tempfile::tempfile().map_err(|e| ToolError::io(tool, e))?;
    let mut stderr = tempfile::tempfile().map_err(|e| ToolError::io(tool, e))?;

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::from(
            stdout.try_clone().map_err(|e| ToolError::io(tool, e))?,
        ))
        .stderr(Stdio::from(
            stderr.try_clone().map_err(|e| ToolError::io(tool, e))?,
        ))
        .spawn()
        .map_err(|source| ToolError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    let start = Instant::now();
    let status = loop {
        match child.try_wait().map_err(|e| ToolError::io(tool, e))? {
            Some(status) => break status,
            None if start.elapsed() >= timeout => {
                // the process may exit between the check and the kill; both results are fine
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout {
                    tool: tool.to_string(),
                    secs: timeout.as_secs_f64(),
                });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    };

    if !status.success() {
        return Err(ToolError::ExitStatus {
            tool: tool.to_string(),
            code: status.code(),
            stderr: read_all(tool, &mut stderr)?,
        });
    }

    read_all(tool, &mut stdout)
}

fn read_all(tool: &str, file: &mut File) -> Result<String, ToolError> {
    let mut buf = Vec::new();
    file.seek(SeekFrom::Start(0))
        .and_then(|_| file.read_to_end(&mut buf))
        .map_err(|e| ToolError::io(tool, e))?;

    String::from_utf8(buf).map_err(|_| ToolError::malformed(tool, "output is not valid UTF-8"))
}
