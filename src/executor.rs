//! A tool for executing commands.

use crate::error::{Error, Result};
use log::debug;
use std::path::PathBuf;
use std::process::Stdio;

/// Represents a command executor.
///
/// # Example
///
/// ```rust,no_run
/// # use ytalbum::executor::Executor;
/// # use std::path::PathBuf;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = Executor::new(PathBuf::from("yt-dlp"), vec!["--version".to_string()]);
///
/// let output = executor.execute().await?;
/// println!("Output: {}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    /// The path to the command executable.
    pub executable_path: PathBuf,
    /// The arguments to pass to the command.
    pub args: Vec<String>,
}

/// Represents the output of a process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutput {
    /// The stdout of the process.
    pub stdout: String,
    /// The stderr of the process.
    pub stderr: String,
    /// The exit code of the process.
    pub code: i32,
}

impl Executor {
    pub fn new(executable_path: PathBuf, args: Vec<String>) -> Self {
        Self {
            executable_path,
            args,
        }
    }

    /// Executes the command and returns the output.
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be executed or
    /// exited with a failure code.
    pub async fn execute(&self) -> Result<ProcessOutput> {
        debug!("Executing command: {:?}", self);

        let mut command = tokio::process::Command::new(&self.executable_path);
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command.kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(0x08000000);
        }

        command.args(&self.args);
        let child = command.spawn().map_err(|e| {
            Error::Command(format!(
                "failed to start {}: {}",
                self.executable_path.display(),
                e
            ))
        })?;

        // wait_with_output drains both pipes, so large JSON on stdout cannot block the child.
        let output = child.wait_with_output().await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        let code = output.status.code().unwrap_or(-1);
        if output.status.success() {
            return Ok(ProcessOutput {
                stdout,
                stderr,
                code,
            });
        }

        Err(Error::Command(format!(
            "Process failed with code {}: {}",
            code,
            stderr.trim()
        )))
    }
}
