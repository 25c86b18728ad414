//! External tool execution
//!
//! Every NCO invocation goes through [`ToolRunner`] so the pipeline can be
//! driven against real binaries or an in-process fake.

use crate::errors::{Result, SplitError};
use std::process::Command;
use tracing::debug;

/// Captured result of one external tool invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Short human-readable description of a failed invocation
    pub fn failure_summary(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit status {}", code)
        } else {
            format!("exit status {}: {}", code, stderr)
        }
    }
}

/// Runs an external program to completion and captures its output
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput>;
}

/// Runs tools as child processes of the current process
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput> {
        debug!(program, ?args, "running external tool");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| SplitError::ToolLaunch {
                program: program.to_string(),
                source,
            })?;

        Ok(ToolOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Names or paths of the NCO binaries
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct NcoTools {
    pub ncks: String,
    pub ncdump: String,
}

impl Default for NcoTools {
    fn default() -> Self {
        Self {
            ncks: "ncks".to_string(),
            ncdump: "ncdump".to_string(),
        }
    }
}
