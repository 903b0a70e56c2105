/* src/reload.rs */

use crate::error::{Result, ZoneGenError};
use fancy_log::{LogLevel, log};
use std::future::Future;
use tokio::process::Command;

/// Asks the running DNS daemon to pick up the regenerated config.
pub trait DaemonReloader {
    fn reload(&self) -> impl Future<Output = Result<()>>;
}

/// Runs a configured command such as `rndc reload`.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    pub fn parse(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| ZoneGenError::Config("reload_command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl DaemonReloader for CommandReloader {
    async fn reload(&self) -> Result<()> {
        log(
            LogLevel::Info,
            &format!("Reloading daemon: {} {}", self.program, self.args.join(" ")),
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| ZoneGenError::Reload(format!("failed to start {}: {}", self.program, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ZoneGenError::Reload(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}
