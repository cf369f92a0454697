//! Runs commands on the machine piprov itself is running on.
//!
//! Useful when provisioning a board from its own console, before SSH is set up the way you want
//! it.

use super::{Invocation, Remote};
use crate::report::{Report, Reporter};
use anyhow::Context;
use log::debug;
use std::process::{Command, Output};

/// A [Remote] that is really the local machine.
#[derive(Clone, Debug)]
pub struct LocalRemote<R: Report = Reporter> {
    host: String,
    reporter: R,
}

impl LocalRemote {
    /// Creates a [LocalRemote] that reports to stdout and stderr.
    pub fn new() -> Self {
        Self::with_reporter(Reporter)
    }
}

impl Default for LocalRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Report> LocalRemote<R> {
    /// Creates a [LocalRemote] that reports through `reporter`.
    pub fn with_reporter(reporter: R) -> Self {
        LocalRemote {
            host: "localhost".to_string(),
            reporter,
        }
    }
}

impl<R: Report> Remote for LocalRemote<R> {
    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output> {
        debug!("[{}] sh -c {:?}", self.host, invocation.script);
        self.reporter.starting(&self.host, invocation)?;

        let mut command = match invocation.sudo {
            true => {
                let mut command = Command::new("sudo");
                command.arg("sh");
                command
            }
            false => Command::new("sh"),
        };
        let output = command
            .arg("-c")
            .arg(&invocation.script)
            .output()
            .with_context(|| format!("failed to start command: {}", invocation.title()))?;

        self.reporter.report(&self.host, invocation, &output)?;
        Ok(output)
    }

    fn reboot(&self) -> anyhow::Result<()> {
        // There is nothing to wait for: if this succeeds, we are about to be killed.
        self.sudo("reboot")?;
        Ok(())
    }
}
