//! Runs commands over SSH using the [openssh] crate.
//!
//! Connections are multiplexed through the system's OpenSSH client, so the user's
//! `~/.ssh/config`, agent, and known hosts all apply. Configure the login user and key there.

use super::{Invocation, Remote, RemoteError};
use crate::report::{Report, Reporter};
use anyhow::Context;
use log::{debug, info};
use openssh::{KnownHosts, Session};
use std::cell::RefCell;
use std::process::Output;
use std::thread;
use std::time::Duration;
use tokio::runtime::{self, Runtime};

/// A [Remote] reached over SSH.
///
/// piprov is strictly sequential, so rather than making every task async, this type owns a small
/// single-threaded runtime and blocks on it for each round trip.
pub struct SshRemote<R: Report = Reporter> {
    host: String,

    /// How long to wait after a reboot before reconnecting.
    reboot_wait: Duration,

    runtime: Runtime,

    /// `None` between dropping the connection for a reboot and reconnecting.
    session: RefCell<Option<Session>>,

    reporter: R,
}

impl SshRemote {
    /// Connects to `host`, which may be anything `ssh` accepts, e.g. `pi@raspberrypi.local` or an
    /// alias from `~/.ssh/config`. Unknown host keys are added to the known hosts file.
    pub fn connect(host: impl Into<String>, reboot_wait: Duration) -> anyhow::Result<Self> {
        Self::connect_with_reporter(host, reboot_wait, Reporter)
    }
}

impl<R: Report> SshRemote<R> {
    /// Like [SshRemote::connect], but reports through `reporter`.
    pub fn connect_with_reporter(
        host: impl Into<String>,
        reboot_wait: Duration,
        reporter: R,
    ) -> anyhow::Result<Self> {
        let host = host.into();
        let runtime = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start the SSH runtime")?;
        let session = open_session(&runtime, &host)?;

        Ok(SshRemote {
            host,
            reboot_wait,
            runtime,
            session: RefCell::new(Some(session)),
            reporter,
        })
    }
}

fn open_session(runtime: &Runtime, host: &str) -> anyhow::Result<Session> {
    info!("[{host}] connecting");
    runtime
        .block_on(Session::connect_mux(host, KnownHosts::Add))
        .with_context(|| format!("[{host}] failed to connect"))
}

impl<R: Report> Remote for SshRemote<R> {
    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output> {
        let session = self.session.borrow();
        let session = session
            .as_ref()
            .ok_or_else(|| RemoteError::NotConnected(self.host.clone()))?;

        debug!("[{}] sh -c {:?}", self.host, invocation.script);
        self.reporter.starting(&self.host, invocation)?;

        let mut command = match invocation.sudo {
            true => {
                let mut command = session.command("sudo");
                command.arg("sh");
                command
            }
            false => session.command("sh"),
        };
        command.arg("-c").arg(&invocation.script);

        let output = self
            .runtime
            .block_on(command.output())
            .with_context(|| format!("[{}] failed to run {}", self.host, invocation.title()))?;

        self.reporter.report(&self.host, invocation, &output)?;
        Ok(output)
    }

    fn reboot(&self) -> anyhow::Result<()> {
        let invocation = Invocation::sudo("reboot");
        self.reporter.starting(&self.host, &invocation)?;

        if let Some(session) = self.session.borrow_mut().take() {
            // The host usually drops the connection before `reboot` can exit, so neither the
            // command's outcome nor the close is meaningful.
            let outcome = self.runtime.block_on(async move {
                {
                    let mut command = session.command("sudo");
                    command.arg("reboot");
                    let _ = command.output().await;
                }
                session.close().await
            });
            debug!("[{}] connection closed for reboot: {outcome:?}", self.host);
        }

        info!(
            "[{}] waiting {}s for the host to come back",
            self.host,
            self.reboot_wait.as_secs(),
        );
        thread::sleep(self.reboot_wait);

        let session = open_session(&self.runtime, &self.host)?;
        *self.session.borrow_mut() = Some(session);
        info!("[{}] back after reboot", self.host);
        Ok(())
    }
}
