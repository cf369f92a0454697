//! Provisioning tasks and the context they run in.
//!
//! A [Task] does one job on the host, e.g. setting the swap size. Tasks that leave the host
//! needing a reboot or an apt cache clean don't do those things themselves. Instead they ask for
//! them through the [Provisioner]'s deferred actions ([Provisioner::apt_clean],
//! [Provisioner::restart]), and each task declares which deferred actions guard it
//! ([Task::defers]).
//!
//! [Provisioner::run] applies those guards around the task, outermost first. Run on its own, a
//! task therefore fires whatever it requested as soon as it finishes. Run inside a larger guarded
//! operation, such as [BuildSystem], the same task only requests, and the outermost operation
//! fires each action once at the end.

pub mod boot;
pub mod build;
pub mod network;
pub mod packages;
pub mod ssh;
pub mod swap;
pub mod system;

#[doc(inline)]
pub use boot::{OverclockProfile, SetOverclock};
#[doc(inline)]
pub use build::BuildSystem;
#[doc(inline)]
pub use network::SetStaticIp;
#[doc(inline)]
pub use packages::SetPackages;
#[doc(inline)]
pub use ssh::ReplaceSshd;
#[doc(inline)]
pub use swap::SetSwapSize;
#[doc(inline)]
pub use system::{
    DisableIpv6, OptimizeMount, RemoveDesktopFiles, RemoveExtraTtys, UpdateOs, UseNoopScheduler,
};

use crate::config::Config;
use crate::defer::DeferredAction;
use crate::remote::{quote, Remote};
use log::info;

/// The deferred actions a [Provisioner] owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deferred {
    /// Cleans the apt cache and removes orphaned packages.
    AptClean,

    /// Reboots the host.
    Restart,
}

/// One provisioning job.
pub trait Task {
    /// The task's name, as used on the command line.
    fn name(&self) -> &'static str;

    /// The deferred actions that guard this task, outermost first.
    fn defers(&self) -> &'static [Deferred] {
        &[]
    }

    /// Does the job. Don't call this directly; use [Provisioner::run], which applies
    /// [Self::defers].
    fn run(&self, p: &Provisioner) -> anyhow::Result<()>;
}

/// Everything a [Task] needs: the host, the configuration, and the session's deferred actions.
pub struct Provisioner<'r> {
    remote: &'r dyn Remote,
    config: Config,
    apt_clean: DeferredAction<'r>,
    restart: DeferredAction<'r>,
}

impl<'r> Provisioner<'r> {
    /// Creates a [Provisioner] for `remote`, with nothing pending.
    pub fn new(remote: &'r dyn Remote, config: Config) -> Self {
        let apt_clean_command = config.apt_clean.clone();

        Provisioner {
            remote,
            config,
            apt_clean: DeferredAction::new("apt clean", move || {
                remote.sudo(&apt_clean_command)?;
                Ok(())
            }),
            restart: DeferredAction::new("restart", move || remote.reboot()),
        }
    }

    pub fn remote(&self) -> &'r dyn Remote {
        self.remote
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cleans the apt cache when fired.
    pub fn apt_clean(&self) -> &DeferredAction<'r> {
        &self.apt_clean
    }

    /// Reboots the host when fired.
    pub fn restart(&self) -> &DeferredAction<'r> {
        &self.restart
    }

    /// Looks up one of the session's deferred actions.
    pub fn deferred(&self, which: Deferred) -> &DeferredAction<'r> {
        match which {
            Deferred::AptClean => &self.apt_clean,
            Deferred::Restart => &self.restart,
        }
    }

    /// Runs `task`, guarded by the deferred actions it declares.
    pub fn run(&self, task: &dyn Task) -> anyhow::Result<()> {
        info!("[{}] ===> {}", self.remote.host(), task.name());
        self.guarded(task.defers(), || task.run(self))
    }

    /// Runs `operation` guarded by `defers`, outermost first. Each deferred action that
    /// `operation` requests fires once `operation` returns, innermost first, unless an enclosing
    /// guarded call on the same action is still active.
    pub fn guarded<T>(
        &self,
        defers: &[Deferred],
        operation: impl FnOnce() -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        match defers.split_first() {
            Some((outer, inner)) => self
                .deferred(*outer)
                .call(|| self.guarded(inner, operation)),
            None => operation(),
        }
    }
}

/// Fires any pending apt clean, then any pending restart.
///
/// Neither action is guarded here, so inside a guarded operation this does nothing and the
/// requests are held for the outermost guarded call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cleanup;

impl Task for Cleanup {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        p.apt_clean().run()?;
        p.restart().run()?;
        Ok(())
    }
}

/// Runs several tasks in order as one guarded operation.
///
/// Whatever the tasks request, the apt cache is cleaned once and the host reboots once, after the
/// last task, even if a task fails part way through.
pub struct Sequence {
    pub tasks: Vec<Box<dyn Task>>,
}

impl Task for Sequence {
    fn name(&self) -> &'static str {
        "run"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart, Deferred::AptClean]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        for task in &self.tasks {
            p.run(task.as_ref())?;
        }
        Ok(())
    }
}

/// Quotes each of `values` for the remote shell and joins them with spaces.
fn quote_all<'v>(values: impl IntoIterator<Item = &'v String>) -> anyhow::Result<String> {
    let quoted = values
        .into_iter()
        .map(|value| quote(value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(quoted.join(" "))
}
