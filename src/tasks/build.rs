use super::{
    Cleanup, Deferred, OptimizeMount, Provisioner, RemoveDesktopFiles, RemoveExtraTtys,
    ReplaceSshd, SetPackages, SetStaticIp, SetSwapSize, Task, UpdateOs, UseNoopScheduler,
};
use crate::packages::read_keep_list;
use anyhow::Context;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Turns a freshly flashed Raspbian into a lean headless server in one go.
///
/// The OS update runs first and reboots on its own, so that everything after it runs on the
/// upgraded system. Every later step runs inside one guarded operation: whatever the steps
/// request, the apt cache is cleaned once and then the host reboots once, at the very end.
#[derive(Clone, Debug)]
pub struct BuildSystem {
    /// The keep-list for [SetPackages].
    pub packages: PathBuf,

    /// If set, `eth0` gets this static address.
    pub static_ip: Option<Ipv4Addr>,

    /// Swap file size in MB.
    pub swap_size_mb: u32,
}

impl BuildSystem {
    /// Every step after the OS update, in order.
    fn steps(&self) -> Vec<Box<dyn Task>> {
        let mut steps: Vec<Box<dyn Task>> = vec![
            Box::new(RemoveDesktopFiles),
            Box::new(SetPackages {
                keep_list: self.packages.clone(),
            }),
            Box::new(ReplaceSshd::default()),
        ];
        if let Some(address) = self.static_ip {
            steps.push(Box::new(SetStaticIp::new(address)));
        }
        steps.push(Box::new(OptimizeMount));
        steps.push(Box::new(UseNoopScheduler));
        steps.push(Box::new(RemoveExtraTtys));
        steps.push(Box::new(SetSwapSize {
            size_mb: Some(self.swap_size_mb),
            ..Default::default()
        }));
        steps.push(Box::new(Cleanup));
        steps
    }
}

impl Task for BuildSystem {
    fn name(&self) -> &'static str {
        "build-system"
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        // Fail before touching the host if the list can't be read.
        read_keep_list(&self.packages).context("cannot build the system")?;

        p.run(&UpdateOs)?;

        p.guarded(&[Deferred::Restart, Deferred::AptClean], || {
            for step in self.steps() {
                p.run(step.as_ref())?;
            }
            Ok(())
        })
    }
}
