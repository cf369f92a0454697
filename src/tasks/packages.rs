use super::{quote_all, Deferred, Provisioner, Task};
use crate::packages::{parse_selections, read_keep_list, PackageDiff};
use log::info;
use std::path::PathBuf;

/// Makes the host's installed packages match a keep-list: everything installed but not listed is
/// purged, and everything listed but not installed is installed.
#[derive(Clone, Debug)]
pub struct SetPackages {
    /// A local file with one package name per line. See [read_keep_list].
    pub keep_list: PathBuf,
}

impl Task for SetPackages {
    fn name(&self) -> &'static str {
        "set-packages"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::AptClean]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let remote = p.remote();
        let wanted = read_keep_list(&self.keep_list)?;
        let installed = parse_selections(&remote.sudo_quiet("dpkg --get-selections")?);

        let diff = PackageDiff::new(&installed, &wanted);
        if diff.is_empty() {
            info!("[{}] installed packages already match the list", remote.host());
            return Ok(());
        }

        if !diff.purge.is_empty() {
            info!("[{}] purging {} packages", remote.host(), diff.purge.len());
            remote.sudo(&format!("apt-get purge -qy {}", quote_all(&diff.purge)?))?;
            p.apt_clean().request();
        }
        if !diff.install.is_empty() {
            info!("[{}] installing {} packages", remote.host(), diff.install.len());
            remote.sudo(&format!("apt-get install -qy {}", quote_all(&diff.install)?))?;
            p.apt_clean().request();
        }
        Ok(())
    }
}
