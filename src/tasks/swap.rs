use super::{Provisioner, Task};
use crate::edit::{edit_file, LineEdit};

/// Sizes (or disables) the swap file and tunes how eagerly the kernel uses it.
///
/// Unset fields fall back to the `swap` section of the configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct SetSwapSize {
    /// Swap file size in MB. Zero turns swap off.
    pub size_mb: Option<u32>,
    pub swappiness: Option<u32>,
    pub cache_pressure: Option<u32>,
}

impl Task for SetSwapSize {
    fn name(&self) -> &'static str {
        "set-swapsize"
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let remote = p.remote();
        let defaults = &p.config().swap;
        let size_mb = self.size_mb.unwrap_or(defaults.size_mb);
        let swappiness = self.swappiness.unwrap_or(defaults.swappiness);
        let cache_pressure = self.cache_pressure.unwrap_or(defaults.cache_pressure);

        match size_mb {
            0 => {
                remote.sudo("swapoff -a")?;
            }
            size_mb => {
                remote.write_file(
                    "/etc/dphys-swapfile",
                    &format!("CONF_SWAPSIZE={size_mb}\n"),
                    None,
                )?;
                remote.sudo("dphys-swapfile setup")?;
                remote.sudo("dphys-swapfile swapon")?;
            }
        }

        edit_file(
            remote,
            "/etc/sysctl.conf",
            &[
                LineEdit::ensure(
                    r"^#?\s*vm\.swappiness\s*=",
                    format!("vm.swappiness={swappiness}"),
                )?,
                LineEdit::ensure(
                    r"^#?\s*vm\.vfs_cache_pressure\s*=",
                    format!("vm.vfs_cache_pressure={cache_pressure}"),
                )?,
            ],
        )?;
        Ok(())
    }
}
