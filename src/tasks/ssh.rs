use super::{Deferred, Provisioner, Task};
use crate::edit::{edit_file, LineEdit};
use log::warn;

/// Replaces the OpenSSH server with Dropbear, which needs far less memory.
///
/// OpenSSH is moved to port 23 rather than removed, so that the session doing the replacing
/// survives. Remove `openssh-server` by hand once Dropbear is known to work.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaceSshd {
    /// Refuse root logins (`-w`).
    pub deny_root: bool,

    /// Refuse password logins (`-s`).
    pub deny_passwords: bool,
}

impl ReplaceSshd {
    /// Dropbear's extra command-line arguments.
    fn extra_args(&self) -> String {
        let mut args = vec![];
        if self.deny_root {
            args.push("-w");
        }
        if self.deny_passwords {
            args.push("-s");
        }
        args.join(" ")
    }
}

impl Task for ReplaceSshd {
    fn name(&self) -> &'static str {
        "replace-sshd"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::AptClean]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let remote = p.remote();

        remote.sudo("apt-get install -qy dropbear openssh-client")?;
        p.apt_clean().request();

        warn!(
            "[{}] moving the OpenSSH server to port 23; remove openssh-server manually",
            remote.host(),
        );
        edit_file(
            remote,
            "/etc/ssh/sshd_config",
            &[LineEdit::ensure(r"^#?\s*Port\s+[0-9]+", "Port 23")?],
        )?;
        remote.sudo("service ssh restart")?;

        edit_file(
            remote,
            "/etc/default/dropbear",
            &[
                LineEdit::ensure(r"^#?\s*NO_START=", "NO_START=0")?,
                LineEdit::ensure(
                    r"^#?\s*DROPBEAR_EXTRA_ARGS=",
                    format!("DROPBEAR_EXTRA_ARGS=\"{}\"", self.extra_args()),
                )?,
            ],
        )?;
        remote.sudo("service dropbear start")?;
        Ok(())
    }
}
