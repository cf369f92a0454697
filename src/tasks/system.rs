//! Small tasks that tune the operating system.

use super::{Deferred, Provisioner, Task};
use crate::edit::{edit_file, LineEdit};
use log::info;

/// Removes the desktop leftovers of a stock Raspbian image from the login user's home directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveDesktopFiles;

impl Task for RemoveDesktopFiles {
    fn name(&self) -> &'static str {
        "remove-desktop-files"
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        p.remote().sudo("rm -rf Desktop python_games; true")?;
        Ok(())
    }
}

/// Upgrades every package, then cleans the apt cache and reboots.
#[derive(Clone, Copy, Debug, Default)]
pub struct UpdateOs;

impl Task for UpdateOs {
    fn name(&self) -> &'static str {
        "update-os"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart, Deferred::AptClean]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        p.remote().sudo(
            "apt-get -qy update && apt-get -qy dist-upgrade \
            && apt-get -qy autoremove && apt-get -qy autoclean",
        )?;
        p.apt_clean().request();
        p.restart().request();
        Ok(())
    }
}

/// Stops the root file systems from recording access times on directories as well as files.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimizeMount;

impl Task for OptimizeMount {
    fn name(&self) -> &'static str {
        "optimize-mount"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        // Matching the optional suffix makes the replacement a no-op on lines already done.
        let edit = LineEdit::replace(
            r"\bdefaults,noatime(,nodiratime)?\b",
            "defaults,noatime,nodiratime",
        )?;
        if edit_file(p.remote(), "/etc/fstab", &[edit])? {
            p.restart().request();
        }
        Ok(())
    }
}

/// Disables IPv6 in the kernel and removes IPv6 entries from `/etc/hosts`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisableIpv6;

impl DisableIpv6 {
    const SYSCTL_FILE: &'static str = "/etc/sysctl.d/disableipv6.conf";
    const SYSCTL: &'static str = "net.ipv6.conf.all.disable_ipv6=1\n";
}

impl Task for DisableIpv6 {
    fn name(&self) -> &'static str {
        "disable-ipv6"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let remote = p.remote();
        let mut changed = false;

        if remote.read_file(Self::SYSCTL_FILE)? != Self::SYSCTL {
            remote.write_file(Self::SYSCTL_FILE, Self::SYSCTL, None)?;
            changed = true;
        }

        changed |= edit_file(
            remote,
            "/etc/modprobe.d/blacklist",
            &[LineEdit::ensure_literal("blacklist ipv6")],
        )?;
        changed |= edit_file(remote, "/etc/hosts", &[LineEdit::comment("::")?])?;

        if changed {
            p.restart().request();
        }
        Ok(())
    }
}

/// Switches the kernel's I/O scheduler from `deadline` to `noop`, which suits SD cards better.
#[derive(Clone, Copy, Debug, Default)]
pub struct UseNoopScheduler;

impl Task for UseNoopScheduler {
    fn name(&self) -> &'static str {
        "use-noop-scheduler"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let edit = LineEdit::replace(r"\bdeadline\b", "noop")?;
        match edit_file(p.remote(), "/boot/cmdline.txt", &[edit])? {
            true => p.restart().request(),
            false => info!(
                "[{}] no deadline scheduler in /boot/cmdline.txt",
                p.remote().host(),
            ),
        }
        Ok(())
    }
}

/// Stops the gettys on ttys 2 through 6. Takes effect at the next boot.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoveExtraTtys;

impl Task for RemoveExtraTtys {
    fn name(&self) -> &'static str {
        "remove-extra-ttys"
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let edit = LineEdit::comment("[2-6]:23:respawn:/sbin/getty 38400 tty[2-6]")?;
        edit_file(p.remote(), "/etc/inittab", &[edit])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::remote::recorder::{Event, Recorder};

    #[test]
    fn remove_desktop_files() -> anyhow::Result<()> {
        let remote = Recorder::new("pi");
        Provisioner::new(&remote, Config::default()).run(&RemoveDesktopFiles)?;
        assert_eq!(vec!["rm -rf Desktop python_games; true"], remote.scripts());
        Ok(())
    }

    #[test]
    fn update_os_cleans_then_reboots() -> anyhow::Result<()> {
        let remote = Recorder::new("pi");
        let p = Provisioner::new(&remote, Config::default());
        p.run(&UpdateOs)?;

        let events = remote.events();
        assert_eq!(3, events.len(), "{events:#?}");
        assert!(
            matches!(&events[0], Event::Exec(i) if i.sudo && i.script.starts_with("apt-get -qy update && ")),
            "{events:#?}",
        );
        assert!(
            matches!(&events[1], Event::Exec(i) if i.script == "apt-get clean && apt-get autoremove -qy"),
            "{events:#?}",
        );
        assert_eq!(Event::Reboot, events[2]);
        assert!(!p.apt_clean().is_pending());
        assert!(!p.restart().is_pending());
        Ok(())
    }

    #[test]
    fn update_os_failure_skips_deferred_actions() {
        let remote = Recorder::new("pi").fail("dist-upgrade");
        let p = Provisioner::new(&remote, Config::default());
        assert!(p.run(&UpdateOs).is_err());
        assert_eq!(1, remote.events().len());
    }

    mod optimize_mount {
        use super::*;

        const FSTAB: &str = "proc /proc proc defaults 0 0\n\
            /dev/mmcblk0p1 /boot vfat defaults 0 2\n\
            /dev/mmcblk0p2 / ext4 defaults,noatime 0 1\n";

        #[test]
        fn adds_nodiratime_and_restarts() -> anyhow::Result<()> {
            let remote = Recorder::new("pi").with_file("/etc/fstab", FSTAB);
            Provisioner::new(&remote, Config::default()).run(&OptimizeMount)?;

            assert_eq!(
                "proc /proc proc defaults 0 0\n\
                /dev/mmcblk0p1 /boot vfat defaults 0 2\n\
                /dev/mmcblk0p2 / ext4 defaults,noatime,nodiratime 0 1\n",
                remote.file("/etc/fstab").unwrap(),
            );
            assert_eq!(Some(&Event::Reboot), remote.events().last());
            Ok(())
        }

        #[test]
        fn second_run_changes_nothing() -> anyhow::Result<()> {
            let remote = Recorder::new("pi").with_file("/etc/fstab", FSTAB);
            let p = Provisioner::new(&remote, Config::default());
            p.run(&OptimizeMount)?;
            let before = remote.events().len();

            p.run(&OptimizeMount)?;
            assert_eq!(before, remote.events().len());
            Ok(())
        }
    }

    mod disable_ipv6 {
        use super::*;

        #[test]
        fn works() -> anyhow::Result<()> {
            let remote = Recorder::new("pi")
                .with_file("/etc/hosts", "127.0.0.1\tlocalhost\n::1\t\tlocalhost ip6-localhost\n");
            Provisioner::new(&remote, Config::default()).run(&DisableIpv6)?;

            assert_eq!(
                "net.ipv6.conf.all.disable_ipv6=1\n",
                remote.file("/etc/sysctl.d/disableipv6.conf").unwrap(),
            );
            assert_eq!(
                "blacklist ipv6\n",
                remote.file("/etc/modprobe.d/blacklist").unwrap(),
            );
            assert_eq!(
                "127.0.0.1\tlocalhost\n#::1\t\tlocalhost ip6-localhost\n",
                remote.file("/etc/hosts").unwrap(),
            );
            assert_eq!(Some(&Event::Reboot), remote.events().last());
            Ok(())
        }

        #[test]
        fn already_disabled() -> anyhow::Result<()> {
            let remote = Recorder::new("pi")
                .with_file(DisableIpv6::SYSCTL_FILE, DisableIpv6::SYSCTL)
                .with_file("/etc/modprobe.d/blacklist", "blacklist ipv6\n")
                .with_file("/etc/hosts", "127.0.0.1\tlocalhost\n");
            Provisioner::new(&remote, Config::default()).run(&DisableIpv6)?;
            assert!(remote.events().is_empty(), "{:#?}", remote.events());
            Ok(())
        }
    }

    mod use_noop_scheduler {
        use super::*;

        #[test]
        fn replaces_deadline() -> anyhow::Result<()> {
            let remote = Recorder::new("pi").with_file(
                "/boot/cmdline.txt",
                "console=tty1 root=/dev/mmcblk0p2 elevator=deadline rootwait\n",
            );
            Provisioner::new(&remote, Config::default()).run(&UseNoopScheduler)?;

            assert_eq!(
                "console=tty1 root=/dev/mmcblk0p2 elevator=noop rootwait\n",
                remote.file("/boot/cmdline.txt").unwrap(),
            );
            assert_eq!(Some(&Event::Reboot), remote.events().last());
            Ok(())
        }

        #[test]
        fn no_deadline_no_restart() -> anyhow::Result<()> {
            let remote = Recorder::new("pi")
                .with_file("/boot/cmdline.txt", "console=tty1 elevator=noop rootwait\n");
            Provisioner::new(&remote, Config::default()).run(&UseNoopScheduler)?;
            assert!(remote.events().is_empty());
            Ok(())
        }
    }

    #[test]
    fn remove_extra_ttys() -> anyhow::Result<()> {
        let remote = Recorder::new("pi").with_file(
            "/etc/inittab",
            "1:2345:respawn:/sbin/getty --noclear 38400 tty1\n\
            2:23:respawn:/sbin/getty 38400 tty2\n\
            6:23:respawn:/sbin/getty 38400 tty6\n",
        );
        Provisioner::new(&remote, Config::default()).run(&RemoveExtraTtys)?;

        assert_eq!(
            "1:2345:respawn:/sbin/getty --noclear 38400 tty1\n\
            #2:23:respawn:/sbin/getty 38400 tty2\n\
            #6:23:respawn:/sbin/getty 38400 tty6\n",
            remote.file("/etc/inittab").unwrap(),
        );
        assert!(!remote.events().contains(&Event::Reboot));
        Ok(())
    }
}
