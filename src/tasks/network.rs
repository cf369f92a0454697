use super::{Deferred, Provisioner, Task};
use crate::template::render;
use anyhow::Context;
use indexmap::IndexMap;
use log::info;
use std::fs;
use std::net::Ipv4Addr;

const INTERFACES: &str = "/etc/network/interfaces";
const BACKUP: &str = "/etc/network/interfaces.dhcp-backup";

/// The built-in `/etc/network/interfaces` template.
pub const INTERFACES_TEMPLATE: &str = "auto lo

iface lo inet loopback
iface eth0 inet static

address $address
netmask $netmask
network $network
broadcast $broadcast
gateway $gateway
";

/// Gives `eth0` a static address.
///
/// The DHCP configuration is backed up to `/etc/network/interfaces.dhcp-backup` the first time.
/// Unset fields fall back to the `network` section of the configuration.
#[derive(Clone, Debug)]
pub struct SetStaticIp {
    pub address: Ipv4Addr,
    pub netmask: Option<Ipv4Addr>,
    pub network: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
}

impl SetStaticIp {
    /// A [SetStaticIp] that takes everything but the address from the configuration.
    pub fn new(address: Ipv4Addr) -> Self {
        SetStaticIp {
            address,
            netmask: None,
            network: None,
            gateway: None,
            broadcast: None,
        }
    }

    /// The variables available to the template: the addresses, then the configuration's `vars`.
    fn vars(&self, p: &Provisioner) -> IndexMap<String, String> {
        let defaults = &p.config().network;
        let mut vars = IndexMap::new();
        for (var, value) in [
            ("address", self.address),
            ("netmask", self.netmask.unwrap_or(defaults.netmask)),
            ("network", self.network.unwrap_or(defaults.network)),
            ("broadcast", self.broadcast.unwrap_or(defaults.broadcast)),
            ("gateway", self.gateway.unwrap_or(defaults.gateway)),
        ] {
            vars.insert(var.to_string(), value.to_string());
        }
        for (var, value) in &p.config().vars {
            vars.insert(var.clone(), value.clone());
        }
        vars
    }

    fn template(p: &Provisioner) -> anyhow::Result<String> {
        match &p.config().network.template {
            Some(path) => fs::read_to_string(path)
                .with_context(|| format!("failed to read template {}", path.display())),
            None => Ok(INTERFACES_TEMPLATE.to_string()),
        }
    }
}

impl Task for SetStaticIp {
    fn name(&self) -> &'static str {
        "set-static-ip"
    }

    fn defers(&self) -> &'static [Deferred] {
        &[Deferred::Restart]
    }

    fn run(&self, p: &Provisioner) -> anyhow::Result<()> {
        let remote = p.remote();
        let interfaces = render(&Self::template(p)?, &self.vars(p))?;

        if remote.read_file(INTERFACES)? == interfaces {
            info!("[{}] {} already up to date", remote.host(), self.address);
            return Ok(());
        }

        remote.sudo(&format!("test -e {BACKUP} || cp -f {INTERFACES} {BACKUP}"))?;
        remote.write_file(INTERFACES, &interfaces, Some(0o644))?;
        p.restart().request();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::remote::recorder::{Event, Recorder};
    use std::io::Write;

    const ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

    const RENDERED: &str = "auto lo

iface lo inet loopback
iface eth0 inet static

address 192.168.1.20
netmask 255.255.255.0
network 192.168.1.0
broadcast 192.168.1.255
gateway 192.168.1.1
";

    #[test]
    fn backs_up_writes_and_restarts() -> anyhow::Result<()> {
        let remote = Recorder::new("pi").with_file(INTERFACES, "iface eth0 inet dhcp\n");
        Provisioner::new(&remote, Config::default()).run(&SetStaticIp::new(ADDRESS))?;

        assert_eq!(
            vec![
                Event::Exec(crate::remote::Invocation::sudo(
                    "test -e /etc/network/interfaces.dhcp-backup \
                    || cp -f /etc/network/interfaces /etc/network/interfaces.dhcp-backup"
                )),
                Event::Write {
                    path: INTERFACES.to_string(),
                    contents: RENDERED.to_string(),
                    mode: Some(0o644),
                },
                Event::Reboot,
            ],
            remote.events(),
        );
        Ok(())
    }

    #[test]
    fn already_static() -> anyhow::Result<()> {
        let remote = Recorder::new("pi").with_file(INTERFACES, RENDERED);
        Provisioner::new(&remote, Config::default()).run(&SetStaticIp::new(ADDRESS))?;
        assert!(remote.events().is_empty());
        Ok(())
    }

    #[test]
    fn arguments_override_config() -> anyhow::Result<()> {
        let remote = Recorder::new("pi");
        let mut config = Config::default();
        config.network.gateway = Ipv4Addr::new(192, 168, 1, 254);
        let task = SetStaticIp {
            netmask: Some(Ipv4Addr::new(255, 255, 0, 0)),
            ..SetStaticIp::new(ADDRESS)
        };
        Provisioner::new(&remote, config).run(&task)?;

        let written = remote.file(INTERFACES).unwrap();
        assert!(written.contains("\nnetmask 255.255.0.0\n"), "{written}");
        assert!(written.contains("\ngateway 192.168.1.254\n"), "{written}");
        Ok(())
    }

    #[test]
    fn custom_template_and_vars() -> anyhow::Result<()> {
        let mut template = tempfile::NamedTempFile::new()?;
        write!(template, "iface wlan0 inet static\naddress ${{address}}/24\ndns $dns\n")?;

        let remote = Recorder::new("pi");
        let mut config = Config::default();
        config.network.template = Some(template.path().to_path_buf());
        config.vars.insert("dns".to_string(), "192.168.1.53".to_string());
        Provisioner::new(&remote, config).run(&SetStaticIp::new(ADDRESS))?;

        assert_eq!(
            "iface wlan0 inet static\naddress 192.168.1.20/24\ndns 192.168.1.53\n",
            remote.file(INTERFACES).unwrap(),
        );
        Ok(())
    }

    #[test]
    fn missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let remote = Recorder::new("pi");
        let mut config = Config::default();
        config.network.template = Some(dir.path().join("interfaces"));

        let p = Provisioner::new(&remote, config);
        assert!(p.run(&SetStaticIp::new(ADDRESS)).is_err());
        assert!(remote.events().is_empty());
    }
}
