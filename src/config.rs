//! piprov's configuration file.
//!
//! The file is optional YAML. Every key has a default, so an empty file (or no file at all) is a
//! valid configuration. Command-line arguments override whatever the file says.
//!
//! ```yaml
//! host: pi@raspberrypi.local
//! reboot_wait_secs: 90
//! swap:
//!   size_mb: 512
//! network:
//!   gateway: 10.0.0.1
//! vars:
//!   dns: 10.0.0.53
//! ```

use anyhow::{anyhow, Context};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns the path of the default configuration file, `~/.config/piprov/config.yaml`.
pub fn config_path() -> anyhow::Result<PathBuf> {
    // Omit the leading slash so that PathBuf::push appends instead of replacing.
    const CONFIG_FILE: &str = ".config/piprov/config.yaml";

    let mut path = home::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
    path.push(CONFIG_FILE);
    Ok(path)
}

/// The contents of a configuration file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The host to provision, in any form `ssh` accepts.
    pub host: Option<String>,

    /// How long to wait for a host to come back after a reboot before reconnecting.
    pub reboot_wait_secs: u64,

    /// The command run as root when a deferred apt clean fires.
    pub apt_clean: String,

    pub swap: SwapConfig,

    pub network: NetworkConfig,

    /// Extra variables for file templates. Applied after piprov's own variables, in order.
    pub vars: IndexMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: None,
            reboot_wait_secs: 120,
            apt_clean: "apt-get clean && apt-get autoremove -qy".to_string(),
            swap: SwapConfig::default(),
            network: NetworkConfig::default(),
            vars: IndexMap::new(),
        }
    }
}

/// Defaults for `set-swapsize`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SwapConfig {
    /// Swap file size in MB. Zero disables swap.
    pub size_mb: u32,

    /// `vm.swappiness`.
    pub swappiness: u32,

    /// `vm.vfs_cache_pressure`.
    pub cache_pressure: u32,
}

impl Default for SwapConfig {
    fn default() -> Self {
        SwapConfig {
            size_mb: 100,
            swappiness: 1,
            cache_pressure: 50,
        }
    }
}

/// Defaults for `set-static-ip`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub netmask: Ipv4Addr,
    pub network: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub broadcast: Ipv4Addr,

    /// A local file to use instead of the built-in `/etc/network/interfaces` template.
    pub template: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            network: Ipv4Addr::new(192, 168, 1, 0),
            gateway: Ipv4Addr::new(192, 168, 1, 1),
            broadcast: Ipv4Addr::new(192, 168, 1, 255),
            template: None,
        }
    }
}

impl Config {
    /// Loads the configuration.
    ///
    /// With `path`, the file must exist. Without it, the default file from [config_path] is read
    /// if it exists, and the defaults are used if it doesn't.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let path = config_path()?;
                match fs::read_to_string(&path) {
                    Ok(yaml) => Self::parse(&yaml, &path),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
                    Err(e) => {
                        Err(e).with_context(|| format!("failed to read {}", path.display()))
                    }
                }
            }
        }
    }

    /// Loads the configuration from `path`, which must exist.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&yaml, path)
    }

    fn parse(yaml: &str, path: &Path) -> anyhow::Result<Self> {
        // serde_yaml refuses to deserialize a document without content into a struct.
        let is_blank = |line: &str| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        };
        if yaml.lines().all(is_blank) {
            return Ok(Config::default());
        }
        serde_yaml::from_str(yaml).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// [Self::reboot_wait_secs] as a [Duration].
    pub fn reboot_wait(&self) -> Duration {
        Duration::from_secs(self.reboot_wait_secs)
    }
}
