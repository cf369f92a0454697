use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use piprov::config::Config;
use piprov::remote::{LocalRemote, Recorder, Remote};
use piprov::tasks::{
    BuildSystem, DisableIpv6, OptimizeMount, OverclockProfile, Provisioner, RemoveDesktopFiles,
    RemoveExtraTtys, ReplaceSshd, Sequence, SetOverclock, SetPackages, SetStaticIp, SetSwapSize,
    Task, UpdateOs, UseNoopScheduler,
};
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "piprov")]
#[command(version)]
#[command(about = "Provision a Raspberry Pi over SSH", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// The host to provision, in any form ssh accepts [default: `host` from the config file]
    #[arg(short = 'H', long, global = true, env = "PIPROV_HOST")]
    host: Option<String>,

    /// Configuration file [default: ~/.config/piprov/config.yaml]
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log what would be done without touching the host. Files on the host are not read, so
    /// every edit and every reboot is reported, even ones a real run would skip
    #[arg(long, global = true, conflicts_with = "local")]
    dry_run: bool,

    /// Provision the machine piprov is running on instead of a remote host
    #[arg(long, global = true)]
    local: bool,

    /// Verbosity level
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run several tasks in order, then clean the apt cache and reboot once if any of them asked
    Run {
        #[arg(value_enum, required = true)]
        tasks: Vec<Step>,
    },

    /// Remove the desktop files of a stock Raspbian image
    RemoveDesktopFiles,

    /// Purge and install packages until the installed set matches a list
    SetPackages {
        /// One package per line; blank lines and # comments are ignored
        file: PathBuf,
    },

    /// Size the swap file and tune swappiness [defaults: `swap` from the config file]
    SetSwapsize {
        /// Swap file size in MB; 0 turns swap off
        size: Option<u32>,
        swappiness: Option<u32>,
        cache_pressure: Option<u32>,
    },

    /// Replace the OpenSSH server with Dropbear
    ReplaceSshd {
        /// Refuse root logins
        #[arg(long)]
        deny_root: bool,

        /// Refuse password logins
        #[arg(long)]
        deny_passwords: bool,
    },

    /// Upgrade all packages, then clean up and reboot
    UpdateOs,

    /// Mount file systems with noatime and nodiratime
    OptimizeMount,

    /// Disable IPv6
    DisableIpv6,

    /// Use the noop I/O scheduler
    UseNoopScheduler,

    /// Disable the gettys on ttys 2 to 6
    RemoveExtraTtys,

    /// Give eth0 a static address [defaults: `network` from the config file]
    SetStaticIp {
        ip: Ipv4Addr,
        netmask: Option<Ipv4Addr>,
        network: Option<Ipv4Addr>,
        gateway: Option<Ipv4Addr>,
        broadcast: Option<Ipv4Addr>,
    },

    /// Apply an overclocking profile
    SetOverclock {
        #[arg(value_enum)]
        profile: OverclockProfile,
    },

    /// Run everything: update, packages, Dropbear, tuning, swap, then one final reboot
    BuildSystem {
        /// Package list for set-packages
        packages: PathBuf,

        /// Also give eth0 this static address
        #[arg(long)]
        static_ip: Option<Ipv4Addr>,

        /// Swap file size in MB
        #[arg(long, default_value_t = 512)]
        swap_size: u32,
    },
}

/// The tasks `run` can chain. Tasks with settings use their defaults from the config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Step {
    RemoveDesktopFiles,
    UpdateOs,
    OptimizeMount,
    DisableIpv6,
    UseNoopScheduler,
    RemoveExtraTtys,
    ReplaceSshd,
    SetSwapsize,
}

impl Step {
    fn into_task(self) -> Box<dyn Task> {
        match self {
            Step::RemoveDesktopFiles => Box::new(RemoveDesktopFiles),
            Step::UpdateOs => Box::new(UpdateOs),
            Step::OptimizeMount => Box::new(OptimizeMount),
            Step::DisableIpv6 => Box::new(DisableIpv6),
            Step::UseNoopScheduler => Box::new(UseNoopScheduler),
            Step::RemoveExtraTtys => Box::new(RemoveExtraTtys),
            Step::ReplaceSshd => Box::new(ReplaceSshd::default()),
            Step::SetSwapsize => Box::new(SetSwapSize::default()),
        }
    }
}

impl Command {
    fn into_task(self) -> Box<dyn Task> {
        match self {
            Command::Run { tasks } => Box::new(Sequence {
                tasks: tasks.into_iter().map(Step::into_task).collect(),
            }),
            Command::RemoveDesktopFiles => Box::new(RemoveDesktopFiles),
            Command::SetPackages { file } => Box::new(SetPackages { keep_list: file }),
            Command::SetSwapsize {
                size,
                swappiness,
                cache_pressure,
            } => Box::new(SetSwapSize {
                size_mb: size,
                swappiness,
                cache_pressure,
            }),
            Command::ReplaceSshd {
                deny_root,
                deny_passwords,
            } => Box::new(ReplaceSshd {
                deny_root,
                deny_passwords,
            }),
            Command::UpdateOs => Box::new(UpdateOs),
            Command::OptimizeMount => Box::new(OptimizeMount),
            Command::DisableIpv6 => Box::new(DisableIpv6),
            Command::UseNoopScheduler => Box::new(UseNoopScheduler),
            Command::RemoveExtraTtys => Box::new(RemoveExtraTtys),
            Command::SetStaticIp {
                ip,
                netmask,
                network,
                gateway,
                broadcast,
            } => Box::new(SetStaticIp {
                address: ip,
                netmask,
                network,
                gateway,
                broadcast,
            }),
            Command::SetOverclock { profile } => Box::new(SetOverclock { profile }),
            Command::BuildSystem {
                packages,
                static_ip,
                swap_size,
            } => Box::new(BuildSystem {
                packages,
                static_ip,
                swap_size_mb: swap_size,
            }),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Warn
        } else {
            log_level
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let host = cli.host.or_else(|| config.host.clone());
    let task = cli.command.into_task();

    if cli.dry_run {
        let remote = Recorder::new(host.unwrap_or_else(|| "dry-run".to_string()));
        return provision(&remote, config, task.as_ref());
    }

    if cli.local {
        return provision(&LocalRemote::new(), config, task.as_ref());
    }

    let host = host.context("no host given; pass --host or set `host` in the config file")?;
    connect_and_provision(host, config, task.as_ref())
}

fn provision(remote: &dyn Remote, config: Config, task: &dyn Task) -> Result<()> {
    Provisioner::new(remote, config).run(task)
}

#[cfg(feature = "openssh")]
fn connect_and_provision(host: String, config: Config, task: &dyn Task) -> Result<()> {
    let remote = piprov::remote::SshRemote::connect(host, config.reboot_wait())?;
    provision(&remote, config, task)
}

#[cfg(not(feature = "openssh"))]
fn connect_and_provision(host: String, _config: Config, _task: &dyn Task) -> Result<()> {
    anyhow::bail!(
        "cannot connect to {host}: piprov was built without SSH support; \
        use --local or --dry-run"
    )
}
