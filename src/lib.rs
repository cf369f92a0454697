//! Provision a Raspberry Pi, or any Debian-based single-board computer, over SSH.
//!
//! piprov is a set of [tasks] (update the OS, enforce a package list, size the swap file, replace
//! the SSH daemon, set a static address, overclock, and so on) plus one task that runs them all,
//! [BuildSystem](tasks::BuildSystem).
//!
//! # Program flow
//!
//! 1. The `piprov` binary loads the [config] and connects to the host through a [Remote]
//!    implementation: [SshRemote](remote::SshRemote), [LocalRemote](remote::LocalRemote), or, for
//!    a dry run, [Recorder](remote::Recorder).
//!
//! 2. It creates a [Provisioner](tasks::Provisioner) for the host. The provisioner owns the
//!    session's two [deferred actions](defer): cleaning the apt cache and rebooting.
//!
//! 3. It runs the requested [Task](tasks::Task). Tasks change files through [edit] and
//!    [template] and run commands through the [Remote]. When a task leaves the host needing a
//!    reboot or a cache clean, it requests the deferred action rather than doing it.
//!
//! 4. When the outermost guarded task finishes, successfully or not, each requested deferred
//!    action fires exactly once.
//!
//! [Remote]: remote::Remote

pub mod config;
pub mod defer;
pub mod edit;
pub mod packages;
pub mod remote;
pub mod report;
pub mod tasks;
pub mod template;
