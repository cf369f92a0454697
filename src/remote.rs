//! Runs shell commands on the host being provisioned.
//!
//! Everything piprov does to a host goes through the [Remote] trait: tasks never talk to SSH
//! directly. This keeps tasks testable (see [Recorder]) and lets the same tasks run over SSH
//! ([SshRemote]), on the local machine ([LocalRemote]), or not at all (a dry run, [Recorder]).
//!
//! Commands are passed to `sh -c` on the host, or `sudo sh -c` when elevated, so tasks may use
//! pipes, redirection, and `&&` freely. Values interpolated into scripts should be quoted with
//! [quote].

pub mod local;
pub mod recorder;
#[cfg(feature = "openssh")]
pub mod ssh;

#[doc(inline)]
pub use local::LocalRemote;
#[doc(inline)]
pub use recorder::Recorder;
#[cfg(feature = "openssh")]
#[doc(inline)]
pub use ssh::SshRemote;

use anyhow::Context;
use std::borrow::Cow;
use std::process::Output;
use thiserror::Error;

/// A shell script to run on a host, plus how to run it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// The script, passed to `sh -c`.
    pub script: String,

    /// Run the script as root via `sudo`.
    pub sudo: bool,

    /// Don't echo captured stdout to the user. Used for queries whose output piprov parses.
    pub quiet: bool,
}

impl Invocation {
    /// A script run as the login user.
    pub fn run(script: impl Into<String>) -> Self {
        Invocation {
            script: script.into(),
            sudo: false,
            quiet: false,
        }
    }

    /// A script run as root.
    pub fn sudo(script: impl Into<String>) -> Self {
        Invocation {
            script: script.into(),
            sudo: true,
            quiet: false,
        }
    }

    /// Marks the invocation as quiet.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// A one-line description of the invocation for user output, e.g. `sudo: swapoff -a`.
    pub fn title(&self) -> String {
        match self.sudo {
            true => format!("sudo: {}", self.script),
            false => format!("run: {}", self.script),
        }
    }
}

/// Failures that originate on the host rather than in piprov.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The command ran but exited unsuccessfully.
    #[error("[{host}] command exited with {status}: {script}")]
    CommandFailed {
        host: String,
        script: String,
        /// Either `exit code <n>` or, if the command was killed by a signal, `error`.
        status: String,
        stderr: String,
    },

    /// A value contains characters that cannot be passed through the shell, e.g. a NUL byte.
    #[error("cannot quote {0:?} for the remote shell")]
    Unquotable(String),

    /// The connection to the host is gone, e.g. because the host failed to come back after a
    /// reboot.
    #[error("[{0}] not connected")]
    NotConnected(String),
}

/// Describes an exit status the way the rest of piprov's output does.
pub fn describe_status(output: &Output) -> String {
    match output.status.code() {
        Some(i) => format!("exit code {i}"),
        None => "error".to_string(),
    }
}

/// Quotes `value` for safe interpolation into a shell script.
///
/// ```
/// use piprov::remote::quote;
///
/// assert_eq!("/etc/fstab", quote("/etc/fstab")?);
/// assert_eq!("'a b'", quote("a b")?);
/// # anyhow::Ok(())
/// ```
pub fn quote(value: &str) -> Result<Cow<'_, str>, RemoteError> {
    shlex::try_quote(value).map_err(|_| RemoteError::Unquotable(value.to_string()))
}

/// A connection to the host being provisioned.
///
/// Implementors provide [Self::execute] and [Self::reboot]; the remaining methods are built on
/// top of [Self::execute] and only need overriding when the implementor has a better way, as
/// [Recorder] does for files.
pub trait Remote {
    /// The host's name, as given by the user.
    fn host(&self) -> &str;

    /// Runs `invocation` and returns its output, successful or not.
    ///
    /// Returns an error only if the command could not be run at all.
    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output>;

    /// Reboots the host and, where that makes sense, waits for it to come back.
    fn reboot(&self) -> anyhow::Result<()>;

    /// Runs `invocation` and returns its raw stdout, or a [RemoteError::CommandFailed] if it
    /// exited unsuccessfully.
    fn checked_bytes(&self, invocation: &Invocation) -> anyhow::Result<Vec<u8>> {
        let output = self.execute(invocation)?;
        if !output.status.success() {
            return Err(RemoteError::CommandFailed {
                host: self.host().to_string(),
                script: invocation.script.clone(),
                status: describe_status(&output),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        Ok(output.stdout)
    }

    /// Like [Self::checked_bytes], but returns stdout as text. Invalid UTF-8 is replaced, so use
    /// this for output that is only shown or parsed, never written back.
    fn checked(&self, invocation: &Invocation) -> anyhow::Result<String> {
        let stdout = self.checked_bytes(invocation)?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Runs `script` as the login user. See [Self::checked].
    fn run(&self, script: &str) -> anyhow::Result<String> {
        self.checked(&Invocation::run(script))
    }

    /// Runs `script` as root. See [Self::checked].
    fn sudo(&self, script: &str) -> anyhow::Result<String> {
        self.checked(&Invocation::sudo(script))
    }

    /// Runs `script` as root without echoing its output. See [Self::checked].
    fn sudo_quiet(&self, script: &str) -> anyhow::Result<String> {
        self.checked(&Invocation::sudo(script).quiet())
    }

    /// Returns the contents of the file at `path`, read as root. A missing file reads as empty.
    ///
    /// Fails if the contents are not valid UTF-8.
    fn read_file(&self, path: &str) -> anyhow::Result<String> {
        let path = quote(path)?;
        let script = format!("test ! -e {path} || cat {path}");
        let contents = self.checked_bytes(&Invocation::sudo(script).quiet())?;
        String::from_utf8(contents).with_context(|| format!("{path} is not valid UTF-8"))
    }

    /// Replaces the file at `path` with `contents`, as root, optionally setting its mode.
    fn write_file(&self, path: &str, contents: &str, mode: Option<u32>) -> anyhow::Result<()> {
        let path = quote(path)?;
        let mut script = format!("printf '%s' {} > {path}", quote(contents)?);
        if let Some(mode) = mode {
            script.push_str(&format!(" && chmod {mode:o} {path}"));
        }
        self.checked(&Invocation::sudo(script).quiet())?;
        Ok(())
    }
}

#[cfg(test)]
mod test;
