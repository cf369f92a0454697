//! Reports the outcome of each command that runs on a host.
//!
//! The arrangement of this module is a bit unusual. The real [Reporter] locks stdout and stderr
//! just before reporting and releases the locks as soon as reporting is done, then hands the
//! locked writers to [_starting] and [_report], which contain all of the formatting logic and can
//! be tested against in-memory writers.

use crate::remote::{describe_status, Invocation};
use std::fmt::Display;
use std::io::{self, Write};
use std::ops::DerefMut;
use std::process::Output;

/// Prints feedback about each command run on a host to keep the user informed.
pub trait Report {
    /// Reports that a command is about to start.
    fn starting(&self, host: &str, invocation: &Invocation) -> io::Result<()>;

    /// Reports the outcome of a command.
    fn report(&self, host: &str, invocation: &Invocation, output: &Output) -> io::Result<()>;
}

/// The real [Report] implementation. Uses the real stdout/stderr.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reporter;

impl Report for Reporter {
    fn starting(&self, host: &str, invocation: &Invocation) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        _starting(&mut stdout, host, invocation)
    }

    fn report(&self, host: &str, invocation: &Invocation, output: &Output) -> io::Result<()> {
        // Hold both locks for the whole report so that stdout and stderr lines stay in order.
        let mut stdout = io::stdout().lock();
        let mut stderr = io::stderr().lock();
        _report(&mut stdout, &mut stderr, host, invocation, output)
    }
}

/// A testable method containing the logic for reporting the outcome of a command.
pub fn _report<OT: Write, ET: Write, O: DerefMut<Target = OT>, E: DerefMut<Target = ET>>(
    mut stdout: O,
    mut stderr: E,
    host: &str,
    invocation: &Invocation,
    output: &Output,
) -> io::Result<()> {
    fn write_indented(
        mut writer: impl Write,
        header: impl Display,
        content: impl AsRef<str>,
    ) -> io::Result<()> {
        //                1234
        writeln!(writer, "    {header}")?;
        for line in content.as_ref().lines() {
            //                12345678
            writeln!(writer, "        {line}")?;
        }
        Ok(())
    }

    let title = invocation.title();

    if output.status.success() {
        writeln!(&mut stdout, "[{host}] Completed {title}")?;
    } else {
        writeln!(
            &mut stderr,
            "[{host}] Command failed. See below for details.",
        )?;
    }

    if !invocation.quiet && !output.stdout.is_empty() {
        write_indented(
            stdout.deref_mut(),
            "Captured stdout:",
            String::from_utf8_lossy(&output.stdout),
        )?;
    }

    if !output.stderr.is_empty() {
        write_indented(
            stderr.deref_mut(),
            "Captured stderr:",
            String::from_utf8_lossy(&output.stderr),
        )?;
    }

    if !output.status.success() {
        writeln!(
            &mut stderr,
            "Command exited with {}: {title}",
            describe_status(output),
        )?;
    }
    Ok(())
}

/// A testable method containing the logic for reporting that a command is starting.
pub fn _starting<OT: Write, O: DerefMut<Target = OT>>(
    mut stdout: O,
    host: &str,
    invocation: &Invocation,
) -> io::Result<()> {
    let title = invocation.title();
    writeln!(
        &mut stdout,
        // Adding one extra space lines up "Starting" with "Completed" in the final output.
        "[{host}] Starting  {title}",
        // Ex:    Completed {title}
    )
}


#[cfg(test)]
mod test;
