//! A [Remote] that records what would have happened instead of doing it.
//!
//! [Recorder] backs `--dry-run` and doubles as the test fake for every task. It never runs
//! anything. Instead it:
//!
//! - records every command, file write, and reboot as an [Event] (reads are not recorded);
//! - keeps an in-memory table of files, so that tasks which read, edit, and write a file see their
//!   own edits (files it has never heard of read as empty);
//! - answers commands with canned stdout registered via [Recorder::respond];
//! - fails commands registered via [Recorder::fail].

use super::{Invocation, Remote};
use indexmap::IndexMap;
use log::info;
use std::cell::RefCell;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};

/// Something a task did to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// A command ran.
    Exec(Invocation),

    /// A file was replaced.
    Write {
        path: String,
        contents: String,
        mode: Option<u32>,
    },

    /// The host was rebooted.
    Reboot,
}

/// A dry-run [Remote]. See the [module documentation](self).
#[derive(Debug)]
pub struct Recorder {
    host: String,
    events: RefCell<Vec<Event>>,
    files: RefCell<IndexMap<String, String>>,

    /// `(needle, stdout)` pairs. A command containing `needle` succeeds with `stdout`.
    responses: Vec<(String, String)>,

    /// A command containing any of these exits with code 1.
    failures: Vec<String>,
}

impl Recorder {
    /// Creates a [Recorder] with no files, responses, or failures.
    pub fn new(host: impl Into<String>) -> Self {
        Recorder {
            host: host.into(),
            events: RefCell::new(vec![]),
            files: RefCell::new(IndexMap::new()),
            responses: vec![],
            failures: vec![],
        }
    }

    /// Seeds the file table.
    pub fn with_file(self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.files.borrow_mut().insert(path.into(), contents.into());
        self
    }

    /// Answers any command containing `needle` with `stdout`. Earlier registrations win.
    pub fn respond(mut self, needle: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.push((needle.into(), stdout.into()));
        self
    }

    /// Fails any command containing `needle`.
    pub fn fail(mut self, needle: impl Into<String>) -> Self {
        self.failures.push(needle.into());
        self
    }

    /// Everything recorded so far, in order.
    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    /// The scripts of all recorded commands, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                Event::Exec(invocation) => Some(invocation.script.clone()),
                _ => None,
            })
            .collect()
    }

    /// The current contents of a file in the table.
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl Remote for Recorder {
    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&self, invocation: &Invocation) -> anyhow::Result<Output> {
        info!("[{}] would {}", self.host, invocation.title());
        self.record(Event::Exec(invocation.clone()));

        let code = match self
            .failures
            .iter()
            .any(|needle| invocation.script.contains(needle.as_str()))
        {
            true => 1,
            false => 0,
        };
        let stdout = self
            .responses
            .iter()
            .find(|(needle, _)| invocation.script.contains(needle.as_str()))
            .map(|(_, stdout)| stdout.clone())
            .unwrap_or_default();

        Ok(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.into_bytes(),
            stderr: vec![],
        })
    }

    fn reboot(&self) -> anyhow::Result<()> {
        info!("[{}] would reboot", self.host);
        self.record(Event::Reboot);
        Ok(())
    }

    fn read_file(&self, path: &str) -> anyhow::Result<String> {
        Ok(self.file(path).unwrap_or_default())
    }

    fn write_file(&self, path: &str, contents: &str, mode: Option<u32>) -> anyhow::Result<()> {
        info!("[{}] would write {path}", self.host);
        self.record(Event::Write {
            path: path.to_string(),
            contents: contents.to_string(),
            mode,
        });
        self.files
            .borrow_mut()
            .insert(path.to_string(), contents.to_string());
        Ok(())
    }
}
