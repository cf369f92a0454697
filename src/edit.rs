//! Idempotent edits to line-oriented configuration files.
//!
//! Every edit converges: applying it to its own output changes nothing. Tasks rely on this to
//! decide whether they changed anything, and therefore whether to request a reboot.
//!
//! Files are split on `'\n'` and joined back the same way, so line endings (including `"\r\n"`
//! and a missing final newline) survive edits to other lines.

use crate::remote::Remote;
use anyhow::Context;
use log::debug;
use regex::{NoExpand, Regex};

/// A single edit to a file.
#[derive(Clone, Debug)]
pub enum LineEdit {
    /// If `line` is already present, does nothing. Otherwise, if a line matches `pattern`,
    /// replaces the first such line with `line`. Otherwise appends `line` as a new line.
    Ensure { pattern: Regex, line: String },

    /// Replaces every match of `pattern` with `with`. Never adds lines.
    Replace { pattern: Regex, with: String },

    /// Comments out lines matching `pattern` with a leading `#`. Lines already commented out are
    /// left alone.
    Comment { pattern: Regex },
}

impl LineEdit {
    /// Creates a [LineEdit::Ensure].
    ///
    /// ```
    /// use piprov::edit::LineEdit;
    ///
    /// let edit = LineEdit::ensure("vm.swappiness=[0-9]*", "vm.swappiness=1")?;
    /// assert_eq!(Some("vm.swappiness=1\n".to_string()), edit.apply("vm.swappiness=60\n"));
    /// assert_eq!(None, edit.apply("vm.swappiness=1\n"));
    /// # anyhow::Ok(())
    /// ```
    pub fn ensure(pattern: &str, line: impl Into<String>) -> anyhow::Result<Self> {
        Ok(LineEdit::Ensure {
            pattern: compile(pattern)?,
            line: line.into(),
        })
    }

    /// Creates a [LineEdit::Ensure] whose pattern is `line` itself, matched literally.
    pub fn ensure_literal(line: impl Into<String>) -> Self {
        let line = line.into();
        LineEdit::Ensure {
            pattern: literal(&line),
            line,
        }
    }

    /// Creates a [LineEdit::Replace].
    pub fn replace(pattern: &str, with: impl Into<String>) -> anyhow::Result<Self> {
        Ok(LineEdit::Replace {
            pattern: compile(pattern)?,
            with: with.into(),
        })
    }

    /// Creates a [LineEdit::Comment].
    pub fn comment(pattern: &str) -> anyhow::Result<Self> {
        Ok(LineEdit::Comment {
            pattern: compile(pattern)?,
        })
    }

    /// Applies the edit to `contents`. Returns the new contents, or `None` if nothing changed.
    pub fn apply(&self, contents: &str) -> Option<String> {
        let edited = match self {
            LineEdit::Ensure { pattern, line } => {
                if line_is_present(contents, line) {
                    return None;
                }
                let mut edited = contents.to_string();
                if !replace_line(&mut edited, pattern, line) {
                    append_line(&mut edited, line);
                }
                edited
            }
            LineEdit::Replace { pattern, with } => replace_in_lines(contents, pattern, with),
            LineEdit::Comment { pattern } => map_lines(contents, |l| {
                match pattern.is_match(l) && !l.trim_start().starts_with('#') {
                    true => format!("#{l}"),
                    false => l.to_string(),
                }
            }),
        };

        match edited == contents {
            true => None,
            false => Some(edited),
        }
    }
}

/// Applies `edits`, in order, to the file at `path` on `remote`.
///
/// Reads the file once and writes it back only if something changed. Returns whether it did.
pub fn edit_file(remote: &dyn Remote, path: &str, edits: &[LineEdit]) -> anyhow::Result<bool> {
    let original = remote
        .read_file(path)
        .with_context(|| format!("failed to read {path}"))?;

    let mut contents = original.clone();
    for edit in edits {
        if let Some(edited) = edit.apply(&contents) {
            contents = edited;
        }
    }

    if contents == original {
        debug!("[{}] {path} already up to date", remote.host());
        return Ok(false);
    }

    remote
        .write_file(path, &contents, None)
        .with_context(|| format!("failed to write {path}"))?;
    Ok(true)
}

fn compile(pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(pattern).with_context(|| format!("invalid pattern: {pattern}"))
}

fn literal(text: &str) -> Regex {
    Regex::new(&regex::escape(text)).expect("BUG: an escaped pattern should always compile")
}

/// Returns whether `line` is present in `file`, ignoring trailing white space.
fn line_is_present(file: &str, line: &str) -> bool {
    let line = line.trim_end();
    file.split('\n').any(|file_line| file_line.trim_end() == line)
}

/// If `pattern` matches a line in `file`, replaces the first such line with `line`. Returns
/// whether a match occurred.
fn replace_line(file: &mut String, pattern: &Regex, line: &str) -> bool {
    let mut start = 0;
    let mut found = None;
    for file_line in file.split('\n') {
        if pattern.is_match(file_line) {
            // Stop short of a trailing '\r' so that "\r\n" line endings survive.
            found = Some(start..start + file_line.trim_end_matches('\r').len());
            break;
        }
        start += file_line.len() + 1;
    }

    match found {
        Some(range) => {
            file.replace_range(range, line);
            true
        }
        None => false,
    }
}

/// Rebuilds `contents` line by line.
fn map_lines(contents: &str, f: impl FnMut(&str) -> String) -> String {
    contents.split('\n').map(f).collect::<Vec<_>>().join("\n")
}

/// Replaces every match of `pattern` with `with`, one line at a time, so that a pattern can never
/// match across a line break.
fn replace_in_lines(contents: &str, pattern: &Regex, with: &str) -> String {
    map_lines(contents, |l| pattern.replace_all(l, NoExpand(with)).into_owned())
}

/// Adds `line` as a new line at the end of `file`.
fn append_line(file: &mut String, line: &str) {
    if file.trim_start().is_empty() && !line.trim_start().is_empty() {
        file.clear();
    } else if !file.ends_with('\n') && !file.is_empty() {
        file.push('\n');
    }
    file.push_str(line);
    file.push('\n');
}
