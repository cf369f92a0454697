//! Package sets: the list a host should have, the list it does have, and the difference.

use anyhow::Context;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Reads a keep-list: one package name per line. Blank lines and `#` comments are skipped, as is
/// white space around names.
pub fn read_keep_list(path: &Path) -> anyhow::Result<BTreeSet<String>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read package list {}", path.display()))?;
    Ok(parse_keep_list(&contents))
}

/// Parses the contents of a keep-list. See [read_keep_list].
pub fn parse_keep_list(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(|line| match line.split_once('#') {
            Some((before, _)) => before.trim(),
            None => line.trim(),
        })
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses the output of `dpkg --get-selections`, returning the packages selected for installation.
///
/// Each line is a package name followed by white space and a selection state. Packages in any
/// state other than `install` (e.g. `deinstall` or `hold`) are skipped.
pub fn parse_selections(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(name), Some("install")) => Some(name.to_string()),
                _ => None,
            }
        })
        .collect()
}

/// What must change to turn the installed package set into the wanted one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageDiff {
    /// Installed but not wanted.
    pub purge: BTreeSet<String>,

    /// Wanted but not installed.
    pub install: BTreeSet<String>,
}

impl PackageDiff {
    /// Compares the `installed` set to the `wanted` set.
    ///
    /// ```
    /// use piprov::packages::PackageDiff;
    /// use std::collections::BTreeSet;
    ///
    /// let installed = BTreeSet::from(["vim".to_string(), "wolfram-engine".to_string()]);
    /// let wanted = BTreeSet::from(["vim".to_string(), "dropbear".to_string()]);
    /// let diff = PackageDiff::new(&installed, &wanted);
    ///
    /// assert_eq!(vec!["wolfram-engine"], diff.purge.iter().collect::<Vec<_>>());
    /// assert_eq!(vec!["dropbear"], diff.install.iter().collect::<Vec<_>>());
    /// ```
    pub fn new(installed: &BTreeSet<String>, wanted: &BTreeSet<String>) -> Self {
        PackageDiff {
            purge: installed.difference(wanted).cloned().collect(),
            install: wanted.difference(installed).cloned().collect(),
        }
    }

    /// Whether the sets already match.
    pub fn is_empty(&self) -> bool {
        self.purge.is_empty() && self.install.is_empty()
    }
}
