//! Variable substitution for the files piprov writes.
//!
//! There are two forms of substitution:
//!
//! 1. Simple substitution (`$var`): any occurrence of `$var` is replaced with the value of the
//!    variable named `var`, if one exists. Names match on word boundaries, so `$foobar` never
//!    matches the variable `foo`. To merge a variable into a word, use braced substitution.
//!
//! 2. Braced substitution (`${var}`): any occurrence of `${var}` is replaced with the value of
//!    `var`, if it exists. This is plain text substitution and is not recursive.
//!
//! Unknown variables are left untouched, so shell variables in a template pass through as long as
//! they don't collide with a variable piprov knows about.
//!
//! # Substitution order
//!
//! Variables are substituted in the order in which they are defined. A value may therefore mention
//! a variable defined after it, and that mention will be substituted in turn. This is rarely
//! useful, but it is predictable.

use anyhow::Context;
use indexmap::IndexMap;
use regex::{NoExpand, Regex};

/// Renders `template` with `vars`. See the [module documentation](self).
///
/// ```
/// use indexmap::IndexMap;
/// use piprov::template::render;
///
/// let mut vars = IndexMap::new();
/// vars.insert("ip".to_string(), "192.168.1.20".to_string());
/// assert_eq!("address 192.168.1.20 # $HOME", render("address $ip # $HOME", &vars)?);
/// # anyhow::Ok(())
/// ```
///
/// # Errors
///
/// Returns an error if a variable's name cannot be used in a pattern, e.g. because it contains
/// regex syntax such as `(`.
pub fn render(template: &str, vars: &IndexMap<String, String>) -> anyhow::Result<String> {
    let mut rendered = template.to_string();

    // A single expression per variable, rather than one pass per form, so that a value that
    // happens to look like the other form is never substituted twice.
    for (var, value) in vars {
        let pattern = format!(r"\${var}\b|\$\{{{var}}}");
        let regex =
            Regex::new(&pattern).with_context(|| format!("invalid template variable: {var}"))?;
        rendered = regex.replace_all(&rendered, NoExpand(value)).into_owned();
    }

    Ok(rendered)
}
