//! The set of secret values to keep out of output.

use crate::env::{resolve_declarations, DeclarationCommand, Environment, EnvironmentItem};
use crate::error::Result;

/// Secret values, in first-seen order, without empties or duplicates.
///
/// Every secret containing a newline is accompanied by a variant where each
/// newline is written as the two characters `\n`, so JSON-style escaped
/// renderings are also caught.
///
/// # Example
///
/// ```
/// use runway::secrets::SecretSet;
///
/// let secrets = SecretSet::new(["token", "", "line1\nline2", "token"]);
/// assert_eq!(secrets.len(), 3);
/// assert!(secrets.contains("line1\\nline2"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSet {
    values: Vec<String>,
}

impl SecretSet {
    /// Create a set from raw values.
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::default();
        set.extend(values);
        set
    }

    /// Resolve secret declarations and collect their values.
    ///
    /// Declarations are resolved in order against an empty environment, so a
    /// secret may reference an earlier one. Every value that was set is kept,
    /// including ones later overwritten or unset.
    pub fn from_items(items: &[EnvironmentItem]) -> Result<Self> {
        let effects = resolve_declarations(items, &Environment::new())?;
        Ok(Self::new(effects.command_history.into_iter().filter_map(
            |command| match command {
                DeclarationCommand::Set(var) => Some(var.value),
                _ => None,
            },
        )))
    }

    /// Collect the values of every sensitive variable.
    pub fn from_variables(env: &Environment) -> Self {
        Self::new(env.sensitive_values())
    }

    /// Add values, applying the same filtering as [`SecretSet::new`].
    pub fn extend<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            let value = value.into();
            if value.is_empty() {
                continue;
            }
            let escaped = value.contains('\n').then(|| value.replace('\n', "\\n"));
            self.push(value);
            if let Some(escaped) = escaped {
                self.push(escaped);
            }
        }
    }

    /// Merge another set into this one.
    pub fn merge(&mut self, other: &SecretSet) {
        for value in &other.values {
            self.push(value.clone());
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate secrets in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.values.iter()
    }

    /// Byte length of the longest secret.
    pub fn max_len(&self) -> usize {
        self.values.iter().map(String::len).max().unwrap_or(0)
    }

    /// Redact every secret in a complete string.
    ///
    /// ```
    /// use runway::secrets::SecretSet;
    ///
    /// let secrets = SecretSet::new(["ABC123"]);
    /// assert_eq!(secrets.redact("token=ABC123"), "token=[REDACTED]");
    /// ```
    pub fn redact(&self, input: &str) -> String {
        let bytes = super::redact::redact_bytes(self, input.as_bytes());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    fn push(&mut self, value: String) {
        if !self.contains(&value) {
            self.values.push(value);
        }
    }
}

impl<'a> IntoIterator for &'a SecretSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
