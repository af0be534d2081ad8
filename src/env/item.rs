//! Environment variable declarations.
//!
//! A declaration is the mapping form used by workflow, step bundle and
//! inventory files:
//!
//! ```yaml
//! - GREETING: Hello
//! - URL: https://$HOST/api
//!   opts:
//!     is_expand: true
//! ```
//!
//! The raw mapping is kept as-is so that malformed declarations survive
//! deserialization and are rejected when the declaration is resolved.

use crate::error::{Result, RunwayError};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Key of the options entry inside a declaration mapping.
pub const OPTIONS_KEY: &str = "opts";

/// Default for `is_expand` when defaults are filled.
pub const DEFAULT_IS_EXPAND: bool = true;
/// Default for `skip_if_empty` when defaults are filled.
pub const DEFAULT_SKIP_IF_EMPTY: bool = false;
/// Default for `is_required` when defaults are filled.
pub const DEFAULT_IS_REQUIRED: bool = false;
/// Default for `is_dont_change_value` when defaults are filled.
pub const DEFAULT_IS_DONT_CHANGE_VALUE: bool = false;
/// Default for `is_template` when defaults are filled.
pub const DEFAULT_IS_TEMPLATE: bool = false;

/// Options attached to a declaration.
///
/// Every flag is optional; an absent flag is treated as `false` during
/// resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentItemOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_options: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,

    /// Expand `$VAR` references against the environment resolved so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expand: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dont_change_value: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_template: Option<bool>,

    /// Leave the variable untouched when the declared value is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_if_empty: Option<bool>,

    /// Remove the variable instead of setting it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unset: Option<bool>,

    /// The value must be redacted from step output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sensitive: Option<bool>,
}

impl EnvironmentItemOptions {
    /// Whether `$VAR` references are expanded.
    pub fn expands(&self) -> bool {
        self.is_expand.unwrap_or(false)
    }

    /// Whether an empty value produces a skip.
    pub fn skips_if_empty(&self) -> bool {
        self.skip_if_empty.unwrap_or(false)
    }

    /// Whether the declaration removes the variable.
    pub fn unsets(&self) -> bool {
        self.unset.unwrap_or(false)
    }

    /// Whether the declared value is sensitive.
    pub fn sensitive(&self) -> bool {
        self.is_sensitive.unwrap_or(false)
    }

    /// Parse options from the raw `opts` value of a declaration.
    fn from_value(key: &str, value: &Value) -> Result<Self> {
        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return Ok(Self::default()),
            other => {
                return Err(RunwayError::InvalidOption {
                    key: key.to_string(),
                    option: OPTIONS_KEY.to_string(),
                    message: format!("expected a mapping, found {}", describe(other)),
                })
            }
        };

        let mut options = Self::default();
        for (option_key, option_value) in mapping {
            let Some(option) = option_key.as_str() else {
                return Err(RunwayError::InvalidOption {
                    key: key.to_string(),
                    option: format!("{:?}", option_key),
                    message: "option keys must be strings".to_string(),
                });
            };

            let flag = || cast_bool(key, option, option_value);
            let text = || cast_string(key, option, option_value);

            match option {
                "title" => options.title = Some(text()?),
                "description" => options.description = Some(text()?),
                "summary" => options.summary = Some(text()?),
                "category" => options.category = Some(text()?),
                "value_options" => {
                    options.value_options = cast_string_list(key, option, option_value)?
                }
                "is_required" => options.is_required = Some(flag()?),
                "is_expand" => options.is_expand = Some(flag()?),
                "is_dont_change_value" => options.is_dont_change_value = Some(flag()?),
                "is_template" => options.is_template = Some(flag()?),
                "skip_if_empty" => options.skip_if_empty = Some(flag()?),
                "unset" => options.unset = Some(flag()?),
                "is_sensitive" => options.is_sensitive = Some(flag()?),
                other => {
                    return Err(RunwayError::InvalidOption {
                        key: key.to_string(),
                        option: other.to_string(),
                        message: "not a supported option".to_string(),
                    })
                }
            }
        }

        Ok(options)
    }

    fn to_value(&self) -> Value {
        let mut mapping = Mapping::new();
        let mut put = |name: &str, value: Value| {
            mapping.insert(Value::String(name.to_string()), value);
        };

        for (name, text) in [
            ("title", &self.title),
            ("description", &self.description),
            ("summary", &self.summary),
            ("category", &self.category),
        ] {
            if let Some(text) = text {
                put(name, Value::String(text.clone()));
            }
        }

        if !self.value_options.is_empty() {
            put(
                "value_options",
                Value::Sequence(
                    self.value_options
                        .iter()
                        .cloned()
                        .map(Value::String)
                        .collect(),
                ),
            );
        }

        for (name, flag) in [
            ("is_required", self.is_required),
            ("is_expand", self.is_expand),
            ("is_dont_change_value", self.is_dont_change_value),
            ("is_template", self.is_template),
            ("skip_if_empty", self.skip_if_empty),
            ("unset", self.unset),
            ("is_sensitive", self.is_sensitive),
        ] {
            if let Some(flag) = flag {
                put(name, Value::Bool(flag));
            }
        }

        Value::Mapping(mapping)
    }
}

/// A single environment variable declaration.
///
/// # Example
///
/// ```
/// use runway::env::{EnvironmentItem, EnvironmentItemOptions};
///
/// let item = EnvironmentItem::new("URL", "https://$HOST").with_options(EnvironmentItemOptions {
///     is_expand: Some(true),
///     ..Default::default()
/// });
///
/// let (key, value) = item.key_value_pair().unwrap();
/// assert_eq!(key, "URL");
/// assert_eq!(value, "https://$HOST");
/// assert!(item.options().unwrap().expands());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentItem {
    entries: Mapping,
}

impl EnvironmentItem {
    /// Create a plain `KEY: value` declaration without options.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut entries = Mapping::new();
        entries.insert(Value::String(key.into()), Value::String(value.into()));
        Self { entries }
    }

    /// Create a declaration whose value is expanded.
    pub fn expanded(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key, value).with_options(EnvironmentItemOptions {
            is_expand: Some(true),
            ..Default::default()
        })
    }

    /// Create a declaration removing `key`.
    pub fn unset(key: impl Into<String>) -> Self {
        Self::new(key, "").with_options(EnvironmentItemOptions {
            unset: Some(true),
            ..Default::default()
        })
    }

    /// Create a declaration from a raw mapping, without validating it.
    pub fn from_mapping(entries: Mapping) -> Self {
        Self { entries }
    }

    /// Replace the declaration's options.
    pub fn with_options(mut self, options: EnvironmentItemOptions) -> Self {
        self.entries
            .insert(Value::String(OPTIONS_KEY.to_string()), options.to_value());
        self
    }

    /// The raw declaration mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.entries
    }

    /// Decompose the declaration into its key and string value.
    ///
    /// # Errors
    ///
    /// Returns [`RunwayError::MalformedDeclaration`] when the mapping does not
    /// hold exactly one variable entry (plus optional `opts`), or when the
    /// value cannot be represented as a string.
    pub fn key_value_pair(&self) -> Result<(String, String)> {
        if self.entries.is_empty() {
            return Err(self.malformed("no environment key specified"));
        }
        if self.entries.len() > 2 {
            return Err(self.malformed(format!(
                "more than 2 keys specified: {}",
                self.sorted_keys().join(", ")
            )));
        }

        let mut variable = None;
        let mut options_found = false;
        for (key, value) in &self.entries {
            match key.as_str() {
                Some(OPTIONS_KEY) => options_found = true,
                Some(name) => variable = Some((name, value)),
                None => return Err(self.malformed(format!("non-string key: {:?}", key))),
            }
        }

        let Some((key, value)) = variable else {
            return Err(self.malformed(format!(
                "no environment key found, keys: {}",
                self.sorted_keys().join(", ")
            )));
        };
        if self.entries.len() > 1 && !options_found {
            return Err(self.malformed(format!(
                "more than 1 environment key specified: {}",
                self.sorted_keys().join(", ")
            )));
        }
        if key.is_empty() {
            return Err(self.malformed("environment key is empty"));
        }

        let value = match value {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            Value::Bool(flag) => flag.to_string(),
            Value::Number(number) => number.to_string(),
            other => {
                return Err(RunwayError::MalformedDeclaration {
                    key: key.to_string(),
                    message: format!("value is not a string: {}", describe(other)),
                })
            }
        };

        Ok((key.to_string(), value))
    }

    /// Parse the declaration's options. Missing `opts` yields defaults.
    pub fn options(&self) -> Result<EnvironmentItemOptions> {
        match self.entries.get(OPTIONS_KEY) {
            Some(value) => EnvironmentItemOptions::from_value(&self.display_key(), value),
            None => Ok(EnvironmentItemOptions::default()),
        }
    }

    /// Fill every unset option flag with its canonical default.
    pub fn fill_defaults(&mut self) -> Result<()> {
        let mut options = self.options()?;
        options.title.get_or_insert_with(String::new);
        options.description.get_or_insert_with(String::new);
        options.summary.get_or_insert_with(String::new);
        options.category.get_or_insert_with(String::new);
        options.is_required.get_or_insert(DEFAULT_IS_REQUIRED);
        options.is_expand.get_or_insert(DEFAULT_IS_EXPAND);
        options
            .is_dont_change_value
            .get_or_insert(DEFAULT_IS_DONT_CHANGE_VALUE);
        options.is_template.get_or_insert(DEFAULT_IS_TEMPLATE);
        options.skip_if_empty.get_or_insert(DEFAULT_SKIP_IF_EMPTY);
        self.entries
            .insert(Value::String(OPTIONS_KEY.to_string()), options.to_value());
        Ok(())
    }

    /// Best-effort key for diagnostics, even for malformed declarations.
    pub fn display_key(&self) -> String {
        self.entries
            .keys()
            .filter_map(Value::as_str)
            .find(|key| *key != OPTIONS_KEY)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{{{}}}", self.sorted_keys().join(", ")))
    }

    fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .keys()
            .map(|key| match key.as_str() {
                Some(text) => text.to_string(),
                None => format!("{:?}", key),
            })
            .collect();
        keys.sort();
        keys
    }

    fn malformed(&self, message: impl Into<String>) -> RunwayError {
        RunwayError::MalformedDeclaration {
            key: self.display_key(),
            message: message.into(),
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn cast_bool(key: &str, option: &str, value: &Value) -> Result<bool> {
    let parsed = match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed.ok_or_else(|| RunwayError::InvalidOption {
        key: key.to_string(),
        option: option.to_string(),
        message: format!("failed to parse bool value ({:?})", value),
    })
}

fn cast_string(key: &str, option: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(RunwayError::InvalidOption {
            key: key.to_string(),
            option: option.to_string(),
            message: format!("expected a string, found {}", describe(other)),
        }),
    }
}

fn cast_string_list(key: &str, option: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| cast_string(key, option, item))
            .collect(),
        other => Err(RunwayError::InvalidOption {
            key: key.to_string(),
            option: option.to_string(),
            message: format!("expected a sequence, found {}", describe(other)),
        }),
    }
}
