//! Step output env files.
//!
//! A step exports variables to later steps by writing `KEY=value` lines to
//! the file named by `RUNWAY_OUTPUT_ENV_FILE`.

use std::path::Path;

use crate::env::{EnvironmentItem, EnvironmentItemOptions};
use crate::error::{Result, RunwayError};

/// Environment key holding the path of a step's output env file.
pub const OUTPUT_ENV_FILE_ENV_KEY: &str = "RUNWAY_OUTPUT_ENV_FILE";

/// Parses dotenv-style output files.
///
/// # Supported Formats
///
/// - Simple: `KEY=value`
/// - Exported: `export KEY=value`
/// - Quoted: `KEY="value with spaces"` or `KEY='single quoted'`
/// - Escapes in double quotes: `KEY="line1\nline2"`
/// - Empty: `KEY=`
/// - Comments: `# This is a comment`
///
/// Lines are kept in file order; a key written twice yields two entries.
///
/// # Example
///
/// ```
/// use runway::config::EnvFileParser;
///
/// let content = r#"
/// # produced by the build step
/// export APK_PATH=out/app.apk
/// NOTES="first\nsecond"
/// "#;
///
/// let vars = EnvFileParser::parse(content);
/// assert_eq!(vars[0], ("APK_PATH".to_string(), "out/app.apk".to_string()));
/// assert_eq!(vars[1].1, "first\nsecond");
/// ```
pub struct EnvFileParser;

impl EnvFileParser {
    /// Parse file content into `(key, value)` pairs in file order.
    pub fn parse(content: &str) -> Vec<(String, String)> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(Self::parse_line)
            .collect()
    }

    /// Parse file content into literal (never expanded) declarations.
    pub fn parse_items(content: &str) -> Vec<EnvironmentItem> {
        let literal = EnvironmentItemOptions {
            is_expand: Some(false),
            ..Default::default()
        };
        Self::parse(content)
            .into_iter()
            .map(|(key, value)| EnvironmentItem::new(key, value).with_options(literal.clone()))
            .collect()
    }

    fn parse_line(line: &str) -> Option<(String, String)> {
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), Self::unquote(value.trim())))
    }

    fn unquote(value: &str) -> String {
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            Self::unescape(&value[1..value.len() - 1])
        } else if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
            value[1..value.len() - 1].to_string()
        } else {
            value.to_string()
        }
    }

    fn unescape(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    /// Load and parse an output env file.
    pub fn load(path: &Path) -> Result<Vec<EnvironmentItem>> {
        let content = std::fs::read_to_string(path).map_err(|e| RunwayError::EnvFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self::parse_items(&content))
    }

    /// Load an output env file, returning nothing if it doesn't exist.
    pub fn load_optional(path: &Path) -> Result<Vec<EnvironmentItem>> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Vec::new())
        }
    }
}
