//! Secret values and output redaction.
//!
//! - [`SecretSet`] - The secret values of a run
//! - [`RedactingWriter`] - Replaces secrets in a byte stream with [`REDACTED`]
//! - [`is_secret_filtering`] - Whether redaction is enabled for a run
//!
//! # Example
//!
//! ```
//! use runway::secrets::SecretSet;
//!
//! let secrets = SecretSet::new(["super-secret-value"]);
//! let output = secrets.redact("The key is super-secret-value here");
//! assert_eq!(output, "The key is [REDACTED] here");
//! ```

pub mod redact;
pub mod set;

pub use redact::{RedactingWriter, REDACTED};
pub use set::SecretSet;

use crate::env::{resolve_declarations, Environment, EnvironmentItem};
use crate::error::Result;

/// Environment key that toggles secret filtering.
pub const SECRET_FILTERING_ENV_KEY: &str = "RUNWAY_SECRET_FILTERING";

/// Whether secret filtering is enabled.
///
/// An explicit `flag` wins. Otherwise the secret declarations are resolved
/// and filtering is enabled unless they set `RUNWAY_SECRET_FILTERING` to
/// something other than `"true"`. Filtering defaults to enabled.
pub fn is_secret_filtering(flag: Option<bool>, secrets: &[EnvironmentItem]) -> Result<bool> {
    if let Some(flag) = flag {
        return Ok(flag);
    }

    let effects = resolve_declarations(secrets, &Environment::new())?;
    Ok(effects
        .result_environment
        .value(SECRET_FILTERING_ENV_KEY)
        .map_or(true, |value| value == "true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flag_wins() {
        let secrets = vec![EnvironmentItem::new(SECRET_FILTERING_ENV_KEY, "true")];
        assert!(!is_secret_filtering(Some(false), &secrets).unwrap());
        assert!(is_secret_filtering(Some(true), &[]).unwrap());
    }

    #[test]
    fn defaults_to_enabled() {
        assert!(is_secret_filtering(None, &[]).unwrap());
    }

    #[test]
    fn secret_declaration_disables() {
        let secrets = vec![EnvironmentItem::new(SECRET_FILTERING_ENV_KEY, "false")];
        assert!(!is_secret_filtering(None, &secrets).unwrap());
    }

    #[test]
    fn later_declaration_overrides_earlier() {
        let secrets = vec![
            EnvironmentItem::new(SECRET_FILTERING_ENV_KEY, "false"),
            EnvironmentItem::new("ENABLE", "true"),
            EnvironmentItem::expanded(SECRET_FILTERING_ENV_KEY, "$ENABLE"),
        ];
        assert!(is_secret_filtering(None, &secrets).unwrap());
    }
}
