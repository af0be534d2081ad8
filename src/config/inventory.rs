//! Secret inventory files.
//!
//! ```yaml
//! envs:
//!   - API_TOKEN: s3cr3t
//!   - BASIC_AUTH: "user:$API_TOKEN"
//!     opts:
//!       is_expand: true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::env::EnvironmentItem;
use crate::error::{Result, RunwayError};

#[derive(Debug, Default, Deserialize)]
struct Inventory {
    #[serde(default)]
    envs: Vec<EnvironmentItem>,
}

/// Load the secret declarations of an inventory file.
///
/// Declarations are only parsed here; they are validated when resolved.
pub fn load_inventory(path: &Path) -> Result<Vec<EnvironmentItem>> {
    let error = |message: String| RunwayError::Inventory {
        path: path.to_path_buf(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| error(e.to_string()))?;
    parse_inventory(&content).map_err(|e| error(e.to_string()))
}

/// Parse inventory YAML.
pub fn parse_inventory(content: &str) -> std::result::Result<Vec<EnvironmentItem>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    let inventory: Inventory = serde_yaml::from_str(content)?;
    Ok(inventory.envs)
}
