use std::path::Path;

use super::load_config;
use crate::exit_codes;

/// Print the effective configuration as YAML, secrets redacted.
pub fn run(config_path: Option<&Path>) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    print!("{}", serde_yaml::to_string(&config.redacted())?);
    Ok(exit_codes::SUCCESS)
}
