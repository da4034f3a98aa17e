//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (AGENT_WARDEN__*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::access_control::{AccessPattern, PermissionRule};
use crate::config::types::{AppConfig, PatternConfig};
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "agent-warden.toml",
    ".agent-warden.toml",
    "~/.config/agent-warden/config.toml",
    "/etc/agent-warden/config.toml",
];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with AGENT_WARDEN prefix
    // e.g., AGENT_WARDEN__EVALUATOR__AUDIT_CAPACITY, AGENT_WARDEN__LOGGING__LEVEL
    // Double underscore (__) maps to nested keys (evaluator.audit_capacity)
    builder = builder.add_source(
        Environment::with_prefix("AGENT_WARDEN")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values
///
/// Compiles every pattern and rule so that a bad glob or an unknown name is
/// reported at load time, with the field it came from.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.evaluator.audit_capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "evaluator.audit_capacity must be greater than 0".to_string(),
        });
    }

    if config.evaluator.predicate_timeout_ms == Some(0) {
        return Err(ConfigError::Invalid {
            message: "evaluator.predicate_timeout_ms must be greater than 0".to_string(),
        });
    }

    for (agent_id, agent) in &config.agents {
        if agent_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "agent ids must not be empty".to_string(),
            });
        }
        for (i, tool) in agent.tools.iter().enumerate() {
            for (j, pattern) in tool.patterns.iter().enumerate() {
                validate_pattern(
                    pattern,
                    &format!("agents.{}.tools[{}].patterns[{}]", agent_id, i, j),
                )?;
            }
        }
    }

    validate_rules(config)?;

    Ok(())
}

/// Validate that a pattern compiles
fn validate_pattern(pattern: &PatternConfig, field_path: &str) -> Result<(), ConfigError> {
    AccessPattern::from_config(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.id().to_string(),
        reason: format!("in {}: {}", field_path, e),
    })?;
    Ok(())
}

/// Validate seed rules and reject duplicate ids
fn validate_rules(config: &AppConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for rule_config in &config.rules {
        let rule = PermissionRule::from_config(rule_config)?;
        rule.validate()?;
        if !seen.insert(rule.id.clone()) {
            return Err(ConfigError::Invalid {
                message: format!("duplicate rule id '{}'", rule.id),
            });
        }
    }
    Ok(())
}
