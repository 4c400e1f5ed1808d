use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use sumi_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Rate: {} req/s", config.scheduler.requests_per_second);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of configuration text
///
/// Recorded with every ledger run so that runs made under different settings
/// can be told apart.
pub fn compute_config_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Loads a configuration and returns both the config and its hash
///
/// Without a path the built-in defaults are used and hashed as an empty
/// document.
pub fn load_config_with_hash(path: Option<&Path>) -> Result<(Config, String), ConfigError> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let config = parse_config(&content)?;
            Ok((config, compute_config_hash(&content)))
        }
        None => {
            let config = Config::default();
            validate(&config)?;
            Ok((config, compute_config_hash("")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[site]
base-url = "https://novels.example.com"
catalog-path = "/list/{page}.html"

[scheduler]
requests-per-second = 1.5
max-retries = 5

[delays]
min-item-delay-ms = 0
max-item-delay-ms = 10

[output]
data-dir = "./out"

[[identity]]
user-agent = "TestAgent/1.0"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.base_url, "https://novels.example.com");
        assert_eq!(config.scheduler.requests_per_second, 1.5);
        assert_eq!(config.scheduler.max_retries, 5);
        // Unspecified keys keep their defaults
        assert_eq!(config.scheduler.base_retry_delay_ms, 2000);
        assert_eq!(config.output.data_dir, "./out");
        assert_eq!(config.output.log_dir, "./logs");
        assert_eq!(config.identities.len(), 1);
        assert!(config.identities[0].accept.starts_with("text/html"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.site.default_category, "Fantasy");
        assert_eq!(config.scheduler.max_retries, 3);
        assert_eq!(config.identity_profiles().len(), 5);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[scheduler]
requests-per-second = 0.0
"#;
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let hash1 = compute_config_hash("test content");
        let hash2 = compute_config_hash("test content");

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, compute_config_hash("other content"));
    }

    #[test]
    fn test_load_defaults_without_path() {
        let (config, hash) = load_config_with_hash(None).unwrap();
        assert_eq!(config.output.data_dir, "./data");
        assert_eq!(hash, compute_config_hash(""));
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../../harvest.example.toml")).unwrap();
        assert_eq!(config.identities.len(), 2);
        assert_eq!(config.identities[1].accept, "text/html,application/xhtml+xml");
        assert_eq!(config.selectors.chapter_noise, "script, div[align=\"center\"]");
    }
}
