use super::types::*;
use crate::config::{expand_env_vars, expand_tilde};
use regex::Regex;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    // Expand environment variables in the YAML string before parsing
    let yaml_string = expand_env_vars(&yaml_string);
    check_unexpanded_vars(&yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;

    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    let mut unexpanded_vars: Vec<String> = re
        .captures_iter(yaml_string)
        .map(|cap| cap.get(1).unwrap().as_str().to_string())
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    Err(ConfigError::Validation(format!(
        "Environment variables are not set: {}\n\
         Set them before running, or replace the $env{{...}} references in the \
         config file with literal values",
        unexpanded_vars.join(", ")
    )))
}

/// Expands tilde (~) in all PathBuf fields in the config.
fn expand_paths(config: &mut Config) {
    config.database.path = expand_tilde(&config.database.path);
    config.watermark.state_file = expand_tilde(&config.watermark.state_file);
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.s3.bucket.is_empty() {
        errors.push("s3.bucket must not be empty".to_string());
    }

    if config.s3.base_path.is_empty() {
        errors.push("s3.base_path must not be empty".to_string());
    } else if config.s3.base_path.ends_with('/') {
        errors.push(format!(
            "s3.base_path '{}' must not end with '/' (date partitions are appended)",
            config.s3.base_path
        ));
    }

    if config.database.path.as_os_str().is_empty() {
        errors.push("database.path must not be empty".to_string());
    }

    if config.watermark.backend == WatermarkBackend::File
        && config.watermark.state_file.as_os_str().is_empty()
    {
        errors.push("watermark.state_file must be set when watermark.backend is 'file'".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    const VALID_YAML: &str = r#"
s3:
  bucket: my-log-bucket
  base_path: AWSLogs/123456789012/elasticloadbalancing/us-east-1
  start_date: 2023-01-01
database:
  path: /tmp/albsync-test.duckdb
"#;

    #[test]
    fn test_load_valid_config() {
        let file = write_config(VALID_YAML);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.s3.bucket, "my-log-bucket");
        assert_eq!(
            config.s3.start_date,
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        // Watermark section is optional and defaults to the database backend
        assert_eq!(config.watermark.backend, WatermarkBackend::Database);
    }

    #[test]
    fn test_file_backend_selected() {
        let yaml = format!(
            "{}watermark:\n  backend: file\n  state_file: /tmp/last_sync.json\n",
            VALID_YAML
        );
        let file = write_config(&yaml);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.watermark.backend, WatermarkBackend::File);
    }

    #[test]
    fn test_trailing_slash_base_path_rejected() {
        let yaml = VALID_YAML.replace(
            "base_path: AWSLogs/123456789012/elasticloadbalancing/us-east-1",
            "base_path: AWSLogs/123456789012/elasticloadbalancing/us-east-1/",
        );
        let file = write_config(&yaml);
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationList(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("ALBSYNC_TEST_BUCKET", "expanded-bucket");
        let yaml = VALID_YAML.replace("my-log-bucket", "$env{ALBSYNC_TEST_BUCKET}");
        let file = write_config(&yaml);
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.s3.bucket, "expanded-bucket");
    }

    #[test]
    fn test_unset_env_var_is_an_error() {
        let yaml = VALID_YAML.replace("my-log-bucket", "$env{ALBSYNC_DEFINITELY_UNSET_VAR}");
        let file = write_config(&yaml);
        let err = load_config(file.path()).unwrap_err();
        assert!(err
            .to_string()
            .contains("ALBSYNC_DEFINITELY_UNSET_VAR"));
    }

    #[test]
    fn test_missing_start_date_is_an_error() {
        let yaml = VALID_YAML.replace("  start_date: 2023-01-01\n", "");
        let file = write_config(&yaml);
        assert!(load_config(file.path()).is_err());
    }
}
