pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, ConfigError};
pub use types::{Config, DatabaseConfig, S3Config, WatermarkBackend, WatermarkConfig};

/// Expands environment variables in a string.
/// Supports $env{VAR_NAME} syntax.
/// If an environment variable is not set, it's left unchanged.
pub fn expand_env_vars(text: &str) -> String {
    let re = Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    re.replace_all(text, |caps: &regex::Captures| {
        let var_name = caps.get(1).unwrap().as_str();

        std::env::var(var_name).unwrap_or_else(|_| {
            // If not set, return original match unchanged
            caps.get(0).unwrap().as_str().to_string()
        })
    })
    .to_string()
}

/// Expands tilde (~) in paths to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();

    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    } else if path_str == "~" {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir;
        }
    }

    path.to_path_buf()
}

/// Resolves the config profile path for the selected environment.
///
/// An explicit `--config` path wins. Otherwise the environment name selects a
/// profile under `resources/`: dev, qa, preprod and prod each load their own
/// file, anything else (including no `-e` at all) falls back to the local
/// profile.
pub fn resolve_profile_path(env_name: Option<&str>, explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return expand_tilde(path);
    }

    let profile = match env_name {
        Some("dev") => "dev",
        Some("qa") => "qa",
        Some("preprod") => "preprod",
        Some("prod") => "prod",
        _ => "local",
    };

    PathBuf::from(format!("resources/{}.yml", profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("ALBSYNC_TEST_REGION", "eu-west-1");
        assert_eq!(
            expand_env_vars("region: $env{ALBSYNC_TEST_REGION}"),
            "region: eu-west-1"
        );
        // Unset variables are left verbatim for the later validation pass
        assert_eq!(
            expand_env_vars("$env{ALBSYNC_NO_SUCH_VAR_42}"),
            "$env{ALBSYNC_NO_SUCH_VAR_42}"
        );
    }

    #[test]
    fn test_resolve_profile_path_known_envs() {
        for env in ["dev", "qa", "preprod", "prod"] {
            assert_eq!(
                resolve_profile_path(Some(env), None),
                PathBuf::from(format!("resources/{}.yml", env))
            );
        }
    }

    #[test]
    fn test_resolve_profile_path_defaults_to_local() {
        assert_eq!(
            resolve_profile_path(None, None),
            PathBuf::from("resources/local.yml")
        );
        assert_eq!(
            resolve_profile_path(Some("staging"), None),
            PathBuf::from("resources/local.yml")
        );
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let explicit = PathBuf::from("/etc/albsync/custom.yml");
        assert_eq!(
            resolve_profile_path(Some("prod"), Some(&explicit)),
            explicit
        );
    }
}
