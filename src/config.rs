//! Configuration for the scripting bridge and server defaults
//!
//! All configuration is loaded from environment variables prefixed with
//! `MAIL_APPLE_`. Every setting has a default, so an empty environment yields
//! a working configuration on a stock macOS install.

use std::env;
use std::env::VarError;
use std::path::PathBuf;

use crate::errors::{AppError, AppResult};

const OSASCRIPT_PATH_KEY: &str = "MAIL_APPLE_OSASCRIPT_PATH";
const APP_NAME_KEY: &str = "MAIL_APPLE_APP_NAME";
const LIST_LIMIT_KEY: &str = "MAIL_APPLE_LIST_LIMIT";
const SEARCH_LIMIT_KEY: &str = "MAIL_APPLE_SEARCH_LIMIT";

/// Server-wide configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Path of the `osascript` executable
    pub osascript_path: PathBuf,
    /// Name of the scriptable mail application (`tell application "<name>"`)
    pub app_name: String,
    /// Default `limit` for `list_emails`
    pub list_limit: usize,
    /// Default `limit` for `search_emails`
    pub search_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            osascript_path: PathBuf::from("/usr/bin/osascript"),
            app_name: "Mail".to_owned(),
            list_limit: 50,
            search_limit: 20,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if a variable is set but malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_APPLE_OSASCRIPT_PATH=/usr/bin/osascript
    /// MAIL_APPLE_APP_NAME=Mail
    /// MAIL_APPLE_LIST_LIMIT=50
    /// MAIL_APPLE_SEARCH_LIMIT=20
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        Self::load_with(|key| env::var(key))
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn load_with<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let defaults = Self::default();
        let osascript_path = optional_env(&lookup, OSASCRIPT_PATH_KEY)?
            .map_or(defaults.osascript_path, PathBuf::from);
        let app_name = match optional_env(&lookup, APP_NAME_KEY)? {
            Some(name) => validate_app_name(name)?,
            None => defaults.app_name,
        };
        let list_limit = parse_limit_env(&lookup, LIST_LIMIT_KEY, defaults.list_limit)?;
        let search_limit = parse_limit_env(&lookup, SEARCH_LIMIT_KEY, defaults.search_limit)?;

        Ok(Self {
            osascript_path,
            app_name,
            list_limit,
            search_limit,
        })
    }
}

/// Read a variable, treating unset and blank values alike
fn optional_env<F>(lookup: &F, key: &str) -> AppResult<Option<String>>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match lookup(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v.trim().to_owned())),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidParameter(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// The application name is embedded in every script
fn validate_app_name(name: String) -> AppResult<String> {
    if name.chars().any(char::is_control) {
        return Err(AppError::InvalidParameter(format!(
            "{APP_NAME_KEY} must not contain control characters"
        )));
    }
    Ok(name)
}

/// Parse a positive `usize` limit with default fallback
///
/// # Errors
///
/// Returns `InvalidParameter` if the variable is set but not a positive
/// integer.
fn parse_limit_env<F>(lookup: &F, key: &str, default: usize) -> AppResult<usize>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    match optional_env(lookup, key)? {
        Some(v) => match v.parse::<usize>() {
            Ok(limit) if limit >= 1 => Ok(limit),
            _ => Err(AppError::InvalidParameter(format!(
                "invalid limit environment variable {key}: '{v}'"
            ))),
        },
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;
    use std::path::PathBuf;

    use super::ServerConfig;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, crate::errors::AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        ServerConfig::load_with(|key| vars.get(key).cloned().ok_or(VarError::NotPresent))
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = load(&[]).expect("defaults must load");
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.list_limit, 50);
        assert_eq!(config.search_limit, 20);
        assert_eq!(config.app_name, "Mail");
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("MAIL_APPLE_OSASCRIPT_PATH", "/opt/bin/osascript"),
            ("MAIL_APPLE_APP_NAME", " Mail Beta "),
            ("MAIL_APPLE_LIST_LIMIT", "10"),
            ("MAIL_APPLE_SEARCH_LIMIT", "5"),
        ])
        .expect("overrides must load");
        assert_eq!(config.osascript_path, PathBuf::from("/opt/bin/osascript"));
        assert_eq!(config.app_name, "Mail Beta");
        assert_eq!(config.list_limit, 10);
        assert_eq!(config.search_limit, 5);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("MAIL_APPLE_APP_NAME", "   "), ("MAIL_APPLE_LIST_LIMIT", "")])
            .expect("blank values must load");
        assert_eq!(config.app_name, "Mail");
        assert_eq!(config.list_limit, 50);
    }

    #[test]
    fn rejects_zero_and_garbage_limits() {
        for bad in ["0", "-3", "many"] {
            let err = load(&[("MAIL_APPLE_SEARCH_LIMIT", bad)]).expect_err("limit must fail");
            assert!(err.to_string().contains("MAIL_APPLE_SEARCH_LIMIT"));
        }
    }

    #[test]
    fn rejects_control_characters_in_app_name() {
        let err = load(&[("MAIL_APPLE_APP_NAME", "Mail\u{7}")]).expect_err("must fail");
        assert!(err.to_string().contains("control characters"));
    }
}
