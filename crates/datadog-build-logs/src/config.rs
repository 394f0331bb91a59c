// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConfigError;
use std::collections::HashMap;
use std::env;

const DEFAULT_SITE: &str = "datadoghq.com";
const DEFAULT_FLUSH_TIMEOUT: u64 = 30;
const DEFAULT_COMPRESSION_LEVEL: i32 = 6;

/// Configuration for shipping build logs to Datadog
#[derive(Debug, Clone)]
pub struct Config {
    /// Datadog API key for authentication
    pub api_key: Option<String>,
    /// Datadog site (e.g., datadoghq.com, datadoghq.eu)
    pub site: String,
    /// Overrides the logs intake URL derived from `site`
    pub logs_dd_url: Option<String>,
    /// Service name attached to every log entry, defaults to the job name
    pub service: Option<String>,
    /// Hostname attached to every log entry, defaults to the build node
    pub hostname: Option<String>,
    /// Extra tags attached to every log entry
    pub tags: HashMap<String, String>,
    /// Number of trailing build log lines to ship, negative for all of them
    pub max_lines: i64,
    /// Whether payloads are zstd compressed
    pub use_compression: bool,
    /// zstd compression level
    pub compression_level: i32,
    /// Request timeout in seconds
    pub flush_timeout: u64,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Forces "http1" or "http2"
    pub http_protocol: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            site: DEFAULT_SITE.to_string(),
            logs_dd_url: None,
            service: None,
            hostname: None,
            tags: HashMap::new(),
            max_lines: -1,
            use_compression: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            https_proxy: None,
            http_protocol: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("DD_API_KEY").filter(|key| !key.trim().is_empty());
        let site = lookup("DD_SITE").unwrap_or_else(|| DEFAULT_SITE.to_string());
        let logs_dd_url = lookup("DD_LOGS_CONFIG_LOGS_DD_URL");
        let service = lookup("DD_SERVICE");
        let hostname = lookup("DD_HOSTNAME");
        let tags = lookup("DD_TAGS")
            .map(|val| parse_tags(&val))
            .unwrap_or_default();
        let max_lines = lookup("DD_BUILD_LOGS_MAX_LINES")
            .and_then(|val| val.trim().parse::<i64>().ok())
            .unwrap_or(-1);
        let use_compression = lookup("DD_LOGS_CONFIG_USE_COMPRESSION")
            .map(|val| val.to_lowercase() != "false")
            .unwrap_or(true);
        let compression_level = lookup("DD_LOGS_CONFIG_COMPRESSION_LEVEL")
            .and_then(|val| val.trim().parse::<i32>().ok())
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        let flush_timeout = lookup("DD_FLUSH_TIMEOUT")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_FLUSH_TIMEOUT);
        let https_proxy = lookup("DD_PROXY_HTTPS").or_else(|| lookup("HTTPS_PROXY"));
        let http_protocol = lookup("DD_HTTP_PROTOCOL").map(|val| val.to_lowercase());
        let log_level = lookup("DD_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        let config = Self {
            api_key,
            site,
            logs_dd_url,
            service,
            hostname,
            tags,
            max_lines,
            use_compression,
            compression_level,
            flush_timeout,
            https_proxy,
            http_protocol,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "DD_SITE cannot be empty".to_string(),
            ));
        }

        if self.flush_timeout == 0 {
            return Err(ConfigError::InvalidConfig(
                "DD_FLUSH_TIMEOUT must be greater than 0".to_string(),
            ));
        }

        if let Some(protocol) = &self.http_protocol {
            if protocol != "http1" && protocol != "http2" {
                return Err(ConfigError::InvalidConfig(format!(
                    "Invalid HTTP protocol '{protocol}'. Must be one of: http1, http2"
                )));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Base URL of the logs intake, without the `/api/v2/logs` path
    #[must_use]
    pub fn logs_intake_url(&self) -> String {
        match &self.logs_dd_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://http-intake.logs.{}", self.site.trim()),
        }
    }
}

/// Parses `key:value` pairs separated by commas or spaces.
///
/// Tags without a value are kept with an empty value.
#[must_use]
pub fn parse_tags(raw: &str) -> HashMap<String, String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(|tag| match tag.split_once(':') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (tag.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_lines, -1);
    }

    #[test]
    fn test_validate_empty_site() {
        let config = Config {
            site: "   ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            flush_timeout: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_http_protocol() {
        let config = Config {
            http_protocol: Some("http3".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_logs_intake_url_from_site() {
        let config = Config {
            site: "datadoghq.eu".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.logs_intake_url(),
            "https://http-intake.logs.datadoghq.eu"
        );
    }

    #[test]
    fn test_logs_intake_url_override() {
        let config = Config {
            logs_dd_url: Some("http://127.0.0.1:8080/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.logs_intake_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("DD_API_KEY", "abc"),
            ("DD_SITE", "us5.datadoghq.com"),
            ("DD_TAGS", "team:ci,env:prod"),
            ("DD_BUILD_LOGS_MAX_LINES", "200"),
            ("DD_LOGS_CONFIG_USE_COMPRESSION", "FALSE"),
            ("HTTPS_PROXY", "http://proxy:3128"),
            ("DD_LOG_LEVEL", "DEBUG"),
        ]))
        .expect("config should load");

        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.site, "us5.datadoghq.com");
        assert_eq!(config.tags.get("team").map(String::as_str), Some("ci"));
        assert_eq!(config.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(config.max_lines, 200);
        assert!(!config.use_compression);
        assert_eq!(config.https_proxy.as_deref(), Some("http://proxy:3128"));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_from_lookup_ignores_unparsable_numbers() {
        let config = Config::from_lookup(lookup_from(&[
            ("DD_BUILD_LOGS_MAX_LINES", "lots"),
            ("DD_FLUSH_TIMEOUT", "soon"),
        ]))
        .expect("config should load");

        assert_eq!(config.max_lines, -1);
        assert_eq!(config.flush_timeout, DEFAULT_FLUSH_TIMEOUT);
    }

    #[test]
    fn test_from_lookup_rejects_invalid_log_level() {
        let result = Config::from_lookup(lookup_from(&[("DD_LOG_LEVEL", "loud")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_tags() {
        let tags = parse_tags("team:ci, env:prod standalone");
        assert_eq!(tags.len(), 3);
        assert_eq!(tags.get("team").map(String::as_str), Some("ci"));
        assert_eq!(tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(tags.get("standalone").map(String::as_str), Some(""));
        assert!(parse_tags("  ,, ").is_empty());
    }
}
