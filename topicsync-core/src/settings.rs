//! Credentials and operational toggles.
//!
//! Read once at process start and passed explicitly to the paging and chat
//! clients; nothing reads the environment after [`Settings::from_env`].

use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

pub const PAGING_TOKEN_VAR: &str = "PAGERDUTY_API_KEY";
pub const CHAT_TOKEN_VAR: &str = "SLACK_API_KEY";
pub const DRY_RUN_VAR: &str = "DRY_RUN";
pub const PAGING_URL_VAR: &str = "TOPICSYNC_PAGERDUTY_URL";
pub const CHAT_URL_VAR: &str = "TOPICSYNC_SLACK_URL";
pub const TIMEOUT_VAR: &str = "TOPICSYNC_TIMEOUT_SECS";

pub const DEFAULT_PAGING_URL: &str = "https://api.pagerduty.com";
pub const DEFAULT_CHAT_URL: &str = "https://slack.com/api";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Validated process-wide settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub paging_token: String,
    pub chat_token: String,
    /// When set, every topic write is downgraded to a logged no-op.
    pub dry_run: bool,
    pub paging_base_url: String,
    pub chat_base_url: String,
    /// Per-request transport timeout.
    pub request_timeout: Duration,
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    ///
    /// `DRY_RUN` is enabled by presence alone, whatever its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let paging_token = required(&lookup, PAGING_TOKEN_VAR)?;
        let chat_token = required(&lookup, CHAT_TOKEN_VAR)?;
        let dry_run = lookup(DRY_RUN_VAR).is_some();

        let paging_base_url = base_url(&lookup, PAGING_URL_VAR, DEFAULT_PAGING_URL);
        let chat_base_url = base_url(&lookup, CHAT_URL_VAR, DEFAULT_CHAT_URL);

        let request_timeout = match lookup(TIMEOUT_VAR) {
            None => DEFAULT_REQUEST_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            paging_token,
            chat_token,
            dry_run,
            paging_base_url,
            chat_base_url,
            request_timeout,
        })
    }

    /// Force dry-run regardless of the environment (CLI `--dry-run`).
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = self.dry_run || dry_run;
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("paging_token", &"<redacted>")
            .field("chat_token", &"<redacted>")
            .field("dry_run", &self.dry_run)
            .field("paging_base_url", &self.paging_base_url)
            .field("chat_base_url", &self.chat_base_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Credentials must be present and contain something other than whitespace.
fn required<F>(lookup: &F, var: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingCredential { var }),
    }
}

fn base_url<F>(lookup: &F, var: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_tokens_are_set() {
        let settings = Settings::from_lookup(lookup_from(&[
            (PAGING_TOKEN_VAR, "pd"),
            (CHAT_TOKEN_VAR, "xoxb"),
        ]))
        .expect("settings");
        assert!(!settings.dry_run);
        assert_eq!(settings.paging_base_url, DEFAULT_PAGING_URL);
        assert_eq!(settings.chat_base_url, DEFAULT_CHAT_URL);
        assert_eq!(settings.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let settings = Settings::from_lookup(lookup_from(&[
            (PAGING_TOKEN_VAR, "pd-secret"),
            (CHAT_TOKEN_VAR, "xoxb-secret"),
        ]))
        .expect("settings");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret"), "got: {rendered}");
    }

    #[test]
    fn base_urls_lose_trailing_slash() {
        let settings = Settings::from_lookup(lookup_from(&[
            (PAGING_TOKEN_VAR, "pd"),
            (CHAT_TOKEN_VAR, "xoxb"),
            (PAGING_URL_VAR, "http://127.0.0.1:9000/"),
        ]))
        .expect("settings");
        assert_eq!(settings.paging_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn cli_flag_cannot_disable_env_dry_run() {
        let settings = Settings::from_lookup(lookup_from(&[
            (PAGING_TOKEN_VAR, "pd"),
            (CHAT_TOKEN_VAR, "xoxb"),
            (DRY_RUN_VAR, ""),
        ]))
        .expect("settings")
        .with_dry_run(false);
        assert!(settings.dry_run);
    }
}
