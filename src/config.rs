use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AdapterError;

pub const DEFAULT_METEOMATICS_URL: &str = "https://api.meteomatics.com";
pub const DEFAULT_POWER_URL: &str = "https://power.larc.nasa.gov";

/// Basic-auth credentials for the weather provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Last day the account is valid, if known.
    pub valid_until: Option<NaiveDate>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            valid_until: None,
        }
    }

    pub fn with_valid_until(mut self, date: NaiveDate) -> Self {
        self.valid_until = Some(date);
        self
    }

    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        self.valid_until.map(|d| (d - today).num_days())
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.valid_until.is_some_and(|d| today > d)
    }
}

/// Retry and timeout policy for the adaptive fetch loop.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Retries after the first attempt for 5xx and network failures.
    pub retry_max: usize,
    /// Delay before the first retry; doubled for every further retry.
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_max: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Credentials plus the provider endpoint they belong to.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub url: String,
    pub credentials: Credentials,
}

#[derive(Debug, Default)]
struct RcConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    valid_until: Option<String>,
}

/// Loads Meteomatics credentials using (in order of precedence):
/// - explicit `username`/`password` arguments
/// - environment variables `METEOMATICS_USERNAME` / `METEOMATICS_PASSWORD`
/// - config file from `METEOMATICS_RC` or `.meteomaticsrc`
pub fn load_credentials(
    username: Option<String>,
    password: Option<String>,
) -> crate::error::Result<ProviderConfig> {
    let env = |name: &str| std::env::var(name).ok();
    load_config_from(username, password, &env, &rc_candidates(&env))
}

pub(crate) fn load_config_from(
    username: Option<String>,
    password: Option<String>,
    env: &dyn Fn(&str) -> Option<String>,
    rc_candidates: &[PathBuf],
) -> crate::error::Result<ProviderConfig> {
    let mut username = username.or_else(|| env("METEOMATICS_USERNAME"));
    let mut password = password.or_else(|| env("METEOMATICS_PASSWORD"));
    let mut url = env("METEOMATICS_URL");
    let mut valid_until = env("METEOMATICS_VALID_UNTIL");

    if username.is_none() || password.is_none() || url.is_none() || valid_until.is_none() {
        for rc_path in rc_candidates {
            if rc_path.exists() {
                let cfg = read_rc(rc_path).with_context(|| {
                    format!("failed to read configuration file {}", rc_path.display())
                })?;
                log::debug!("loaded provider configuration from {}", rc_path.display());

                username = username.or(cfg.username);
                password = password.or(cfg.password);
                url = url.or(cfg.url);
                valid_until = valid_until.or(cfg.valid_until);
                break;
            }
        }
    }

    let searched = || {
        if rc_candidates.is_empty() {
            "create .meteomaticsrc".to_string()
        } else {
            format!(
                "or put it in one of: {}",
                rc_candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
    };

    let Some(username) = username else {
        return Err(AdapterError::CredentialsMissing(format!(
            "Missing configuration: username (set METEOMATICS_USERNAME {})",
            searched()
        )));
    };
    let Some(password) = password else {
        return Err(AdapterError::CredentialsMissing(format!(
            "Missing configuration: password (set METEOMATICS_PASSWORD {})",
            searched()
        )));
    };

    let valid_until = match valid_until {
        Some(v) => Some(
            NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d")
                .with_context(|| format!("invalid valid_until date `{}` (expected YYYY-MM-DD)", v))?,
        ),
        None => None,
    };

    Ok(ProviderConfig {
        url: url.unwrap_or_else(|| DEFAULT_METEOMATICS_URL.to_string()),
        credentials: Credentials {
            username,
            password,
            valid_until,
        },
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path)?;
    let mut cfg = RcConfig::default();

    // Support formatting where `password:` is on one line and the value is on the next line.
    let mut pending_key: Option<&str> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(pk) = pending_key.take() {
            if !line.contains(':') {
                cfg.set(pk, strip_quotes(line));
                continue;
            }
        }

        if let Some((k, v)) = line.split_once(':') {
            let k = k.trim();
            let v = strip_quotes(v.trim());
            match k {
                "url" | "username" | "password" | "valid_until" => {
                    if v.is_empty() {
                        pending_key = Some(match k {
                            "url" => "url",
                            "username" => "username",
                            "password" => "password",
                            _ => "valid_until",
                        });
                    } else {
                        cfg.set(k, v);
                    }
                }
                other => log::debug!("ignoring unknown key `{}` in {}", other, path.display()),
            }
        }
    }

    if cfg.username.is_none() && cfg.password.is_none() && cfg.url.is_none() {
        return Err(anyhow!("no recognised keys (url, username, password, valid_until)"));
    }

    Ok(cfg)
}

impl RcConfig {
    fn set(&mut self, key: &str, value: &str) {
        let value = Some(value.to_string());
        match key {
            "url" => self.url = value,
            "username" => self.username = value,
            "password" => self.password = value,
            "valid_until" => self.valid_until = value,
            _ => {}
        }
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    if (s.starts_with('"') && s.ends_with('"') && s.len() >= 2)
        || (s.starts_with('\'') && s.ends_with('\'') && s.len() >= 2)
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

fn rc_candidates(env: &dyn Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    // 1) METEOMATICS_RC (explicit)
    // 2) ./.meteomaticsrc
    // 3) ~/.meteomaticsrc
    if let Some(p) = env("METEOMATICS_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".meteomaticsrc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".meteomaticsrc"));
    }
    v
}
