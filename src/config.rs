//! Environment-driven configuration for IMAP accounts and pipeline settings
//!
//! Accounts follow the pattern `MAIL_IMAP_<SEGMENT>_<KEY>` and are discovered
//! by scanning for `MAIL_IMAP_*_HOST` variables. Pipeline settings use the
//! `MAIL_CONTEXT_` prefix.

use std::collections::BTreeMap;
use std::env;
use std::env::VarError;

use chrono::format::{Item, StrftimeItems};
use regex::Regex;
use secrecy::SecretString;

use crate::errors::{AppError, AppResult};
use crate::ordering::MAX_RESULTS;

/// IMAP account configuration
///
/// Passwords are stored using `SecretString` to prevent accidental logging.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// Account identifier (lowercase, used as default `account_id` parameter)
    pub account_id: String,
    /// IMAP server hostname
    pub host: String,
    /// IMAP server port (typically 993 for TLS)
    pub port: u16,
    /// Whether to use TLS (plaintext is refused at connect time)
    pub secure: bool,
    /// Username for authentication
    pub user: String,
    /// Password
    pub pass: SecretString,
}

/// Server-wide configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// All configured accounts, keyed by `account_id`
    pub accounts: BTreeMap<String, AccountConfig>,
    /// TCP connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// IMAP greeting/TLS handshake timeout in milliseconds
    pub greeting_timeout_ms: u64,
    /// Socket I/O timeout in milliseconds
    pub socket_timeout_ms: u64,
    /// Mailbox queried when a request does not name one
    pub default_mailbox: String,
    /// Upper bound on consolidated records per request (1..=20)
    pub max_results: usize,
    /// `strftime` pattern for resolved message dates (rendered in UTC)
    pub date_format: String,
}

impl ServerConfig {
    /// Load all configuration from environment variables
    ///
    /// If no accounts are explicitly defined, a `default` account is required
    /// via `MAIL_IMAP_DEFAULT_HOST`, `MAIL_IMAP_DEFAULT_USER`, and
    /// `MAIL_IMAP_DEFAULT_PASS`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if required environment variables are missing
    /// or malformed.
    ///
    /// # Example Environment
    ///
    /// ```text
    /// MAIL_IMAP_DEFAULT_HOST=imap.gmail.com
    /// MAIL_IMAP_DEFAULT_USER=user@gmail.com
    /// MAIL_IMAP_DEFAULT_PASS=app-password
    /// MAIL_CONTEXT_MAILBOX=INBOX
    /// MAIL_CONTEXT_MAX_RESULTS=20
    /// MAIL_CONTEXT_DATE_FORMAT=%Y-%m-%d %H:%M
    /// ```
    pub fn load_from_env() -> AppResult<Self> {
        let account_pattern = Regex::new(r"^MAIL_IMAP_([A-Z0-9_]+)_HOST$")
            .map_err(|e| AppError::Internal(format!("invalid account regex: {e}")))?;

        let mut account_segments: Vec<String> = env::vars()
            .filter_map(|(k, _)| {
                account_pattern
                    .captures(&k)
                    .and_then(|c| c.get(1).map(|m| m.as_str().to_owned()))
            })
            .collect();

        if account_segments.is_empty() {
            account_segments.push("DEFAULT".to_owned());
        }

        account_segments.sort();
        account_segments.dedup();

        let mut accounts = BTreeMap::new();
        for seg in account_segments {
            let account = load_account(&seg)?;
            accounts.insert(account.account_id.clone(), account);
        }

        let default_mailbox =
            optional_env("MAIL_CONTEXT_MAILBOX")?.unwrap_or_else(|| "INBOX".to_owned());

        let max_results = parse_usize_env("MAIL_CONTEXT_MAX_RESULTS", MAX_RESULTS)?;
        if !(1..=MAX_RESULTS).contains(&max_results) {
            return Err(AppError::InvalidInput(format!(
                "MAIL_CONTEXT_MAX_RESULTS must be in range 1..{MAX_RESULTS}"
            )));
        }

        let date_format = optional_env("MAIL_CONTEXT_DATE_FORMAT")?
            .unwrap_or_else(|| "%Y-%m-%d %H:%M".to_owned());
        validate_date_format(&date_format)?;

        Ok(Self {
            accounts,
            connect_timeout_ms: parse_u64_env("MAIL_IMAP_CONNECT_TIMEOUT_MS", 30_000)?,
            greeting_timeout_ms: parse_u64_env("MAIL_IMAP_GREETING_TIMEOUT_MS", 15_000)?,
            socket_timeout_ms: parse_u64_env("MAIL_IMAP_SOCKET_TIMEOUT_MS", 300_000)?,
            default_mailbox,
            max_results,
            date_format,
        })
    }

    /// Get account configuration by ID
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the account ID is not configured.
    pub fn get_account(&self, account_id: &str) -> AppResult<&AccountConfig> {
        self.accounts
            .get(account_id)
            .ok_or_else(|| AppError::NotFound(format!("account '{account_id}' is not configured")))
    }
}

/// Load a single account configuration from environment
///
/// `DEFAULT` becomes account id `default`; other segments are lowercased.
fn load_account(segment: &str) -> AppResult<AccountConfig> {
    let prefix = format!("MAIL_IMAP_{}_", sanitize_segment(segment));
    let host = required_env(&format!("{prefix}HOST"))?;
    let user = required_env(&format!("{prefix}USER"))?;
    let pass = required_env(&format!("{prefix}PASS"))?;

    Ok(AccountConfig {
        account_id: segment.to_ascii_lowercase(),
        host,
        port: parse_u16_env(&format!("{prefix}PORT"), 993)?,
        secure: parse_bool_env(&format!("{prefix}SECURE"), true)?,
        user,
        pass: SecretString::new(pass.into()),
    })
}

/// Reject `strftime` patterns chrono cannot render
///
/// chrono panics when formatting with an invalid item, so bad patterns must be
/// caught before any date is displayed.
fn validate_date_format(pattern: &str) -> AppResult<()> {
    if pattern.trim().is_empty() {
        return Err(AppError::invalid("MAIL_CONTEXT_DATE_FORMAT must not be empty"));
    }
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        return Err(AppError::InvalidInput(format!(
            "MAIL_CONTEXT_DATE_FORMAT is not a valid strftime pattern: '{pattern}'"
        )));
    }
    Ok(())
}

/// Read a required environment variable, returning error if missing or empty
fn required_env(key: &str) -> AppResult<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::InvalidInput(format!(
            "missing required environment variable {key}"
        ))),
    }
}

/// Read an optional environment variable; blank counts as unset
fn optional_env(key: &str) -> AppResult<Option<String>> {
    match env::var(key) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(AppError::InvalidInput(format!(
            "environment variable {key} contains non-unicode data"
        ))),
    }
}

/// Sanitize an account segment to uppercase alphanumeric/underscore
fn sanitize_segment(seg: &str) -> String {
    let mut out = String::with_capacity(seg.len());
    for ch in seg.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push('_');
        }
    }
    out.trim_matches('_').to_owned()
}

/// Parse a boolean environment variable with flexible values
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set to an unrecognized value.
fn parse_bool_env(key: &str, default: bool) -> AppResult<bool> {
    match optional_env(key)? {
        Some(v) => parse_bool_value(&v).ok_or_else(|| {
            AppError::InvalidInput(format!("invalid boolean environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}

fn parse_bool_value(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u16_env(key: &str, default: u16) -> AppResult<u16> {
    parse_numeric_env(key, default, "u16")
}

fn parse_u64_env(key: &str, default: u64) -> AppResult<u64> {
    parse_numeric_env(key, default, "u64")
}

fn parse_usize_env(key: &str, default: usize) -> AppResult<usize> {
    parse_numeric_env(key, default, "usize")
}

/// Parse a numeric environment variable, falling back to `default` if unset
///
/// # Errors
///
/// Returns `InvalidInput` if the variable is set but does not parse.
fn parse_numeric_env<T: std::str::FromStr>(key: &str, default: T, kind: &str) -> AppResult<T> {
    match optional_env(key)? {
        Some(v) => v.trim().parse::<T>().map_err(|_| {
            AppError::InvalidInput(format!("invalid {kind} environment variable {key}: '{v}'"))
        }),
        None => Ok(default),
    }
}
