//! Configuration, built from environment variables.
//!
//! Missing required configuration is the only condition that ends the
//! process, and only at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::decision::DecisionPolicy;
use crate::error::ConfigError;
use crate::registry::SourceDescriptor;
use crate::sheets::SheetsAuth;

/// Sheet tab used when a watch-source entry omits one.
pub const DEFAULT_SHEET_NAME: &str = "Form Responses 1";

/// Discord transport settings.
pub struct DiscordConfig {
    pub bot_token: SecretString,
    pub channel_id: String,
    pub guild_id: String,
    pub staff_ping_user_id: String,
}

/// Full service configuration.
pub struct WatcherConfig {
    pub discord: DiscordConfig,
    pub sources: Vec<SourceDescriptor>,
    pub sheets_auth: SheetsAuth,
    pub policy: DecisionPolicy,
    pub poll_interval: Duration,
    pub state_path: PathBuf,
    pub http_port: u16,
}

impl WatcherConfig {
    /// Build from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let discord = DiscordConfig {
            bot_token: SecretString::from(required("DISCORD_TOKEN")?),
            channel_id: required("DISCORD_CHANNEL_ID")?,
            guild_id: required("DISCORD_GUILD_ID")?,
            staff_ping_user_id: required("STAFF_PING_USER_ID")?,
        };

        let sources = parse_sources(&required("WATCH_SOURCES")?)?;

        let sheets_auth = sheets_auth_from_env()?;

        let policy = DecisionPolicy {
            dm_on_reject: std::env::var("DM_ON_REJECT").is_ok_and(|v| v == "true"),
            accepted_role_id: std::env::var("ACCEPTED_ROLE_ID")
                .ok()
                .filter(|v| !v.is_empty()),
            call_deadline: Duration::from_secs(env_u64("CALL_DEADLINE_SECS", 30)),
        };

        Ok(Self {
            discord,
            sources,
            sheets_auth,
            policy,
            poll_interval: Duration::from_secs(env_u64("POLL_INTERVAL_SECS", 10)),
            state_path: std::env::var("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("processed_state.json")),
            http_port: env_u64("HTTP_PORT", 8080) as u16,
        })
    }
}

fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Service-account credentials win over a static token.
fn sheets_auth_from_env() -> Result<SheetsAuth, ConfigError> {
    if let Ok(client_email) = std::env::var("GOOGLE_SERVICE_ACCOUNT_EMAIL") {
        let key = required("GOOGLE_PRIVATE_KEY")?;
        return Ok(SheetsAuth::ServiceAccount {
            client_email,
            private_key_pem: SecretString::from(normalize_private_key(&key)),
        });
    }
    if let Ok(token) = std::env::var("GOOGLE_SHEETS_TOKEN") {
        return Ok(SheetsAuth::Static(SecretString::from(token)));
    }
    Err(ConfigError::MissingEnvVar(
        "GOOGLE_SERVICE_ACCOUNT_EMAIL".to_string(),
    ))
}

/// Env files often carry the PEM with literal `\n` sequences.
fn normalize_private_key(key: &str) -> String {
    if key.contains("\\n") {
        key.replace("\\n", "\n")
    } else {
        key.to_string()
    }
}

/// Parse the watch-source list: comma-separated
/// `spreadsheetId|sheetName|typeLabel` entries. Sheet name may be empty
/// (defaults to "Form Responses 1"); the label is required.
fn parse_sources(raw: &str) -> Result<Vec<SourceDescriptor>, ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: "WATCH_SOURCES".to_string(),
        message: message.to_string(),
    };

    let mut sources = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.split('|');
        let id = parts.next().unwrap_or("").trim();
        let sheet = parts.next().unwrap_or("").trim();
        let label = parts.next().unwrap_or("").trim();

        if id.is_empty() {
            return Err(invalid(&format!("missing spreadsheet id in {entry:?}")));
        }
        if label.is_empty() {
            return Err(invalid(&format!("missing type label in {entry:?}")));
        }

        sources.push(SourceDescriptor::new(
            id,
            if sheet.is_empty() { DEFAULT_SHEET_NAME } else { sheet },
            label,
        ));
    }

    if sources.is_empty() {
        return Err(invalid("no sources configured"));
    }
    Ok(sources)
}
