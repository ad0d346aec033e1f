use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default columns/rows applied when a `create` request omits them.
pub const DEFAULT_COLS: u16 = 120;
pub const DEFAULT_ROWS: u16 = 30;

/// Grace window the session manager waits for a late-binding WS upgrade
/// after a session is created, before the row is eligible for idle checks.
pub const ATTACH_GRACE_MS: u64 = 0;

/// Top-level config (shellcast.toml + SHELLCAST_* env overrides).
///
/// Only `database.path` affects the core (spec'd explicitly); the rest is
/// read solely by the gateway's bridge gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session_cookie: SessionCookieConfig,
    #[serde(default)]
    pub bootstrap_admin: BootstrapAdminConfig,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            session_cookie: SessionCookieConfig::default(),
            bootstrap_admin: BootstrapAdminConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// The cookie used to carry a signed session token to the WS bridge gate.
/// Signing/verification of the token itself is an external collaborator —
/// the core only needs the cookie's name to look it up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCookieConfig {
    #[serde(default = "default_cookie_name")]
    pub name: String,
    #[serde(default = "default_session_secret")]
    pub secret: String,
}

impl Default for SessionCookieConfig {
    fn default() -> Self {
        Self {
            name: default_cookie_name(),
            secret: default_session_secret(),
        }
    }
}

/// Bootstrap admin credentials, read by an external collaborator (the user
/// CRUD surface) on first boot when no users exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,
    #[serde(default = "default_admin_password")]
    pub password: String,
}

impl Default for BootstrapAdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: default_admin_password(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.shellcast/shellcast.db")
}
fn default_cookie_name() -> String {
    "shellcast_session".to_string()
}
fn default_session_secret() -> String {
    "change-me-please-very-secret".to_string()
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_admin_password() -> String {
    "admin-change-me".to_string()
}

impl BrokerConfig {
    /// Load config from a TOML file with `SHELLCAST_*` env var overrides.
    ///
    /// Checks, in order: explicit path argument, then
    /// `~/.shellcast/shellcast.toml`, falling back to built-in defaults when
    /// neither a file nor overrides are present.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("SHELLCAST_").split("_"))
            .extract()
            .map_err(|e| crate::error::CoreError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.shellcast/shellcast.toml")
}
