use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::Store;

/// Broker-wide policy snapshot, resolved by merging hardcoded defaults with
/// whatever has been overridden in `app_settings`.
///
/// Mirrors `get_effective_settings` from the original implementation, which
/// read these same named keys out of its settings table on every call and
/// fell back to module-level constants for anything absent. Resolved fresh
/// wherever it's needed rather than cached, so an admin's settings write
/// takes effect on the next session operation without a broker restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveSettings {
    pub auth_required: bool,
    pub allow_anonymous_terminal: bool,
    pub max_sessions: u32,
    pub idle_ttl_seconds: u64,
    pub scrollback_limit_chars: usize,
    pub default_unix_shell: String,
    pub default_windows_shell: String,
}

impl Default for EffectiveSettings {
    fn default() -> Self {
        Self {
            auth_required: false,
            allow_anonymous_terminal: true,
            max_sessions: 50,
            idle_ttl_seconds: 0,
            scrollback_limit_chars: 200_000,
            default_unix_shell: "/bin/bash".to_string(),
            default_windows_shell: "powershell.exe".to_string(),
        }
    }
}

impl EffectiveSettings {
    /// Selects `default_unix_shell` or `default_windows_shell` for the
    /// platform this broker is running on.
    pub fn default_shell(&self) -> &str {
        if cfg!(windows) {
            &self.default_windows_shell
        } else {
            &self.default_unix_shell
        }
    }

    /// Load defaults, then overlay any keys found in `app_settings`.
    /// Unknown or malformed override keys are ignored rather than failing
    /// the caller — a bad override should degrade to the default, not take
    /// the broker down.
    pub fn resolve(store: &Store) -> Result<Self> {
        let mut settings = Self::default();
        let overrides = store.get_all_settings()?;

        if let Some(v) = overrides.get("auth_required").and_then(|v| v.as_bool()) {
            settings.auth_required = v;
        }
        if let Some(v) = overrides
            .get("allow_anonymous_terminal")
            .and_then(|v| v.as_bool())
        {
            settings.allow_anonymous_terminal = v;
        }
        if let Some(v) = overrides.get("max_sessions").and_then(|v| v.as_u64()) {
            settings.max_sessions = v as u32;
        }
        if let Some(v) = overrides.get("idle_ttl_seconds").and_then(|v| v.as_u64()) {
            settings.idle_ttl_seconds = v;
        }
        if let Some(v) = overrides
            .get("scrollback_limit_chars")
            .and_then(|v| v.as_u64())
        {
            settings.scrollback_limit_chars = v as usize;
        }
        if let Some(v) = overrides.get("default_unix_shell").and_then(|v| v.as_str()) {
            settings.default_unix_shell = v.to_string();
        }
        if let Some(v) = overrides
            .get("default_windows_shell")
            .and_then(|v| v.as_str())
        {
            settings.default_windows_shell = v.to_string();
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn test_store() -> Store {
        Store::from_connection(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn resolve_with_no_overrides_is_default() {
        let store = test_store();
        let settings = EffectiveSettings::resolve(&store).unwrap();
        assert_eq!(settings.max_sessions, 50);
        assert_eq!(settings.idle_ttl_seconds, 0);
        assert!(!settings.auth_required);
        assert!(settings.allow_anonymous_terminal);
    }

    #[test]
    fn resolve_applies_overrides() {
        let store = test_store();
        store
            .set_setting("max_sessions", &serde_json::json!(5))
            .unwrap();
        store
            .set_setting("auth_required", &serde_json::json!(true))
            .unwrap();

        let settings = EffectiveSettings::resolve(&store).unwrap();
        assert_eq!(settings.max_sessions, 5);
        assert!(settings.auth_required);
        // Untouched keys keep their default.
        assert!(settings.allow_anonymous_terminal);
    }

    #[test]
    fn resolve_ignores_malformed_override() {
        let store = test_store();
        store
            .set_setting("max_sessions", &serde_json::json!("not-a-number"))
            .unwrap();

        let settings = EffectiveSettings::resolve(&store).unwrap();
        assert_eq!(settings.max_sessions, 50);
    }

    #[test]
    fn default_shell_picks_platform_key() {
        let settings = EffectiveSettings::default();
        if cfg!(windows) {
            assert_eq!(settings.default_shell(), "powershell.exe");
        } else {
            assert_eq!(settings.default_shell(), "/bin/bash");
        }
    }
}
