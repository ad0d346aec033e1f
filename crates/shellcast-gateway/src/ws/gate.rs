use axum::http::HeaderMap;
use shellcast_core::BrokerConfig;
use shellcast_store::EffectiveSettings;

/// Outcome of the attach gate: either the connection may proceed, or it
/// must be rejected with one of the two WS close codes spec'd for this
/// surface.
pub enum GateDecision {
    Allow,
    Reject(u16),
}

pub const CODE_UNAUTHENTICATED: u16 = 4401;
pub const CODE_ANONYMOUS_DISABLED: u16 = 4403;

/// Decide whether an attach attempt may proceed. Only the decision point is
/// implemented here, not a full session/user system: when auth is required
/// we only check that a non-empty session cookie is present, the way the
/// bridge's gate is specified to — verifying the token against a user store
/// is explicitly out of scope.
pub fn check(settings: &EffectiveSettings, config: &BrokerConfig, headers: &HeaderMap) -> GateDecision {
    if settings.auth_required {
        match extract_cookie(headers, &config.session_cookie.name) {
            Some(value) if !value.is_empty() => GateDecision::Allow,
            _ => GateDecision::Reject(CODE_UNAUTHENTICATED),
        }
    } else if !settings.allow_anonymous_terminal {
        GateDecision::Reject(CODE_ANONYMOUS_DISABLED)
    } else {
        GateDecision::Allow
    }
}

fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(name: &str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            format!("{name}={value}; other=1").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn auth_required_without_cookie_is_rejected() {
        let settings = EffectiveSettings {
            auth_required: true,
            ..EffectiveSettings::default()
        };
        let config = BrokerConfig::default();
        let decision = check(&settings, &config, &HeaderMap::new());
        assert!(matches!(decision, GateDecision::Reject(CODE_UNAUTHENTICATED)));
    }

    #[test]
    fn auth_required_with_cookie_is_allowed() {
        let settings = EffectiveSettings {
            auth_required: true,
            ..EffectiveSettings::default()
        };
        let config = BrokerConfig::default();
        let headers = headers_with_cookie(&config.session_cookie.name, "abc123");
        let decision = check(&settings, &config, &headers);
        assert!(matches!(decision, GateDecision::Allow));
    }

    #[test]
    fn anonymous_disabled_without_auth_is_rejected() {
        let settings = EffectiveSettings {
            auth_required: false,
            allow_anonymous_terminal: false,
            ..EffectiveSettings::default()
        };
        let config = BrokerConfig::default();
        let decision = check(&settings, &config, &HeaderMap::new());
        assert!(matches!(
            decision,
            GateDecision::Reject(CODE_ANONYMOUS_DISABLED)
        ));
    }

    #[test]
    fn anonymous_allowed_by_default() {
        let settings = EffectiveSettings::default();
        let config = BrokerConfig::default();
        let decision = check(&settings, &config, &HeaderMap::new());
        assert!(matches!(decision, GateDecision::Allow));
    }
}
