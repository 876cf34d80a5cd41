//! Shared cookie helpers.
//!
//! Centralises `Set-Cookie` header construction for the session and admin
//! cookies so the routing layer does not duplicate the formatting logic.

use chrono::{DateTime, Utc};

use crate::config::{AuthConfig, SessionConfig};

/// Build a `Set-Cookie` header value for a session id.
pub fn session_cookie(session_id: &str, config: &AuthConfig, expires_at: DateTime<Utc>) -> String {
    let session_config = &config.session;
    let attrs = cookie_attributes(session_config);
    let expires = expires_at.format("%a, %d %b %Y %H:%M:%S GMT");

    format!(
        "{}={}; Path=/; Expires={}{}",
        session_config.cookie_name, session_id, expires, attrs
    )
}

/// Build a `Set-Cookie` header that clears (expires) the session cookie.
pub fn clear_session_cookie(config: &AuthConfig) -> String {
    let session_config = &config.session;
    let attrs = cookie_attributes(session_config);

    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
        session_config.cookie_name, attrs
    )
}

/// Build a `Set-Cookie` header value for a signed admin token.
pub fn admin_cookie(token: &str, config: &AuthConfig) -> String {
    let attrs = cookie_attributes(&config.session);
    format!("{}={}; Path=/{}", config.admin.cookie_name, token, attrs)
}

/// Build a `Set-Cookie` header that clears the admin cookie. This is all
/// admin logout does; the token itself stays valid until its TTL elapses.
pub fn clear_admin_cookie(config: &AuthConfig) -> String {
    let attrs = cookie_attributes(&config.session);
    format!(
        "{}=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
        config.admin.cookie_name, attrs
    )
}

/// Format the common "; Secure; HttpOnly; SameSite=…" suffix.
fn cookie_attributes(session_config: &SessionConfig) -> String {
    let secure = if session_config.cookie_secure {
        "; Secure"
    } else {
        ""
    };
    let http_only = if session_config.cookie_http_only {
        "; HttpOnly"
    } else {
        ""
    };

    format!(
        "{}{}; SameSite={}",
        secure, http_only, session_config.cookie_same_site
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn session_cookie_carries_attributes() {
        let config = AuthConfig::new("0123456789012345678901234567890X");
        let expires = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let cookie = session_cookie("sess-1", &config, expires);
        assert!(cookie.starts_with("creel.session=sess-1; Path=/"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn clear_cookie_expires_in_the_past() {
        let config = AuthConfig::new("0123456789012345678901234567890X");
        let cookie = clear_session_cookie(&config);
        assert!(cookie.contains("Expires=Thu, 01 Jan 1970"));
    }
}
