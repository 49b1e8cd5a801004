//! Sessions for the authoring endpoints.

use axum::http::{header, HeaderMap};
use serde::Serialize;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserIdentity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub user: UserIdentity,
}

pub trait SessionProvider: Send + Sync {
    /// The session carried by a request, if any.
    fn get_session(&self, headers: &HeaderMap) -> Option<Session>;

    /// Check a login credential, returning the session it grants.
    fn login(&self, api_key: &str) -> Option<Session>;
}

/// Sessions backed by a single administrator API key, sent as
/// `Authorization: Bearer <key>`. Without a key nobody is signed in.
pub struct ApiKeySessions {
    api_key: Option<String>,
}

impl ApiKeySessions {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
        }
    }

    fn admin() -> Session {
        Session {
            user: UserIdentity {
                id: "admin".to_string(),
                name: "Administrator".to_string(),
            },
        }
    }
}

impl SessionProvider for ApiKeySessions {
    fn get_session(&self, headers: &HeaderMap) -> Option<Session> {
        let token = headers
            .get(header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?
            .trim();
        self.login(token)
    }

    fn login(&self, api_key: &str) -> Option<Session> {
        let expected = self.api_key.as_deref()?;
        constant_time_compare(api_key, expected).then(Self::admin)
    }
}

/// Constant-time string comparison to prevent timing attacks
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
        headers
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret123", "secret123"));
        assert!(!constant_time_compare("secret123", "secret124"));
        assert!(!constant_time_compare("secret123", "secret12"));
        assert!(!constant_time_compare("", "secret"));
    }

    #[test]
    fn test_bearer_key_grants_session() {
        let sessions = ApiKeySessions::new(Some("s3cret".to_string()));
        let session = sessions.get_session(&headers("Bearer s3cret")).unwrap();
        assert_eq!(session.user.id, "admin");
        assert_eq!(session.user.name, "Administrator");
    }

    #[test]
    fn test_wrong_or_malformed_credentials() {
        let sessions = ApiKeySessions::new(Some("s3cret".to_string()));
        assert!(sessions.get_session(&headers("Bearer wrong")).is_none());
        assert!(sessions.get_session(&headers("Basic s3cret")).is_none());
        assert!(sessions.get_session(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_no_key_configured_means_no_sessions() {
        for key in [None, Some(String::new())] {
            let sessions = ApiKeySessions::new(key);
            assert!(sessions.login("").is_none());
            assert!(sessions.get_session(&headers("Bearer ")).is_none());
        }
    }
}
