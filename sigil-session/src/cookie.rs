//! Carrying the session identifier in an HTTP cookie

use cookie::time::Duration;
use cookie::{Cookie, SameSite};
use sigil_core::{SameSitePolicy, SessionSettings};

/// Attributes of the session cookie
///
/// `max_age` should match the backend's signature lifetime so the browser drops the
/// cookie around the time the server stops accepting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub max_age: i64,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSitePolicy,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, max_age: i64) -> Self {
        Self {
            name: name.into(),
            max_age,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: SameSitePolicy::Lax,
        }
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            name: settings.cookie_name.clone(),
            max_age: settings.max_age,
            path: settings.cookie_path.clone(),
            domain: settings.cookie_domain.clone(),
            secure: settings.cookie_secure,
            http_only: true,
            same_site: settings.cookie_same_site,
        }
    }

    /// Session identifier from a request `Cookie` header
    ///
    /// Malformed pairs are skipped; an empty value counts as absent.
    pub fn extract(&self, header: &str) -> Option<String> {
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    /// `Set-Cookie` value carrying `session_id`
    pub fn to_header_value(&self, session_id: &str) -> String {
        self.build(session_id.to_string()).to_string()
    }

    /// `Set-Cookie` value that makes the client discard the cookie
    pub fn removal_header_value(&self) -> String {
        let mut cookie = self.build(String::new());
        cookie.make_removal();
        cookie.to_string()
    }

    fn build(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);
        cookie.set_path(self.path.clone());
        cookie.set_max_age(Duration::seconds(self.max_age));
        cookie.set_http_only(self.http_only);
        cookie.set_secure(self.secure);
        cookie.set_same_site(match self.same_site {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        });
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        cookie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract() {
        let cookie = SessionCookie::new("session", 60);

        assert_eq!(
            cookie.extract("theme=dark; session=abc.def.ghi; lang=en"),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(cookie.extract("theme=dark"), None);
        assert_eq!(cookie.extract("session="), None);
        assert_eq!(cookie.extract(""), None);
    }

    #[test]
    fn test_header_value_attributes() {
        let mut cookie = SessionCookie::new("session", 3600);
        cookie.secure = true;
        cookie.domain = Some("example.com".to_string());

        let header = cookie.to_header_value("abc");
        assert!(header.starts_with("session=abc"));
        assert!(header.contains("Max-Age=3600"));
        assert!(header.contains("Path=/"));
        assert!(header.contains("HttpOnly"));
        assert!(header.contains("Secure"));
        assert!(header.contains("SameSite=Lax"));
        assert!(header.contains("Domain=example.com"));
    }

    #[test]
    fn test_removal_header_value() {
        let header = SessionCookie::new("session", 3600).removal_header_value();
        assert!(header.starts_with("session=;"));
        assert!(header.contains("Max-Age=0"));
    }
}
