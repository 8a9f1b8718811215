//! Session cookie store used for fragment correlation.
//!
//! An attached outlet sets `fragment_id=<id>; Path=/` so that a fragment
//! origin can tell it is being pierced. Detaching the outlet expires the
//! cookie unless a later outlet has since taken it over.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Name of the correlation cookie; its value is the fragment id.
pub const CORRELATION_COOKIE: &str = "fragment_id";

/// A single cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: String,
    /// `None` for session cookies.
    pub expires: Option<SystemTime>,
}

impl Cookie {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }
}

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;
        if self.expires == Some(UNIX_EPOCH) {
            write!(f, "; Expires=Thu, 01 Jan 1970 00:00:00 GMT")?;
        }
        Ok(())
    }
}

/// Session-scoped cookie store keyed by `(name, path)`.
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: Vec<Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) a session cookie.
    pub fn set(&mut self, name: &str, value: &str, path: &str) {
        let cookie = Cookie {
            name: name.to_string(),
            value: value.to_string(),
            path: path.to_string(),
            expires: None,
        };
        match self
            .cookies
            .iter_mut()
            .find(|c| c.name == name && c.path == path)
        {
            Some(existing) => *existing = cookie,
            None => self.cookies.push(cookie),
        }
    }

    /// Expire a cookie by moving its expiry to the epoch.
    pub fn expire(&mut self, name: &str, path: &str) {
        for cookie in self
            .cookies
            .iter_mut()
            .filter(|c| c.name == name && c.path == path)
        {
            cookie.expires = Some(UNIX_EPOCH);
        }
    }

    /// Value of a live cookie.
    pub fn get(&self, name: &str) -> Option<&str> {
        let now = SystemTime::now();
        self.cookies
            .iter()
            .find(|c| c.name == name && !c.is_expired(now))
            .map(|c| c.value.as_str())
    }

    /// `Cookie` request header value for every live cookie, if any.
    pub fn header_value(&self) -> Option<String> {
        let now = SystemTime::now();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| !c.is_expired(now))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Every stored cookie, expired ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_expire() {
        let mut jar = CookieJar::new();
        jar.set(CORRELATION_COOKIE, "news", "/");
        assert_eq!(jar.get("fragment_id"), Some("news"));
        assert_eq!(jar.header_value().as_deref(), Some("fragment_id=news"));

        jar.expire(CORRELATION_COOKIE, "/");
        assert_eq!(jar.get(CORRELATION_COOKIE), None);
        assert_eq!(jar.header_value(), None);

        let cookie = jar.iter().next().unwrap();
        assert_eq!(
            cookie.to_string(),
            "fragment_id=news; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT"
        );
    }

    #[test]
    fn test_set_revives_expired_cookie() {
        let mut jar = CookieJar::new();
        jar.set("a", "1", "/");
        jar.expire("a", "/");
        jar.set("a", "2", "/");
        assert_eq!(jar.get("a"), Some("2"));
        assert_eq!(jar.iter().count(), 1);
    }
}
