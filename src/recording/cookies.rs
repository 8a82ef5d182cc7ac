//! Session token and the per-recording cookie set.

use std::fmt;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "BREEZESESSION";

/// Bearer token that grants access to a private recording.
///
/// The token is never printed: `Debug` shows only its length.
#[derive(Clone, PartialEq, Eq)]
pub struct Session(String);

impl Session {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token value, for building request headers only.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Token length, the only property that is safe to log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for an empty token.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session(<redacted, {} chars>)", self.0.len())
    }
}

/// A single name/value cookie pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
}

impl Cookie {
    /// Creates a cookie pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered cookies for one recording, unique by name.
///
/// The session cookie always comes first; later cookies with a name already
/// present are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieSet {
    cookies: Vec<Cookie>,
}

impl CookieSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set holding only the session cookie, if any.
    #[must_use]
    pub fn from_session(session: Option<&Session>) -> Self {
        Self::merged(session, std::iter::empty())
    }

    /// Merges the session cookie with cookies returned by the page.
    #[must_use]
    pub fn merged(session: Option<&Session>, extra: impl IntoIterator<Item = Cookie>) -> Self {
        let mut set = Self::new();
        if let Some(session) = session.filter(|s| !s.is_empty()) {
            set.insert(Cookie::new(SESSION_COOKIE_NAME, session.token()));
        }
        for cookie in extra {
            set.insert(cookie);
        }
        set
    }

    /// Adds a cookie unless one with the same name exists. Returns whether it was added.
    pub fn insert(&mut self, cookie: Cookie) -> bool {
        if cookie.name.is_empty() || self.cookies.iter().any(|c| c.name == cookie.name) {
            return false;
        }
        self.cookies.push(cookie);
        true
    }

    /// Number of cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true when no cookies are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterates cookies in send order.
    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.iter()
    }

    /// Renders the `Cookie` request header value, or `None` when empty.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_debug_is_redacted() {
        let session = Session::new("super-secret-token");
        let shown = format!("{session:?}");
        assert!(!shown.contains("super-secret"), "token leaked: {shown}");
        assert!(shown.contains("18 chars"), "length missing: {shown}");
    }

    #[test]
    fn test_merged_puts_session_first_and_dedupes() {
        let session = Session::new("tok");
        let set = CookieSet::merged(
            Some(&session),
            vec![
                Cookie::new("JSESSIONID", "a"),
                Cookie::new(SESSION_COOKIE_NAME, "other"),
                Cookie::new("JSESSIONID", "b"),
                Cookie::new("", "ignored"),
            ],
        );
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.header_value().unwrap(),
            "BREEZESESSION=tok; JSESSIONID=a"
        );
    }

    #[test]
    fn test_empty_set_renders_no_header() {
        assert!(CookieSet::from_session(None).header_value().is_none());
        assert!(CookieSet::from_session(Some(&Session::new(""))).is_empty());
    }
}
