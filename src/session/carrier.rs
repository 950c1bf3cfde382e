//! Transport boundary: where session ids are read from and written to.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Lifetime used for cookies of sessions that never expire (24 years).
pub const UNLIMITED_COOKIE_AGE: Duration = Duration::from_secs(24 * 365 * 24 * 60 * 60);

/// Request/response collaborator of the session manager.
///
/// Implementations expose the session id sources of one request (cookie,
/// header, query parameter) and receive instructions to set or clear the
/// id on the response. See [`crate::http::HttpCarrier`] for the HTTP one.
pub trait Carrier: Send {
    /// Value of the named request cookie.
    fn cookie(&self, name: &str) -> Option<Vec<u8>>;

    /// Value of the named request header.
    fn header(&self, name: &str) -> Option<Vec<u8>>;

    /// Value of the named query parameter.
    fn query(&self, name: &str) -> Option<Vec<u8>>;

    /// Whether the request arrived over TLS.
    fn is_tls(&self) -> bool {
        false
    }

    /// Issue (or reissue) a cookie on the response.
    fn set_cookie(&mut self, cookie: &SessionCookie);

    /// Tell the client to drop the named cookie.
    fn delete_cookie(&mut self, name: &str, domain: &str);

    /// Mirror the id into a header.
    fn set_header(&mut self, name: &str, value: &[u8]);

    /// Remove a mirrored header.
    fn remove_header(&mut self, name: &str);
}

/// SameSite cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// No SameSite attribute.
    #[default]
    Disabled,
    /// Bare `SameSite` attribute, leaving the mode to the client.
    Default,
    Lax,
    Strict,
    None,
}

impl SameSite {
    /// Attribute text, if any.
    pub fn attribute(&self) -> Option<&'static str> {
        match self {
            SameSite::Disabled => None,
            SameSite::Default => Some("SameSite"),
            SameSite::Lax => Some("SameSite=Lax"),
            SameSite::Strict => Some("SameSite=Strict"),
            SameSite::None => Some("SameSite=None"),
        }
    }
}

/// A session cookie to be written on the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: Vec<u8>,
    pub domain: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// `None` makes a browser-session cookie.
    pub max_age: Option<Duration>,
}

impl SessionCookie {
    /// Cookie with the fixed attributes used for session ids.
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            http_only: true,
            secure: false,
            same_site: SameSite::Disabled,
            max_age: None,
        }
    }

    /// Cookie instructing the client to drop `name`.
    pub fn removal(name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            max_age: Some(Duration::ZERO),
            ..Self::new(name, Vec::new())
        }
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, String::from_utf8_lossy(&self.value));
        if !self.domain.is_empty() {
            out.push_str("; Domain=");
            out.push_str(&self.domain);
        }
        out.push_str("; Path=");
        out.push_str(&self.path);
        if let Some(age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", age.as_secs()));
            if age.is_zero() {
                out.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
            }
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if let Some(same_site) = self.same_site.attribute() {
            out.push_str("; ");
            out.push_str(same_site);
        }
        out
    }
}
