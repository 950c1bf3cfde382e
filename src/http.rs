//! [`Carrier`] over `axum::http` request parts.

use std::collections::HashMap;

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Uri};
use tracing::warn;

use crate::session::{Carrier, SessionCookie};

/// Reads the session id from request headers and query string, and
/// collects `Set-Cookie` and mirrored headers for the response.
///
/// Id changes are also applied to the request view, so later lookups in
/// the same request see the new id.
#[derive(Debug, Clone)]
pub struct HttpCarrier {
    request: HeaderMap,
    uri: Uri,
    tls: bool,
    response: HeaderMap,
    /// Cookies set (`Some`) or deleted (`None`) during this request.
    cookie_overrides: HashMap<String, Option<Vec<u8>>>,
}

impl HttpCarrier {
    pub fn new(request: HeaderMap, uri: Uri) -> Self {
        Self {
            request,
            uri,
            tls: false,
            response: HeaderMap::new(),
            cookie_overrides: HashMap::new(),
        }
    }

    /// Build from request parts. TLS is taken from the URI scheme.
    pub fn from_parts(parts: &Parts) -> Self {
        let tls = parts.uri.scheme_str() == Some("https");
        Self::new(parts.headers.clone(), parts.uri.clone()).with_tls(tls)
    }

    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Headers to add to the response.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response
    }

    pub fn into_response_headers(self) -> HeaderMap {
        self.response
    }

    fn request_cookie(&self, name: &str) -> Option<Vec<u8>> {
        self.request
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| value.trim().trim_matches('"').as_bytes().to_vec())
    }

    fn replace_set_cookie(&mut self, name: &str, value: HeaderValue) {
        let prefix = format!("{name}=");
        let kept: Vec<HeaderValue> = self
            .response
            .get_all(SET_COOKIE)
            .iter()
            .filter(|v| !v.as_bytes().starts_with(prefix.as_bytes()))
            .cloned()
            .collect();

        self.response.remove(SET_COOKIE);
        for other in kept {
            self.response.append(SET_COOKIE, other);
        }
        self.response.append(SET_COOKIE, value);
    }
}

impl Carrier for HttpCarrier {
    fn cookie(&self, name: &str) -> Option<Vec<u8>> {
        match self.cookie_overrides.get(name) {
            Some(overridden) => overridden.clone(),
            None => self.request_cookie(name),
        }
    }

    fn header(&self, name: &str) -> Option<Vec<u8>> {
        self.request
            .get(name)
            .map(|value| value.as_bytes().to_vec())
    }

    fn query(&self, name: &str) -> Option<Vec<u8>> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned().into_bytes())
    }

    fn is_tls(&self) -> bool {
        self.tls
    }

    fn set_cookie(&mut self, cookie: &SessionCookie) {
        match HeaderValue::from_str(&cookie.to_header_value()) {
            Ok(value) => {
                self.replace_set_cookie(&cookie.name, value);
                self.cookie_overrides
                    .insert(cookie.name.clone(), Some(cookie.value.clone()));
            }
            Err(e) => warn!(cookie = %cookie.name, error = %e, "Invalid cookie value"),
        }
    }

    fn delete_cookie(&mut self, name: &str, domain: &str) {
        let removal = SessionCookie::removal(name, domain);
        match HeaderValue::from_str(&removal.to_header_value()) {
            Ok(value) => self.replace_set_cookie(name, value),
            Err(e) => warn!(cookie = %name, error = %e, "Invalid cookie name"),
        }
        self.cookie_overrides.insert(name.to_string(), None);
    }

    fn set_header(&mut self, name: &str, value: &[u8]) {
        let parsed = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value),
        );
        match parsed {
            (Ok(name), Ok(value)) => {
                self.request.insert(name.clone(), value.clone());
                self.response.insert(name, value);
            }
            _ => warn!(header = %name, "Invalid session header"),
        }
    }

    fn remove_header(&mut self, name: &str) {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            self.request.remove(&name);
            self.response.remove(&name);
        }
    }
}
