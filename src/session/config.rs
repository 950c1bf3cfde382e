//! Session manager configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::carrier::{Carrier, SameSite, UNLIMITED_COOKIE_AGE};
use super::id::{default_generator, IdGenerator, DEFAULT_ID_LENGTH};
use crate::codec::{BinaryCodec, Codec};

pub const DEFAULT_COOKIE_NAME: &str = "sessionid";
pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_GC_LIFETIME: Duration = Duration::from_secs(60);
/// Keep-alive applied server-side to browser-session cookies.
pub const DEFAULT_BROWSER_SESSION_TTL: Duration = Duration::from_secs(48 * 60 * 60);
pub const DEFAULT_POOL_SIZE: usize = 1024;

/// Decides whether the `Secure` cookie attribute may be set for a request.
pub type SecurePredicate = Arc<dyn Fn(&dyn Carrier) -> bool + Send + Sync>;

/// How long a session lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Never expires; the cookie is kept for 24 years.
    Never,
    /// Lives as long as the client keeps the browser open.
    Browser,
    /// Expires after this much inactivity.
    After(Duration),
}

/// Round up to whole seconds, the resolution of persisted expirations.
fn whole_secs(d: Duration) -> Duration {
    if d.subsec_nanos() == 0 {
        d
    } else {
        Duration::from_secs(d.as_secs().saturating_add(1))
    }
}

impl Expiration {
    /// Decode the signed-seconds form: `0` never, negative browser-session.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            0 => Expiration::Never,
            s if s < 0 => Expiration::Browser,
            s => Expiration::After(Duration::from_secs(s.unsigned_abs())),
        }
    }

    /// Inverse of [`Expiration::from_secs`].
    pub fn as_secs(&self) -> i64 {
        match self {
            Expiration::Never => 0,
            Expiration::Browser => -1,
            Expiration::After(d) if d.is_zero() => 0,
            Expiration::After(d) => i64::try_from(whole_secs(*d).as_secs()).unwrap_or(i64::MAX),
        }
    }

    /// Lifetime handed to providers. `Duration::ZERO` means never expire.
    pub fn ttl(&self, browser_session_ttl: Duration) -> Duration {
        match self {
            Expiration::Never => Duration::ZERO,
            Expiration::Browser => browser_session_ttl,
            Expiration::After(d) => whole_secs(*d),
        }
    }

    /// `Max-Age` of the cookie carrying the id. `None` for browser sessions.
    pub fn cookie_max_age(&self) -> Option<Duration> {
        match self {
            Expiration::Browser => None,
            Expiration::Never => Some(UNLIMITED_COOKIE_AGE),
            Expiration::After(d) if d.is_zero() => Some(UNLIMITED_COOKIE_AGE),
            Expiration::After(d) => Some(whole_secs(*d)),
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Expiration::After(DEFAULT_EXPIRATION)
    }
}

/// Configuration of a [`super::SessionManager`].
///
/// Fields are public; the `with_*` methods are shorthand for chained setup.
#[derive(Clone)]
pub struct SessionConfig {
    /// Cookie carrying the session id.
    pub cookie_name: String,
    /// Cookie domain. Empty means host-only.
    pub domain: String,
    /// Default lifetime of new sessions.
    pub expiration: Expiration,
    /// Interval between GC runs for providers that need one.
    pub gc_lifetime: Duration,
    /// Allow the `Secure` attribute at all.
    pub secure: bool,
    /// Per-request check combined with `secure`.
    pub is_secure: SecurePredicate,
    pub same_site: SameSite,
    /// Also accept and mirror the id in a header.
    pub id_in_http_header: bool,
    pub http_header_name: String,
    /// Also accept the id from a query parameter.
    pub id_in_url_query: bool,
    pub url_query_name: String,
    /// Length of ids made by the default generator.
    pub id_length: usize,
    /// Custom id generator. `None` uses the CSPRNG alphanumeric one.
    pub id_generator: Option<IdGenerator>,
    pub codec: Arc<dyn Codec>,
    /// Server-side lifetime of browser-session records.
    pub browser_session_ttl: Duration,
    /// Idle stores kept for reuse.
    pub pool_size: usize,
}

impl SessionConfig {
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_gc_lifetime(mut self, interval: Duration) -> Self {
        self.gc_lifetime = interval;
        self
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_is_secure<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&dyn Carrier) -> bool + Send + Sync + 'static,
    {
        self.is_secure = Arc::new(predicate);
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Accept and mirror the id in the named header.
    pub fn with_http_header(mut self, name: impl Into<String>) -> Self {
        self.id_in_http_header = true;
        self.http_header_name = name.into();
        self
    }

    /// Accept the id from the named query parameter.
    pub fn with_url_query(mut self, name: impl Into<String>) -> Self {
        self.id_in_url_query = true;
        self.url_query_name = name.into();
        self
    }

    pub fn with_id_length(mut self, len: usize) -> Self {
        self.id_length = len;
        self
    }

    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> Vec<u8> + Send + Sync + 'static,
    {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    pub fn with_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Arc::new(codec);
        self
    }

    pub fn with_browser_session_ttl(mut self, ttl: Duration) -> Self {
        self.browser_session_ttl = ttl;
        self
    }

    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Replace blank or zero settings with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.cookie_name.is_empty() {
            self.cookie_name = DEFAULT_COOKIE_NAME.to_string();
        }
        if self.http_header_name.is_empty() {
            self.http_header_name = self.cookie_name.clone();
        }
        if self.url_query_name.is_empty() {
            self.url_query_name = self.cookie_name.clone();
        }
        if self.gc_lifetime.is_zero() {
            self.gc_lifetime = DEFAULT_GC_LIFETIME;
        }
        if self.id_length == 0 {
            self.id_length = DEFAULT_ID_LENGTH;
        }
        self
    }

    /// Generator in effect: the custom one if set, else the default.
    pub fn generator(&self) -> IdGenerator {
        self.id_generator
            .clone()
            .unwrap_or_else(|| default_generator(self.id_length))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            domain: String::new(),
            expiration: Expiration::default(),
            gc_lifetime: DEFAULT_GC_LIFETIME,
            secure: true,
            is_secure: Arc::new(|carrier: &dyn Carrier| carrier.is_tls()),
            same_site: SameSite::default(),
            id_in_http_header: false,
            http_header_name: DEFAULT_COOKIE_NAME.to_string(),
            id_in_url_query: false,
            url_query_name: DEFAULT_COOKIE_NAME.to_string(),
            id_length: DEFAULT_ID_LENGTH,
            id_generator: None,
            codec: Arc::new(BinaryCodec),
            browser_session_ttl: DEFAULT_BROWSER_SESSION_TTL,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("domain", &self.domain)
            .field("expiration", &self.expiration)
            .field("gc_lifetime", &self.gc_lifetime)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("id_in_http_header", &self.id_in_http_header)
            .field("http_header_name", &self.http_header_name)
            .field("id_in_url_query", &self.id_in_url_query)
            .field("url_query_name", &self.url_query_name)
            .field("id_length", &self.id_length)
            .field("custom_id_generator", &self.id_generator.is_some())
            .field("codec", &self.codec.name())
            .field("browser_session_ttl", &self.browser_session_ttl)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "sessionid");
        assert_eq!(config.domain, "");
        assert_eq!(config.expiration, Expiration::After(Duration::from_secs(7200)));
        assert_eq!(config.gc_lifetime, Duration::from_secs(60));
        assert!(config.secure);
        assert!(!config.id_in_http_header);
        assert!(!config.id_in_url_query);
        assert_eq!(config.id_length, 32);
        assert_eq!(config.codec.name(), "binary");
    }

    #[test]
    fn test_expiration_from_secs() {
        assert_eq!(Expiration::from_secs(0), Expiration::Never);
        assert_eq!(Expiration::from_secs(-1), Expiration::Browser);
        assert_eq!(Expiration::from_secs(-500), Expiration::Browser);
        assert_eq!(
            Expiration::from_secs(30),
            Expiration::After(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_expiration_as_secs_inverse() {
        for secs in [0, -1, 1, 7200] {
            assert_eq!(Expiration::from_secs(secs).as_secs(), secs);
        }
        assert_eq!(Expiration::After(Duration::ZERO).as_secs(), 0);
    }

    #[test]
    fn test_sub_second_expiration_rounds_up() {
        let half = Expiration::After(Duration::from_millis(500));
        assert_eq!(half.as_secs(), 1);
        assert_eq!(
            Expiration::from_secs(half.as_secs()),
            Expiration::After(Duration::from_secs(1))
        );
        assert_eq!(half.ttl(Duration::ZERO), Duration::from_secs(1));
        assert_eq!(half.cookie_max_age(), Some(Duration::from_secs(1)));

        let longer = Expiration::After(Duration::from_millis(2_100));
        assert_eq!(longer.as_secs(), 3);
        assert_eq!(longer.ttl(Duration::ZERO), Duration::from_secs(3));
    }

    #[test]
    fn test_expiration_ttl() {
        let keepalive = Duration::from_secs(99);
        assert_eq!(Expiration::Never.ttl(keepalive), Duration::ZERO);
        assert_eq!(Expiration::Browser.ttl(keepalive), keepalive);
        assert_eq!(
            Expiration::After(Duration::from_secs(5)).ttl(keepalive),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_cookie_max_age() {
        assert_eq!(Expiration::Browser.cookie_max_age(), None);
        assert_eq!(Expiration::Never.cookie_max_age(), Some(UNLIMITED_COOKIE_AGE));
        assert_eq!(
            Expiration::After(Duration::from_secs(60)).cookie_max_age(),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_normalized_fills_blanks() {
        let config = SessionConfig {
            cookie_name: String::new(),
            http_header_name: String::new(),
            url_query_name: String::new(),
            gc_lifetime: Duration::ZERO,
            id_length: 0,
            ..SessionConfig::default()
        }
        .normalized();

        assert_eq!(config.cookie_name, "sessionid");
        assert_eq!(config.http_header_name, "sessionid");
        assert_eq!(config.url_query_name, "sessionid");
        assert_eq!(config.gc_lifetime, DEFAULT_GC_LIFETIME);
        assert_eq!(config.id_length, DEFAULT_ID_LENGTH);
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::default()
            .with_cookie_name("sid")
            .with_http_header("X-Session")
            .with_url_query("token")
            .with_id_generator(|| b"fixed".to_vec());

        assert_eq!(config.cookie_name, "sid");
        assert!(config.id_in_http_header);
        assert_eq!(config.http_header_name, "X-Session");
        assert!(config.id_in_url_query);
        assert_eq!(config.url_query_name, "token");
        assert_eq!((config.generator())(), b"fixed".to_vec());
    }

    #[test]
    fn test_default_generator_uses_id_length() {
        let config = SessionConfig::default().with_id_length(12);
        assert_eq!((config.generator())().len(), 12);
    }
}
