//! Session lifecycle: id resolution, provider dispatch, cookie instructions.

use std::sync::Arc;

use tracing::{debug, warn};

use super::carrier::{Carrier, SessionCookie};
use super::config::{Expiration, SessionConfig};
use super::gc::GcScheduler;
use super::id::{redact, IdGenerator};
use super::store::{Store, StorePool};
use crate::error::SessionError;
use crate::provider::{Provider, ProviderRegistry};
use crate::value::Value;
use crate::Result;

/// Reserved key holding a per-session expiration override in the stored
/// payload. Never visible through [`Store`].
pub const EXPIRATION_KEY: &str = "__store:expiration__";

/// Entry point of the crate: loads, saves, regenerates and destroys
/// sessions on behalf of a request [`Carrier`].
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use axum::http::{HeaderMap, Uri};
/// use session_keeper::http::HttpCarrier;
/// use session_keeper::provider::MemoryProvider;
/// use session_keeper::session::{SessionConfig, SessionManager};
///
/// # async fn run() -> session_keeper::Result<()> {
/// let manager = SessionManager::with_provider(
///     SessionConfig::default(),
///     Arc::new(MemoryProvider::new()),
/// );
///
/// let mut carrier = HttpCarrier::new(HeaderMap::new(), Uri::from_static("/"));
/// let mut store = manager.get(&mut carrier).await?;
/// store.set("user", "alice");
/// manager.save(&mut carrier, store).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: SessionConfig,
    generator: IdGenerator,
    provider: Option<Arc<dyn Provider>>,
    pool: StorePool,
    gc: Option<GcScheduler>,
}

impl SessionManager {
    /// Create a manager without a provider. Every operation fails with
    /// [`SessionError::NotConfigured`] until one is set.
    pub fn new(config: SessionConfig) -> Self {
        let config = config.normalized();
        Self {
            generator: config.generator(),
            pool: StorePool::new(config.pool_size),
            config,
            provider: None,
            gc: None,
        }
    }

    /// Create a manager bound to `provider`.
    pub fn with_provider(config: SessionConfig, provider: Arc<dyn Provider>) -> Self {
        let mut manager = Self::new(config);
        manager.set_provider(provider);
        manager
    }

    /// Attach a provider, replacing the previous one.
    ///
    /// Starts background GC when the provider needs it. GC requires a tokio
    /// runtime; outside of one it is skipped with a warning.
    pub fn set_provider(&mut self, provider: Arc<dyn Provider>) {
        self.gc = None;

        if provider.need_gc() {
            if tokio::runtime::Handle::try_current().is_ok() {
                self.gc = Some(GcScheduler::start(
                    Arc::clone(&provider),
                    self.config.gc_lifetime,
                ));
            } else {
                warn!(
                    provider = provider.name(),
                    "No tokio runtime, session GC not started"
                );
            }
        }

        debug!(provider = provider.name(), "Session provider set");
        self.provider = Some(provider);
    }

    /// Attach the provider registered under `name`.
    pub fn use_registered(&mut self, registry: &ProviderRegistry, name: &str) -> Result<()> {
        let provider = registry
            .get(name)
            .ok_or_else(|| SessionError::UnknownProvider(name.to_string()))?;
        self.set_provider(provider);
        Ok(())
    }

    pub fn provider(&self) -> Option<&Arc<dyn Provider>> {
        self.provider.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    /// Whether a GC task is running for the current provider.
    pub fn gc_running(&self) -> bool {
        self.gc.as_ref().is_some_and(GcScheduler::is_running)
    }

    /// Signal the GC task to stop without waiting for it.
    pub fn stop_gc(&self) {
        if let Some(gc) = &self.gc {
            gc.stop();
        }
    }

    /// Stop the GC task and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(gc) = self.gc.take() {
            gc.shutdown().await;
        }
    }

    fn require_provider(&self) -> Result<&Arc<dyn Provider>> {
        self.provider.as_ref().ok_or(SessionError::NotConfigured)
    }

    fn new_id(&self) -> Result<Vec<u8>> {
        let id = (self.generator)();
        if id.is_empty() {
            return Err(SessionError::EmptySessionId);
        }
        Ok(id)
    }

    /// Id presented by the client: cookie, then header, then query.
    fn session_id_from(&self, carrier: &dyn Carrier) -> Option<Vec<u8>> {
        let present = |v: &Vec<u8>| !v.is_empty();

        if let Some(id) = carrier.cookie(&self.config.cookie_name).filter(present) {
            return Some(id);
        }
        if self.config.id_in_http_header {
            if let Some(id) = carrier.header(&self.config.http_header_name).filter(present) {
                return Some(id);
            }
        }
        if self.config.id_in_url_query {
            if let Some(id) = carrier.query(&self.config.url_query_name).filter(present) {
                return Some(id);
            }
        }
        None
    }

    fn set_http_values(&self, carrier: &mut dyn Carrier, id: &[u8], expiration: Expiration) {
        let secure = self.config.secure && (self.config.is_secure)(&*carrier);
        let cookie = SessionCookie {
            domain: self.config.domain.clone(),
            secure,
            same_site: self.config.same_site,
            max_age: expiration.cookie_max_age(),
            ..SessionCookie::new(self.config.cookie_name.clone(), id.to_vec())
        };
        carrier.set_cookie(&cookie);

        if self.config.id_in_http_header {
            carrier.set_header(&self.config.http_header_name, id);
        }
    }

    fn del_http_values(&self, carrier: &mut dyn Carrier) {
        carrier.delete_cookie(&self.config.cookie_name, &self.config.domain);

        if self.config.id_in_http_header {
            carrier.remove_header(&self.config.http_header_name);
        }
    }

    /// Load the session of the current request, or start a new one.
    ///
    /// A new session gets a fresh id and the carrier is told to issue it.
    /// A known id whose record is gone yields an empty store under that id.
    pub async fn get(&self, carrier: &mut dyn Carrier) -> Result<Store> {
        let provider = self.require_provider()?;

        let mut store = self.pool.acquire();
        store.set_default_expiration(self.config.expiration);

        match self.session_id_from(&*carrier) {
            Some(id) => {
                let bytes = provider.get(&id).await?;
                if !bytes.is_empty() {
                    let mut data = self.config.codec.decode(&bytes)?;
                    if let Some(Value::Int(secs)) = data.remove(EXPIRATION_KEY) {
                        store.restore_expiration(Expiration::from_secs(secs));
                    }
                    store.load(data);
                }
                debug!(id = %redact(&id), values = store.len(), "Session loaded");
                store.set_session_id(id);
            }
            None => {
                let id = self.new_id()?;
                debug!(id = %redact(&id), "New session");
                self.set_http_values(carrier, &id, store.expiration());
                store.set_session_id(id);
            }
        }

        Ok(store)
    }

    /// Persist `store` and return it to the pool.
    ///
    /// The cookie is reissued when the expiration was changed during this
    /// request.
    pub async fn save(&self, carrier: &mut dyn Carrier, mut store: Store) -> Result<()> {
        let provider = self.require_provider()?;

        if let Some(expiration) = store.expiration_override() {
            store
                .data_mut()
                .insert(EXPIRATION_KEY.to_string(), Value::Int(expiration.as_secs()));
        }

        let result = self.persist(&**provider, carrier, &store).await;
        self.pool.release(store);
        result
    }

    async fn persist(
        &self,
        provider: &dyn Provider,
        carrier: &mut dyn Carrier,
        store: &Store,
    ) -> Result<()> {
        let id = store.session_id();
        if id.is_empty() {
            return Err(SessionError::InvalidSessionId(String::new()));
        }

        let bytes = self.config.codec.encode(store.data())?;
        let expiration = store.expiration();
        provider
            .save(&id, &bytes, expiration.ttl(self.config.browser_session_ttl))
            .await?;

        if store.has_expiration_changed() {
            self.set_http_values(carrier, &id, expiration);
        }
        debug!(id = %redact(&id), bytes = bytes.len(), "Session saved");
        Ok(())
    }

    /// Move the session to a fresh id, keeping its values.
    pub async fn regenerate(&self, carrier: &mut dyn Carrier, store: &mut Store) -> Result<()> {
        let provider = self.require_provider()?;

        let new_id = self.new_id()?;
        let old_id = store.session_id();
        let expiration = store.expiration();

        provider
            .regenerate(&old_id, &new_id, expiration.ttl(self.config.browser_session_ttl))
            .await?;

        debug!(old = %redact(&old_id), new = %redact(&new_id), "Session regenerated");
        self.set_http_values(carrier, &new_id, expiration);
        store.set_session_id(new_id);
        Ok(())
    }

    /// Remove the session of the current request and clear its cookie.
    ///
    /// A request without a session id is a no-op.
    pub async fn destroy(&self, carrier: &mut dyn Carrier) -> Result<()> {
        let provider = self.require_provider()?;

        let Some(id) = self.session_id_from(&*carrier) else {
            return Ok(());
        };

        provider.destroy(&id).await?;
        self.del_http_values(carrier);
        debug!(id = %redact(&id), "Session destroyed");
        Ok(())
    }

    /// Number of sessions in the provider, best effort.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.require_provider()?.count().await)
    }
}
