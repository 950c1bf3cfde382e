//! Session management module.
//!
//! This module provides the per-request [`Store`], the [`SessionManager`]
//! driving its lifecycle, the [`Carrier`] seam towards the transport and
//! the background [`GcScheduler`].

mod carrier;
mod config;
mod gc;
mod id;
mod manager;
mod store;

pub use carrier::{Carrier, SameSite, SessionCookie, UNLIMITED_COOKIE_AGE};
pub use config::{
    Expiration, SecurePredicate, SessionConfig, DEFAULT_BROWSER_SESSION_TTL, DEFAULT_COOKIE_NAME,
    DEFAULT_EXPIRATION, DEFAULT_GC_LIFETIME, DEFAULT_POOL_SIZE,
};
pub use gc::{run_once, GcScheduler};
pub use id::{default_generator, generate_id, redact, IdGenerator, DEFAULT_ID_LENGTH, ID_ALPHABET};
pub use manager::{SessionManager, EXPIRATION_KEY};
pub use store::{Store, StorePool};
