//! # session-keeper
//!
//! Transport-agnostic session store with pluggable backends.
//!
//! Sessions are small key/value records identified by a random token. The
//! [`SessionManager`] resolves the token from a request [`Carrier`] (cookie,
//! header or query parameter), loads the record from a [`Provider`] and
//! hands out an owned [`Store`] for the request to mutate and save.
//!
//! ## Features
//!
//! - **Pluggable backends**: in-memory sharded map and one-file-per-session
//!   storage behind an async, byte-oriented [`Provider`] trait
//! - **Codecs**: compact MessagePack-compatible binary, base64 and JSON
//! - **Background GC**: expired records are swept by a tokio task
//! - **HTTP adapter**: [`http::HttpCarrier`] over `axum::http` types
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use axum::http::{HeaderMap, Uri};
//! use session_keeper::http::HttpCarrier;
//! use session_keeper::{MemoryProvider, SessionConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> session_keeper::Result<()> {
//!     session_keeper::logging::try_init().ok();
//!
//!     let manager = SessionManager::with_provider(
//!         SessionConfig::default(),
//!         Arc::new(MemoryProvider::new()),
//!     );
//!
//!     let mut carrier = HttpCarrier::new(HeaderMap::new(), Uri::from_static("/"));
//!     let mut store = manager.get(&mut carrier).await?;
//!     store.set("visits", 1);
//!     manager.save(&mut carrier, store).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ccmap;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod provider;
pub mod server;
pub mod session;
pub mod value;

// Re-export commonly used types
pub use ccmap::CcMap;
pub use codec::{Base64Codec, BinaryCodec, Codec, CodecError, JsonCodec};
pub use error::{Result, SessionError};
pub use provider::{FileProvider, MemoryProvider, Provider, ProviderRegistry};
pub use session::{
    Carrier, Expiration, GcScheduler, SameSite, SessionConfig, SessionCookie, SessionManager,
    Store, StorePool,
};
pub use value::{Dict, Value};
